// SPDX-FileCopyrightText: 2026 Wavecast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the WhatsApp Cloud API.
//!
//! Provides [`CloudApiGateway`], the production [`MessagingGateway`]: plain
//! single-shot requests with no retry of its own. Retry policy belongs to
//! the dispatch queue, which already distinguishes transient gateway errors
//! from permanent faults.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;
use wavecast_config::WhatsAppConfig;
use wavecast_core::{ApprovedTemplate, MessagingGateway, ProviderMessageId, WavecastError};

/// Error code used when the provider's response carries no parseable error.
const UNKNOWN_ERROR: &str = "UNKNOWN_ERROR";

/// WhatsApp Cloud API client.
///
/// Holds the bearer-authenticated connection pool plus the two Graph API
/// identifiers every call is scoped by: the sending phone number and the
/// business account owning the templates.
#[derive(Debug, Clone)]
pub struct CloudApiGateway {
    client: reqwest::Client,
    base_url: String,
    phone_number_id: String,
    business_account_id: Option<String>,
}

impl CloudApiGateway {
    /// Builds a gateway from config. Fails when the sending credentials
    /// (access token and phone number id) are absent.
    pub fn new(config: &WhatsAppConfig) -> Result<Self, WavecastError> {
        let access_token = config.access_token.as_deref().ok_or_else(|| {
            WavecastError::Config("whatsapp.access_token is not set".to_string())
        })?;
        let phone_number_id = config.phone_number_id.clone().ok_or_else(|| {
            WavecastError::Config("whatsapp.phone_number_id is not set".to_string())
        })?;

        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {access_token}"))
            .map_err(|e| WavecastError::Config(format!("invalid access token value: {e}")))?;
        auth.set_sensitive(true);
        headers.insert("authorization", auth);
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| WavecastError::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.api_url.clone(),
            phone_number_id,
            business_account_id: config.business_account_id.clone(),
        })
    }

    /// Overrides the base URL (for testing with wiremock).
    #[cfg(test)]
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }

    /// Parse a non-success Graph API response into a gateway error, keeping
    /// the provider's error code for retry classification and audit.
    async fn error_from_response(response: reqwest::Response) -> WavecastError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        match serde_json::from_str::<GraphErrorResponse>(&body) {
            Ok(err) => WavecastError::Gateway {
                code: err.error.code.to_string(),
                message: err.error.message,
            },
            Err(_) => WavecastError::Gateway {
                code: UNKNOWN_ERROR.to_string(),
                message: format!("API returned {status}: {body}"),
            },
        }
    }
}

#[async_trait]
impl MessagingGateway for CloudApiGateway {
    async fn send_template(
        &self,
        to: &str,
        template_name: &str,
        language_code: &str,
        variables: &[String],
    ) -> Result<ProviderMessageId, WavecastError> {
        let mut template = json!({
            "name": template_name,
            "language": { "code": language_code },
        });
        if !variables.is_empty() {
            let parameters: Vec<serde_json::Value> = variables
                .iter()
                .map(|v| json!({ "type": "text", "text": v }))
                .collect();
            template["components"] = json!([{
                "type": "body",
                "parameters": parameters,
            }]);
        }
        let payload = json!({
            "messaging_product": "whatsapp",
            "to": to,
            "type": "template",
            "template": template,
        });

        let url = format!("{}/{}/messages", self.base_url, self.phone_number_id);
        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| WavecastError::Gateway {
                code: UNKNOWN_ERROR.to_string(),
                message: format!("HTTP request failed: {e}"),
            })?;

        let status = response.status();
        debug!(status = %status, to, template_name, "send response received");

        if !status.is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let body: SendResponse = response.json().await.map_err(|e| WavecastError::Gateway {
            code: UNKNOWN_ERROR.to_string(),
            message: format!("failed to parse send response: {e}"),
        })?;
        let message = body.messages.into_iter().next().ok_or_else(|| {
            WavecastError::Gateway {
                code: UNKNOWN_ERROR.to_string(),
                message: "send response contained no message id".to_string(),
            }
        })?;
        Ok(ProviderMessageId(message.id))
    }

    async fn fetch_approved_templates(&self) -> Result<Vec<ApprovedTemplate>, WavecastError> {
        let business_account_id = self.business_account_id.as_deref().ok_or_else(|| {
            WavecastError::Config("whatsapp.business_account_id is not set".to_string())
        })?;

        let url = format!(
            "{}/{}/message_templates?limit=100",
            self.base_url, business_account_id
        );
        let response =
            self.client
                .get(&url)
                .send()
                .await
                .map_err(|e| WavecastError::Gateway {
                    code: UNKNOWN_ERROR.to_string(),
                    message: format!("HTTP request failed: {e}"),
                })?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let body: TemplateListResponse =
            response.json().await.map_err(|e| WavecastError::Gateway {
                code: UNKNOWN_ERROR.to_string(),
                message: format!("failed to parse template list: {e}"),
            })?;

        Ok(body
            .data
            .into_iter()
            .filter(|t| t.status == "APPROVED")
            .map(|t| ApprovedTemplate {
                name: t.name,
                language: t.language,
                category: t.category,
            })
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(default)]
    messages: Vec<SentMessage>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    id: String,
}

#[derive(Debug, Deserialize)]
struct TemplateListResponse {
    #[serde(default)]
    data: Vec<TemplateEntry>,
}

#[derive(Debug, Deserialize)]
struct TemplateEntry {
    name: String,
    language: String,
    status: String,
    #[serde(default)]
    category: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GraphErrorResponse {
    error: GraphError,
}

#[derive(Debug, Deserialize)]
struct GraphError {
    message: String,
    code: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_gateway(base_url: &str) -> CloudApiGateway {
        CloudApiGateway::new(&WhatsAppConfig {
            api_url: "https://graph.facebook.com/v18.0".into(),
            phone_number_id: Some("phone-1".into()),
            business_account_id: Some("waba-1".into()),
            access_token: Some("test-token".into()),
            app_secret: None,
        })
        .unwrap()
        .with_base_url(base_url.to_string())
    }

    #[tokio::test]
    async fn send_template_returns_provider_message_id() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/phone-1/messages"))
            .and(header("authorization", "Bearer test-token"))
            .and(body_partial_json(serde_json::json!({
                "messaging_product": "whatsapp",
                "to": "15551234567",
                "type": "template",
                "template": {
                    "name": "welcome",
                    "language": { "code": "en" },
                    "components": [{
                        "type": "body",
                        "parameters": [{ "type": "text", "text": "Ada" }],
                    }],
                },
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "messaging_product": "whatsapp",
                "contacts": [{ "input": "15551234567", "wa_id": "15551234567" }],
                "messages": [{ "id": "wamid.ABC123" }],
            })))
            .mount(&server)
            .await;

        let gateway = test_gateway(&server.uri());
        let id = gateway
            .send_template("15551234567", "welcome", "en", &["Ada".to_string()])
            .await
            .unwrap();
        assert_eq!(id.0, "wamid.ABC123");
    }

    #[tokio::test]
    async fn send_template_without_variables_omits_components() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/phone-1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "messages": [{ "id": "wamid.NOVARS" }],
            })))
            .expect(1)
            .mount(&server)
            .await;

        let gateway = test_gateway(&server.uri());
        let id = gateway
            .send_template("15551234567", "welcome", "en", &[])
            .await
            .unwrap();
        assert_eq!(id.0, "wamid.NOVARS");

        // The recorded request must not carry a components array.
        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert!(body["template"].get("components").is_none());
    }

    #[tokio::test]
    async fn send_failure_surfaces_provider_error_code() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/phone-1/messages"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": {
                    "message": "(#131026) Message undeliverable",
                    "type": "OAuthException",
                    "code": 131026,
                },
            })))
            .mount(&server)
            .await;

        let gateway = test_gateway(&server.uri());
        let err = gateway
            .send_template("15551234567", "welcome", "en", &[])
            .await
            .unwrap_err();
        match err {
            WavecastError::Gateway { code, message } => {
                assert_eq!(code, "131026");
                assert!(message.contains("undeliverable"));
            }
            other => panic!("expected gateway error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unparseable_error_body_maps_to_unknown_code() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/phone-1/messages"))
            .respond_with(ResponseTemplate::new(500).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let gateway = test_gateway(&server.uri());
        let err = gateway
            .send_template("15551234567", "welcome", "en", &[])
            .await
            .unwrap_err();
        match err {
            WavecastError::Gateway { code, .. } => assert_eq!(code, UNKNOWN_ERROR),
            other => panic!("expected gateway error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn template_listing_keeps_only_approved() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/waba-1/message_templates"))
            .and(query_param("limit", "100"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [
                    { "name": "welcome", "language": "en", "status": "APPROVED",
                      "category": "MARKETING" },
                    { "name": "pending_offer", "language": "en", "status": "PENDING" },
                    { "name": "hola", "language": "es", "status": "APPROVED" },
                ],
            })))
            .mount(&server)
            .await;

        let gateway = test_gateway(&server.uri());
        let templates = gateway.fetch_approved_templates().await.unwrap();
        let names: Vec<_> = templates.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["welcome", "hola"]);
        assert_eq!(templates[0].category.as_deref(), Some("MARKETING"));
    }

    #[test]
    fn missing_credentials_fail_construction() {
        let err = CloudApiGateway::new(&WhatsAppConfig::default()).unwrap_err();
        assert!(matches!(err, WavecastError::Config(_)));
    }
}
