// SPDX-FileCopyrightText: 2026 Wavecast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WhatsApp Cloud API integration for Wavecast.
//!
//! [`CloudApiGateway`] implements the outbound [`wavecast_core::MessagingGateway`]
//! seam; the [`webhook`] module provides the inbound status-callback surface
//! (handshake, signature verification, payload parsing, axum routes).

pub mod client;
pub mod share;
pub mod webhook;

pub use client::CloudApiGateway;
pub use share::share_link;
pub use webhook::{webhook_router, WebhookState};
