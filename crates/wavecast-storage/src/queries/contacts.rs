// SPDX-FileCopyrightText: 2026 Wavecast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Contact operations: the minimal surface the fan-out coordinator needs to
//! resolve its recipient set.

use rusqlite::params;
use wavecast_core::WavecastError;

use crate::database::Database;
use crate::models::Contact;
use crate::queries::column_parse_err;

/// Normalize a phone number to a digits-only identifier with country code.
///
/// Strips `+`, spaces, dashes and parentheses; leaves digits untouched.
pub fn normalize_phone_number(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Insert a new contact. The phone number is normalized on the way in.
pub async fn insert_contact(db: &Database, contact: &Contact) -> Result<(), WavecastError> {
    let mut contact = contact.clone();
    contact.phone_number = normalize_phone_number(&contact.phone_number);
    db.connection()
        .call(move |conn| {
            let tags = serde_json::to_string(&contact.tags)
                .map_err(|e| column_parse_err(3, e))?;
            conn.execute(
                "INSERT INTO contacts (id, name, phone_number, tags, is_active, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    contact.id,
                    contact.name,
                    contact.phone_number,
                    tags,
                    contact.is_active,
                    contact.created_at,
                    contact.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// All active contacts, optionally filtered to those carrying at least one
/// of the given tags. An empty tag list means "all active".
pub async fn list_active_contacts(
    db: &Database,
    target_tags: &[String],
) -> Result<Vec<Contact>, WavecastError> {
    let target_tags = target_tags.to_vec();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, phone_number, tags, is_active, created_at, updated_at
                 FROM contacts WHERE is_active = 1
                 ORDER BY created_at ASC",
            )?;
            let rows = stmt.query_map([], map_contact_row)?;

            let mut contacts = Vec::new();
            for row in rows {
                let contact = row?;
                if target_tags.is_empty()
                    || contact.tags.iter().any(|t| target_tags.contains(t))
                {
                    contacts.push(contact);
                }
            }
            Ok(contacts)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

fn map_contact_row(row: &rusqlite::Row<'_>) -> Result<Contact, rusqlite::Error> {
    let tags_json: String = row.get(3)?;
    let tags = serde_json::from_str(&tags_json).map_err(|e| column_parse_err(3, e))?;
    Ok(Contact {
        id: row.get(0)?,
        name: row.get(1)?,
        phone_number: row.get(2)?,
        tags,
        is_active: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}
