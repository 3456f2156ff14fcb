// SPDX-FileCopyrightText: 2026 Wavecast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules. Each accepts `&Database` and runs through the
//! single-writer connection.

pub mod campaigns;
pub mod contacts;
pub mod deliveries;
pub mod queue;

/// Map a status-string parse failure into a rusqlite conversion error so it
/// propagates through `query_row`/`query_map` like any other column fault.
pub(crate) fn column_parse_err<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
}
