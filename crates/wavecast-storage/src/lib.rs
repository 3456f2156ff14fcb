// SPDX-FileCopyrightText: 2026 Wavecast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Wavecast dispatch pipeline.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a
//! single-writer concurrency model via `tokio-rusqlite`, and typed query
//! modules for contacts, campaigns, delivery records, and the durable
//! dispatch queue. Campaign counters are only ever mutated through atomic
//! keyed deltas so the worker and the status ingestor can write
//! concurrently without lost updates.

pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;
pub mod time;

pub use database::Database;
pub use models::*;
