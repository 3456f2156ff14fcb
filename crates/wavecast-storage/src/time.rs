// SPDX-FileCopyrightText: 2026 Wavecast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! ISO-8601 UTC timestamp helpers.
//!
//! Timestamps are stored as millisecond-precision strings matching sqlite's
//! `strftime('%Y-%m-%dT%H:%M:%fZ', 'now')`, so Rust-generated and
//! SQL-generated values compare lexicographically.

use chrono::{Duration, Utc};

const FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Current UTC time as an ISO-8601 string.
pub fn now_iso() -> String {
    Utc::now().format(FORMAT).to_string()
}

/// UTC time `ms` milliseconds from now as an ISO-8601 string.
///
/// Used for delayed queue admission and retry backoff scheduling.
pub fn iso_in_ms(ms: u64) -> String {
    (Utc::now() + Duration::milliseconds(ms as i64))
        .format(FORMAT)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_matches_sqlite_strftime_shape() {
        let now = now_iso();
        // e.g. 2026-01-01T00:00:00.000Z
        assert_eq!(now.len(), 24);
        assert!(now.ends_with('Z'));
        assert_eq!(&now[4..5], "-");
        assert_eq!(&now[10..11], "T");
        assert_eq!(&now[19..20], ".");
    }

    #[test]
    fn future_timestamps_sort_after_now() {
        let now = now_iso();
        let later = iso_in_ms(5000);
        assert!(later > now, "{later} should sort after {now}");
    }
}
