// SPDX-FileCopyrightText: 2026 Wavecast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `wa.me` share links for pre-filled messages.

use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};

/// Link that opens a WhatsApp chat with `text` pre-filled. With a phone
/// number the chat targets that number; without one the user picks a
/// recipient.
pub fn share_link(phone_number: Option<&str>, text: &str) -> String {
    let encoded = utf8_percent_encode(text, NON_ALPHANUMERIC);
    match phone_number {
        Some(number) => format!("https://wa.me/{number}?text={encoded}"),
        None => format!("https://wa.me/?text={encoded}"),
    }
}
