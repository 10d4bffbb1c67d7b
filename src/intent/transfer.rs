//! Stage-gated extractors for the money-transfer stages.

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;

static NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{1,3}(?:,\d{3})+|\d+)(\.\d+)?").expect("number regex")
});

static COUNTRY_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z]{2}$").expect("country code regex"));

static AFFIRMATIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(yes|yeah|yep|yup|confirm|confirmed|go ahead)\b").expect("affirmative regex")
});

static NEGATIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(no|nope|nah|cancel|stop)\b").expect("negative regex")
});

/// The first number in the message. Thousands separators are accepted.
pub fn transaction_amount(text: &str) -> Option<Decimal> {
    let caps = NUMBER.captures(text)?;
    let integer = caps.get(1)?.as_str().replace(',', "");
    let fraction = caps.get(2).map(|m| m.as_str()).unwrap_or("");
    Decimal::from_str(&format!("{integer}{fraction}")).ok()
}

/// Exactly two letters, uppercased.
pub fn country_code(text: &str) -> Option<String> {
    let trimmed = text.trim();
    COUNTRY_CODE
        .is_match(trimmed)
        .then(|| trimmed.to_ascii_uppercase())
}

/// `Some(true)` for yes/confirm, `Some(false)` for no/cancel.
pub fn confirmation(text: &str) -> Option<bool> {
    if AFFIRMATIVE.is_match(text) {
        Some(true)
    } else if NEGATIVE.is_match(text) {
        Some(false)
    } else {
        None
    }
}
