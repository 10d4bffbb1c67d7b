//! Currency-pair and rate-keyword extractors.

use std::sync::LazyLock;

use regex::Regex;

/// ISO 4217 codes the assistant recognises in free text.
pub const KNOWN_CURRENCIES: &[&str] = &[
    "AED", "AUD", "BDT", "BHD", "CAD", "CHF", "CNY", "EGP", "EUR", "GBP", "GHS", "IDR", "INR",
    "JOD", "JPY", "KES", "KWD", "LKR", "MYR", "NGN", "NPR", "OMR", "PHP", "PKR", "QAR", "SAR",
    "SGD", "THB", "TRY", "UGX", "USD", "ZAR",
];

static PAIR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b([a-z]{3})\s*(?:/|->|\bto\b|\binto\b)\s*([a-z]{3})\b")
        .expect("currency pair regex")
});

static RATE_KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(rates?|exchange|fx|currency|currencies|conversion|convert)\b")
        .expect("rate keyword regex")
});

static CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b([a-z]{3})\b").expect("currency code regex"));

pub fn is_known_currency(code: &str) -> bool {
    KNOWN_CURRENCIES
        .iter()
        .any(|c| c.eq_ignore_ascii_case(code))
}

/// `XXX to YYY` or `XXX/YYY`, both sides known currency codes.
pub fn currency_pair(text: &str) -> Option<(String, String)> {
    PAIR.captures_iter(text).find_map(|caps| {
        let source = caps.get(1)?.as_str();
        let target = caps.get(2)?.as_str();
        (is_known_currency(source) && is_known_currency(target))
            .then(|| (source.to_ascii_uppercase(), target.to_ascii_uppercase()))
    })
}

/// A rate keyword, optionally with a known code.
///
/// `Some(None)` means a rate question with no recognisable currency.
pub fn rate_inquiry(text: &str) -> Option<Option<String>> {
    if !RATE_KEYWORD.is_match(text) {
        return None;
    }
    let code = CODE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .find(|c| is_known_currency(c))
        .map(str::to_ascii_uppercase);
    Some(code)
}
