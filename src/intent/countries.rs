//! Supported payout/payin corridors and the canonical country matcher.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Direction of money movement a user asked about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    Payout,
    Payin,
}

impl std::fmt::Display for ServiceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Payout => write!(f, "payout"),
            Self::Payin => write!(f, "payin"),
        }
    }
}

/// One row of the corridor table.
#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct Country {
    pub name: &'static str,
    /// ISO 3166-1 alpha-2.
    pub code: &'static str,
    pub currency: &'static str,
    pub payout: bool,
    pub payin: bool,
    /// Delivery methods available for payouts.
    pub methods: &'static [&'static str],
    #[serde(skip)]
    pub aliases: &'static [&'static str],
}

impl Country {
    pub fn supports(&self, service: ServiceType) -> bool {
        match service {
            ServiceType::Payout => self.payout,
            ServiceType::Payin => self.payin,
        }
    }
}

/// Receiving currency used when a destination is not in the table.
pub const FALLBACK_CURRENCY: &str = "INR";

pub static COUNTRIES: &[Country] = &[
    Country { name: "India", code: "IN", currency: "INR", payout: true, payin: true, methods: &["bank account", "UPI", "cash pickup"], aliases: &[] },
    Country { name: "Pakistan", code: "PK", currency: "PKR", payout: true, payin: false, methods: &["bank account", "mobile wallet", "cash pickup"], aliases: &[] },
    Country { name: "Philippines", code: "PH", currency: "PHP", payout: true, payin: false, methods: &["bank account", "mobile wallet", "cash pickup"], aliases: &["the philippines"] },
    Country { name: "Bangladesh", code: "BD", currency: "BDT", payout: true, payin: false, methods: &["bank account", "bKash wallet"], aliases: &[] },
    Country { name: "Sri Lanka", code: "LK", currency: "LKR", payout: true, payin: false, methods: &["bank account", "cash pickup"], aliases: &[] },
    Country { name: "Nepal", code: "NP", currency: "NPR", payout: true, payin: false, methods: &["bank account", "cash pickup"], aliases: &[] },
    Country { name: "Egypt", code: "EG", currency: "EGP", payout: true, payin: false, methods: &["bank account", "cash pickup"], aliases: &[] },
    Country { name: "Uganda", code: "UG", currency: "UGX", payout: true, payin: true, methods: &["bank account", "mobile money"], aliases: &[] },
    Country { name: "Kenya", code: "KE", currency: "KES", payout: true, payin: true, methods: &["bank account", "M-Pesa"], aliases: &[] },
    Country { name: "Nigeria", code: "NG", currency: "NGN", payout: true, payin: false, methods: &["bank account"], aliases: &[] },
    Country { name: "Ghana", code: "GH", currency: "GHS", payout: true, payin: false, methods: &["bank account", "mobile money"], aliases: &[] },
    Country { name: "Jordan", code: "JO", currency: "JOD", payout: true, payin: false, methods: &["bank account"], aliases: &[] },
    Country { name: "United Kingdom", code: "GB", currency: "GBP", payout: true, payin: true, methods: &["bank account"], aliases: &["great britain", "britain", "england"] },
    Country { name: "United States", code: "US", currency: "USD", payout: true, payin: true, methods: &["bank account"], aliases: &["usa", "united states of america", "america"] },
    Country { name: "United Arab Emirates", code: "AE", currency: "AED", payout: false, payin: true, methods: &[], aliases: &["uae", "emirates"] },
];

/// Lowercase, replace punctuation with spaces and collapse whitespace.
pub(crate) fn normalize(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whole-word phrase containment on normalized text.
pub(crate) fn contains_phrase(haystack: &str, phrase: &str) -> bool {
    format!(" {haystack} ").contains(&format!(" {phrase} "))
}

fn names(country: &Country) -> impl Iterator<Item = String> + '_ {
    std::iter::once(country.name.to_lowercase())
        .chain(country.aliases.iter().map(|a| a.to_string()))
}

/// Exact (case-insensitive) match on a country name or alias.
pub fn by_name(text: &str) -> Option<&'static Country> {
    let wanted = normalize(text);
    COUNTRIES
        .iter()
        .find(|c| names(c).any(|n| n == wanted))
}

/// First country whose name or alias appears as a phrase within `text`.
pub fn mentioned_in(text: &str) -> Option<&'static Country> {
    let hay = normalize(text);
    COUNTRIES
        .iter()
        .find(|c| names(c).any(|n| contains_phrase(&hay, &n)))
}

/// Look up by ISO-2 code, ignoring case.
pub fn by_code(code: &str) -> Option<&'static Country> {
    COUNTRIES.iter().find(|c| c.code.eq_ignore_ascii_case(code))
}

/// Receiving currency for a destination, defaulting to INR.
pub fn currency_for_code(code: &str) -> &'static str {
    by_code(code).map(|c| c.currency).unwrap_or(FALLBACK_CURRENCY)
}

static SUPPORT_QUESTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\bdo\s+you\s+(?:support|offer|do|allow)\s+(pay[\s-]?outs?|pay[\s-]?ins?)\s+(?:to|from|in|into|for)\s+(.+)",
    )
    .expect("support question regex")
});

static SERVICES_QUESTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\bwhat\s+services\s+(?:do\s+you\s+(?:offer|have|support)|are\s+(?:available|offered))\s+(?:in|for)\s+(.+)",
    )
    .expect("services question regex")
});

const PAYOUT_WORDS: &[&str] = &["send", "sending", "transfer", "payout", "pay out", "remit"];
const PAYIN_WORDS: &[&str] = &["receive", "receiving", "payin", "pay in", "collect"];

fn service_from_word(word: &str) -> ServiceType {
    if normalize(word).contains("in") {
        ServiceType::Payin
    } else {
        ServiceType::Payout
    }
}

/// Country/service inquiry: "do you support payout to X", "what services do
/// you offer in X", a bare country name, or a country name mentioned next to
/// a send/receive keyword.
pub fn country_inquiry(text: &str) -> Option<(&'static Country, Option<ServiceType>)> {
    if let Some(caps) = SUPPORT_QUESTION.captures(text) {
        let service = service_from_word(caps.get(1)?.as_str());
        if let Some(country) = mentioned_in(caps.get(2)?.as_str()) {
            return Some((country, Some(service)));
        }
    }

    if let Some(caps) = SERVICES_QUESTION.captures(text) {
        if let Some(country) = mentioned_in(caps.get(1)?.as_str()) {
            return Some((country, None));
        }
    }

    if let Some(country) = by_name(text) {
        return Some((country, None));
    }

    let hay = normalize(text);
    let service = if PAYIN_WORDS.iter().any(|w| contains_phrase(&hay, w)) {
        ServiceType::Payin
    } else if PAYOUT_WORDS.iter().any(|w| contains_phrase(&hay, w)) {
        ServiceType::Payout
    } else {
        return None;
    };
    mentioned_in(text).map(|country| (country, Some(service)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_lookup_ignores_case_and_punctuation() {
        assert_eq!(by_name("UGANDA").unwrap().code, "UG");
        assert_eq!(by_name("  sri lanka? ").unwrap().code, "LK");
        assert_eq!(by_name("UAE").unwrap().code, "AE");
        assert!(by_name("atlantis").is_none());
    }

    #[test]
    fn mention_requires_whole_words() {
        assert_eq!(mentioned_in("sending to kenya tomorrow").unwrap().code, "KE");
        assert!(mentioned_in("kenyan shillings").is_none());
    }

    #[test]
    fn currency_lookup_defaults_to_inr() {
        assert_eq!(currency_for_code("pk"), "PKR");
        assert_eq!(currency_for_code("PH"), "PHP");
        assert_eq!(currency_for_code("ZZ"), "INR");
    }

    #[test]
    fn codes_are_unique() {
        let mut codes: Vec<&str> = COUNTRIES.iter().map(|c| c.code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), COUNTRIES.len());
    }

    #[test]
    fn bare_name_has_no_service() {
        let (country, service) = country_inquiry("UGANDA").unwrap();
        assert_eq!(country.code, "UG");
        assert_eq!(service, None);
    }

    #[test]
    fn support_question_resolves_same_record() {
        let (bare, _) = country_inquiry("UGANDA").unwrap();
        let (asked, service) = country_inquiry("do you support payout to uganda").unwrap();
        assert_eq!(bare, asked);
        assert_eq!(service, Some(ServiceType::Payout));
    }

    #[test]
    fn payin_question() {
        let (country, service) = country_inquiry("Do you support pay-ins from Kenya?").unwrap();
        assert_eq!(country.code, "KE");
        assert_eq!(service, Some(ServiceType::Payin));
    }

    #[test]
    fn services_question() {
        let (country, service) = country_inquiry("What services do you offer in Nepal?").unwrap();
        assert_eq!(country.code, "NP");
        assert_eq!(service, None);
    }

    #[test]
    fn keyword_with_substring_name() {
        let (country, service) = country_inquiry("can I send money to my family in pakistan").unwrap();
        assert_eq!(country.code, "PK");
        assert_eq!(service, Some(ServiceType::Payout));

        let (country, service) = country_inquiry("we want to receive funds from the USA").unwrap();
        assert_eq!(country.code, "US");
        assert_eq!(service, Some(ServiceType::Payin));
    }

    #[test]
    fn name_without_keyword_inside_sentence_is_ignored() {
        assert!(country_inquiry("my cousin lives in india").is_none());
        assert!(country_inquiry("pk").is_none());
    }

    #[test]
    fn normalize_collapses_noise() {
        assert_eq!(normalize("  Do you  support PAYOUT, to Uganda?? "), "do you support payout to uganda");
    }
}
