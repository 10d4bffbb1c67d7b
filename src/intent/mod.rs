//! Intent extraction: pure classifiers over a single free-text message.
//!
//! Extractors run in a fixed priority order and the first match wins:
//!
//! 1. currency pair (`USD to INR`, `EUR/GBP`)
//! 2. rate keyword, with an optional currency code
//! 3. country / service inquiry
//! 4. transaction amount (only while collecting an amount)
//! 5. two-letter country code (only while collecting a country)
//! 6. yes/no confirmation (only while confirming)
//! 7. greeting, thanks, capability question
//!
//! Nothing here touches conversation state; the caller passes the capture of
//! the current stage so the gated extractors know whether to run.

pub mod countries;
pub mod currency;
pub mod smalltalk;
pub mod transfer;

use rust_decimal::Decimal;

use crate::catalog::Capture;

pub use countries::{COUNTRIES, Country, ServiceType, currency_for_code};
pub use smalltalk::SmallTalk;

/// A recognised request.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    CurrencyPair { source: String, target: String },
    RateInquiry { currency: Option<String> },
    CountryInquiry {
        country: &'static Country,
        service: Option<ServiceType>,
    },
    Amount(Decimal),
    CountryCode(String),
    Confirmation { affirmative: bool },
    SmallTalk(SmallTalk),
}

impl Intent {
    /// Short label for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CurrencyPair { .. } => "currency_pair",
            Self::RateInquiry { .. } => "rate_inquiry",
            Self::CountryInquiry { .. } => "country_inquiry",
            Self::Amount(_) => "amount",
            Self::CountryCode(_) => "country_code",
            Self::Confirmation { .. } => "confirmation",
            Self::SmallTalk(_) => "small_talk",
        }
    }

    /// Informational intents answer a question without moving the script.
    pub fn is_informational(&self) -> bool {
        matches!(
            self,
            Self::CurrencyPair { .. }
                | Self::RateInquiry { .. }
                | Self::CountryInquiry { .. }
                | Self::SmallTalk(_)
        )
    }
}

/// Classify a message. `capture` gates extractors 4–6.
pub fn classify(text: &str, capture: Option<Capture>) -> Option<Intent> {
    if let Some((source, target)) = currency::currency_pair(text) {
        return Some(Intent::CurrencyPair { source, target });
    }

    if let Some(currency) = currency::rate_inquiry(text) {
        return Some(Intent::RateInquiry { currency });
    }

    if let Some((country, service)) = countries::country_inquiry(text) {
        return Some(Intent::CountryInquiry { country, service });
    }

    match capture {
        Some(Capture::Amount) => {
            if let Some(amount) = transfer::transaction_amount(text) {
                return Some(Intent::Amount(amount));
            }
        }
        Some(Capture::Country) => {
            if let Some(code) = transfer::country_code(text) {
                return Some(Intent::CountryCode(code));
            }
        }
        Some(Capture::Confirm) => {
            if let Some(affirmative) = transfer::confirmation(text) {
                return Some(Intent::Confirmation { affirmative });
            }
        }
        None => {}
    }

    smalltalk::small_talk(text).map(Intent::SmallTalk)
}
