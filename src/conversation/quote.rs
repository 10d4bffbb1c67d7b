//! QuoteContext: the per-session transfer scratchpad.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::QuoteContextError;

/// The parts of a gateway quote the conversation cares about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteSummary {
    pub quote_id: String,
    pub sending_currency: String,
    pub receiving_amount: Option<Decimal>,
    pub receiving_currency: String,
    pub rate: Option<Decimal>,
}

/// Filled in as the user supplies amount, then country, then confirmation.
///
/// A quote cannot be recorded before both amount and destination are known,
/// and a transaction cannot be recorded before a quote. Changing an earlier
/// field discards everything recorded after it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QuoteContext {
    amount: Option<Decimal>,
    currency: Option<String>,
    destination_country: Option<String>,
    quote_id: Option<String>,
    receiving_amount: Option<Decimal>,
    receiving_currency: Option<String>,
    rate: Option<Decimal>,
    transaction_ref: Option<String>,
}

impl QuoteContext {
    pub fn amount(&self) -> Option<Decimal> {
        self.amount
    }

    pub fn currency(&self) -> Option<&str> {
        self.currency.as_deref()
    }

    pub fn destination_country(&self) -> Option<&str> {
        self.destination_country.as_deref()
    }

    pub fn quote_id(&self) -> Option<&str> {
        self.quote_id.as_deref()
    }

    pub fn receiving_amount(&self) -> Option<Decimal> {
        self.receiving_amount
    }

    pub fn receiving_currency(&self) -> Option<&str> {
        self.receiving_currency.as_deref()
    }

    pub fn rate(&self) -> Option<Decimal> {
        self.rate
    }

    pub fn transaction_ref(&self) -> Option<&str> {
        self.transaction_ref.as_deref()
    }

    pub fn set_amount(&mut self, amount: Decimal) {
        *self = Self {
            amount: Some(amount),
            ..Self::default()
        };
    }

    pub fn set_destination(&mut self, country_code: &str) {
        self.clear_quote();
        self.destination_country = Some(country_code.to_ascii_uppercase());
    }

    pub fn record_quote(&mut self, summary: &QuoteSummary) -> Result<(), QuoteContextError> {
        if self.amount.is_none() || self.destination_country.is_none() {
            return Err(QuoteContextError::QuoteBeforeDetails);
        }
        self.quote_id = Some(summary.quote_id.clone());
        self.currency = Some(summary.sending_currency.clone());
        self.receiving_amount = summary.receiving_amount;
        self.receiving_currency = Some(summary.receiving_currency.clone());
        self.rate = summary.rate;
        self.transaction_ref = None;
        Ok(())
    }

    pub fn record_transaction(&mut self, reference: &str) -> Result<(), QuoteContextError> {
        if self.quote_id.is_none() {
            return Err(QuoteContextError::TransactionBeforeQuote);
        }
        self.transaction_ref = Some(reference.to_string());
        Ok(())
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    fn clear_quote(&mut self) {
        self.quote_id = None;
        self.currency = None;
        self.receiving_amount = None;
        self.receiving_currency = None;
        self.rate = None;
        self.transaction_ref = None;
    }
}
