//! Wire types for the payments gateway and the rate service.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::conversation::QuoteSummary;
use crate::error::GatewayError;
use crate::intent::currency_for_code;

/// Currency every rate in a [`RateTable`] is quoted against.
pub const RATE_BASE_CURRENCY: &str = "AED";

/// Fixed quote fields for this product's corridor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteTemplate {
    pub sending_country_code: String,
    pub sending_currency_code: String,
    pub receiving_mode: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub instrument: String,
}

impl Default for QuoteTemplate {
    fn default() -> Self {
        Self {
            sending_country_code: "AE".to_string(),
            sending_currency_code: "AED".to_string(),
            receiving_mode: "BANK".to_string(),
            kind: "SEND".to_string(),
            instrument: "REMITTANCE".to_string(),
        }
    }
}

impl QuoteTemplate {
    /// Build a quote payload. The receiving currency comes from the corridor
    /// table and falls back to INR for unknown destinations.
    pub fn request(&self, amount: Decimal, receiving_country: &str) -> QuoteRequest {
        let receiving_country_code = receiving_country.trim().to_ascii_uppercase();
        QuoteRequest {
            sending_country_code: self.sending_country_code.clone(),
            sending_currency_code: self.sending_currency_code.clone(),
            receiving_currency_code: currency_for_code(&receiving_country_code).to_string(),
            receiving_country_code,
            sending_amount: amount,
            receiving_mode: self.receiving_mode.clone(),
            kind: self.kind.clone(),
            instrument: self.instrument.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub sending_country_code: String,
    pub sending_currency_code: String,
    pub receiving_country_code: String,
    pub receiving_currency_code: String,
    pub sending_amount: Decimal,
    pub receiving_mode: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub instrument: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FxRate {
    #[serde(default)]
    pub rate: Option<Decimal>,
}

/// Quote response. Every field is optional on the wire; a missing
/// `quote_id` is rejected by [`QuoteResponse::into_summary`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct QuoteResponse {
    #[serde(default)]
    pub quote_id: Option<String>,
    #[serde(default)]
    pub receiving_amount: Option<Decimal>,
    #[serde(default)]
    pub receiving_currency_code: Option<String>,
    #[serde(default)]
    pub fx_rates: Vec<FxRate>,
}

impl QuoteResponse {
    pub fn into_summary(self, request: &QuoteRequest) -> Result<QuoteSummary, GatewayError> {
        let quote_id = self
            .quote_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| GatewayError::MissingField {
                endpoint: "quote".to_string(),
                field: "quote_id".to_string(),
            })?;
        Ok(QuoteSummary {
            quote_id,
            sending_currency: request.sending_currency_code.clone(),
            receiving_amount: self.receiving_amount,
            receiving_currency: self
                .receiving_currency_code
                .unwrap_or_else(|| request.receiving_currency_code.clone()),
            rate: self.fx_rates.first().and_then(|fx| fx.rate),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankDetails {
    pub account_type_code: String,
    pub iso_code: String,
    pub iban: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sender {
    pub customer_number: String,
    pub first_name: String,
    pub last_name: String,
    pub mobile_number: String,
    pub nationality: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receiver {
    pub first_name: String,
    pub last_name: String,
    pub mobile_number: String,
    pub nationality: String,
    pub relation_code: String,
    pub bank_details: BankDetails,
}

/// Fixed sender/receiver demo data sent with every transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionTemplate {
    #[serde(rename = "type")]
    pub kind: String,
    pub instrument: String,
    pub source_of_income: String,
    pub purpose_of_txn: String,
    pub message: String,
    pub sender: Sender,
    pub receiver: Receiver,
}

impl Default for TransactionTemplate {
    fn default() -> Self {
        Self {
            kind: "SEND".to_string(),
            instrument: "REMITTANCE".to_string(),
            source_of_income: "SLRY".to_string(),
            purpose_of_txn: "SAVG".to_string(),
            message: "Agency transaction".to_string(),
            sender: Sender {
                customer_number: "7841001220007002".to_string(),
                first_name: "Demo".to_string(),
                last_name: "Sender".to_string(),
                mobile_number: "+971500000001".to_string(),
                nationality: "AE".to_string(),
            },
            receiver: Receiver {
                first_name: "Demo".to_string(),
                last_name: "Receiver".to_string(),
                mobile_number: "+919000000001".to_string(),
                nationality: "IN".to_string(),
                relation_code: "32".to_string(),
                bank_details: BankDetails {
                    account_type_code: "1".to_string(),
                    iso_code: "ALFHPKKA068".to_string(),
                    iban: "PK12ABCD1234567891234567".to_string(),
                },
            },
        }
    }
}

impl TransactionTemplate {
    pub fn request(&self, quote_id: &str) -> TransactionRequest {
        TransactionRequest {
            template: self.clone(),
            transaction: TransactionQuote {
                quote_id: quote_id.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionQuote {
    pub quote_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRequest {
    #[serde(flatten)]
    pub template: TransactionTemplate,
    pub transaction: TransactionQuote,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TransactionCreated {
    #[serde(default)]
    pub transaction_ref_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmRequest {
    pub transaction_ref_number: String,
}

/// Status inquiry response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionStatus {
    pub status: String,
}

/// Statuses after which a transaction no longer changes.
const TERMINAL_STATUSES: &[&str] = &["DELIVERED", "FAILED", "CANCELLED"];

impl TransactionStatus {
    /// Whether polling should stop.
    pub fn is_terminal(&self) -> bool {
        TERMINAL_STATUSES
            .iter()
            .any(|s| s.eq_ignore_ascii_case(self.status.trim()))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Some gateway deployments wrap every body in `{"data": ...}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum Envelope<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> Envelope<T> {
    pub(crate) fn into_inner(self) -> T {
        match self {
            Self::Wrapped { data } => data,
            Self::Bare(inner) => inner,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RatesBody {
    pub payload: RatesPayload,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RatesPayload {
    #[serde(default)]
    pub rates: Vec<RateEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RateEntry {
    pub toccy: String,
    pub rate: Decimal,
}

/// Rates against a single base currency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateTable {
    base: String,
    rates: HashMap<String, Decimal>,
}

impl RateTable {
    pub fn new(base: impl Into<String>, rates: impl IntoIterator<Item = (String, Decimal)>) -> Self {
        Self {
            base: base.into().to_ascii_uppercase(),
            rates: rates
                .into_iter()
                .map(|(code, rate)| (code.to_ascii_uppercase(), rate))
                .collect(),
        }
    }

    pub(crate) fn from_body(body: RatesBody) -> Self {
        Self::new(
            RATE_BASE_CURRENCY,
            body.payload.rates.into_iter().map(|e| (e.toccy, e.rate)),
        )
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// Units of `code` per one unit of base. The base itself is 1.
    pub fn rate(&self, code: &str) -> Option<Decimal> {
        let code = code.to_ascii_uppercase();
        if code == self.base {
            return Some(Decimal::ONE);
        }
        self.rates.get(&code).copied()
    }

    /// Units of `target` per one unit of `source`.
    pub fn cross_rate(&self, source: &str, target: &str) -> Option<Decimal> {
        let source = self.rate(source)?;
        let target = self.rate(target)?;
        target.checked_div(source)
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn quote_request_derives_receiving_currency() {
        let request = QuoteTemplate::default().request(dec!(200), "pk");
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["receiving_country_code"], "PK");
        assert_eq!(json["receiving_currency_code"], "PKR");
        assert_eq!(json["sending_country_code"], "AE");
        assert_eq!(json["sending_currency_code"], "AED");
        assert_eq!(json["type"], "SEND");
        assert_eq!(json["sending_amount"], "200");
    }

    #[test]
    fn unknown_destination_defaults_to_inr() {
        let request = QuoteTemplate::default().request(dec!(50), "ZZ");
        assert_eq!(request.receiving_currency_code, "INR");
    }

    #[test]
    fn quote_response_accepts_envelope_and_numbers() {
        let raw = r#"{"data": {"quote_id": "Q-1", "receiving_amount": 15150.5,
            "receiving_currency_code": "PKR", "fx_rates": [{"rate": "75.7525"}]}}"#;
        let response = serde_json::from_str::<Envelope<QuoteResponse>>(raw)
            .unwrap()
            .into_inner();
        let request = QuoteTemplate::default().request(dec!(200), "PK");
        let summary = response.into_summary(&request).unwrap();
        assert_eq!(summary.quote_id, "Q-1");
        assert_eq!(summary.receiving_amount, Some(dec!(15150.5)));
        assert_eq!(summary.rate, Some(dec!(75.7525)));
        assert_eq!(summary.sending_currency, "AED");
    }

    #[test]
    fn quote_without_id_is_rejected() {
        let raw = r#"{"receiving_amount": 10}"#;
        let response = serde_json::from_str::<Envelope<QuoteResponse>>(raw)
            .unwrap()
            .into_inner();
        let request = QuoteTemplate::default().request(dec!(200), "PK");
        assert!(matches!(
            response.into_summary(&request),
            Err(GatewayError::MissingField { .. })
        ));
    }

    #[test]
    fn transaction_request_flattens_template() {
        let json = serde_json::to_value(TransactionTemplate::default().request("Q-9")).unwrap();
        assert_eq!(json["transaction"]["quote_id"], "Q-9");
        assert_eq!(json["type"], "SEND");
        assert_eq!(json["receiver"]["bank_details"]["iso_code"], "ALFHPKKA068");
    }

    #[test]
    fn terminal_statuses() {
        let status = |s: &str| TransactionStatus { status: s.into() };
        assert!(status("DELIVERED").is_terminal());
        assert!(status("cancelled").is_terminal());
        assert!(status("FAILED").is_terminal());
        assert!(!status("IN_PROGRESS").is_terminal());
    }

    #[test]
    fn cross_rates_go_through_base() {
        let raw = r#"{"payload": {"rates": [
            {"toccy": "USD", "rate": "0.2723"},
            {"toccy": "INR", "rate": "22.6300"}
        ]}}"#;
        let table = RateTable::from_body(serde_json::from_str(raw).unwrap());
        assert_eq!(table.base(), "AED");
        assert_eq!(table.rate("aed"), Some(Decimal::ONE));
        assert_eq!(table.rate("INR"), Some(dec!(22.63)));
        assert_eq!(table.cross_rate("AED", "INR"), Some(dec!(22.63)));
        let usd_inr = table.cross_rate("USD", "INR").unwrap();
        assert_eq!(usd_inr.round_dp(2), dec!(83.11));
        assert!(table.cross_rate("USD", "XYZ").is_none());
    }
}
