//! QuoteOrchestrator: turns engine effects into gateway calls.
//!
//! Every operation returns a [`FlowOutcome`]; gateway errors are logged here
//! and reported to the user by the engine, never propagated to the session.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use super::model::{QuoteTemplate, TransactionStatus, TransactionTemplate};
use super::{PaymentsGateway, RateSource};
use crate::conversation::{FlowOutcome, QuoteContext};
use crate::error::GatewayError;

/// One tick of a status poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollEvent {
    Status(TransactionStatus),
    Failed(String),
}

impl PollEvent {
    pub fn into_outcome(self, reference: &str) -> FlowOutcome {
        match self {
            Self::Status(status) => FlowOutcome::TransactionStatus {
                reference: reference.to_string(),
                status: status.status,
            },
            Self::Failed(reason) => FlowOutcome::StatusCheckFailed {
                reference: reference.to_string(),
                reason,
            },
        }
    }
}

pub struct QuoteOrchestrator {
    gateway: Arc<dyn PaymentsGateway>,
    rates: Option<Arc<dyn RateSource>>,
    quote_template: QuoteTemplate,
    transaction_template: TransactionTemplate,
}

impl QuoteOrchestrator {
    pub fn new(gateway: Arc<dyn PaymentsGateway>) -> Self {
        Self {
            gateway,
            rates: None,
            quote_template: QuoteTemplate::default(),
            transaction_template: TransactionTemplate::default(),
        }
    }

    pub fn with_rates(mut self, rates: Arc<dyn RateSource>) -> Self {
        self.rates = Some(rates);
        self
    }

    pub fn with_templates(mut self, quote: QuoteTemplate, transaction: TransactionTemplate) -> Self {
        self.quote_template = quote;
        self.transaction_template = transaction;
        self
    }

    /// Ask the gateway for a quote. No retry on failure.
    pub async fn request_quote(&self, amount: Decimal, country: &str) -> FlowOutcome {
        let request = self.quote_template.request(amount, country);
        debug!(
            amount = %amount,
            receiving_country = %request.receiving_country_code,
            receiving_currency = %request.receiving_currency_code,
            "Requesting quote"
        );

        let summary = self
            .gateway
            .create_quote(&request)
            .await
            .and_then(|response| response.into_summary(&request));

        match summary {
            Ok(summary) => {
                info!(quote_id = %summary.quote_id, "Quote created");
                FlowOutcome::Quoted(summary)
            }
            Err(e) => {
                warn!(error = %e, "Quote request failed");
                FlowOutcome::QuoteFailed {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Create then confirm a transaction for the recorded quote. Without a
    /// quote id nothing is sent.
    pub async fn confirm_and_create_transaction(&self, quote: &QuoteContext) -> FlowOutcome {
        let Some(quote_id) = quote.quote_id() else {
            return FlowOutcome::NoValidQuote;
        };

        match self.create_and_confirm(quote_id).await {
            Ok(reference) => {
                info!(quote_id = %quote_id, reference = %reference, "Transaction confirmed");
                FlowOutcome::TransactionCreated { reference }
            }
            Err(e) => {
                warn!(error = %e, quote_id = %quote_id, "Transaction failed");
                FlowOutcome::TransactionFailed {
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn create_and_confirm(&self, quote_id: &str) -> Result<String, GatewayError> {
        let request = self.transaction_template.request(quote_id);
        let reference = self.gateway.create_transaction(&request).await?;
        self.gateway.confirm_transaction(&reference).await?;
        Ok(reference)
    }

    /// Rate of `target` per unit of `source`, or per unit of the rate
    /// service's base currency when `source` is `None`.
    pub async fn lookup_rate(&self, source: Option<&str>, target: &str) -> FlowOutcome {
        let Some(ref rates) = self.rates else {
            return FlowOutcome::RateUnavailable {
                reason: "no rate source configured".to_string(),
            };
        };

        let table = match rates.fetch_rates().await {
            Ok(table) => table,
            Err(e) => {
                return FlowOutcome::RateUnavailable {
                    reason: e.to_string(),
                };
            }
        };

        let source = source.unwrap_or(table.base()).to_ascii_uppercase();
        let target = target.to_ascii_uppercase();
        match table.cross_rate(&source, &target) {
            Some(rate) => FlowOutcome::RateQuoted {
                source,
                target,
                rate: rate.round_dp(4),
            },
            None => FlowOutcome::RateUnavailable {
                reason: format!("no rate for {source}/{target}"),
            },
        }
    }

    /// Inquire every `interval` until the status is terminal, an inquiry
    /// fails, or `on_event` breaks. The first inquiry happens after one
    /// interval.
    pub async fn poll_transaction_status<F>(&self, reference: &str, interval: Duration, mut on_event: F)
    where
        F: FnMut(PollEvent) -> ControlFlow<()> + Send,
    {
        let start = tokio::time::Instant::now() + interval;
        let mut ticker = tokio::time::interval_at(start, interval);
        loop {
            ticker.tick().await;
            let (event, done) = match self.gateway.enquire_transaction(reference).await {
                Ok(status) => {
                    debug!(reference, status = %status.status, "Transaction status");
                    let done = status.is_terminal();
                    (PollEvent::Status(status), done)
                }
                Err(e) => {
                    warn!(reference, error = %e, "Status inquiry failed; stopping poll");
                    (PollEvent::Failed(e.to_string()), true)
                }
            };

            if on_event(event).is_break() || done {
                break;
            }
        }
        debug!(reference, "Stopped polling transaction status");
    }
}
