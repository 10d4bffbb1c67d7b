//! Payments gateway contract, its HTTP client and quote orchestration.
//!
//! The conversation never talks to the gateway directly: the stage engine
//! asks for an effect, the session hands it to the [`QuoteOrchestrator`],
//! and the resulting [`FlowOutcome`](crate::conversation::FlowOutcome) is
//! folded back by the engine.

pub mod client;
pub mod model;
pub mod orchestrator;

pub use client::{HttpPaymentsClient, HttpRateSource};
pub use model::{
    QuoteRequest, QuoteResponse, QuoteTemplate, RateTable, TransactionRequest,
    TransactionStatus, TransactionTemplate,
};
pub use orchestrator::{PollEvent, QuoteOrchestrator};

use async_trait::async_trait;

use crate::error::GatewayError;

/// Operations of the external payments gateway. Each call is one
/// authenticated request/response.
#[async_trait]
pub trait PaymentsGateway: Send + Sync {
    async fn create_quote(&self, request: &QuoteRequest) -> Result<QuoteResponse, GatewayError>;

    /// Returns the transaction reference number.
    async fn create_transaction(
        &self,
        request: &TransactionRequest,
    ) -> Result<String, GatewayError>;

    async fn confirm_transaction(&self, reference: &str) -> Result<(), GatewayError>;

    async fn enquire_transaction(&self, reference: &str)
    -> Result<TransactionStatus, GatewayError>;
}

/// Currency-rate lookup.
#[async_trait]
pub trait RateSource: Send + Sync {
    async fn fetch_rates(&self) -> Result<RateTable, GatewayError>;
}
