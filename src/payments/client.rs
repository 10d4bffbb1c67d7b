//! reqwest-backed gateway and rate clients.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::model::{
    ConfirmRequest, Envelope, QuoteRequest, QuoteResponse, RateTable, RatesBody,
    TokenResponse, TransactionCreated, TransactionRequest, TransactionStatus,
};
use super::{PaymentsGateway, RateSource};
use crate::config::GatewayConfig;
use crate::error::GatewayError;

const TOKEN_PATH: &str = "/auth/realms/cdp/protocol/openid-connect/token";
const QUOTE_PATH: &str = "/amr/paas/api/v1_0/paas/quote";
const CREATE_TRANSACTION_PATH: &str = "/amr/paas/api/v1_0/paas/createtransaction";
const CONFIRM_TRANSACTION_PATH: &str = "/amr/paas/api/v1_0/paas/confirmtransaction";
const ENQUIRE_TRANSACTION_PATH: &str = "/amr/paas/api/v1_0/paas/enquire-transaction";

/// Used when the token response carries no `expires_in`.
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(300);
/// Refresh this long before the gateway would reject the token.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(30);
/// Longer `expires_in` values are capped to this.
const MAX_TOKEN_LIFETIME: Duration = Duration::from_secs(86_400);

struct CachedToken {
    access_token: SecretString,
    expires_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        Instant::now() + TOKEN_EXPIRY_MARGIN < self.expires_at
    }
}

/// Gateway client holding one cached bearer token.
///
/// The token is fetched lazily and refreshed under a mutex, so concurrent
/// callers never race two password grants.
pub struct HttpPaymentsClient {
    config: GatewayConfig,
    client: reqwest::Client,
    token: Mutex<Option<CachedToken>>,
}

impl HttpPaymentsClient {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayError::Http {
                endpoint: "client".to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            config,
            client,
            token: Mutex::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url)
    }

    async fn bearer(&self) -> Result<SecretString, GatewayError> {
        let mut cached = self.token.lock().await;
        if let Some(ref token) = *cached {
            if token.is_fresh() {
                return Ok(token.access_token.clone());
            }
        }

        let fresh = self.fetch_token().await?;
        let access_token = fresh.access_token.clone();
        *cached = Some(fresh);
        Ok(access_token)
    }

    async fn fetch_token(&self) -> Result<CachedToken, GatewayError> {
        let params = [
            ("grant_type", "password"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.expose_secret()),
            ("username", self.config.username.as_str()),
            ("password", self.config.password.expose_secret()),
        ];

        let resp = self
            .client
            .post(self.url(TOKEN_PATH))
            .form(&params)
            .send()
            .await
            .map_err(|e| self.transport_error("token", e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(status = %status, "Gateway token request rejected");
            return Err(GatewayError::Auth(format!("token endpoint returned {status}: {body}")));
        }

        let token: TokenResponse = resp.json().await.map_err(|e| GatewayError::InvalidResponse {
            endpoint: "token".to_string(),
            reason: e.to_string(),
        })?;
        if token.access_token.is_empty() {
            return Err(GatewayError::Auth("token endpoint returned an empty token".to_string()));
        }

        let lifetime = token
            .expires_in
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TOKEN_LIFETIME)
            .min(MAX_TOKEN_LIFETIME);
        info!(expires_in = lifetime.as_secs(), "Fetched gateway access token");

        Ok(CachedToken {
            access_token: SecretString::from(token.access_token),
            expires_at: Instant::now() + lifetime,
        })
    }

    /// Forget the cached token after the gateway rejects it.
    async fn invalidate_token(&self) {
        *self.token.lock().await = None;
    }

    /// Send an authenticated request and decode the (optionally enveloped)
    /// JSON body.
    async fn call<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        request: RequestBuilder,
    ) -> Result<T, GatewayError> {
        let token = self.bearer().await?;
        let resp = request
            .bearer_auth(token.expose_secret())
            .send()
            .await
            .map_err(|e| self.transport_error(endpoint, e))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| self.transport_error(endpoint, e))?;

        if status == StatusCode::UNAUTHORIZED {
            self.invalidate_token().await;
        }
        if !status.is_success() {
            warn!(endpoint, status = %status, "Gateway call failed");
            return Err(GatewayError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        debug!(endpoint, "Gateway call succeeded");
        let body = if body.trim().is_empty() { "null" } else { body.as_str() };
        serde_json::from_str::<Envelope<T>>(body)
            .map(Envelope::into_inner)
            .map_err(|e| GatewayError::InvalidResponse {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })
    }

    fn transport_error(&self, endpoint: &str, error: reqwest::Error) -> GatewayError {
        if error.is_timeout() {
            GatewayError::Timeout {
                endpoint: endpoint.to_string(),
                timeout: self.config.timeout,
            }
        } else {
            GatewayError::Http {
                endpoint: endpoint.to_string(),
                reason: error.to_string(),
            }
        }
    }
}

#[async_trait]
impl PaymentsGateway for HttpPaymentsClient {
    async fn create_quote(&self, request: &QuoteRequest) -> Result<QuoteResponse, GatewayError> {
        let builder = self.client.post(self.url(QUOTE_PATH)).json(request);
        self.call("quote", builder).await
    }

    async fn create_transaction(
        &self,
        request: &TransactionRequest,
    ) -> Result<String, GatewayError> {
        let builder = self
            .client
            .post(self.url(CREATE_TRANSACTION_PATH))
            .json(request);
        let created: TransactionCreated = self.call("createtransaction", builder).await?;
        created
            .transaction_ref_number
            .filter(|r| !r.trim().is_empty())
            .ok_or_else(|| GatewayError::MissingField {
                endpoint: "createtransaction".to_string(),
                field: "transaction_ref_number".to_string(),
            })
    }

    async fn confirm_transaction(&self, reference: &str) -> Result<(), GatewayError> {
        let body = ConfirmRequest {
            transaction_ref_number: reference.to_string(),
        };
        let builder = self
            .client
            .post(self.url(CONFIRM_TRANSACTION_PATH))
            .json(&body);
        // Only the status code matters; the body varies between deployments.
        let _: serde_json::Value = self.call("confirmtransaction", builder).await?;
        Ok(())
    }

    async fn enquire_transaction(
        &self,
        reference: &str,
    ) -> Result<TransactionStatus, GatewayError> {
        let builder = self
            .client
            .get(self.url(ENQUIRE_TRANSACTION_PATH))
            .query(&[("transaction_ref_number", reference)]);
        self.call("enquire-transaction", builder).await
    }
}

/// Unauthenticated rate lookup.
pub struct HttpRateSource {
    url: String,
    client: reqwest::Client,
}

impl HttpRateSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Http {
                endpoint: "rates".to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

#[async_trait]
impl RateSource for HttpRateSource {
    async fn fetch_rates(&self) -> Result<RateTable, GatewayError> {
        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| GatewayError::Http {
                endpoint: "rates".to_string(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GatewayError::Status {
                endpoint: "rates".to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let body: RatesBody = resp.json().await.map_err(|e| GatewayError::InvalidResponse {
            endpoint: "rates".to_string(),
            reason: e.to_string(),
        })?;
        let table = RateTable::from_body(body);
        debug!(rates = table.len(), "Fetched currency rates");
        Ok(table)
    }
}
