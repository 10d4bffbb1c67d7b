//! SessionManager: creates, looks up and drops sessions by id.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use super::chat::Session;
use crate::catalog::Catalog;
use crate::config::{AppConfig, SessionConfig};
use crate::conversation::StageEngine;
use crate::error::{self, SessionError};
use crate::payments::{HttpPaymentsClient, HttpRateSource, QuoteOrchestrator};

/// Sessions share the catalog and the orchestrator (and through it the
/// gateway client with its token cache); nothing else.
pub struct SessionManager {
    sessions: RwLock<HashMap<Uuid, Arc<Session>>>,
    engine: StageEngine,
    orchestrator: Arc<QuoteOrchestrator>,
    config: SessionConfig,
}

impl SessionManager {
    pub fn new(
        catalog: Arc<Catalog>,
        orchestrator: Arc<QuoteOrchestrator>,
        config: SessionConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            sessions: RwLock::new(HashMap::new()),
            engine: StageEngine::new(catalog),
            orchestrator,
            config,
        })
    }

    /// Load the catalog and build the gateway clients described by `config`.
    pub fn from_config(config: &AppConfig) -> error::Result<Arc<Self>> {
        let catalog = match &config.server.catalog_path {
            Some(path) => Catalog::from_path(path)?,
            None => Catalog::builtin()?,
        };
        info!(
            stages = catalog.len(),
            initial = %catalog.initial().id,
            "Stage catalog loaded"
        );

        let gateway = HttpPaymentsClient::new(config.gateway.clone())?;
        let mut orchestrator = QuoteOrchestrator::new(Arc::new(gateway));
        match &config.gateway.rates_url {
            Some(url) => {
                info!(url = %url, "Currency rates enabled");
                let rates = HttpRateSource::new(url.clone(), config.gateway.timeout)?;
                orchestrator = orchestrator.with_rates(Arc::new(rates));
            }
            None => info!("Currency rates disabled"),
        }

        Ok(Self::new(
            Arc::new(catalog),
            Arc::new(orchestrator),
            config.session.clone(),
        ))
    }

    pub async fn create(&self) -> Arc<Session> {
        let session = Session::new(
            self.engine.clone(),
            self.orchestrator.clone(),
            self.config.clone(),
        );
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.id(), session.clone());
        info!(session_id = %session.id(), active = sessions.len(), "Session created");
        session
    }

    pub async fn get(&self, id: Uuid) -> Result<Arc<Session>, SessionError> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(SessionError::NotFound(id))
    }

    /// Drop a session. Its timers stop on their next tick.
    pub async fn remove(&self, id: Uuid) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(&id).ok_or(SessionError::NotFound(id))?;
        info!(session_id = %id, active = sessions.len(), "Session removed");
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
