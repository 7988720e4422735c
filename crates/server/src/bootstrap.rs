use std::sync::Arc;

use autouw_agent::{AnthropicClient, ClaudeContext, RiskNarrativeClient, UnderwritingAgent};
use autouw_core::config::AppConfig;
use autouw_core::errors::ApplicationError;
use autouw_db::{DocumentStore, StoreError};
use autouw_report::{QuoteReportRenderer, ReportError};
use axum::Router;
use thiserror::Error;
use tracing::info;

use crate::{api, health};

pub struct Application {
    pub config: AppConfig,
    pub store: Arc<DocumentStore>,
    pub agent: Arc<UnderwritingAgent>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("document store could not be opened: {0}")]
    Store(#[source] StoreError),
    #[error("report renderer could not be initialized: {0}")]
    Report(#[source] ReportError),
    #[error(transparent)]
    Model(ApplicationError),
}

impl Application {
    pub fn router(&self) -> Router {
        api::router(self.agent.clone(), self.store.clone()).merge(health::router(
            self.config.storage.documents_dir.clone(),
            self.config.storage.reports_dir.clone(),
        ))
    }
}

/// Wires the model client, the document store and the report renderer. A
/// missing API key fails here, not on the first request.
pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let llm = Arc::new(AnthropicClient::from_config(&config.llm).map_err(BootstrapError::Model)?);
    let context = Arc::new(ClaudeContext::from_config(&config.llm));

    let store = Arc::new(
        DocumentStore::open(&config.storage.documents_dir).await.map_err(BootstrapError::Store)?,
    );
    info!(
        event_name = "system.bootstrap.store_opened",
        correlation_id = "bootstrap",
        documents_dir = %config.storage.documents_dir.display(),
        "document store opened"
    );

    let renderer =
        QuoteReportRenderer::from_config(&config.storage).map_err(BootstrapError::Report)?;
    info!(
        event_name = "system.bootstrap.renderer_ready",
        correlation_id = "bootstrap",
        pdf = renderer.converts_to_pdf(),
        "report renderer ready"
    );

    let agent = UnderwritingAgent::new(RiskNarrativeClient::new(llm, context), Arc::new(renderer))
        .with_guidelines(store.clone());

    Ok(Application { config, store, agent: Arc::new(agent) })
}

#[cfg(test)]
mod tests {
    use autouw_core::config::AppConfig;

    use crate::bootstrap::bootstrap_with_config;

    #[tokio::test]
    async fn bootstrap_fails_fast_without_api_key() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut config = AppConfig::default();
        config.llm.api_key = None;
        config.storage.documents_dir = temp.path().join("data");

        let result = bootstrap_with_config(config).await;

        let message = result.err().map(|error| error.to_string()).unwrap_or_default();
        assert!(message.contains("llm.api_key"), "{message}");
        assert!(!temp.path().join("data").exists());
    }

    #[tokio::test]
    async fn bootstrap_opens_the_store() {
        let temp = tempfile::tempdir().expect("tempdir");
        let documents_dir = temp.path().join("data");
        let mut config = AppConfig::default();
        config.llm.api_key = Some("sk-ant-test".to_string().into());
        config.storage.documents_dir = documents_dir.clone();
        config.storage.reports_dir = temp.path().join("reports");

        let app = bootstrap_with_config(config).await.expect("bootstrap");

        assert!(documents_dir.is_dir());
        assert!(app.store.list().await.is_empty());
    }
}
