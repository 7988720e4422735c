pub mod batch;
pub mod config;
pub mod docs;
pub mod guidelines;
pub mod quote;

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use tracing::warn;

use autouw_agent::{AnthropicClient, ClaudeContext, RiskNarrativeClient, UnderwritingAgent};
use autouw_core::config::AppConfig;
use autouw_core::errors::ApplicationError;
use autouw_db::DocumentStore;
use autouw_report::QuoteReportRenderer;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    /// Successful command whose stdout is `output` verbatim.
    pub fn output(output: impl Into<String>) -> Self {
        Self { exit_code: 0, output: output.into() }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    pub fn from_error(command: &str, error: &ApplicationError) -> Self {
        Self::failure(command, error.error_class(), error.to_string(), exit_code_for(error))
    }
}

/// 2 configuration/validation, 3 runtime, 4 not found, 5 upstream/parse, 6 io/report.
pub fn exit_code_for(error: &ApplicationError) -> u8 {
    match error {
        ApplicationError::Validation(_) | ApplicationError::Configuration(_) => 2,
        ApplicationError::NotFound { .. } => 4,
        ApplicationError::Parse { .. } | ApplicationError::Integration(_) => 5,
        ApplicationError::Io { .. } | ApplicationError::Report(_) => 6,
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\
             \"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

pub(crate) fn to_pretty_json<T: Serialize>(command: &str, value: &T) -> CommandResult {
    match serde_json::to_string_pretty(value) {
        Ok(json) => CommandResult::output(json),
        Err(error) => CommandResult::failure(command, "serialization", error.to_string(), 3),
    }
}

/// Commands are synchronous at the edge; each one drives its async work on a
/// current-thread runtime.
pub(crate) fn block_on<F: Future>(command: &str, future: F) -> Result<F::Output, CommandResult> {
    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(
        |error| {
            CommandResult::failure(
                command,
                "runtime",
                format!("failed to build tokio runtime: {error}"),
                3,
            )
        },
    )?;
    Ok(runtime.block_on(future))
}

pub(crate) async fn open_store(config: &AppConfig) -> Result<DocumentStore, ApplicationError> {
    DocumentStore::open(&config.storage.documents_dir).await.map_err(ApplicationError::from)
}

/// Wires the production collaborators. The document store only feeds guideline
/// context, so a store that cannot be opened is logged and skipped.
pub async fn build_agent(config: &AppConfig) -> Result<UnderwritingAgent, ApplicationError> {
    let llm = Arc::new(AnthropicClient::from_config(&config.llm)?);
    let context = Arc::new(ClaudeContext::from_config(&config.llm));
    let renderer = Arc::new(QuoteReportRenderer::from_config(&config.storage)?);
    let agent = UnderwritingAgent::new(RiskNarrativeClient::new(llm, context), renderer);

    match open_store(config).await {
        Ok(store) => Ok(agent.with_guidelines(Arc::new(store))),
        Err(error) => {
            warn!(
                event_name = "cli.guidelines.unavailable",
                error = %error,
                "document store could not be opened; quoting without guideline context"
            );
            Ok(agent)
        }
    }
}
