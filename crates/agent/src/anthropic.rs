//! Messages API transport for Claude models.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use autouw_core::config::LlmConfig;
use autouw_core::errors::ApplicationError;

use crate::llm::{ChatMessage, GenerationRequest, LlmClient};

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Clone)]
pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: SecretString,
    base_url: String,
}

impl AnthropicClient {
    pub fn new(
        api_key: SecretString,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, ApplicationError> {
        let http = reqwest::Client::builder().timeout(timeout).build().map_err(|error| {
            ApplicationError::Integration(format!("could not build http client: {error}"))
        })?;

        Ok(Self { http, api_key, base_url: base_url.trim_end_matches('/').to_string() })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, ApplicationError> {
        let api_key = config
            .require_api_key()
            .map_err(|error| ApplicationError::Configuration(error.to_string()))?
            .clone();
        Self::new(api_key, &config.base_url, Duration::from_secs(config.timeout_secs))
    }

    pub fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.base_url)
    }
}

#[derive(Debug, Serialize)]
struct MessagesBody<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    system: &'a str,
    messages: &'a [ChatMessage],
}

impl<'a> From<&'a GenerationRequest> for MessagesBody<'a> {
    fn from(request: &'a GenerationRequest) -> Self {
        Self {
            model: &request.parameters.model,
            max_tokens: request.parameters.max_tokens,
            temperature: request.parameters.temperature,
            top_p: request.parameters.top_p,
            system: &request.system,
            messages: &request.messages,
        }
    }
}

#[derive(Debug, Deserialize)]
struct MessagesReply {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type", default)]
    kind: String,
    text: Option<String>,
}

fn reply_text(reply: MessagesReply) -> Result<String, ApplicationError> {
    reply
        .content
        .into_iter()
        .filter(|block| block.kind.is_empty() || block.kind == "text")
        .find_map(|block| block.text)
        .ok_or_else(|| {
            ApplicationError::Integration("model service returned no text content".to_string())
        })
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, ApplicationError> {
        let started = Instant::now();
        let body = MessagesBody::from(request);

        let response = self
            .http
            .post(self.endpoint())
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|error| {
                ApplicationError::Integration(format!("request to model service failed: {error}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                event_name = "llm.generate.rejected",
                model = %request.parameters.model,
                status = status.as_u16(),
                "model service returned an error status"
            );
            return Err(ApplicationError::Integration(format!(
                "model service returned {status}: {body}"
            )));
        }

        let reply: MessagesReply = response.json().await.map_err(|error| {
            ApplicationError::Integration(format!("could not decode model service reply: {error}"))
        })?;

        info!(
            event_name = "llm.generate.completed",
            model = %request.parameters.model,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "model reply received"
        );

        reply_text(reply)
    }
}
