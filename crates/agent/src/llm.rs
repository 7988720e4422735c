use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use autouw_core::errors::ApplicationError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }
}

/// Sampling policy sent with every request; owned by configuration, not by callers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelParameters {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GenerationRequest {
    pub system: String,
    pub messages: Vec<ChatMessage>,
    pub parameters: ModelParameters,
}

/// The single network seam. Implementations return the reply text; transport and
/// upstream failures map to [`ApplicationError::Integration`].
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, ApplicationError>;
}
