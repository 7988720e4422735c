//! Capability set a model backend provides to the narrative client. Adding a
//! backend means adding an implementation here; callers never branch on model.

use serde_json::Value;

use autouw_core::config::LlmConfig;
use autouw_core::errors::ApplicationError;

use crate::llm::{ChatMessage, ModelParameters};

pub const CLAUDE_CONTEXT_WINDOW: usize = 200_000;
const CHARS_PER_TOKEN: usize = 4;
const REQUIRED_KEYS: [&str; 3] = ["risk_profile", "risk_factors", "risk_score"];

const SYSTEM_PROMPT: &str = "You are an expert insurance underwriter for small business \
policies. Evaluate the business risk profile using the business facts, claims history and any \
underwriting guideline excerpts provided. Always respond with valid JSON only, with the keys \
risk_profile (low, medium or high), risk_factors (list of specific factors), risk_score \
(0-100) and recommendations (list of risk mitigation steps).";

pub trait ModelContext: Send + Sync {
    fn system_prompt(&self) -> &str;

    fn format_user_message(&self, content: &str) -> ChatMessage;

    /// Extracts the JSON object from a raw reply. Failures carry the raw text.
    fn parse_reply(&self, raw: &str) -> Result<Value, ApplicationError>;

    fn parameters(&self) -> ModelParameters;

    fn validate_reply(&self, reply: &Value) -> bool;

    fn context_window(&self) -> usize;

    fn estimate_tokens(&self, text: &str) -> usize;
}

#[derive(Clone, Debug)]
pub struct ClaudeContext {
    parameters: ModelParameters,
}

impl ClaudeContext {
    pub fn new(parameters: ModelParameters) -> Self {
        Self { parameters }
    }

    pub fn from_config(config: &LlmConfig) -> Self {
        Self::new(ModelParameters {
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            top_p: None,
        })
    }
}

impl ModelContext for ClaudeContext {
    fn system_prompt(&self) -> &str {
        SYSTEM_PROMPT
    }

    fn format_user_message(&self, content: &str) -> ChatMessage {
        ChatMessage::user(content)
    }

    fn parse_reply(&self, raw: &str) -> Result<Value, ApplicationError> {
        extract_json_object(raw)
    }

    fn parameters(&self) -> ModelParameters {
        self.parameters.clone()
    }

    fn validate_reply(&self, reply: &Value) -> bool {
        reply
            .as_object()
            .is_some_and(|object| REQUIRED_KEYS.iter().all(|key| object.contains_key(*key)))
    }

    fn context_window(&self) -> usize {
        CLAUDE_CONTEXT_WINDOW
    }

    fn estimate_tokens(&self, text: &str) -> usize {
        text.chars().count() / CHARS_PER_TOKEN
    }
}

/// Strips ```json / ``` fencing, then parses. When that fails, retries on the span
/// from the first `{` to the last `}`.
pub fn extract_json_object(raw: &str) -> Result<Value, ApplicationError> {
    let unfenced = strip_fencing(raw);
    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(unfenced.trim()) {
        return Ok(value);
    }

    let (Some(start), Some(end)) = (raw.find('{'), raw.rfind('}')) else {
        return Err(ApplicationError::parse("no JSON object found in model reply", raw));
    };
    if end < start {
        return Err(ApplicationError::parse("no JSON object found in model reply", raw));
    }

    match serde_json::from_str::<Value>(&raw[start..=end]) {
        Ok(value @ Value::Object(_)) => Ok(value),
        Ok(_) => Err(ApplicationError::parse("model reply is not a JSON object", raw)),
        Err(error) => {
            Err(ApplicationError::parse(format!("model reply is not valid JSON: {error}"), raw))
        }
    }
}

fn strip_fencing(raw: &str) -> &str {
    if let Some((_, rest)) = raw.split_once("```json") {
        return rest.split_once("```").map_or(rest, |(body, _)| body);
    }
    if let Some((_, rest)) = raw.split_once("```") {
        return rest.split_once("```").map_or(rest, |(body, _)| body);
    }
    raw
}
