//! Risk narrative and quote orchestration.
//!
//! The model is only asked for a qualitative opinion (profile, factors, score).
//! Premium, conditions and explanation are computed deterministically in
//! `autouw-core`; nothing the model says changes the price.

pub mod anthropic;
pub mod context;
pub mod llm;
pub mod narrative;
pub mod runtime;

pub use anthropic::AnthropicClient;
pub use context::{ClaudeContext, ModelContext};
pub use llm::{ChatMessage, GenerationRequest, LlmClient, ModelParameters, Role};
pub use narrative::RiskNarrativeClient;
pub use runtime::UnderwritingAgent;
