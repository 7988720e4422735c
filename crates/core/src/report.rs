use std::path::PathBuf;

use async_trait::async_trait;

use crate::domain::quote::UnderwritingDecision;
use crate::errors::ApplicationError;

/// Turns a finished decision into a report artifact and returns where it was written.
#[async_trait]
pub trait ReportRenderer: Send + Sync {
    async fn render(&self, decision: &UnderwritingDecision) -> Result<PathBuf, ApplicationError>;
}
