use async_trait::async_trait;

use crate::domain::document::Document;
use crate::errors::ApplicationError;

/// Underwriting guidance consulted before the model is asked for a risk opinion.
#[async_trait]
pub trait GuidelineSource: Send + Sync {
    async fn guidelines_for(
        &self,
        business_type: &str,
        state: Option<&str>,
    ) -> Result<Vec<Document>, ApplicationError>;
}
