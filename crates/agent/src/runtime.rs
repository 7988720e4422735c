use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use autouw_core::composer::{compose_explanation, determine_conditions};
use autouw_core::domain::document::Document;
use autouw_core::domain::profile::{BusinessProfile, PolicyRequest};
use autouw_core::domain::quote::{Quote, QuoteId, UnderwritingDecision};
use autouw_core::errors::ApplicationError;
use autouw_core::guidelines::GuidelineSource;
use autouw_core::rating::{RatingEngine, StaticRateTable};
use autouw_core::report::ReportRenderer;

use crate::narrative::RiskNarrativeClient;

/// Request orchestrator. Runs validate -> rate -> narrative -> compose -> render
/// in order and returns a quote only when every stage succeeded.
#[derive(Clone)]
pub struct UnderwritingAgent {
    rating: Arc<dyn RatingEngine>,
    narrative: RiskNarrativeClient,
    renderer: Arc<dyn ReportRenderer>,
    guidelines: Option<Arc<dyn GuidelineSource>>,
}

impl UnderwritingAgent {
    pub fn new(narrative: RiskNarrativeClient, renderer: Arc<dyn ReportRenderer>) -> Self {
        Self { rating: Arc::new(StaticRateTable), narrative, renderer, guidelines: None }
    }

    pub fn with_guidelines(mut self, guidelines: Arc<dyn GuidelineSource>) -> Self {
        self.guidelines = Some(guidelines);
        self
    }

    pub fn with_rating_engine(mut self, rating: Arc<dyn RatingEngine>) -> Self {
        self.rating = rating;
        self
    }

    pub async fn quote(&self, request: &PolicyRequest) -> Result<Quote, ApplicationError> {
        let profile = request.validate().map_err(|error| {
            warn!(
                event_name = "quote.validation.failed",
                business_name = %request.business_name,
                field = %error.field,
                "policy request rejected"
            );
            error
        })?;
        self.quote_profile(profile).await
    }

    pub async fn quote_profile(&self, profile: BusinessProfile) -> Result<Quote, ApplicationError> {
        let created_at = Utc::now();
        let quote_id = QuoteId::generate(created_at);
        info!(
            event_name = "quote.started",
            quote_id = %quote_id,
            business_type = %profile.business_type,
            state = %profile.state,
            "quote generation started"
        );

        let rating = self.rating.rate(&profile);
        let premium = rating.premium();
        info!(
            event_name = "quote.rated",
            quote_id = %quote_id,
            premium = %premium,
            "profile rated"
        );

        let guidelines = self.lookup_guidelines(&quote_id, &profile).await;
        let risk = self.narrative.evaluate(&profile, &guidelines).await.map_err(|failure| {
            error!(
                event_name = "quote.narrative.failed",
                quote_id = %quote_id,
                error_class = failure.error_class(),
                error = %failure,
                "risk narrative failed; quote aborted"
            );
            failure
        })?;

        let conditions = determine_conditions(&profile, &risk);
        let explanation = compose_explanation(&profile, &risk, &rating, premium);
        let decision = UnderwritingDecision {
            quote_id,
            created_at,
            profile,
            risk,
            rating,
            premium,
            conditions,
            explanation,
        };

        let report_path = self.renderer.render(&decision).await.map_err(|failure| {
            error!(
                event_name = "quote.report.failed",
                quote_id = %decision.quote_id,
                error = %failure,
                "report rendering failed; quote aborted"
            );
            failure
        })?;

        info!(
            event_name = "quote.completed",
            quote_id = %decision.quote_id,
            risk_profile = decision.risk.risk_profile.as_str(),
            report_path = %report_path.display(),
            "quote generated"
        );
        Ok(Quote { decision, report_path })
    }

    /// Items are processed one after another; a failing item never stops the rest.
    pub async fn quote_batch(
        &self,
        requests: &[PolicyRequest],
    ) -> Vec<Result<Quote, ApplicationError>> {
        let mut outcomes = Vec::with_capacity(requests.len());
        for (index, request) in requests.iter().enumerate() {
            let outcome = self.quote(request).await;
            if let Err(failure) = &outcome {
                warn!(
                    event_name = "quote.batch.item_failed",
                    index,
                    business_name = %request.business_name,
                    error_class = failure.error_class(),
                    "batch item failed"
                );
            }
            outcomes.push(outcome);
        }
        outcomes
    }

    async fn lookup_guidelines(
        &self,
        quote_id: &QuoteId,
        profile: &BusinessProfile,
    ) -> Vec<Document> {
        let Some(source) = &self.guidelines else {
            return Vec::new();
        };

        match source.guidelines_for(&profile.business_type, Some(&profile.state)).await {
            Ok(documents) => documents,
            Err(failure) => {
                warn!(
                    event_name = "quote.guidelines.unavailable",
                    quote_id = %quote_id,
                    error = %failure,
                    "continuing without guideline context"
                );
                Vec::new()
            }
        }
    }
}
