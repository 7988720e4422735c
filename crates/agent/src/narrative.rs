use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use autouw_core::domain::document::Document;
use autouw_core::domain::profile::BusinessProfile;
use autouw_core::domain::risk::{RiskAssessment, RiskProfile};
use autouw_core::errors::{ApplicationError, ValidationError};
use autouw_core::format::format_money;

use crate::context::ModelContext;
use crate::llm::{GenerationRequest, LlmClient};

pub const GUIDELINE_EXCERPT_CHARS: usize = 500;

/// Asks the model for a qualitative risk opinion. One call per evaluation, no
/// retries; anything that cannot be read as an assessment is a parse error.
#[derive(Clone)]
pub struct RiskNarrativeClient {
    llm: Arc<dyn LlmClient>,
    context: Arc<dyn ModelContext>,
}

impl RiskNarrativeClient {
    pub fn new(llm: Arc<dyn LlmClient>, context: Arc<dyn ModelContext>) -> Self {
        Self { llm, context }
    }

    pub async fn evaluate(
        &self,
        profile: &BusinessProfile,
        guidelines: &[Document],
    ) -> Result<RiskAssessment, ApplicationError> {
        let prompt = render_prompt(profile, guidelines);
        let system = self.context.system_prompt().to_string();

        let estimated_tokens =
            self.context.estimate_tokens(&system) + self.context.estimate_tokens(&prompt);
        if estimated_tokens > self.context.context_window() {
            return Err(ValidationError::new(
                "prompt",
                format!(
                    "estimated {estimated_tokens} tokens exceeds the model context window of {}",
                    self.context.context_window()
                ),
            )
            .into());
        }

        let request = GenerationRequest {
            system,
            messages: vec![self.context.format_user_message(&prompt)],
            parameters: self.context.parameters(),
        };
        debug!(
            event_name = "narrative.request.sent",
            model = %request.parameters.model,
            estimated_tokens,
            guideline_count = guidelines.len(),
            "requesting risk narrative"
        );

        let raw = self.llm.generate(&request).await?;
        let reply = self.context.parse_reply(&raw)?;
        if !self.context.validate_reply(&reply) {
            warn!(event_name = "narrative.reply.invalid", "model reply is missing required keys");
            return Err(ApplicationError::parse(
                "model reply is missing one of risk_profile, risk_factors, risk_score",
                raw,
            ));
        }

        let assessment = assessment_from_reply(&reply, &raw)?;
        info!(
            event_name = "narrative.reply.accepted",
            risk_profile = assessment.risk_profile.as_str(),
            risk_score = assessment.risk_score,
            factor_count = assessment.risk_factors.len(),
            "risk narrative accepted"
        );
        Ok(assessment)
    }
}

pub fn render_prompt(profile: &BusinessProfile, guidelines: &[Document]) -> String {
    let claims =
        serde_json::to_string_pretty(&profile.claims).unwrap_or_else(|_| "[]".to_string());

    let mut prompt = format!(
        "Evaluate the risk profile for this business:\n\n\
         Business: {}\n\
         Type: {}\n\
         Revenue: {}\n\
         Employees: {}\n\
         Location: {}, {}\n\
         Years in Business: {}\n\
         Description: {}\n\n\
         Claims History:\n{claims}\n",
        profile.name,
        profile.business_type,
        format_money(profile.annual_revenue),
        profile.employee_count,
        profile.city,
        profile.state,
        profile.years_in_business,
        profile.description,
    );

    if let Some(notes) = &profile.notes {
        prompt.push_str(&format!("\nAdditional Notes: {notes}\n"));
    }

    if !guidelines.is_empty() {
        prompt.push_str("\nUnderwriting Guidelines:\n");
        for guideline in guidelines {
            let excerpt: String = guideline.content.chars().take(GUIDELINE_EXCERPT_CHARS).collect();
            prompt.push_str(&format!("- {}: {excerpt}\n", guideline.title));
        }
    }

    prompt.push_str(
        "\nPlease provide a JSON response with:\n\
         1. risk_profile (low/medium/high)\n\
         2. risk_factors (list of specific factors)\n\
         3. risk_score (0-100)\n\
         4. recommendations (list of risk mitigation steps)\n\n\
         Format your response as valid JSON.",
    );
    prompt
}

/// Coerces a parsed reply into a [`RiskAssessment`]. Only the profile label is
/// checked against a fixed set; the score is taken as given.
pub fn assessment_from_reply(reply: &Value, raw: &str) -> Result<RiskAssessment, ApplicationError> {
    let label = reply.get("risk_profile").and_then(Value::as_str).unwrap_or_default();
    let risk_profile = RiskProfile::from_label(label).ok_or_else(|| {
        ApplicationError::parse(format!("unknown risk_profile `{label}` in model reply"), raw)
    })?;

    let risk_factors = string_list(reply.get("risk_factors")).ok_or_else(|| {
        ApplicationError::parse("risk_factors in model reply is not a list", raw)
    })?;

    let risk_score = match reply.get("risk_score") {
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(text)) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| ApplicationError::parse("risk_score in model reply is not a number", raw))?;

    let recommendations = match reply.get("recommendations") {
        None | Some(Value::Null) => Vec::new(),
        other => string_list(other).ok_or_else(|| {
            ApplicationError::parse("recommendations in model reply is not a list", raw)
        })?,
    };

    Ok(RiskAssessment { risk_profile, risk_factors, risk_score, recommendations })
}

fn string_list(value: Option<&Value>) -> Option<Vec<String>> {
    let items = value?.as_array()?;
    Some(
        items
            .iter()
            .map(|item| match item {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;
    use serde_json::{json, Map};

    use autouw_core::domain::document::{DocType, Document};
    use autouw_core::domain::profile::{BusinessProfile, Claim, ClaimType};
    use autouw_core::domain::risk::RiskProfile;
    use autouw_core::errors::ApplicationError;

    use super::{assessment_from_reply, render_prompt, GUIDELINE_EXCERPT_CHARS};

    fn profile() -> BusinessProfile {
        BusinessProfile {
            name: "Joe's Diner".to_string(),
            business_type: "restaurant".to_string(),
            annual_revenue: Decimal::from(750_000),
            employee_count: 25,
            state: "CA".to_string(),
            city: "San Francisco".to_string(),
            years_in_business: 5,
            description: "Family-owned restaurant".to_string(),
            claims: vec![Claim {
                date: NaiveDate::from_ymd_opt(2023, 1, 15).expect("valid date"),
                claim_type: ClaimType::Property,
                amount: Decimal::from(5_000),
            }],
            notes: Some("Recently renovated kitchen".to_string()),
        }
    }

    fn guideline(content: String) -> Document {
        Document {
            doc_id: "gl-restaurant".to_string(),
            title: "Restaurant Guidelines".to_string(),
            content,
            doc_type: DocType::Guideline,
            metadata: Map::new(),
            applicable_states: vec!["all".to_string()],
            last_updated: Utc::now(),
        }
    }

    #[test]
    fn prompt_lists_business_facts_and_claims() {
        let prompt = render_prompt(&profile(), &[]);

        assert!(prompt.contains("Business: Joe's Diner"));
        assert!(prompt.contains("Revenue: $750,000.00"));
        assert!(prompt.contains("Location: San Francisco, CA"));
        assert!(prompt.contains("\"type\": \"property\""));
        assert!(prompt.contains("Additional Notes: Recently renovated kitchen"));
        assert!(!prompt.contains("Underwriting Guidelines"));
        assert!(prompt.ends_with("Format your response as valid JSON."));
    }

    #[test]
    fn guideline_excerpts_are_truncated() {
        let long = "x".repeat(GUIDELINE_EXCERPT_CHARS + 200);

        let prompt = render_prompt(&profile(), &[guideline(long)]);

        let excerpt = "x".repeat(GUIDELINE_EXCERPT_CHARS);
        let expected = format!("- Restaurant Guidelines: {excerpt}\n");
        assert!(prompt.contains(&expected));
        assert!(!prompt.contains(&"x".repeat(GUIDELINE_EXCERPT_CHARS + 1)));
    }

    #[test]
    fn reply_with_recommendations_is_read_in_full() {
        let reply = json!({
            "risk_profile": "Medium",
            "risk_factors": ["Recent property claim", "Open flame cooking"],
            "risk_score": 65,
            "recommendations": ["Install hood suppression"]
        });

        let assessment = assessment_from_reply(&reply, "raw").expect("assessment");

        assert_eq!(assessment.risk_profile, RiskProfile::Medium);
        assert_eq!(assessment.risk_factors.len(), 2);
        assert_eq!(assessment.risk_score, 65.0);
        assert_eq!(assessment.recommendations, vec!["Install hood suppression".to_string()]);
    }

    #[test]
    fn numeric_string_score_is_accepted() {
        let reply = json!({"risk_profile": "low", "risk_factors": [], "risk_score": "12.5"});

        let assessment = assessment_from_reply(&reply, "raw").expect("assessment");

        assert_eq!(assessment.risk_score, 12.5);
        assert!(assessment.recommendations.is_empty());
    }

    #[test]
    fn unknown_label_and_bad_shapes_are_parse_errors() {
        let cases = [
            json!({"risk_profile": "severe", "risk_factors": [], "risk_score": 90}),
            json!({"risk_profile": "low", "risk_factors": "none", "risk_score": 10}),
            json!({"risk_profile": "low", "risk_factors": [], "risk_score": "ten"}),
            json!({
                "risk_profile": "low",
                "risk_factors": [],
                "risk_score": 1,
                "recommendations": 3
            }),
        ];

        for reply in cases {
            match assessment_from_reply(&reply, "the raw reply") {
                Err(ApplicationError::Parse { raw, .. }) => assert_eq!(raw, "the raw reply"),
                other => panic!("expected parse error for {reply}, got {other:?}"),
            }
        }
    }
}
