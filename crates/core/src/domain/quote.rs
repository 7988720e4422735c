use std::path::PathBuf;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::profile::BusinessProfile;
use crate::domain::risk::RiskAssessment;
use crate::rating::RatingBreakdown;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuoteId(pub String);

impl QuoteId {
    /// `QUOTE_<yyyymmdd>_<hhmmss>_<8 hex>`: sortable by creation time and safe as a file stem.
    pub fn generate(created_at: DateTime<Utc>) -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        Self(format!("QUOTE_{}_{}", created_at.format("%Y%m%d_%H%M%S"), &suffix[..8]))
    }
}

impl std::fmt::Display for QuoteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything decided for one quote before the report artifact exists.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnderwritingDecision {
    pub quote_id: QuoteId,
    pub created_at: DateTime<Utc>,
    pub profile: BusinessProfile,
    pub risk: RiskAssessment,
    pub rating: RatingBreakdown,
    pub premium: Decimal,
    pub conditions: Vec<String>,
    pub explanation: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    #[serde(flatten)]
    pub decision: UnderwritingDecision,
    pub report_path: PathBuf,
}

impl Quote {
    pub fn id(&self) -> &QuoteId {
        &self.decision.quote_id
    }

    pub fn premium(&self) -> Decimal {
        self.decision.premium
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::QuoteId;

    #[test]
    fn generated_ids_embed_timestamp_and_are_unique() {
        let created_at = Utc.with_ymd_and_hms(2024, 3, 22, 14, 5, 9).single().expect("valid time");

        let first = QuoteId::generate(created_at);
        let second = QuoteId::generate(created_at);

        assert!(first.0.starts_with("QUOTE_20240322_140509_"));
        assert_eq!(first.0.len(), "QUOTE_20240322_140509_".len() + 8);
        assert_ne!(first, second);
    }
}
