use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskProfile {
    Low,
    Medium,
    High,
}

impl RiskProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Accepts the three labels in any letter case.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

/// Qualitative opinion returned by the risk narrative model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub risk_profile: RiskProfile,
    pub risk_factors: Vec<String>,
    pub risk_score: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recommendations: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::RiskProfile;

    #[test]
    fn labels_are_case_insensitive() {
        assert_eq!(RiskProfile::from_label("HIGH"), Some(RiskProfile::High));
        assert_eq!(RiskProfile::from_label(" Medium "), Some(RiskProfile::Medium));
        assert_eq!(RiskProfile::from_label("severe"), None);
    }
}
