//! Special conditions and the plain-text premium explanation.
//!
//! Both outputs are pure functions of their inputs; the explanation text is
//! compared byte-for-byte in tests, so any wording change is a contract change.

use rust_decimal::Decimal;

use crate::domain::profile::BusinessProfile;
use crate::domain::risk::{RiskAssessment, RiskProfile};
use crate::format::{format_money, title_case};
use crate::rating::RatingBreakdown;

pub const HIGH_RISK_CONDITIONS: [&str; 4] = [
    "Monthly safety inspections required",
    "Employee training program implementation",
    "Security system installation",
    "Regular risk assessment reviews",
];

pub const FOOD_SERVICE_CONDITIONS: [&str; 3] = [
    "Food safety certification required",
    "Regular kitchen equipment maintenance",
    "Employee hygiene training",
];

pub const MANUFACTURING_CONDITIONS: [&str; 3] =
    ["Equipment safety inspections", "Worker safety training", "Emergency response plan"];

pub const CLAIMS_REVIEW_CONDITIONS: [&str; 2] =
    ["Claims review every 6 months", "Risk mitigation plan required"];

/// Rules are cumulative; order is high-risk, business type, claims.
pub fn determine_conditions(profile: &BusinessProfile, risk: &RiskAssessment) -> Vec<String> {
    let mut conditions = Vec::new();

    if risk.risk_profile == RiskProfile::High {
        conditions.extend(HIGH_RISK_CONDITIONS.iter().map(|item| item.to_string()));
    }

    match profile.business_type.trim().to_ascii_lowercase().as_str() {
        "restaurant" => {
            conditions.extend(FOOD_SERVICE_CONDITIONS.iter().map(|item| item.to_string()))
        }
        "manufacturing" => {
            conditions.extend(MANUFACTURING_CONDITIONS.iter().map(|item| item.to_string()))
        }
        _ => {}
    }

    if !profile.claims.is_empty() {
        conditions.extend(CLAIMS_REVIEW_CONDITIONS.iter().map(|item| item.to_string()));
    }

    conditions
}

pub fn compose_explanation(
    profile: &BusinessProfile,
    risk: &RiskAssessment,
    rating: &RatingBreakdown,
    premium: Decimal,
) -> String {
    let mut lines = vec![
        format!("Premium calculation for {}:", profile.name),
        format!(
            "1. Base Rate: {} (based on {} business type)",
            format_money(rating.base_rate),
            title_case(&profile.business_type)
        ),
        format!(
            "2. Revenue Adjustment: {:.2}x (based on annual revenue of {})",
            rating.revenue_factor,
            format_money(profile.annual_revenue)
        ),
        format!(
            "3. Employee Count Adjustment: {:.2}x (based on {} employees)",
            rating.employee_factor, profile.employee_count
        ),
        format!(
            "4. Claims History Adjustment: {:.2}x (based on {} claims)",
            rating.claims_factor,
            profile.claims.len()
        ),
        format!(
            "5. Years in Business Adjustment: {:.2}x (based on {} years)",
            rating.years_factor, profile.years_in_business
        ),
        String::new(),
        format!("Final Calculation: {} = {}", rating.formula(), format_money(premium)),
        String::new(),
        format!("Risk Profile: {}", title_case(risk.risk_profile.as_str())),
        format!("Risk Score: {:.2}", risk.risk_score),
        String::new(),
        "Key Risk Factors:".to_string(),
    ];
    lines.extend(risk.risk_factors.iter().map(|factor| format!("- {factor}")));

    lines.join("\n")
}
