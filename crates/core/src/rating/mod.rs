//! Rating engine: base rate by business type, adjusted by four independent
//! step factors. No interaction terms, so every factor can be audited on its own.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::profile::{BusinessProfile, Claim};
use crate::format::{format_money, title_case};

pub const DEFAULT_BASE_RATE: Decimal = Decimal::from_parts(5_000, 0, 0, false, 0);

const BASE_RATES: [(&str, i64); 5] = [
    ("restaurant", 5_000),
    ("retail", 4_000),
    ("manufacturing", 8_000),
    ("construction", 10_000),
    ("professional_services", 3_000),
];

const SMALL_CLAIM_LIMIT: i64 = 5_000;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingBreakdown {
    pub base_rate: Decimal,
    pub revenue_factor: Decimal,
    pub employee_factor: Decimal,
    pub claims_factor: Decimal,
    pub years_factor: Decimal,
}

impl RatingBreakdown {
    pub fn premium(&self) -> Decimal {
        (self.base_rate
            * self.revenue_factor
            * self.employee_factor
            * self.claims_factor
            * self.years_factor)
            .normalize()
    }

    /// One row per rating input, in the order they are multiplied.
    pub fn steps(&self, profile: &BusinessProfile) -> Vec<RatingStep> {
        vec![
            RatingStep {
                stage: "Base Rate".to_string(),
                value: self.base_rate,
                basis: format!(
                    "Standard rate for {} businesses",
                    title_case(&profile.business_type)
                ),
            },
            RatingStep {
                stage: "Revenue Factor".to_string(),
                value: self.revenue_factor,
                basis: format!(
                    "Based on annual revenue of {}",
                    format_money(profile.annual_revenue)
                ),
            },
            RatingStep {
                stage: "Employee Factor".to_string(),
                value: self.employee_factor,
                basis: format!("Based on {} employees", profile.employee_count),
            },
            RatingStep {
                stage: "Claims Factor".to_string(),
                value: self.claims_factor,
                basis: format!("Based on {} claims", profile.claims.len()),
            },
            RatingStep {
                stage: "Years Factor".to_string(),
                value: self.years_factor,
                basis: format!("Based on {} years in business", profile.years_in_business),
            },
        ]
    }

    /// `$5,000.00 × 1.00 × 1.20 × 1.20 × 1.00`
    pub fn formula(&self) -> String {
        format!(
            "{} × {:.2} × {:.2} × {:.2} × {:.2}",
            format_money(self.base_rate),
            self.revenue_factor,
            self.employee_factor,
            self.claims_factor,
            self.years_factor
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingStep {
    pub stage: String,
    pub value: Decimal,
    pub basis: String,
}

pub trait RatingEngine: Send + Sync {
    fn rate(&self, profile: &BusinessProfile) -> RatingBreakdown;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct StaticRateTable;

impl RatingEngine for StaticRateTable {
    fn rate(&self, profile: &BusinessProfile) -> RatingBreakdown {
        rate_profile(profile)
    }
}

pub fn rate_profile(profile: &BusinessProfile) -> RatingBreakdown {
    RatingBreakdown {
        base_rate: base_rate(&profile.business_type),
        revenue_factor: revenue_factor(profile.annual_revenue),
        employee_factor: employee_factor(profile.employee_count),
        claims_factor: claims_factor(&profile.claims),
        years_factor: years_factor(profile.years_in_business),
    }
}

pub fn premium(profile: &BusinessProfile) -> Decimal {
    rate_profile(profile).premium()
}

/// Unknown business types fall back to [`DEFAULT_BASE_RATE`].
pub fn base_rate(business_type: &str) -> Decimal {
    let key = business_type.trim().to_ascii_lowercase();
    BASE_RATES
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, rate)| Decimal::from(*rate))
        .unwrap_or(DEFAULT_BASE_RATE)
}

pub fn revenue_factor(annual_revenue: Decimal) -> Decimal {
    if annual_revenue < Decimal::from(500_000) {
        factor(8)
    } else if annual_revenue < Decimal::from(1_000_000) {
        factor(10)
    } else if annual_revenue < Decimal::from(2_000_000) {
        factor(12)
    } else {
        factor(15)
    }
}

pub fn employee_factor(employee_count: u32) -> Decimal {
    match employee_count {
        0..=9 => factor(8),
        10..=24 => factor(10),
        25..=49 => factor(12),
        _ => factor(15),
    }
}

/// Claim count dominates amount, except that a single claim under 5000 rates lower.
pub fn claims_factor(claims: &[Claim]) -> Decimal {
    let total: Decimal = claims.iter().map(|claim| claim.amount).sum();
    match claims.len() {
        0 => factor(9),
        1 if total < Decimal::from(SMALL_CLAIM_LIMIT) => factor(11),
        1 => factor(12),
        2 => factor(13),
        _ => factor(15),
    }
}

pub fn years_factor(years_in_business: u32) -> Decimal {
    match years_in_business {
        0..=1 => factor(12),
        2..=4 => factor(11),
        5..=9 => factor(10),
        _ => factor(9),
    }
}

fn factor(tenths: i64) -> Decimal {
    Decimal::new(tenths, 1)
}
