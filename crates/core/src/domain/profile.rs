use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;

pub const US_STATE_CODES: [&str; 50] = [
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "FL", "GA", "HI", "ID", "IL", "IN", "IA", "KS",
    "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH", "NJ", "NM", "NY",
    "NC", "ND", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT", "VT", "VA", "WA", "WV",
    "WI", "WY",
];

const CLAIM_DATE_FORMAT: &str = "%Y-%m-%d";

/// Claim as submitted on the wire, before validation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClaimRecord {
    pub date: String,
    #[serde(rename = "type")]
    pub claim_type: String,
    pub amount: Decimal,
}

/// Quote request as submitted by the CLI or the HTTP surface.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PolicyRequest {
    pub business_name: String,
    pub business_type: String,
    pub annual_revenue: Decimal,
    pub employee_count: i64,
    pub state: String,
    pub city: String,
    pub years_in_business: i64,
    pub business_description: String,
    #[serde(default)]
    pub claims_history: Vec<ClaimRecord>,
    #[serde(default)]
    pub additional_notes: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimType {
    Property,
    Liability,
    WorkersComp,
    Auto,
}

impl ClaimType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Property => "property",
            Self::Liability => "liability",
            Self::WorkersComp => "workers_comp",
            Self::Auto => "auto",
        }
    }
}

impl std::str::FromStr for ClaimType {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "property" => Ok(Self::Property),
            "liability" => Ok(Self::Liability),
            "workers_comp" => Ok(Self::WorkersComp),
            "auto" => Ok(Self::Auto),
            other => Err(ValidationError::new(
                "claims_history.type",
                format!(
                    "claim type `{other}` must be one of property|liability|workers_comp|auto"
                ),
            )),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub claim_type: ClaimType,
    pub amount: Decimal,
}

impl TryFrom<&ClaimRecord> for Claim {
    type Error = ValidationError;

    fn try_from(record: &ClaimRecord) -> Result<Self, Self::Error> {
        let date = NaiveDate::parse_from_str(record.date.trim(), CLAIM_DATE_FORMAT).map_err(|_| {
            ValidationError::new(
                "claims_history.date",
                format!("`{}` must be in YYYY-MM-DD format", record.date),
            )
        })?;
        let claim_type = record.claim_type.parse::<ClaimType>()?;
        if record.amount <= Decimal::ZERO {
            return Err(ValidationError::new("claims_history.amount", "must be positive"));
        }

        Ok(Self { date, claim_type, amount: record.amount })
    }
}

/// Normalized facts about the business being underwritten.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessProfile {
    pub name: String,
    pub business_type: String,
    pub annual_revenue: Decimal,
    pub employee_count: u32,
    pub state: String,
    pub city: String,
    pub years_in_business: u32,
    pub description: String,
    pub claims: Vec<Claim>,
    pub notes: Option<String>,
}

impl BusinessProfile {
    pub fn total_claims_amount(&self) -> Decimal {
        self.claims.iter().map(|claim| claim.amount).sum()
    }
}

impl PolicyRequest {
    pub fn validate(&self) -> Result<BusinessProfile, ValidationError> {
        let name = required_text("business_name", &self.business_name)?;
        let business_type = required_text("business_type", &self.business_type)?;

        if self.annual_revenue <= Decimal::ZERO {
            return Err(ValidationError::new("annual_revenue", "must be positive"));
        }

        let employee_count =
            u32::try_from(self.employee_count).ok().filter(|count| *count > 0).ok_or_else(|| {
                ValidationError::new(
                    "employee_count",
                    format!("must be between 1 and {}, got {}", u32::MAX, self.employee_count),
                )
            })?;

        let years_in_business = u32::try_from(self.years_in_business).map_err(|_| {
            ValidationError::new(
                "years_in_business",
                format!("must be between 0 and {}, got {}", u32::MAX, self.years_in_business),
            )
        })?;

        let state = normalize_state(&self.state)?;
        let description = required_text("business_description", &self.business_description)?;

        let claims =
            self.claims_history.iter().map(Claim::try_from).collect::<Result<Vec<_>, _>>()?;

        let notes = self
            .additional_notes
            .as_deref()
            .map(str::trim)
            .filter(|notes| !notes.is_empty())
            .map(str::to_string);

        Ok(BusinessProfile {
            name,
            business_type,
            annual_revenue: self.annual_revenue,
            employee_count,
            state,
            city: self.city.trim().to_string(),
            years_in_business,
            description,
            claims,
            notes,
        })
    }
}

pub fn normalize_state(raw: &str) -> Result<String, ValidationError> {
    let state = raw.trim().to_ascii_uppercase();
    if US_STATE_CODES.contains(&state.as_str()) {
        Ok(state)
    } else {
        Err(ValidationError::new("state", format!("`{raw}` must be a valid US state code")))
    }
}

fn required_text(field: &str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new(field, "cannot be empty"));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{ClaimRecord, ClaimType, PolicyRequest};

    fn request_fixture() -> PolicyRequest {
        PolicyRequest {
            business_name: "Joe's Diner".to_string(),
            business_type: "restaurant".to_string(),
            annual_revenue: Decimal::new(750_000, 0),
            employee_count: 25,
            state: "ca".to_string(),
            city: "San Francisco".to_string(),
            years_in_business: 5,
            business_description: "  Family-owned restaurant serving American cuisine.  "
                .to_string(),
            claims_history: vec![ClaimRecord {
                date: "2023-01-15".to_string(),
                claim_type: "property".to_string(),
                amount: Decimal::new(5_000, 0),
            }],
            additional_notes: Some("Recently renovated kitchen.".to_string()),
        }
    }

    #[test]
    fn validate_normalizes_state_and_trims_description() {
        let profile = request_fixture().validate().expect("valid request");

        assert_eq!(profile.state, "CA");
        assert_eq!(profile.description, "Family-owned restaurant serving American cuisine.");
        assert_eq!(profile.claims.len(), 1);
        assert_eq!(profile.claims[0].claim_type, ClaimType::Property);
        assert_eq!(profile.total_claims_amount(), Decimal::new(5_000, 0));
    }

    #[test]
    fn rejects_unknown_state() {
        let mut request = request_fixture();
        request.state = "XX".to_string();

        let error = request.validate().expect_err("XX is not a state");
        assert_eq!(error.field, "state");
    }

    #[test]
    fn rejects_non_positive_revenue_and_employees() {
        let mut request = request_fixture();
        request.annual_revenue = Decimal::ZERO;
        assert_eq!(request.validate().expect_err("zero revenue").field, "annual_revenue");

        let mut request = request_fixture();
        request.employee_count = 0;
        assert_eq!(request.validate().expect_err("zero employees").field, "employee_count");

        let mut request = request_fixture();
        request.employee_count = -3;
        assert_eq!(request.validate().expect_err("negative employees").field, "employee_count");
    }

    #[test]
    fn rejects_negative_years_in_business() {
        let mut request = request_fixture();
        request.years_in_business = -1;

        assert_eq!(request.validate().expect_err("negative years").field, "years_in_business");
    }

    #[test]
    fn out_of_range_counts_name_the_accepted_range() {
        let mut request = request_fixture();
        request.years_in_business = i64::from(u32::MAX) + 1;
        let error = request.validate().expect_err("too many years");
        assert_eq!(error.field, "years_in_business");
        assert!(!error.message.contains("negative"), "{}", error.message);
        assert!(error.message.contains("between 0 and 4294967295"), "{}", error.message);

        let mut request = request_fixture();
        request.employee_count = i64::MAX;
        let error = request.validate().expect_err("too many employees");
        assert_eq!(error.field, "employee_count");
        assert!(error.message.contains("between 1 and 4294967295"), "{}", error.message);
        assert!(error.message.contains(&i64::MAX.to_string()), "{}", error.message);
    }

    #[test]
    fn rejects_blank_description() {
        let mut request = request_fixture();
        request.business_description = "   ".to_string();

        assert_eq!(
            request.validate().expect_err("blank description").field,
            "business_description"
        );
    }

    #[test]
    fn rejects_malformed_claims() {
        let mut request = request_fixture();
        request.claims_history[0].date = "01/15/2023".to_string();
        assert_eq!(request.validate().expect_err("bad date").field, "claims_history.date");

        let mut request = request_fixture();
        request.claims_history[0].claim_type = "slip_and_fall".to_string();
        assert_eq!(request.validate().expect_err("bad type").field, "claims_history.type");

        let mut request = request_fixture();
        request.claims_history[0].amount = Decimal::new(-10, 0);
        assert_eq!(request.validate().expect_err("bad amount").field, "claims_history.amount");
    }

    #[test]
    fn blank_notes_are_dropped() {
        let mut request = request_fixture();
        request.additional_notes = Some("   ".to_string());

        assert_eq!(request.validate().expect("valid").notes, None);
    }

    #[test]
    fn deserializes_wire_format_with_numeric_amounts() {
        let request: PolicyRequest = serde_json::from_value(serde_json::json!({
            "business_name": "Corner Shop",
            "business_type": "retail",
            "annual_revenue": 250000.0,
            "employee_count": 4,
            "state": "TX",
            "city": "Austin",
            "years_in_business": 1,
            "business_description": "Neighbourhood grocery",
            "claims_history": [{"date": "2022-06-20", "type": "liability", "amount": 2500}]
        }))
        .expect("wire request should deserialize");

        assert_eq!(request.annual_revenue, Decimal::new(250_000, 0));
        assert_eq!(request.claims_history[0].amount, Decimal::new(2_500, 0));
        assert_eq!(request.additional_notes, None);
    }
}
