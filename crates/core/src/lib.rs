pub mod composer;
pub mod config;
pub mod domain;
pub mod errors;
pub mod format;
pub mod guidelines;
pub mod rating;
pub mod report;

pub use composer::{compose_explanation, determine_conditions};
pub use domain::document::{DocType, Document};
pub use domain::profile::{BusinessProfile, Claim, ClaimRecord, ClaimType, PolicyRequest};
pub use domain::quote::{Quote, QuoteId, UnderwritingDecision};
pub use domain::risk::{RiskAssessment, RiskProfile};
pub use errors::{ApplicationError, InterfaceError, ValidationError};
pub use guidelines::GuidelineSource;
pub use rating::{RatingBreakdown, RatingEngine, StaticRateTable};
pub use report::ReportRenderer;
