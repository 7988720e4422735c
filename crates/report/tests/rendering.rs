use std::fs;

use chrono::{NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;

use autouw_core::composer::{compose_explanation, determine_conditions};
use autouw_core::config::StorageConfig;
use autouw_core::domain::profile::{BusinessProfile, Claim, ClaimType};
use autouw_core::domain::quote::{QuoteId, UnderwritingDecision};
use autouw_core::domain::risk::{RiskAssessment, RiskProfile};
use autouw_core::rating::rate_profile;
use autouw_core::report::ReportRenderer;
use autouw_report::{QuoteReportRenderer, ReportError};

fn profile(claims: Vec<Claim>, notes: Option<&str>) -> BusinessProfile {
    BusinessProfile {
        name: "Joe's Diner".to_string(),
        business_type: "restaurant".to_string(),
        annual_revenue: Decimal::from(750_000),
        employee_count: 25,
        state: "CA".to_string(),
        city: "San Francisco".to_string(),
        years_in_business: 5,
        description: "Family-owned restaurant serving breakfast and lunch".to_string(),
        claims,
        notes: notes.map(str::to_string),
    }
}

fn decision(profile: BusinessProfile, risk_profile: RiskProfile) -> UnderwritingDecision {
    let created_at = Utc.with_ymd_and_hms(2024, 3, 5, 14, 30, 0).single().expect("timestamp");
    let risk = RiskAssessment {
        risk_profile,
        risk_factors: vec!["Open flame cooking".to_string()],
        risk_score: 65.0,
        recommendations: vec!["Install hood suppression".to_string()],
    };
    let rating = rate_profile(&profile);
    let premium = rating.premium();
    UnderwritingDecision {
        quote_id: QuoteId("QUOTE_20240305_143000_abcd1234".to_string()),
        created_at,
        conditions: determine_conditions(&profile, &risk),
        explanation: compose_explanation(&profile, &risk, &rating, premium),
        profile,
        risk,
        rating,
        premium,
    }
}

fn property_claim() -> Claim {
    Claim {
        date: NaiveDate::from_ymd_opt(2023, 1, 15).expect("date"),
        claim_type: ClaimType::Property,
        amount: Decimal::from(5_000),
    }
}

#[tokio::test]
async fn html_report_is_written_into_a_fresh_reports_dir() {
    let temp = tempfile::tempdir().expect("tempdir");
    let reports_dir = temp.path().join("out").join("reports");
    let renderer = QuoteReportRenderer::new(&reports_dir).expect("renderer").html_only();
    let profile = profile(vec![property_claim()], Some("Renovated kitchen"));
    let decision = decision(profile, RiskProfile::Medium);

    let path = renderer.write_report(&decision).await.expect("report written");

    assert_eq!(path, reports_dir.join("quote_QUOTE_20240305_143000_abcd1234.html"));
    let html = fs::read_to_string(&path).expect("read report");
    assert!(html.contains("Quote QUOTE_20240305_143000_abcd1234"));
    assert!(html.contains("Joe&#x27;s Diner"));
    assert!(html.contains("San Francisco, CA"));
    assert!(html.contains("$750,000.00"));
    assert!(html.contains("$7,200.00"));
    assert!(html.contains("March 05, 2024"));
    assert!(html.contains("Medium"));
    assert!(html.contains("#ea580c"));
    assert!(html.contains("65.0"));
    assert!(html.contains("<td>1.20</td>"));
    assert!(html.contains("Install hood suppression"));
    assert!(html.contains("Claims History"));
    assert!(html.contains("2023-01-15"));
    assert!(html.contains("Food safety certification required"));
    assert!(html.contains("Claims review every 6 months"));
    assert!(html.contains("Renovated kitchen"));
}

#[tokio::test]
async fn optional_sections_are_left_out() {
    let temp = tempfile::tempdir().expect("tempdir");
    let renderer = QuoteReportRenderer::new(temp.path()).expect("renderer").html_only();
    let mut decision = decision(profile(Vec::new(), None), RiskProfile::Low);
    decision.conditions.clear();

    let html = renderer.render_html(&decision).expect("html");

    assert!(!html.contains("Claims History"));
    assert!(!html.contains("Required Conditions"));
    assert!(!html.contains("Additional Notes"));
    assert!(html.contains("#16a34a"));
}

#[tokio::test]
async fn template_dir_override_replaces_the_embedded_template() {
    let temp = tempfile::tempdir().expect("tempdir");
    let templates = temp.path().join("templates");
    fs::create_dir_all(&templates).expect("templates dir");
    fs::write(
        templates.join("quote.html.tera"),
        "<p>{{ quote_id }} costs {{ premium | money }}</p>",
    )
    .expect("write template");
    let storage = StorageConfig {
        documents_dir: temp.path().join("data"),
        reports_dir: temp.path().join("reports"),
        templates_dir: Some(templates),
    };

    let renderer = QuoteReportRenderer::from_config(&storage).expect("renderer").html_only();
    let path = renderer
        .render(&decision(profile(Vec::new(), None), RiskProfile::Low))
        .await
        .expect("rendered through the trait");

    let html = fs::read_to_string(path).expect("read report");
    assert_eq!(html, "<p>QUOTE_20240305_143000_abcd1234 costs $5,400.00</p>");
}

#[test]
fn template_dir_without_quote_template_is_rejected() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::write(temp.path().join("other.html.tera"), "<p>unrelated</p>").expect("write template");

    let error = QuoteReportRenderer::with_template_dir(temp.path().join("reports"), temp.path())
        .expect_err("quote template missing");

    assert!(matches!(error, ReportError::Template(_)));
}

#[tokio::test]
async fn render_failures_surface_as_report_errors() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::write(temp.path().join("quote.html.tera"), "{{ missing.field }}").expect("write template");
    let renderer = QuoteReportRenderer::with_template_dir(temp.path().join("reports"), temp.path())
        .expect("renderer")
        .html_only();

    let error = renderer
        .render(&decision(profile(Vec::new(), None), RiskProfile::High))
        .await
        .expect_err("undefined variable");

    assert_eq!(error.error_class(), "report");
    assert!(!temp.path().join("reports").exists());
}
