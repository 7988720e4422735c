use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use tera::{Context, Tera};
use tokio::process::Command;
use tracing::{error, info, warn};

use autouw_core::config::StorageConfig;
use autouw_core::domain::profile::BusinessProfile;
use autouw_core::domain::quote::UnderwritingDecision;
use autouw_core::domain::risk::RiskProfile;
use autouw_core::errors::ApplicationError;
use autouw_core::format::title_case;
use autouw_core::rating::RatingStep;
use autouw_core::report::ReportRenderer;

use crate::filters::register_template_filters;

pub const QUOTE_TEMPLATE: &str = "quote.html.tera";

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("template error: {0}")]
    Template(String),
    #[error("conversion error: {0}")]
    Conversion(String),
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl ReportError {
    fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io { context: context.into(), source }
    }
}

impl From<ReportError> for ApplicationError {
    fn from(error: ReportError) -> Self {
        match error {
            ReportError::Io { context, source } => ApplicationError::io(context, source),
            other => ApplicationError::Report(other.to_string()),
        }
    }
}

/// Renders the quote template to HTML and converts it to PDF with `wkhtmltopdf`
/// when the tool is on `PATH`. Without it, or when conversion fails, the HTML
/// itself is the report.
#[derive(Clone, Debug)]
pub struct QuoteReportRenderer {
    tera: Tera,
    reports_dir: PathBuf,
    wkhtmltopdf_path: Option<PathBuf>,
}

impl QuoteReportRenderer {
    /// Uses the template compiled into the binary.
    pub fn new(reports_dir: impl Into<PathBuf>) -> Result<Self, ReportError> {
        let mut tera = Tera::default();
        tera.add_raw_template(
            QUOTE_TEMPLATE,
            include_str!("../../../templates/reports/quote.html.tera"),
        )
        .map_err(|error| ReportError::Template(error.to_string()))?;
        Ok(Self::assemble(tera, reports_dir.into()))
    }

    /// Loads every `*.tera` file under `template_dir`; it must provide `quote.html.tera`.
    pub fn with_template_dir(
        reports_dir: impl Into<PathBuf>,
        template_dir: &Path,
    ) -> Result<Self, ReportError> {
        let pattern = format!("{}/**/*.tera", template_dir.display());
        let tera = Tera::new(&pattern).map_err(|error| ReportError::Template(error.to_string()))?;
        if !tera.get_template_names().any(|name| name == QUOTE_TEMPLATE) {
            return Err(ReportError::Template(format!(
                "{} does not contain {QUOTE_TEMPLATE}",
                template_dir.display()
            )));
        }
        Ok(Self::assemble(tera, reports_dir.into()))
    }

    pub fn from_config(storage: &StorageConfig) -> Result<Self, ReportError> {
        match &storage.templates_dir {
            Some(template_dir) => Self::with_template_dir(&storage.reports_dir, template_dir),
            None => Self::new(&storage.reports_dir),
        }
    }

    fn assemble(mut tera: Tera, reports_dir: PathBuf) -> Self {
        tera.autoescape_on(vec![".html", ".html.tera"]);
        register_template_filters(&mut tera);

        let wkhtmltopdf_path = which::which("wkhtmltopdf").ok();
        match &wkhtmltopdf_path {
            Some(path) => info!(
                event_name = "report.converter.found",
                path = %path.display(),
                "wkhtmltopdf found"
            ),
            None => warn!(
                event_name = "report.converter.missing",
                "wkhtmltopdf not found in PATH; reports will be written as HTML"
            ),
        }

        Self { tera, reports_dir, wkhtmltopdf_path }
    }

    /// Skips PDF conversion even when `wkhtmltopdf` is installed.
    pub fn html_only(mut self) -> Self {
        self.wkhtmltopdf_path = None;
        self
    }

    pub fn reports_dir(&self) -> &Path {
        &self.reports_dir
    }

    pub fn converts_to_pdf(&self) -> bool {
        self.wkhtmltopdf_path.is_some()
    }

    pub fn render_html(&self, decision: &UnderwritingDecision) -> Result<String, ReportError> {
        let view = ReportView::from_decision(decision);
        let context = Context::from_serialize(&view)
            .map_err(|error| ReportError::Template(error.to_string()))?;
        self.tera
            .render(QUOTE_TEMPLATE, &context)
            .map_err(|error| ReportError::Template(format!("{error:?}")))
    }

    pub async fn write_report(
        &self,
        decision: &UnderwritingDecision,
    ) -> Result<PathBuf, ReportError> {
        let html = self.render_html(decision)?;

        tokio::fs::create_dir_all(&self.reports_dir).await.map_err(|error| {
            ReportError::io(
                format!("could not create reports directory {}", self.reports_dir.display()),
                error,
            )
        })?;

        let html_path = self.reports_dir.join(format!("quote_{}.html", decision.quote_id));
        tokio::fs::write(&html_path, &html).await.map_err(|error| {
            ReportError::io(format!("could not write {}", html_path.display()), error)
        })?;

        let Some(wkhtmltopdf) = &self.wkhtmltopdf_path else {
            info!(
                event_name = "report.html.written",
                quote_id = %decision.quote_id,
                path = %html_path.display(),
                "report written as HTML"
            );
            return Ok(html_path);
        };

        let pdf_path = self.reports_dir.join(format!("quote_{}.pdf", decision.quote_id));
        match convert_html_to_pdf(wkhtmltopdf, &html_path, &pdf_path).await {
            Ok(()) => {
                let _ = tokio::fs::remove_file(&html_path).await;
                info!(
                    event_name = "report.pdf.written",
                    quote_id = %decision.quote_id,
                    path = %pdf_path.display(),
                    "report written as PDF"
                );
                Ok(pdf_path)
            }
            Err(conversion) => {
                warn!(
                    event_name = "report.pdf.fallback",
                    quote_id = %decision.quote_id,
                    error = %conversion,
                    path = %html_path.display(),
                    "PDF conversion failed, keeping the HTML report"
                );
                Ok(html_path)
            }
        }
    }
}

#[async_trait]
impl ReportRenderer for QuoteReportRenderer {
    async fn render(&self, decision: &UnderwritingDecision) -> Result<PathBuf, ApplicationError> {
        self.write_report(decision).await.map_err(ApplicationError::from)
    }
}

async fn convert_html_to_pdf(
    wkhtmltopdf: &Path,
    html_path: &Path,
    pdf_path: &Path,
) -> Result<(), ReportError> {
    let output = Command::new(wkhtmltopdf)
        .args(["--page-size", "Letter", "--encoding", "utf-8", "--quiet"])
        .args(["--margin-top", "18mm", "--margin-bottom", "18mm"])
        .args(["--margin-left", "18mm", "--margin-right", "18mm"])
        .arg("--enable-local-file-access")
        .arg(html_path)
        .arg(pdf_path)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|error| ReportError::io("could not run wkhtmltopdf", error))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        error!(event_name = "report.pdf.failed", stderr = %stderr, "wkhtmltopdf failed");
        return Err(ReportError::Conversion(stderr.trim().to_string()));
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct ReportView<'a> {
    quote_id: String,
    generated_on: String,
    business: &'a BusinessProfile,
    business_type: String,
    premium: Decimal,
    risk_profile: String,
    risk_color: &'static str,
    risk_score: f64,
    risk_factors: &'a [String],
    recommendations: &'a [String],
    steps: Vec<RatingStep>,
    formula: String,
    claims: Vec<ClaimRow>,
    conditions: &'a [String],
    notes: Option<&'a str>,
    explanation: &'a str,
}

#[derive(Debug, Serialize)]
struct ClaimRow {
    date: String,
    kind: String,
    amount: Decimal,
}

impl<'a> ReportView<'a> {
    fn from_decision(decision: &'a UnderwritingDecision) -> Self {
        let profile = &decision.profile;
        let risk = &decision.risk;
        Self {
            quote_id: decision.quote_id.to_string(),
            generated_on: decision.created_at.format("%B %d, %Y").to_string(),
            business: profile,
            business_type: title_case(&profile.business_type),
            premium: decision.premium,
            risk_profile: title_case(risk.risk_profile.as_str()),
            risk_color: risk_color(risk.risk_profile),
            risk_score: risk.risk_score,
            risk_factors: &risk.risk_factors,
            recommendations: &risk.recommendations,
            steps: decision.rating.steps(profile),
            formula: decision.rating.formula(),
            claims: profile
                .claims
                .iter()
                .map(|claim| ClaimRow {
                    date: claim.date.format("%Y-%m-%d").to_string(),
                    kind: title_case(claim.claim_type.as_str()),
                    amount: claim.amount,
                })
                .collect(),
            conditions: &decision.conditions,
            notes: profile.notes.as_deref(),
            explanation: &decision.explanation,
        }
    }
}

fn risk_color(profile: RiskProfile) -> &'static str {
    match profile {
        RiskProfile::High => "#dc2626",
        RiskProfile::Medium => "#ea580c",
        RiskProfile::Low => "#16a34a",
    }
}
