use std::path::{Path, PathBuf};

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

#[derive(Clone)]
pub struct HealthState {
    documents_dir: PathBuf,
    reports_dir: PathBuf,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub documents: HealthCheck,
    pub reports: HealthCheck,
    pub checked_at: String,
}

pub fn router(documents_dir: PathBuf, reports_dir: PathBuf) -> Router {
    Router::new()
        .route("/health", get(health))
        .with_state(HealthState { documents_dir, reports_dir })
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let documents = documents_check(&state.documents_dir).await;
    let reports = reports_check(&state.reports_dir).await;
    let ready = documents.status == "ready" && reports.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "autouw-server runtime initialized".to_string(),
        },
        documents,
        reports,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn documents_check(dir: &Path) -> HealthCheck {
    match tokio::fs::metadata(dir).await {
        Ok(metadata) if metadata.is_dir() => HealthCheck {
            status: "ready",
            detail: format!("document store at {}", dir.display()),
        },
        Ok(_) => HealthCheck {
            status: "degraded",
            detail: format!("{} is not a directory", dir.display()),
        },
        Err(error) => HealthCheck {
            status: "degraded",
            detail: format!("document store unavailable at {}: {error}", dir.display()),
        },
    }
}

/// The reports directory is created on the first report, so a missing one is
/// still ready.
async fn reports_check(dir: &Path) -> HealthCheck {
    match tokio::fs::metadata(dir).await {
        Ok(metadata) if metadata.is_dir() => {
            HealthCheck { status: "ready", detail: format!("reports at {}", dir.display()) }
        }
        Ok(_) => HealthCheck {
            status: "degraded",
            detail: format!("{} is not a directory", dir.display()),
        },
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => HealthCheck {
            status: "ready",
            detail: format!("{} will be created on first report", dir.display()),
        },
        Err(error) => HealthCheck {
            status: "degraded",
            detail: format!("reports unavailable at {}: {error}", dir.display()),
        },
    }
}
