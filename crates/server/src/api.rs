//! JSON surface over the underwriting agent and the guideline store.

use std::sync::Arc;

use autouw_agent::UnderwritingAgent;
use autouw_core::domain::document::Document;
use autouw_core::domain::profile::{normalize_state, PolicyRequest};
use autouw_core::domain::quote::Quote;
use autouw_core::errors::{ApplicationError, ValidationError};
use autouw_db::DocumentStore;
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct ApiState {
    agent: Arc<UnderwritingAgent>,
    store: Arc<DocumentStore>,
}

#[derive(Debug, Deserialize, Default)]
pub struct GuidelinesQuery {
    pub state: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub error_class: String,
    pub correlation_id: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    fn from_application(error: ApplicationError, correlation_id: &str) -> Self {
        let error_class = error.error_class().to_string();
        let interface = error.into_interface(correlation_id);
        let status = StatusCode::from_u16(interface.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let error = if status.is_server_error() {
            interface.user_message().to_string()
        } else {
            interface.message().to_string()
        };

        Self {
            status,
            body: ErrorBody {
                error,
                error_class,
                correlation_id: interface.correlation_id().to_string(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

pub fn router(agent: Arc<UnderwritingAgent>, store: Arc<DocumentStore>) -> Router {
    Router::new()
        .route("/quote", post(create_quote))
        .route("/guidelines/{business_type}", get(list_guidelines))
        .with_state(ApiState { agent, store })
}

async fn create_quote(
    State(state): State<ApiState>,
    body: Result<Json<PolicyRequest>, JsonRejection>,
) -> Result<Json<Quote>, ApiError> {
    let correlation_id = Uuid::new_v4().to_string();
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            let error = ValidationError::new("body", rejection.body_text());
            return Err(reject("quote", error.into(), &correlation_id));
        }
    };

    match state.agent.quote(&request).await {
        Ok(quote) => {
            info!(
                event_name = "server.quote.created",
                correlation_id = %correlation_id,
                quote_id = %quote.id(),
                premium = %quote.premium(),
                "quote created"
            );
            Ok(Json(quote))
        }
        Err(error) => Err(reject("quote", error, &correlation_id)),
    }
}

async fn list_guidelines(
    State(state): State<ApiState>,
    Path(business_type): Path<String>,
    Query(query): Query<GuidelinesQuery>,
) -> Result<Json<Vec<Document>>, ApiError> {
    let correlation_id = Uuid::new_v4().to_string();
    let state_code = match query.state.as_deref().map(normalize_state).transpose() {
        Ok(code) => code,
        Err(error) => return Err(reject("guidelines", error.into(), &correlation_id)),
    };

    let documents = state.store.guidelines_for(&business_type, state_code.as_deref()).await;
    info!(
        event_name = "server.guidelines.listed",
        correlation_id = %correlation_id,
        business_type = %business_type,
        count = documents.len(),
        "guidelines listed"
    );
    Ok(Json(documents))
}

fn reject(operation: &str, error: ApplicationError, correlation_id: &str) -> ApiError {
    warn!(
        event_name = "server.request.failed",
        correlation_id = %correlation_id,
        operation,
        error_class = error.error_class(),
        error = %error,
        "request failed"
    );
    ApiError::from_application(error, correlation_id)
}
