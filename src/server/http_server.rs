//! HTTP boundary - `POST /evaluate`
//!
//! - `POST /evaluate`: evaluate one operation against its context
//! - `GET /health`: liveness probe
//!
//! Remote-backend failures never reach the caller: the decision service
//! substitutes the local policy and the response still reports success.

use crate::models::config::ServerConfig;
use crate::models::{Evaluation, OperationContext, OperationRisk, OperationType};
use crate::policy::{render_prompt, DecisionService};
use crate::Result;
use anyhow::Context;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

// =============================================================================
// Wire types
// =============================================================================

/// Both fields are optional at the type level so a missing one is reported as
/// a client error instead of an extractor rejection
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateRequest {
    pub operation_type: Option<String>,
    pub context: Option<OperationContext>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateResponse {
    pub success: bool,
    pub prompt: String,
    pub response: String,
    pub operation_risk: OperationRisk,
    #[serde(flatten)]
    pub evaluation: Evaluation,
}

impl EvaluateResponse {
    pub fn new(op: &OperationType, ctx: &OperationContext, evaluation: Evaluation) -> Self {
        Self {
            success: true,
            prompt: render_prompt(op, ctx),
            response: evaluation.summary(),
            operation_risk: evaluation.operation_risk(),
            evaluation,
        }
    }
}

// =============================================================================
// Application State
// =============================================================================

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<dyn DecisionService>,
}

impl AppState {
    pub fn new(service: Arc<dyn DecisionService>) -> Self {
        Self { service }
    }
}

// =============================================================================
// Server Startup
// =============================================================================

/// Router with every route and layer, ready to serve or drive in tests
pub fn router(service: Arc<dyn DecisionService>) -> Router {
    Router::new()
        .route("/evaluate", post(handle_evaluate))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(AppState::new(service))
}

pub async fn start_server(config: &ServerConfig, service: Arc<dyn DecisionService>) -> Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let backend = service.name();
    let app = router(service);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(address = %addr, backend, "Evaluation server listening");
    println!("✓ Server listening on http://{}", addr);
    println!("  Evaluate: POST http://{}/evaluate", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

// =============================================================================
// Handlers
// =============================================================================

async fn health_check() -> &'static str {
    "OK"
}

fn client_error(message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "success": false, "error": message.into() })),
    )
        .into_response()
}

async fn handle_evaluate(
    State(state): State<AppState>,
    payload: std::result::Result<Json<EvaluateRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(p) => p,
        Err(rejection) => return client_error(rejection.body_text()),
    };

    let Some(raw_op) = request.operation_type.filter(|s| !s.trim().is_empty()) else {
        return client_error("Missing required field: operationType");
    };
    let Some(ctx) = request.context else {
        return client_error("Missing required field: context");
    };

    let op = OperationType::parse(&raw_op);
    match state.service.evaluate(&op, &ctx).await {
        Ok(evaluation) => {
            info!(
                operation = %op,
                verdict = %evaluation.verdict,
                source = ?evaluation.source,
                "Evaluated"
            );
            Json(EvaluateResponse::new(&op, &ctx, evaluation)).into_response()
        }
        Err(e) => {
            error!(operation = %op, error = %e, "Evaluation failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "success": false, "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Confidence, Verdict};

    #[test]
    fn test_response_flattens_evaluation() {
        let ctx = OperationContext {
            current_name: Some("Miscellaneous".to_string()),
            ..Default::default()
        };
        let evaluation = Evaluation::new(Verdict::Reject, Confidence::High).risk("Catch-all");
        let response = EvaluateResponse::new(&OperationType::DeleteSubTheme, &ctx, evaluation);

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["operationRisk"], "High");
        assert_eq!(json["verdict"], "REJECT");
        assert_eq!(json["confidence"], "High");
        assert_eq!(json["risks"][0], "Catch-all");
        assert!(json["response"].as_str().unwrap().contains("REJECT"));
        assert!(json["prompt"]
            .as_str()
            .unwrap()
            .contains("Delete sub-theme \"Miscellaneous\""));
    }
}
