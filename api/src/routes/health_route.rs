//! Liveness plus dependency readiness.
//!
//! The store must answer for the service to count as healthy; the LLM
//! probe is reported but advisory (a provider blip should not flap the
//! orchestrator's liveness checks).

use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::instrument;

use crate::core::app_state::AppState;

#[instrument(name = "health_route", skip_all)]
pub async fn handle(State(state): State<Arc<AppState>>) -> Response {
    let store_ok = state.store.ping().is_ok();
    let llm = state.llm.probe().await;

    let status = if store_ok { "ok" } else { "degraded" };
    let http_status = if store_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let body = json!({
        "status": status,
        "store": store_ok,
        "llm": llm,
        "provider": state.llm.provider_name(),
        "model": state.llm.model(),
    });

    (http_status, Json(body)).into_response()
}
