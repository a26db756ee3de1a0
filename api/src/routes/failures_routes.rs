//! Read API over failure logs, plus the operator path that flags one as
//! resolved.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection, rejection::QueryRejection},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};

use crate::core::app_state::AppState;
use crate::error_handler::{AppError, AppResult};
use crate::routes::reviews_routes::{PageParams, validate_paging};

#[instrument(name = "list_failures", skip_all)]
pub async fn list(
    State(state): State<Arc<AppState>>,
    params: Result<Query<PageParams>, QueryRejection>,
) -> AppResult<Response> {
    let Query(params) = params?;
    let (offset, limit) = validate_paging(params.offset, params.limit)?;
    let page = state.store.list_failures(offset, limit)?;
    Ok(Json(page).into_response())
}

#[instrument(name = "get_failure", skip_all, fields(id))]
pub async fn get_one(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> AppResult<Response> {
    match state.store.get_failure(id)? {
        Some(log) => Ok(Json(log).into_response()),
        None => Err(AppError::NotFound),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ResolveRequest {
    #[serde(default)]
    pub notes: Option<String>,
}

#[instrument(name = "resolve_failure", skip_all, fields(id))]
pub async fn resolve(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    body: Result<Json<ResolveRequest>, JsonRejection>,
) -> AppResult<Response> {
    let Json(req) = body?;
    state.store.mark_failure_resolved(id, req.notes.as_deref())?;
    info!(id, "failure marked resolved");
    Ok(Json(json!({"status": "resolved", "id": id})).into_response())
}
