//! Read API over review records. Thin handlers: validate and clamp the
//! paging inputs, then surface the store operations one-to-one.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State, rejection::QueryRejection},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::instrument;

use crate::core::app_state::AppState;
use crate::error_handler::{AppError, AppResult};

const DEFAULT_PAGE_LIMIT: i64 = 20;
const DEFAULT_LATEST_LIMIT: i64 = 10;

#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    #[serde(default)]
    pub offset: Option<i64>,
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FilterParams {
    #[serde(default)]
    pub repo_slug: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
}

/// Rejects negative paging values with 400; clamping to the [1,100] window
/// happens in the store.
pub(crate) fn validate_paging(offset: Option<i64>, limit: Option<i64>) -> AppResult<(i64, i64)> {
    let offset = offset.unwrap_or(0);
    let limit = limit.unwrap_or(DEFAULT_PAGE_LIMIT);
    if offset < 0 || limit < 0 {
        return Err(AppError::BadRequest {
            kind: "malformed",
            message: "offset and limit must be non-negative".into(),
        });
    }
    Ok((offset, limit))
}

#[instrument(name = "list_reviews", skip_all)]
pub async fn list(
    State(state): State<Arc<AppState>>,
    params: Result<Query<PageParams>, QueryRejection>,
) -> AppResult<Response> {
    let Query(params) = params?;
    let (offset, limit) = validate_paging(params.offset, params.limit)?;
    let page = state.store.list_reviews(offset, limit)?;
    Ok(Json(page).into_response())
}

#[instrument(name = "latest_reviews", skip_all)]
pub async fn latest(
    State(state): State<Arc<AppState>>,
    params: Result<Query<PageParams>, QueryRejection>,
) -> AppResult<Response> {
    let Query(params) = params?;
    let (_, limit) = validate_paging(None, params.limit.or(Some(DEFAULT_LATEST_LIMIT)))?;
    let rows = state.store.latest_reviews(limit)?;
    Ok(Json(rows).into_response())
}

#[instrument(name = "get_review", skip_all, fields(id))]
pub async fn get_one(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> AppResult<Response> {
    match state.store.get_review(id)? {
        Some(record) => Ok(Json(record).into_response()),
        None => Err(AppError::NotFound),
    }
}

#[instrument(name = "reviews_by_project", skip_all, fields(project = %project_key))]
pub async fn by_project(
    State(state): State<Arc<AppState>>,
    Path(project_key): Path<String>,
    params: Result<Query<FilterParams>, QueryRejection>,
) -> AppResult<Response> {
    let Query(params) = params?;
    let (_, limit) = validate_paging(None, params.limit)?;
    let rows = state
        .store
        .reviews_by_project(&project_key, params.repo_slug.as_deref(), limit)?;
    Ok(Json(rows).into_response())
}

#[instrument(name = "reviews_by_author", skip_all)]
pub async fn by_author(
    State(state): State<Arc<AppState>>,
    Path(email): Path<String>,
    params: Result<Query<PageParams>, QueryRejection>,
) -> AppResult<Response> {
    let Query(params) = params?;
    let (_, limit) = validate_paging(None, params.limit)?;
    let rows = state.store.reviews_by_author(&email, limit)?;
    Ok(Json(rows).into_response())
}

#[instrument(name = "reviews_by_commit", skip_all)]
pub async fn by_commit(
    State(state): State<Arc<AppState>>,
    Path(commit_id): Path<String>,
) -> AppResult<Response> {
    let rows = state.store.reviews_by_commit(&commit_id)?;
    Ok(Json(rows).into_response())
}

#[instrument(name = "reviews_by_mr", skip_all, fields(mr_id))]
pub async fn by_mr(
    State(state): State<Arc<AppState>>,
    Path(mr_id): Path<i64>,
) -> AppResult<Response> {
    let rows = state.store.reviews_by_mr(mr_id)?;
    Ok(Json(rows).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_paging_is_rejected() {
        assert!(validate_paging(Some(-1), Some(10)).is_err());
        assert!(validate_paging(Some(0), Some(-5)).is_err());
    }

    #[test]
    fn defaults_apply_when_unset() {
        assert_eq!(validate_paging(None, None).unwrap(), (0, DEFAULT_PAGE_LIMIT));
        assert_eq!(validate_paging(Some(30), Some(5)).unwrap(), (30, 5));
    }

    #[test]
    fn zero_and_oversized_limits_pass_through_for_store_clamping() {
        // The store owns the [1,100] window; 0 and 1000 are legal inputs here.
        assert_eq!(validate_paging(None, Some(0)).unwrap().1, 0);
        assert_eq!(validate_paging(None, Some(1000)).unwrap().1, 1000);
    }
}
