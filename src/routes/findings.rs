//! Finding routes.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use crate::errors::{ApiResponse, AppError};
use crate::models::finding::{Finding, FindingSummary};
use crate::models::pagination::{PagedResult, Pagination};
use crate::services::finding::{self as finding_service, FindingFilters};
use crate::AppState;

/// GET /api/v1/findings — list findings filtered by family, system, severity, status.
pub async fn list(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
    Query(filters): Query<FindingFilters>,
) -> Result<Json<ApiResponse<PagedResult<FindingSummary>>>, AppError> {
    let result = finding_service::list(&state.db, &filters, &pagination).await?;
    Ok(ApiResponse::success(result))
}

/// GET /api/v1/findings/:id — full stored finding.
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Finding>>, AppError> {
    let finding = finding_service::get_by_id(&state.db, id).await?;
    Ok(ApiResponse::success(finding))
}
