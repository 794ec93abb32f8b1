//! Ingestion history routes.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use crate::errors::{ApiResponse, AppError};
use crate::models::pagination::{PagedResult, Pagination};
use crate::services::ingestion::{self, IngestionLog, IngestionLogSummary};
use crate::AppState;

/// GET /api/v1/ingestion/history — list past imports, newest first.
pub async fn history(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<ApiResponse<PagedResult<IngestionLogSummary>>>, AppError> {
    let total = ingestion::count_history(&state.db).await?;
    let logs = ingestion::list_history(&state.db, pagination.limit(), pagination.offset()).await?;
    let paged = PagedResult::new(logs, total, &pagination);
    Ok(ApiResponse::success(paged))
}

/// GET /api/v1/ingestion/:id — full log entry including warnings.
pub async fn get_log(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<IngestionLog>>, AppError> {
    let log = ingestion::get_log(&state.db, id).await?;
    Ok(ApiResponse::success(log))
}
