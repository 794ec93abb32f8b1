//! System routes.

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::errors::{ApiResponse, AppError};
use crate::models::system::SystemSummary;
use crate::services::system;
use crate::AppState;

/// GET /api/v1/systems — systems with checklist and finding counts.
pub async fn list(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<SystemSummary>>>, AppError> {
    let systems = system::list(&state.db).await?;
    Ok(ApiResponse::success(systems))
}

/// DELETE /api/v1/systems/:id — remove a system and everything imported under it.
pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    system::delete(&state.db, id).await?;
    Ok(ApiResponse::success(()))
}
