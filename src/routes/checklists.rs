//! Checklist upload route.

use axum::{
    extract::{Multipart, State},
    Json,
};

use crate::errors::{ApiResponse, AppError};
use crate::parsers::ChecklistFormat;
use crate::routes::read_upload;
use crate::services::ingestion::{self, IngestionResult};
use crate::AppState;

/// POST /api/v1/checklists/upload — import a CKL/CKLB file (multipart `file`, `system`, optional `format`).
pub async fn upload(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ApiResponse<IngestionResult>>, AppError> {
    let upload = read_upload(multipart).await?;

    let system = upload
        .fields
        .get("system")
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::Validation("Missing 'system' field".to_string()))?;

    let format = match upload.fields.get("format").map(|f| f.trim()) {
        None | Some("") => None,
        Some(text) => Some(
            serde_json::from_value::<ChecklistFormat>(serde_json::Value::String(
                text.to_ascii_lowercase(),
            ))
            .map_err(|_| {
                AppError::Validation(format!("Invalid format '{text}'. Supported: ckl, cklb"))
            })?,
        ),
    };

    let result = ingestion::ingest_checklist(
        &state.db,
        &state.catalog,
        &upload.data,
        &upload.file_name,
        system,
        format,
    )
    .await?;

    Ok(ApiResponse::success(result))
}
