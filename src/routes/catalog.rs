//! CCI catalog routes: import and lookup.

use axum::{
    extract::{Multipart, Path, State},
    Json,
};

use crate::errors::{ApiResponse, AppError};
use crate::routes::read_upload;
use crate::services::catalog::{self, CatalogEntryDetail, CatalogImportResult, CatalogSummary};
use crate::AppState;

/// POST /api/v1/catalog/import — replace the catalog from a CCI list XML (multipart `file`).
pub async fn import(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ApiResponse<CatalogImportResult>>, AppError> {
    let upload = read_upload(multipart).await?;
    let result = catalog::import_catalog(
        &state.db,
        &state.catalog,
        &upload.data,
        &upload.file_name,
        &state.config.catalog_options(),
    )
    .await?;
    Ok(ApiResponse::success(result))
}

/// GET /api/v1/catalog — size of the active catalog.
pub async fn summary(State(state): State<AppState>) -> Json<ApiResponse<CatalogSummary>> {
    ApiResponse::success(catalog::summary(&state.catalog))
}

/// GET /api/v1/catalog/:cci_id — controls and families for one CCI.
pub async fn get_entry(
    State(state): State<AppState>,
    Path(cci_id): Path<String>,
) -> Result<Json<ApiResponse<CatalogEntryDetail>>, AppError> {
    let entry = catalog::get_entry(&state.catalog, &cci_id)?;
    Ok(ApiResponse::success(entry))
}
