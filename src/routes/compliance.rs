//! Compliance routes: statistics, recommendations, CSV export, and snapshots.

use axum::{
    extract::{Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use crate::errors::{ApiResponse, AppError};
use crate::models::compliance::{
    ComplianceScope, ComplianceSnapshot, ComplianceStat, FamilyComplianceStat, Recommendation,
    SystemComplianceStat,
};
use crate::services::compliance::{self, ComplianceOverview};
use crate::services::report;
use crate::AppState;

/// Query parameters for the CSV export.
#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    pub system: Option<String>,
    /// `family` (default) or `system`.
    pub group_by: Option<String>,
}

/// Query parameters for listing snapshots.
#[derive(Debug, Deserialize)]
pub struct SnapshotQuery {
    pub system: Option<String>,
}

/// GET /api/v1/compliance/overview — overall, per-family, per-system stats and advice.
pub async fn overview(
    State(state): State<AppState>,
    Query(scope): Query<ComplianceScope>,
) -> Result<Json<ApiResponse<ComplianceOverview>>, AppError> {
    let scope = scope.normalized();
    let result =
        compliance::overview(&state.db, &scope, &state.config.aggregation_options()).await?;
    Ok(ApiResponse::success(result))
}

/// GET /api/v1/compliance/stats — one statistic for `family`/`system`/`source_file`.
pub async fn stats(
    State(state): State<AppState>,
    Query(scope): Query<ComplianceScope>,
) -> Result<Json<ApiResponse<ComplianceStat>>, AppError> {
    let scope = scope.normalized();
    let stat = compliance::stats(&state.db, &scope, &state.config.aggregation_options()).await?;
    Ok(ApiResponse::success(stat))
}

/// GET /api/v1/compliance/families — per-family statistics.
pub async fn families(
    State(state): State<AppState>,
    Query(scope): Query<ComplianceScope>,
) -> Result<Json<ApiResponse<Vec<FamilyComplianceStat>>>, AppError> {
    let scope = scope.normalized();
    let stats =
        compliance::family_stats(&state.db, &scope, &state.config.aggregation_options()).await?;
    Ok(ApiResponse::success(stats))
}

/// GET /api/v1/compliance/systems — per-system statistics.
pub async fn systems(
    State(state): State<AppState>,
    Query(scope): Query<ComplianceScope>,
) -> Result<Json<ApiResponse<Vec<SystemComplianceStat>>>, AppError> {
    let scope = scope.normalized();
    let stats =
        compliance::system_stats(&state.db, &scope, &state.config.aggregation_options()).await?;
    Ok(ApiResponse::success(stats))
}

/// GET /api/v1/compliance/recommendations — prioritised remediation advice.
pub async fn recommendations(
    State(state): State<AppState>,
    Query(scope): Query<ComplianceScope>,
) -> Result<Json<ApiResponse<Vec<Recommendation>>>, AppError> {
    let scope = scope.normalized();
    let recs =
        compliance::recommendations(&state.db, &scope, &state.config.aggregation_options())
            .await?;
    Ok(ApiResponse::success(recs))
}

/// GET /api/v1/compliance/export.csv — compliance table as CSV.
pub async fn export_csv(
    State(state): State<AppState>,
    Query(query): Query<ExportQuery>,
) -> Result<impl IntoResponse, AppError> {
    let scope = ComplianceScope {
        system: query.system,
        ..ComplianceScope::default()
    }
    .normalized();
    let options = state.config.aggregation_options();

    let (body, file_name) = match query.group_by.as_deref().map(str::trim) {
        None | Some("") | Some("family") => {
            let stats = compliance::family_stats(&state.db, &scope, &options).await?;
            (report::family_csv(&stats)?, "compliance-families.csv")
        }
        Some("system") => {
            let stats = compliance::system_stats(&state.db, &scope, &options).await?;
            (report::system_csv(&stats)?, "compliance-systems.csv")
        }
        Some(other) => {
            return Err(AppError::Validation(format!(
                "Invalid group_by '{other}'. Supported: family, system"
            )))
        }
    };

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        body,
    ))
}

/// POST /api/v1/compliance/snapshots/refresh — recompute cached rows for `family`/`system`.
pub async fn refresh_snapshots(
    State(state): State<AppState>,
    Query(scope): Query<ComplianceScope>,
) -> Result<Json<ApiResponse<Vec<ComplianceSnapshot>>>, AppError> {
    let scope = scope.normalized();
    let rows =
        compliance::refresh_snapshot(&state.db, &scope, &state.config.aggregation_options())
            .await?;
    Ok(ApiResponse::success(rows))
}

/// GET /api/v1/compliance/snapshots — cached snapshot rows.
pub async fn list_snapshots(
    State(state): State<AppState>,
    Query(query): Query<SnapshotQuery>,
) -> Result<Json<ApiResponse<Vec<ComplianceSnapshot>>>, AppError> {
    let system = query
        .system
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let rows = compliance::list_snapshots(&state.db, system).await?;
    Ok(ApiResponse::success(rows))
}
