//! Stored finding queries: paginated listing and aggregation input.

use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::compliance::ComplianceScope;
use crate::models::finding::{AggregationRow, Finding, FindingSummary, ResolvedFinding, StatusClass};
use crate::models::pagination::{PagedResult, Pagination};

/// Filters for the finding list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FindingFilters {
    /// Control family code, e.g. `AC`.
    pub family: Option<String>,
    /// System name.
    pub system: Option<String>,
    /// Severity as written in the checklist, case-insensitive.
    pub severity: Option<String>,
    /// Status in any spelling (`Not_Reviewed`, `not_reviewed`, ...).
    pub status: Option<String>,
    pub stig_name: Option<String>,
}

/// WHERE clause over `findings f JOIN systems s` and the values it binds, in order.
fn build_conditions(filters: &FindingFilters) -> (String, Vec<String>) {
    let mut conditions: Vec<String> = Vec::new();
    let mut binds: Vec<String> = Vec::new();

    if let Some(family) = &filters.family {
        binds.push(family.trim().to_string());
        conditions.push(format!("${} = ANY(f.families)", binds.len()));
    }
    if let Some(system) = &filters.system {
        binds.push(system.trim().to_string());
        conditions.push(format!("s.name = ${}", binds.len()));
    }
    if let Some(severity) = &filters.severity {
        binds.push(severity.trim().to_ascii_lowercase());
        conditions.push(format!("LOWER(TRIM(f.severity)) = ${}", binds.len()));
    }
    if let Some(status) = &filters.status {
        binds.push(StatusClass::key(status));
        conditions.push(format!(
            "LOWER(TRANSLATE(TRIM(f.status), '_ -', '')) = ${}",
            binds.len()
        ));
    }
    if let Some(stig_name) = &filters.stig_name {
        binds.push(stig_name.trim().to_string());
        conditions.push(format!("f.stig_name = ${}", binds.len()));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };
    (where_clause, binds)
}

/// List findings with filters and pagination.
pub async fn list(
    pool: &PgPool,
    filters: &FindingFilters,
    pagination: &Pagination,
) -> Result<PagedResult<FindingSummary>, AppError> {
    let (where_clause, binds) = build_conditions(filters);

    let count_sql = format!(
        "SELECT COUNT(*) FROM findings f JOIN systems s ON s.id = f.system_id {where_clause}"
    );
    let data_sql = format!(
        "SELECT f.id, s.name AS system_name, f.group_id, f.rule_id, f.title, f.severity, \
         f.status, f.nist_controls, f.families, f.source_file, f.stig_name \
         FROM findings f JOIN systems s ON s.id = f.system_id {where_clause} \
         ORDER BY s.name, f.source_file, f.group_id \
         LIMIT {} OFFSET {}",
        pagination.limit(),
        pagination.offset()
    );

    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    let mut data_query = sqlx::query_as::<_, FindingSummary>(&data_sql);

    macro_rules! bind_both {
        ($val:expr) => {
            count_query = count_query.bind($val);
            data_query = data_query.bind($val);
        };
    }

    for value in &binds {
        bind_both!(value);
    }

    let total = count_query.fetch_one(pool).await?;
    let items = data_query.fetch_all(pool).await?;

    Ok(PagedResult::new(items, total, pagination))
}

/// Get a single finding by ID.
pub async fn get_by_id(pool: &PgPool, id: Uuid) -> Result<Finding, AppError> {
    sqlx::query_as::<_, Finding>("SELECT * FROM findings WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Finding not found".to_string()))
}

/// Load the stored findings inside `scope` as aggregation input.
pub async fn fetch_for_aggregation(
    pool: &PgPool,
    scope: &ComplianceScope,
) -> Result<Vec<ResolvedFinding>, AppError> {
    let mut conditions: Vec<String> = Vec::new();
    let mut param_index = 0u32;

    if scope.family.is_some() {
        param_index += 1;
        conditions.push(format!("${param_index} = ANY(f.families)"));
    }
    if scope.system.is_some() {
        param_index += 1;
        conditions.push(format!("s.name = ${param_index}"));
    }
    if scope.source_file.is_some() {
        param_index += 1;
        conditions.push(format!("f.source_file = ${param_index}"));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    let sql = format!(
        "SELECT s.name AS system_name, f.group_id, f.rule_id, f.rule_version, f.title, \
         f.severity, f.status, f.cci_references, f.nist_controls, f.families, \
         f.source_file, f.stig_name \
         FROM findings f JOIN systems s ON s.id = f.system_id {where_clause} \
         ORDER BY s.name, f.source_file, f.group_id"
    );

    let mut query = sqlx::query_as::<_, AggregationRow>(&sql);
    if let Some(ref family) = scope.family {
        query = query.bind(family);
    }
    if let Some(ref system) = scope.system {
        query = query.bind(system);
    }
    if let Some(ref source_file) = scope.source_file {
        query = query.bind(source_file);
    }

    let rows = query.fetch_all(pool).await?;
    Ok(rows.into_iter().map(ResolvedFinding::from).collect())
}
