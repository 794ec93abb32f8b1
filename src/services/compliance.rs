//! Compliance statistics over stored findings and the cached snapshot table.

use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::compliance::{
    AggregationOptions, ComplianceScope, ComplianceSnapshot, ComplianceStat,
    FamilyComplianceStat, Recommendation, SystemComplianceStat,
};
use crate::models::finding::ResolvedFinding;
use crate::services::ingestion::{self, IngestionLogSummary};
use crate::services::{aggregator, finding, recommendation, system};

/// Everything the compliance dashboard shows for one scope.
#[derive(Debug, Serialize)]
pub struct ComplianceOverview {
    pub overall: ComplianceStat,
    pub families: Vec<FamilyComplianceStat>,
    pub systems: Vec<SystemComplianceStat>,
    pub recommendations: Vec<Recommendation>,
    pub system_count: i64,
    pub recent_imports: Vec<IngestionLogSummary>,
}

/// Build the dashboard overview for a scope.
pub async fn overview(
    pool: &PgPool,
    scope: &ComplianceScope,
    options: &AggregationOptions,
) -> Result<ComplianceOverview, AppError> {
    let (findings, system_count, recent_imports) = tokio::try_join!(
        finding::fetch_for_aggregation(pool, scope),
        system::count(pool),
        ingestion::list_history(pool, 5, 0),
    )?;

    let families = aggregator::aggregate_by_family(&findings, scope, options);
    let recommendations = recommendation::recommend(&families, &findings);

    Ok(ComplianceOverview {
        overall: aggregator::aggregate(&findings, scope, options),
        systems: aggregator::aggregate_by_system(&findings, scope, options),
        families,
        recommendations,
        system_count,
        recent_imports,
    })
}

/// Single statistic over the findings in scope.
pub async fn stats(
    pool: &PgPool,
    scope: &ComplianceScope,
    options: &AggregationOptions,
) -> Result<ComplianceStat, AppError> {
    let findings = finding::fetch_for_aggregation(pool, scope).await?;
    Ok(aggregator::aggregate(&findings, scope, options))
}

/// Per-family statistics, sorted by family code.
pub async fn family_stats(
    pool: &PgPool,
    scope: &ComplianceScope,
    options: &AggregationOptions,
) -> Result<Vec<FamilyComplianceStat>, AppError> {
    let findings = finding::fetch_for_aggregation(pool, scope).await?;
    Ok(aggregator::aggregate_by_family(&findings, scope, options))
}

/// Per-system statistics, sorted by system name.
pub async fn system_stats(
    pool: &PgPool,
    scope: &ComplianceScope,
    options: &AggregationOptions,
) -> Result<Vec<SystemComplianceStat>, AppError> {
    let findings = finding::fetch_for_aggregation(pool, scope).await?;
    Ok(aggregator::aggregate_by_system(&findings, scope, options))
}

/// Remediation recommendations for the findings in scope.
pub async fn recommendations(
    pool: &PgPool,
    scope: &ComplianceScope,
    options: &AggregationOptions,
) -> Result<Vec<Recommendation>, AppError> {
    let findings = finding::fetch_for_aggregation(pool, scope).await?;
    let families = aggregator::aggregate_by_family(&findings, scope, options);
    Ok(recommendation::recommend(&families, &findings))
}

/// One row to be written to `compliance_snapshots`.
#[derive(Debug, Clone, PartialEq)]
struct SnapshotRow {
    family: Option<String>,
    stat: ComplianceStat,
}

/// Rows cached for a scope: a family-scoped refresh stores that family only,
/// otherwise an overall row (no family) followed by one row per family.
fn snapshot_rows(
    findings: &[ResolvedFinding],
    scope: &ComplianceScope,
    options: &AggregationOptions,
) -> Vec<SnapshotRow> {
    if let Some(family) = &scope.family {
        return vec![SnapshotRow {
            family: Some(family.clone()),
            stat: aggregator::aggregate(findings, scope, options),
        }];
    }

    let mut rows = vec![SnapshotRow {
        family: None,
        stat: aggregator::aggregate(findings, scope, options),
    }];
    rows.extend(
        aggregator::aggregate_by_family(findings, scope, options)
            .into_iter()
            .map(|f| SnapshotRow {
                family: Some(f.family),
                stat: f.stat,
            }),
    );
    rows
}

/// Recompute and replace the cached snapshot rows for a scope.
///
/// Snapshots are keyed by system and family only; a `source_file` scope is
/// rejected.
pub async fn refresh_snapshot(
    pool: &PgPool,
    scope: &ComplianceScope,
    options: &AggregationOptions,
) -> Result<Vec<ComplianceSnapshot>, AppError> {
    if scope.source_file.is_some() {
        return Err(AppError::Validation(
            "Snapshots cannot be scoped to a single source file".to_string(),
        ));
    }

    let system_id: Option<Uuid> = match &scope.system {
        Some(name) => Some(system::find_by_name(pool, name).await?.id),
        None => None,
    };

    let findings = finding::fetch_for_aggregation(pool, scope).await?;
    let rows = snapshot_rows(&findings, scope, options);

    let mut tx = pool.begin().await?;

    match &scope.family {
        Some(family) => {
            sqlx::query(
                "DELETE FROM compliance_snapshots \
                 WHERE system_id IS NOT DISTINCT FROM $1 AND family = $2",
            )
            .bind(system_id)
            .bind(family)
            .execute(&mut *tx)
            .await?;
        }
        None => {
            sqlx::query("DELETE FROM compliance_snapshots WHERE system_id IS NOT DISTINCT FROM $1")
                .bind(system_id)
                .execute(&mut *tx)
                .await?;
        }
    }

    let mut stored = Vec::with_capacity(rows.len());
    for row in &rows {
        let snapshot = sqlx::query_as::<_, ComplianceSnapshot>(
            r#"
            INSERT INTO compliance_snapshots (
                system_id, family, total, open, compliant, not_reviewed,
                high, medium, low, compliance_percentage
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id, system_id, family, total, open, compliant, not_reviewed,
                      high, medium, low, compliance_percentage, computed_at
            "#,
        )
        .bind(system_id)
        .bind(&row.family)
        .bind(to_i64(row.stat.total))
        .bind(to_i64(row.stat.open))
        .bind(to_i64(row.stat.compliant))
        .bind(to_i64(row.stat.not_reviewed))
        .bind(to_i64(row.stat.high))
        .bind(to_i64(row.stat.medium))
        .bind(to_i64(row.stat.low))
        .bind(row.stat.compliance_percentage)
        .fetch_one(&mut *tx)
        .await?;
        stored.push(snapshot);
    }

    tx.commit().await?;

    tracing::info!(
        system = ?scope.system,
        family = ?scope.family,
        rows = stored.len(),
        "Compliance snapshot refreshed"
    );
    Ok(stored)
}

/// Cached snapshots, optionally for one system; the global scope sorts first.
pub async fn list_snapshots(
    pool: &PgPool,
    system_name: Option<&str>,
) -> Result<Vec<ComplianceSnapshot>, AppError> {
    let snapshots = sqlx::query_as::<_, ComplianceSnapshot>(
        r#"
        SELECT cs.id, cs.system_id, cs.family, cs.total, cs.open, cs.compliant,
               cs.not_reviewed, cs.high, cs.medium, cs.low,
               cs.compliance_percentage, cs.computed_at
        FROM compliance_snapshots cs
        LEFT JOIN systems s ON s.id = cs.system_id
        WHERE $1::TEXT IS NULL OR s.name = $1
        ORDER BY s.name NULLS FIRST, cs.family NULLS FIRST
        "#,
    )
    .bind(system_name)
    .fetch_all(pool)
    .await?;
    Ok(snapshots)
}

fn to_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}
