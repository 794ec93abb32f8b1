//! Checklist ingestion pipeline and the import audit log.
//!
//! A checklist upload is parsed, stamped with its system, resolved against
//! the current catalog snapshot, and written in a single transaction. Every
//! import attempt, catalog or checklist, leaves one `ingestion_logs` row.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgConnection, PgExecutor, PgPool};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::finding::ResolvedFinding;
use crate::parsers::{ChecklistFormat, ParseError, ParseResult, RecordWarning};
use crate::services::catalog::CatalogHandle;
use crate::services::{fingerprint, resolver, system};

pub(crate) const STATUS_COMPLETED: &str = "Completed";
pub(crate) const STATUS_FAILED: &str = "Failed";
pub(crate) const STATUS_DUPLICATE: &str = "Duplicate";

/// Emit a progress event every this many persisted findings.
const PROGRESS_INTERVAL: usize = 10;

/// Kind of import recorded in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    CatalogImport,
    ChecklistImport,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CatalogImport => write!(f, "catalog_import"),
            Self::ChecklistImport => write!(f, "checklist_import"),
        }
    }
}

/// Summary of a checklist import.
#[derive(Debug, Serialize)]
pub struct IngestionResult {
    pub ingestion_log_id: Uuid,
    pub checklist_file_id: Uuid,
    pub system_id: Uuid,
    pub system_name: String,
    pub file_name: String,
    pub format: ChecklistFormat,
    pub stig_name: String,
    pub host_name: Option<String>,
    pub total_findings: usize,
    /// Findings that resolved to at least one NIST control.
    pub mapped_findings: usize,
    /// Findings with no resolvable control.
    pub unmapped_findings: usize,
    /// Distinct CCI ids absent from the catalog.
    pub missing_mappings: Vec<String>,
    pub warnings: Vec<RecordWarning>,
}

/// Ingestion log entry stored in the database.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct IngestionLog {
    pub id: Uuid,
    pub operation: String,
    pub file_name: Option<String>,
    pub system_name: Option<String>,
    pub format: Option<String>,
    pub stig_name: Option<String>,
    pub total_records: i32,
    pub warnings: i32,
    pub missing_mappings: i32,
    pub status: String,
    pub error_details: Option<serde_json::Value>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Ingestion log summary for history listing.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct IngestionLogSummary {
    pub id: Uuid,
    pub operation: String,
    pub file_name: Option<String>,
    pub system_name: Option<String>,
    pub total_records: i32,
    pub warnings: i32,
    pub missing_mappings: i32,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Data needed to insert an ingestion log entry.
#[derive(Debug)]
pub(crate) struct LogEntry<'a> {
    pub operation: Operation,
    pub file_name: &'a str,
    pub system_name: Option<&'a str>,
    pub format: Option<&'a str>,
    pub stig_name: Option<&'a str>,
    pub total_records: usize,
    pub warnings: usize,
    pub missing_mappings: usize,
    pub status: &'static str,
    pub error_details: serde_json::Value,
    pub started_at: DateTime<Utc>,
}

impl<'a> LogEntry<'a> {
    /// Log entry for an import that did not complete.
    pub fn failure(
        operation: Operation,
        file_name: &'a str,
        system_name: Option<&'a str>,
        err: &AppError,
        started_at: DateTime<Utc>,
    ) -> Self {
        let status = if err.is_conflict() {
            STATUS_DUPLICATE
        } else {
            STATUS_FAILED
        };
        Self {
            operation,
            file_name,
            system_name,
            format: None,
            stig_name: None,
            total_records: 0,
            warnings: 0,
            missing_mappings: 0,
            status,
            error_details: serde_json::json!({ "message": err.to_string() }),
            started_at,
        }
    }
}

/// Insert an ingestion log entry, returning its id.
pub(crate) async fn write_log<'c, E>(executor: E, entry: &LogEntry<'_>) -> Result<Uuid, AppError>
where
    E: PgExecutor<'c>,
{
    let id = sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO ingestion_logs (
            operation, file_name, system_name, format, stig_name,
            total_records, warnings, missing_mappings, status, error_details,
            started_at, completed_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, NOW())
        RETURNING id
        "#,
    )
    .bind(entry.operation.to_string())
    .bind(entry.file_name)
    .bind(entry.system_name)
    .bind(entry.format)
    .bind(entry.stig_name)
    .bind(to_i32(entry.total_records))
    .bind(to_i32(entry.warnings))
    .bind(to_i32(entry.missing_mappings))
    .bind(entry.status)
    .bind(&entry.error_details)
    .bind(entry.started_at)
    .fetch_one(executor)
    .await?;
    Ok(id)
}

/// Detect the format (unless given) and parse a checklist document.
pub fn parse_checklist(
    data: &[u8],
    file_name: &str,
    format: Option<ChecklistFormat>,
) -> Result<(ChecklistFormat, ParseResult), ParseError> {
    let format = match format {
        Some(format) => format,
        None => ChecklistFormat::detect(file_name, data)?,
    };
    let result = format.parser().parse(data, file_name)?;
    Ok((format, result))
}

/// Run the full ingestion pipeline for an uploaded checklist.
pub async fn ingest_checklist(
    pool: &PgPool,
    catalog: &CatalogHandle,
    data: &[u8],
    file_name: &str,
    system_name: &str,
    format: Option<ChecklistFormat>,
) -> Result<IngestionResult, AppError> {
    let started_at = Utc::now();
    let system_name = system_name.trim();
    if system_name.is_empty() {
        return Err(AppError::Validation("Missing 'system' field".to_string()));
    }

    // 1. Parse
    let (format, mut parsed) = match parse_checklist(data, file_name, format) {
        Ok(parsed) => parsed,
        Err(e) => {
            let err = AppError::parse(file_name, e);
            record_failure(pool, file_name, system_name, &err, started_at).await;
            return Err(err);
        }
    };
    parsed.assign_system(system_name);

    // 2. Resolve against the snapshot as of now
    let snapshot = catalog.current();
    if snapshot.is_empty() {
        tracing::warn!(file = %file_name, "CCI catalog is empty; findings will carry no NIST controls");
    }
    let resolution = resolver::resolve_batch(&parsed.findings, &snapshot);
    if !resolution.unmapped_ccis.is_empty() {
        tracing::debug!(
            file = %file_name,
            missing_mappings = resolution.unmapped_ccis.len(),
            ccis = ?resolution.unmapped_ccis,
            "CCI references without catalog entry"
        );
    }

    // 3. Persist
    let format_name = format.to_string();
    let input = PersistInput {
        file_name,
        system_name,
        format: &format_name,
        stig_name: &parsed.stig_name,
        host_name: parsed.host_name.as_deref(),
        content_hash: fingerprint::content_hash(data),
        findings: &resolution.findings,
        warnings: &parsed.warnings,
        unmapped_ccis: &resolution.unmapped_ccis,
        started_at,
    };
    let persisted = match persist(pool, &input).await {
        Ok(persisted) => persisted,
        Err(e) => {
            record_failure(pool, file_name, system_name, &e, started_at).await;
            return Err(e);
        }
    };

    let total_findings = resolution.findings.len();
    let mapped_findings = resolution
        .findings
        .iter()
        .filter(|f| !f.nist_controls.is_empty())
        .count();

    tracing::info!(
        file = %file_name,
        system = %system_name,
        format = %format_name,
        findings = total_findings,
        mapped = mapped_findings,
        missing_mappings = resolution.unmapped_ccis.len(),
        warnings = parsed.warnings.len(),
        "Checklist imported"
    );

    Ok(IngestionResult {
        ingestion_log_id: persisted.ingestion_log_id,
        checklist_file_id: persisted.checklist_file_id,
        system_id: persisted.system_id,
        system_name: system_name.to_string(),
        file_name: file_name.to_string(),
        format,
        stig_name: parsed.stig_name,
        host_name: parsed.host_name,
        total_findings,
        mapped_findings,
        unmapped_findings: total_findings - mapped_findings,
        missing_mappings: resolution.unmapped_ccis,
        warnings: parsed.warnings,
    })
}

struct PersistInput<'a> {
    file_name: &'a str,
    system_name: &'a str,
    format: &'a str,
    stig_name: &'a str,
    host_name: Option<&'a str>,
    content_hash: String,
    findings: &'a [ResolvedFinding],
    warnings: &'a [RecordWarning],
    unmapped_ccis: &'a [String],
    started_at: DateTime<Utc>,
}

struct Persisted {
    system_id: Uuid,
    checklist_file_id: Uuid,
    ingestion_log_id: Uuid,
}

/// Write the system, checklist file, findings and log row in one transaction.
async fn persist(pool: &PgPool, input: &PersistInput<'_>) -> Result<Persisted, AppError> {
    let mut tx = pool.begin().await?;

    let system = system::find_or_create(&mut *tx, input.system_name).await?;

    let existing = sqlx::query_scalar::<_, Uuid>(
        "SELECT id FROM checklist_files WHERE system_id = $1 AND content_hash = $2",
    )
    .bind(system.id)
    .bind(&input.content_hash)
    .fetch_optional(&mut *tx)
    .await?;
    if existing.is_some() {
        return Err(duplicate(input));
    }

    let checklist_file_id = sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO checklist_files (
            system_id, file_name, format, stig_name, host_name, content_hash, finding_count
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id
        "#,
    )
    .bind(system.id)
    .bind(input.file_name)
    .bind(input.format)
    .bind(input.stig_name)
    .bind(input.host_name)
    .bind(&input.content_hash)
    .bind(to_i32(input.findings.len()))
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| unique_to_conflict(e, input))?;

    let total = input.findings.len();
    for (i, finding) in input.findings.iter().enumerate() {
        insert_finding(&mut tx, checklist_file_id, system.id, finding).await?;
        if (i + 1) % PROGRESS_INTERVAL == 0 {
            tracing::debug!(file = %input.file_name, persisted = i + 1, total, "Persisting findings");
        }
    }

    let ingestion_log_id = write_log(
        &mut *tx,
        &LogEntry {
            operation: Operation::ChecklistImport,
            file_name: input.file_name,
            system_name: Some(input.system_name),
            format: Some(input.format),
            stig_name: Some(input.stig_name),
            total_records: total,
            warnings: input.warnings.len(),
            missing_mappings: input.unmapped_ccis.len(),
            status: STATUS_COMPLETED,
            error_details: serde_json::json!({
                "warnings": input.warnings,
                "unmapped_ccis": input.unmapped_ccis,
            }),
            started_at: input.started_at,
        },
    )
    .await?;

    tx.commit().await?;

    Ok(Persisted {
        system_id: system.id,
        checklist_file_id,
        ingestion_log_id,
    })
}

async fn insert_finding(
    conn: &mut PgConnection,
    checklist_file_id: Uuid,
    system_id: Uuid,
    resolved: &ResolvedFinding,
) -> Result<(), AppError> {
    let f = &resolved.finding;
    sqlx::query(
        r#"
        INSERT INTO findings (
            checklist_file_id, system_id, group_id, rule_id, rule_version, title,
            severity, status, discussion, check_content, fix_text, finding_details,
            comments, cci_references, nist_controls, families, source_file, stig_name
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
        "#,
    )
    .bind(checklist_file_id)
    .bind(system_id)
    .bind(&f.group_id)
    .bind(&f.rule_id)
    .bind(&f.rule_version)
    .bind(&f.title)
    .bind(&f.severity)
    .bind(&f.status)
    .bind(&f.discussion)
    .bind(&f.check_content)
    .bind(&f.fix_text)
    .bind(&f.finding_details)
    .bind(&f.comments)
    .bind(&f.cci_references)
    .bind(&resolved.nist_controls)
    .bind(&resolved.families)
    .bind(&f.source_file)
    .bind(&f.stig_name)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

fn duplicate(input: &PersistInput<'_>) -> AppError {
    AppError::Conflict(format!(
        "{} has already been imported for system '{}'",
        input.file_name, input.system_name
    ))
}

/// A concurrent import of the same content trips the unique constraint.
fn unique_to_conflict(err: sqlx::Error, input: &PersistInput<'_>) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => duplicate(input),
        _ => AppError::Database(err),
    }
}

async fn record_failure(
    pool: &PgPool,
    file_name: &str,
    system_name: &str,
    err: &AppError,
    started_at: DateTime<Utc>,
) {
    let entry = LogEntry::failure(
        Operation::ChecklistImport,
        file_name,
        Some(system_name),
        err,
        started_at,
    );
    if let Err(log_err) = write_log(pool, &entry).await {
        tracing::warn!(error = %log_err, file = %file_name, "Failed to record import failure");
    }
}

fn to_i32(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

/// Count total ingestion log entries.
pub async fn count_history(pool: &PgPool) -> Result<i64, AppError> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM ingestion_logs")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Get ingestion history with pagination, newest first.
pub async fn list_history(
    pool: &PgPool,
    limit: i64,
    offset: i64,
) -> Result<Vec<IngestionLogSummary>, AppError> {
    let logs = sqlx::query_as::<_, IngestionLogSummary>(
        r#"
        SELECT id, operation, file_name, system_name,
               total_records, warnings, missing_mappings,
               status, started_at, completed_at
        FROM ingestion_logs
        ORDER BY started_at DESC
        LIMIT $1 OFFSET $2
        "#,
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;
    Ok(logs)
}

/// Get full ingestion log details by ID.
pub async fn get_log(pool: &PgPool, id: Uuid) -> Result<IngestionLog, AppError> {
    let log = sqlx::query_as::<_, IngestionLog>(
        r#"
        SELECT id, operation, file_name, system_name, format, stig_name,
               total_records, warnings, missing_mappings, status, error_details,
               started_at, completed_at
        FROM ingestion_logs
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Ingestion log not found".to_string()))?;
    Ok(log)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_display() {
        assert_eq!(Operation::CatalogImport.to_string(), "catalog_import");
        assert_eq!(Operation::ChecklistImport.to_string(), "checklist_import");
    }

    #[test]
    fn parse_checklist_detects_format() {
        let data = include_bytes!("../../tests/fixtures/sample.cklb");
        let (format, result) = parse_checklist(data, "upload", None).unwrap();
        assert_eq!(format, ChecklistFormat::Cklb);
        assert_eq!(result.findings.len(), 4);
    }

    #[test]
    fn parse_checklist_honours_explicit_format() {
        let data = include_bytes!("../../tests/fixtures/sample.ckl");
        // extension says JSON, caller says CKL
        let (format, result) = parse_checklist(data, "export.json", Some(ChecklistFormat::Ckl)).unwrap();
        assert_eq!(format, ChecklistFormat::Ckl);
        assert_eq!(result.host_name.as_deref(), Some("web-01"));
    }

    #[test]
    fn parse_checklist_rejects_unknown_content() {
        let err = parse_checklist(b"plain text", "notes.txt", None).unwrap_err();
        assert!(matches!(err, ParseError::UnsupportedFormat(_)));
    }

    #[test]
    fn failure_entry_status() {
        let now = Utc::now();
        let parse = AppError::parse("a.ckl", ParseError::MissingElement("STIGS"));
        let entry = LogEntry::failure(Operation::ChecklistImport, "a.ckl", Some("web"), &parse, now);
        assert_eq!(entry.status, STATUS_FAILED);
        assert!(entry.error_details["message"]
            .as_str()
            .unwrap()
            .contains("STIGS"));

        let dup = AppError::Conflict("again".to_string());
        let entry = LogEntry::failure(Operation::ChecklistImport, "a.ckl", Some("web"), &dup, now);
        assert_eq!(entry.status, STATUS_DUPLICATE);
    }

    #[test]
    fn ingestion_result_serialization() {
        let result = IngestionResult {
            ingestion_log_id: Uuid::nil(),
            checklist_file_id: Uuid::nil(),
            system_id: Uuid::nil(),
            system_name: "web".to_string(),
            file_name: "web-01.ckl".to_string(),
            format: ChecklistFormat::Ckl,
            stig_name: "Apache".to_string(),
            host_name: None,
            total_findings: 4,
            mapped_findings: 3,
            unmapped_findings: 1,
            missing_mappings: vec!["CCI-000054".to_string()],
            warnings: vec![RecordWarning::new(3, "STATUS", "missing status")],
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["format"], "ckl");
        assert_eq!(json["total_findings"], 4);
        assert_eq!(json["missing_mappings"][0], "CCI-000054");
        assert_eq!(json["warnings"][0]["field"], "STATUS");
    }

    #[test]
    fn count_conversion_saturates() {
        assert_eq!(to_i32(7), 7);
        assert_eq!(to_i32(usize::MAX), i32::MAX);
    }
}
