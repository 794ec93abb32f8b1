//! CCI catalog persistence and the in-memory snapshot used for resolution.
//!
//! The snapshot is only swapped after the replacing transaction commits, so
//! readers see either the old catalog or the new one, never a partial load.
//! Imports are serialized so the snapshot always matches the last commit.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::Utc;
use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::catalog::{Catalog, CciEntry, CciEntryRow};
use crate::parsers::cci_list::{self, CatalogOptions};
use crate::services::ingestion::{self, LogEntry, Operation};

/// Shared handle to the current catalog snapshot.
#[derive(Debug, Clone, Default)]
pub struct CatalogHandle {
    inner: Arc<RwLock<Arc<Catalog>>>,
    import_lock: Arc<Mutex<()>>,
}

impl CatalogHandle {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(catalog))),
            import_lock: Arc::default(),
        }
    }

    /// Exclusive right to replace the catalog, held from the database write
    /// through the snapshot swap.
    pub async fn lock_imports(&self) -> MutexGuard<'_, ()> {
        self.import_lock.lock().await
    }

    /// The catalog as of now. Holding the returned `Arc` pins that snapshot.
    pub fn current(&self) -> Arc<Catalog> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Swap in a new catalog, returning the previous one.
    pub fn replace(&self, catalog: Catalog) -> Arc<Catalog> {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, Arc::new(catalog))
    }
}

/// Summary of a catalog import.
#[derive(Debug, Serialize)]
pub struct CatalogImportResult {
    pub ingestion_log_id: Uuid,
    pub file_name: String,
    pub item_count: usize,
    pub entries: usize,
    pub skipped_items: usize,
    pub unmapped_items: usize,
    pub distinct_controls: usize,
    pub previous_entries: usize,
}

/// Size summary of the loaded catalog.
#[derive(Debug, Serialize)]
pub struct CatalogSummary {
    pub entries: usize,
    pub distinct_controls: usize,
}

/// One catalog entry with its derived families.
#[derive(Debug, Serialize)]
pub struct CatalogEntryDetail {
    #[serde(flatten)]
    pub entry: CciEntry,
    pub families: Vec<String>,
}

/// Replace the stored catalog. Run inside the caller's transaction.
pub async fn replace(conn: &mut PgConnection, catalog: &Catalog) -> Result<(), AppError> {
    sqlx::query("DELETE FROM cci_entries")
        .execute(&mut *conn)
        .await?;

    for entry in catalog.entries() {
        let controls: Vec<&str> = entry.nist_controls.iter().map(String::as_str).collect();
        sqlx::query("INSERT INTO cci_entries (cci_id, nist_controls) VALUES ($1, $2)")
            .bind(&entry.cci_id)
            .bind(&controls)
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}

/// Load the stored catalog.
pub async fn load_from_db(pool: &PgPool) -> Result<Catalog, AppError> {
    let rows = sqlx::query_as::<_, CciEntryRow>("SELECT cci_id, nist_controls FROM cci_entries")
        .fetch_all(pool)
        .await?;
    Ok(Catalog::from_entries(rows.into_iter().map(CciEntry::from)))
}

/// Parse, persist and activate a CCI list document.
pub async fn import_catalog(
    pool: &PgPool,
    handle: &CatalogHandle,
    data: &[u8],
    file_name: &str,
    options: &CatalogOptions,
) -> Result<CatalogImportResult, AppError> {
    let started_at = Utc::now();

    let parsed = match cci_list::parse(data, options) {
        Ok(parsed) => parsed,
        Err(e) => {
            let err = AppError::parse(file_name, e);
            record_failure(pool, file_name, &err, started_at).await;
            return Err(err);
        }
    };

    let entries = parsed.catalog.len();
    let distinct_controls = parsed.catalog.distinct_control_count();
    let log = LogEntry {
        operation: Operation::CatalogImport,
        file_name,
        system_name: None,
        format: Some("xml"),
        stig_name: None,
        total_records: parsed.item_count,
        warnings: parsed.skipped_items,
        missing_mappings: parsed.unmapped_items,
        status: ingestion::STATUS_COMPLETED,
        error_details: serde_json::Value::Null,
        started_at,
    };

    let _import = handle.lock_imports().await;
    let ingestion_log_id = match persist(pool, &parsed.catalog, &log).await {
        Ok(id) => id,
        Err(e) => {
            record_failure(pool, file_name, &e, started_at).await;
            return Err(e);
        }
    };
    let previous = handle.replace(parsed.catalog);

    tracing::info!(
        file = %file_name,
        entries,
        distinct_controls,
        skipped = parsed.skipped_items,
        unmapped = parsed.unmapped_items,
        "CCI catalog imported"
    );

    Ok(CatalogImportResult {
        ingestion_log_id,
        file_name: file_name.to_string(),
        item_count: parsed.item_count,
        entries,
        skipped_items: parsed.skipped_items,
        unmapped_items: parsed.unmapped_items,
        distinct_controls,
        previous_entries: previous.len(),
    })
}

/// Replace the stored catalog and write its log row in one transaction.
async fn persist(pool: &PgPool, catalog: &Catalog, log: &LogEntry<'_>) -> Result<Uuid, AppError> {
    let mut tx = pool.begin().await?;
    replace(&mut *tx, catalog).await?;
    let log_id = ingestion::write_log(&mut *tx, log).await?;
    tx.commit().await?;
    Ok(log_id)
}

/// Summary of the active snapshot.
pub fn summary(handle: &CatalogHandle) -> CatalogSummary {
    let catalog = handle.current();
    CatalogSummary {
        entries: catalog.len(),
        distinct_controls: catalog.distinct_control_count(),
    }
}

/// Look up a single CCI in the active snapshot.
pub fn get_entry(handle: &CatalogHandle, cci_id: &str) -> Result<CatalogEntryDetail, AppError> {
    let catalog = handle.current();
    let entry = catalog
        .lookup(cci_id)
        .ok_or_else(|| AppError::NotFound(format!("CCI {cci_id} not in catalog")))?;
    Ok(CatalogEntryDetail {
        families: entry.families(),
        entry: entry.clone(),
    })
}

async fn record_failure(
    pool: &PgPool,
    file_name: &str,
    err: &AppError,
    started_at: chrono::DateTime<Utc>,
) {
    let entry = LogEntry::failure(Operation::CatalogImport, file_name, None, err, started_at);
    if let Err(log_err) = ingestion::write_log(pool, &entry).await {
        tracing::warn!(error = %log_err, file = %file_name, "Failed to record catalog import failure");
    }
}
