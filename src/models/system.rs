//! Systems (assessment targets) and the checklist files imported under them.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct System {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// System with import counts for list views.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SystemSummary {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub checklist_count: i64,
    pub finding_count: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ChecklistFile {
    pub id: Uuid,
    pub system_id: Uuid,
    pub file_name: String,
    pub format: String,
    pub stig_name: String,
    pub host_name: Option<String>,
    pub content_hash: String,
    pub finding_count: i32,
    pub imported_at: DateTime<Utc>,
}
