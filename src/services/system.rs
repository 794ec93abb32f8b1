//! Assessed systems: lookup, creation on first import, listing and removal.

use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::system::{System, SystemSummary};

/// Fetch the system named `name`, creating it if it does not exist.
pub async fn find_or_create<'c, E>(executor: E, name: &str) -> Result<System, AppError>
where
    E: PgExecutor<'c>,
{
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("System name is required".to_string()));
    }

    // The no-op update makes RETURNING yield the existing row on conflict.
    let system = sqlx::query_as::<_, System>(
        r#"
        INSERT INTO systems (name)
        VALUES ($1)
        ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
        RETURNING id, name, description, created_at
        "#,
    )
    .bind(name)
    .fetch_one(executor)
    .await?;
    Ok(system)
}

/// Find a system by exact name.
pub async fn find_by_name(pool: &PgPool, name: &str) -> Result<System, AppError> {
    sqlx::query_as::<_, System>(
        "SELECT id, name, description, created_at FROM systems WHERE name = $1",
    )
    .bind(name)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("System '{name}' not found")))
}

/// List systems with checklist and finding counts, by name.
pub async fn list(pool: &PgPool) -> Result<Vec<SystemSummary>, AppError> {
    let systems = sqlx::query_as::<_, SystemSummary>(
        r#"
        SELECT
            s.id, s.name, s.description, s.created_at,
            (SELECT COUNT(*) FROM checklist_files c WHERE c.system_id = s.id) AS checklist_count,
            (SELECT COUNT(*) FROM findings f WHERE f.system_id = s.id) AS finding_count
        FROM systems s
        ORDER BY s.name
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(systems)
}

/// Count registered systems.
pub async fn count(pool: &PgPool) -> Result<i64, AppError> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM systems")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Delete a system; its checklist files, findings and snapshots cascade.
pub async fn delete(pool: &PgPool, id: Uuid) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM systems WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("System not found".to_string()));
    }
    tracing::info!(system_id = %id, "System deleted");
    Ok(())
}
