//! Versioned schema upgrades, recorded in `schema_migrations`.

use super::Error;
use tokio_rusqlite::{Connection, params};

/// A numbered SQL batch applied at most once.
struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration { version: 1, name: "sources_jobs", sql: include_str!("../../migrations/001_sources_jobs.sql") },
    Migration { version: 2, name: "published_items", sql: include_str!("../../migrations/002_published_items.sql") },
    Migration { version: 3, name: "content", sql: include_str!("../../migrations/003_content.sql") },
];

/// Bring the schema up to the latest version.
///
/// Each pending migration runs in its own transaction together with its
/// `schema_migrations` row, so a failed batch leaves the previous version intact.
pub async fn run(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| -> Result<(), Error> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TEXT NOT NULL
            )",
        )?;
        let current: i64 =
            conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_migrations", [], |row| row.get(0))?;

        for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
            let tx = conn.transaction()?;
            tx.execute_batch(migration.sql)
                .map_err(|e| Error::MigrationFailed(format!("{} ({}): {e}", migration.version, migration.name)))?;
            tx.execute(
                "INSERT INTO schema_migrations (version, name, applied_at) VALUES (?1, ?2, ?3)",
                params![migration.version, migration.name, chrono::Utc::now().to_rfc3339()],
            )?;
            tx.commit()?;
            tracing::info!(version = migration.version, name = migration.name, "applied migration");
        }
        Ok(())
    })
    .await
    .map_err(Error::from)
}
