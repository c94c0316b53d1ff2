//! Admin-triggered schema patches.
//!
//! Deployments that predate the current migration set can be brought
//! up to date over the API without shell access to the database host.
//! Every patch is idempotent (guarded with IF NOT EXISTS) and recorded
//! in a checksum ledger, so running the endpoint repeatedly is safe.

use serde::Serialize;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::Result;
use crate::services::audit_service::{AuditRecord, AuditService, EntityType};

/// One named schema patch
struct MaintenanceScript {
    name: &'static str,
    sql: &'static str,
}

/// Ordered list of patches. Append only; never edit a shipped script
/// unless the replacement stays idempotent, since drifted scripts are
/// re-run.
const SCRIPTS: &[MaintenanceScript] = &[
    MaintenanceScript {
        name: "0001_videos_mux_columns",
        sql: "ALTER TABLE videos ADD COLUMN IF NOT EXISTS mux_asset_id TEXT;
ALTER TABLE videos ADD COLUMN IF NOT EXISTS mux_playback_id TEXT;
CREATE INDEX IF NOT EXISTS idx_videos_mux_asset_id ON videos (mux_asset_id) WHERE mux_asset_id IS NOT NULL;",
    },
    MaintenanceScript {
        name: "0002_videos_thumbnail_columns",
        sql: "ALTER TABLE videos ADD COLUMN IF NOT EXISTS thumbnail_key TEXT;
ALTER TABLE videos ADD COLUMN IF NOT EXISTS thumbnail_method thumbnail_method;
ALTER TABLE videos ADD COLUMN IF NOT EXISTS thumbnail_status thumbnail_status NOT NULL DEFAULT 'pending';
ALTER TABLE videos ADD COLUMN IF NOT EXISTS mediaconvert_job_id TEXT;
CREATE INDEX IF NOT EXISTS idx_videos_mediaconvert_job_id ON videos (mediaconvert_job_id) WHERE mediaconvert_job_id IS NOT NULL;",
    },
    MaintenanceScript {
        name: "0003_articles_bluebook_citation",
        sql: "ALTER TABLE articles ADD COLUMN IF NOT EXISTS bluebook_citation TEXT;",
    },
    MaintenanceScript {
        name: "0004_users_must_change_password",
        sql: "ALTER TABLE users ADD COLUMN IF NOT EXISTS must_change_password BOOLEAN NOT NULL DEFAULT FALSE;",
    },
];

fn checksum(sql: &str) -> String {
    hex::encode(Sha256::digest(sql.as_bytes()))
}

/// Ledger state for one script
#[derive(Debug, Clone, Serialize)]
pub struct MaintenanceStatus {
    pub name: String,
    pub checksum: String,
    pub applied: bool,
    pub applied_at: Option<chrono::DateTime<chrono::Utc>>,
    /// True when the shipped script no longer matches the recorded
    /// checksum; the next apply re-runs it.
    pub drifted: bool,
}

/// Outcome of an apply run
#[derive(Debug, Clone, Serialize)]
pub struct MaintenanceReport {
    pub applied: Vec<String>,
    pub skipped: Vec<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct LedgerRow {
    name: String,
    checksum: String,
    applied_at: chrono::DateTime<chrono::Utc>,
}

/// Maintenance migration service
pub struct MaintenanceService {
    db: PgPool,
    audit: Arc<AuditService>,
}

impl MaintenanceService {
    pub fn new(db: PgPool, audit: Arc<AuditService>) -> Self {
        Self { db, audit }
    }

    /// The ledger itself must exist before anything can be recorded.
    /// Safe to call on every run.
    async fn ensure_ledger(&self) -> Result<()> {
        sqlx::raw_sql(
            "CREATE TABLE IF NOT EXISTS maintenance_migrations (
                name TEXT PRIMARY KEY,
                checksum TEXT NOT NULL,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )",
        )
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn ledger(&self) -> Result<Vec<LedgerRow>> {
        Ok(sqlx::query_as::<_, LedgerRow>(
            "SELECT name, checksum, applied_at FROM maintenance_migrations ORDER BY name",
        )
        .fetch_all(&self.db)
        .await?)
    }

    /// Report each shipped script against the ledger.
    pub async fn status(&self) -> Result<Vec<MaintenanceStatus>> {
        self.ensure_ledger().await?;
        let ledger = self.ledger().await?;

        Ok(SCRIPTS
            .iter()
            .map(|script| {
                let expected = checksum(script.sql);
                let recorded = ledger.iter().find(|row| row.name == script.name);
                MaintenanceStatus {
                    name: script.name.to_string(),
                    checksum: expected.clone(),
                    applied: recorded.is_some(),
                    applied_at: recorded.map(|row| row.applied_at),
                    drifted: recorded.is_some_and(|row| row.checksum != expected),
                }
            })
            .collect())
    }

    /// Run every script the ledger does not already record with a
    /// matching checksum. Each script commits together with its ledger
    /// row, so a failure leaves earlier patches recorded.
    pub async fn apply_pending(
        &self,
        actor_id: Uuid,
        actor_email: &str,
    ) -> Result<MaintenanceReport> {
        self.ensure_ledger().await?;
        let ledger = self.ledger().await?;

        let mut report = MaintenanceReport {
            applied: Vec::new(),
            skipped: Vec::new(),
        };

        for script in SCRIPTS {
            let expected = checksum(script.sql);
            let recorded = ledger.iter().find(|row| row.name == script.name);

            match recorded {
                Some(row) if row.checksum == expected => {
                    report.skipped.push(script.name.to_string());
                    continue;
                }
                Some(row) => {
                    tracing::warn!(
                        "Maintenance script {} drifted (ledger {}, shipped {}); re-running",
                        script.name,
                        &row.checksum[..8.min(row.checksum.len())],
                        &expected[..8]
                    );
                }
                None => {}
            }

            tracing::info!("Applying maintenance script {}", script.name);
            let mut tx = self.db.begin().await?;
            sqlx::raw_sql(script.sql).execute(&mut *tx).await?;
            sqlx::query(
                "INSERT INTO maintenance_migrations (name, checksum, applied_at)
                 VALUES ($1, $2, NOW())
                 ON CONFLICT (name) DO UPDATE SET checksum = EXCLUDED.checksum, applied_at = NOW()",
            )
            .bind(script.name)
            .bind(&expected)
            .execute(&mut *tx)
            .await?;
            tx.commit().await?;

            report.applied.push(script.name.to_string());
        }

        self.audit
            .record(
                AuditRecord::new("maintenance.migrations_applied", EntityType::Maintenance, "schema")
                    .actor(actor_id, actor_email)
                    .payload(serde_json::json!({
                        "applied": report.applied,
                        "skipped": report.skipped,
                    })),
            )
            .await?;

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn script_names_are_unique_and_ordered() {
        let names: Vec<&str> = SCRIPTS.iter().map(|s| s.name).collect();
        let unique: HashSet<&str> = names.iter().copied().collect();
        assert_eq!(names.len(), unique.len());

        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[test]
    fn every_script_is_guarded_for_idempotence() {
        for script in SCRIPTS {
            assert!(
                script.sql.contains("IF NOT EXISTS"),
                "script {} is missing an IF NOT EXISTS guard",
                script.name
            );
        }
    }

    #[test]
    fn checksums_are_stable_and_distinct() {
        for script in SCRIPTS {
            assert_eq!(checksum(script.sql), checksum(script.sql));
            assert_eq!(checksum(script.sql).len(), 64);
        }

        let sums: HashSet<String> = SCRIPTS.iter().map(|s| checksum(s.sql)).collect();
        assert_eq!(sums.len(), SCRIPTS.len());
    }
}
