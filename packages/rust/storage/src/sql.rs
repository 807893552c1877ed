//! libSQL marker backend (local, offline).

use std::path::Path;

use bookgenome_shared::{GenomeError, Marker, MarkerKind, Result};
use chrono::Utc;
use libsql::{Connection, Database, params};

use crate::MarkerStore;
use crate::migrations;

/// Markers in a local libSQL database, one row per `(document_id, tag)`.
pub struct LibsqlMarkerStore {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

impl std::fmt::Debug for LibsqlMarkerStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LibsqlMarkerStore").finish_non_exhaustive()
    }
}

fn storage_err(e: libsql::Error) -> GenomeError {
    GenomeError::Storage(e.to_string())
}

impl LibsqlMarkerStore {
    /// Open or create the database at `path` and apply pending migrations.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| GenomeError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;
        let conn = db.connect().map_err(storage_err)?;

        let store = Self { db, conn };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        GenomeError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Current schema version, or 0 if no migrations have been applied.
    async fn schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }
}

impl MarkerStore for LibsqlMarkerStore {
    async fn list(&self, document_id: &str) -> Result<Vec<Marker>> {
        let mut rows = self
            .conn
            .query(
                "SELECT tag, payload FROM markers WHERE document_id = ?1 ORDER BY tag",
                params![document_id],
            )
            .await
            .map_err(storage_err)?;

        let mut markers = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            let tag = row.get::<String>(0).map_err(storage_err)?;
            let payload: Option<String> = row.get(1).ok();
            let Some(kind) = MarkerKind::parse_tag(&tag) else {
                tracing::warn!(document_id, tag = %tag, "ignoring unrecognised marker row");
                continue;
            };
            let marker = Marker::new(document_id, kind);
            markers.push(match payload {
                Some(body) => marker.with_payload(body),
                None => marker,
            });
        }
        Ok(markers)
    }

    async fn insert(&self, marker: &Marker) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO markers (document_id, tag, category, payload, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(document_id, tag) DO UPDATE SET
                   payload = excluded.payload,
                   created_at = excluded.created_at",
                params![
                    marker.document_id.as_str(),
                    marker.kind.tag(),
                    marker.kind.category().as_str(),
                    marker.payload.as_deref(),
                    now.as_str(),
                ],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn delete(&self, document_id: &str, kind: &MarkerKind) -> Result<bool> {
        let affected = self
            .conn
            .execute(
                "DELETE FROM markers WHERE document_id = ?1 AND tag = ?2",
                params![document_id, kind.tag()],
            )
            .await
            .map_err(storage_err)?;
        Ok(affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use bookgenome_shared::{MarkerCategory, PutOutcome};
    use uuid::Uuid;

    use super::*;

    async fn test_store() -> LibsqlMarkerStore {
        let tmp = std::env::temp_dir().join(format!("bg_test_{}.db", Uuid::now_v7()));
        LibsqlMarkerStore::open(&tmp).await.expect("open test db")
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let store = test_store().await;
        assert_eq!(store.schema_version().await, 2);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("bg_test_{}.db", Uuid::now_v7()));
        let first = LibsqlMarkerStore::open(&tmp).await.expect("first open");
        drop(first);
        let second = LibsqlMarkerStore::open(&tmp).await.expect("second open");
        assert_eq!(second.schema_version().await, 2);
    }

    #[tokio::test]
    async fn marker_lifecycle() {
        let store = test_store().await;
        let marker = Marker::new("book", MarkerKind::UrlsFound(1)).with_payload("http://a.org");
        assert_eq!(store.put(marker.clone()).await.expect("put"), PutOutcome::Recorded);
        assert_eq!(
            store.put(marker.clone()).await.expect("put again"),
            PutOutcome::AlreadyRecorded
        );
        assert_eq!(store.list("book").await.expect("list"), [marker]);

        assert!(store.delete("book", &MarkerKind::UrlsFound(1)).await.expect("delete"));
        assert!(!store.delete("book", &MarkerKind::UrlsFound(1)).await.expect("again"));
        assert!(store.list("book").await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn payloadless_markers_round_trip() {
        let store = test_store().await;
        store
            .put(Marker::new("book", MarkerKind::GenomeUploaded))
            .await
            .expect("put");
        let upload = store
            .in_category("book", MarkerCategory::Upload)
            .await
            .expect("category");
        assert_eq!(upload.len(), 1);
        assert_eq!(upload[0].payload, None);
    }
}
