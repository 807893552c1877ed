//! SQL migrations for the marker database.
//!
//! Applied in order on open. A migration runs only when its version is above
//! the highest recorded in `schema_migrations`.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "Initial schema: markers",
            sql: r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- One row per (document, tag); tag is the marker's file-name prefix
CREATE TABLE IF NOT EXISTS markers (
    document_id TEXT NOT NULL,
    tag         TEXT NOT NULL,
    category    TEXT NOT NULL,
    payload     TEXT,
    created_at  TEXT NOT NULL,
    PRIMARY KEY (document_id, tag)
);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
        },
        Migration {
            version: 2,
            description: "Index markers by category",
            sql: r#"
CREATE INDEX IF NOT EXISTS idx_markers_category ON markers(document_id, category);

INSERT INTO schema_migrations (version) VALUES (2);
"#,
        },
    ]
}
