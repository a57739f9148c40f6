//! Embedded schema migrations

use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use crate::error::Result;

const MIGRATIONS: &[(i64, &str, &str)] = &[
    (1, "001_schema", include_str!("../migrations/001_schema.sql")),
    (
        2,
        "002_award_guards",
        include_str!("../migrations/002_award_guards.sql"),
    ),
];

/// Applies every migration newer than the recorded schema version
pub struct Migrator {
    migrations: &'static [(i64, &'static str, &'static str)],
}

impl Migrator {
    pub fn new() -> Self {
        Self {
            migrations: MIGRATIONS,
        }
    }

    pub fn run(&self, conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version    INTEGER PRIMARY KEY,
                name       TEXT NOT NULL,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            )",
        )?;

        let current: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get::<_, Option<i64>>(0)
            })
            .optional()?
            .flatten()
            .unwrap_or(0);

        for (version, name, sql) in self.migrations {
            if *version <= current {
                continue;
            }
            conn.execute_batch(sql)?;
            conn.execute(
                "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
                params![version, name],
            )?;
            info!("Applied migration {}", name);
        }

        Ok(())
    }

    pub fn latest_version(&self) -> i64 {
        self.migrations.last().map(|(v, _, _)| *v).unwrap_or(0)
    }
}

impl Default for Migrator {
    fn default() -> Self {
        Self::new()
    }
}
