//! Database schema migrations.
//!
//! Creates the sessions, api_calls, tts_usage, and errors tables plus the
//! schema_migrations bookkeeping table.

use rusqlite::Connection;
use tracing::info;

use banter_core::error::BanterError;

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), BanterError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| BanterError::Analytics(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| BanterError::Analytics(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied analytics migration v1: initial_schema");
    }

    Ok(())
}

/// Version 1: initial schema. Timestamps are unix seconds.
fn apply_v1(conn: &Connection) -> Result<(), BanterError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS sessions (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            start_time  INTEGER NOT NULL,
            end_time    INTEGER
        );

        CREATE TABLE IF NOT EXISTS api_calls (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id      INTEGER NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
            provider        TEXT NOT NULL,
            model           TEXT NOT NULL DEFAULT '',
            tokens_input    INTEGER NOT NULL DEFAULT 0,
            tokens_output   INTEGER NOT NULL DEFAULT 0,
            cost            REAL NOT NULL DEFAULT 0,
            latency_ms      INTEGER NOT NULL DEFAULT 0,
            timestamp       INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS tts_usage (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id      INTEGER NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
            provider        TEXT NOT NULL,
            char_count      INTEGER NOT NULL DEFAULT 0,
            cost            REAL NOT NULL DEFAULT 0,
            latency_ms      INTEGER NOT NULL DEFAULT 0,
            timestamp       INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS errors (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id      INTEGER NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
            component       TEXT NOT NULL,
            error_msg       TEXT NOT NULL DEFAULT '',
            timestamp       INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_api_calls_session ON api_calls(session_id);
        CREATE INDEX IF NOT EXISTS idx_tts_usage_session ON tts_usage(session_id);
        CREATE INDEX IF NOT EXISTS idx_errors_session ON errors(session_id);
        CREATE INDEX IF NOT EXISTS idx_sessions_start ON sessions(start_time);

        INSERT INTO schema_migrations (version, name) VALUES (1, 'initial_schema');
        ",
    )
    .map_err(|e| BanterError::Analytics(format!("Migration v1 failed: {}", e)))?;

    Ok(())
}
