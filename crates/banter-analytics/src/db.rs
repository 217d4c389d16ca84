//! SQLite-backed analytics sink.
//!
//! Wraps a single rusqlite Connection in a Mutex. Opening the database
//! starts a session row; [`SqliteAnalytics::finish`] stamps its end time.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info, warn};

use banter_core::error::BanterError;

use crate::migrations;
use crate::sink::{AnalyticsSink, ApiCallRecord, CostRates, TtsRecord, UsageStats};

/// Persists usage records for one application session.
pub struct SqliteAnalytics {
    conn: Mutex<Connection>,
    session_id: i64,
    rates: CostRates,
}

impl SqliteAnalytics {
    /// Open (or create) the database at `path`, purge sessions older than
    /// `retention_days` (zero keeps everything), and start a new session.
    pub fn open(path: &Path, rates: CostRates, retention_days: u32) -> Result<Self, BanterError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)
            .map_err(|e| BanterError::Analytics(format!("Failed to open database: {}", e)))?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;",
        )
        .map_err(|e| BanterError::Analytics(format!("Failed to set pragmas: {}", e)))?;

        info!("Analytics database opened at {}", path.display());
        Self::initialize(conn, rates, retention_days)
    }

    /// Open an in-memory database (for testing).
    pub fn in_memory(rates: CostRates) -> Result<Self, BanterError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| BanterError::Analytics(format!("Failed to open in-memory db: {}", e)))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|e| BanterError::Analytics(format!("Failed to set pragmas: {}", e)))?;
        Self::initialize(conn, rates, 0)
    }

    fn initialize(conn: Connection, rates: CostRates, retention_days: u32) -> Result<Self, BanterError> {
        migrations::run_migrations(&conn)?;

        if retention_days > 0 {
            let cutoff = Utc::now() - Duration::days(i64::from(retention_days));
            let purged = purge_sessions_before(&conn, cutoff)?;
            if purged > 0 {
                info!(purged, retention_days, "Purged old analytics sessions");
            }
        }

        conn.execute(
            "INSERT INTO sessions (start_time) VALUES (?1)",
            params![Utc::now().timestamp()],
        )
        .map_err(|e| BanterError::Analytics(format!("Failed to start session: {}", e)))?;
        let session_id = conn.last_insert_rowid();
        info!(session_id, "Analytics session started");

        Ok(Self {
            conn: Mutex::new(conn),
            session_id,
            rates,
        })
    }

    /// Execute a closure with the underlying connection.
    fn with_conn<F, T>(&self, f: F) -> Result<T, BanterError>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| BanterError::Analytics(format!("Database lock poisoned: {}", e)))?;
        f(&conn).map_err(|e| BanterError::Analytics(e.to_string()))
    }

    pub fn session_id(&self) -> i64 {
        self.session_id
    }

    /// Stamp the session's end time.
    pub fn finish(&self) -> Result<(), BanterError> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE sessions SET end_time = ?1 WHERE id = ?2",
                params![Utc::now().timestamp(), self.session_id],
            )
        })?;
        info!(session_id = self.session_id, "Analytics session ended");
        Ok(())
    }

    /// Usage recorded during the current session.
    pub fn session_stats(&self) -> Result<UsageStats, BanterError> {
        self.with_conn(|conn| collect_stats(conn, Some(self.session_id)))
    }

    /// Usage across every retained session.
    pub fn lifetime_stats(&self) -> Result<UsageStats, BanterError> {
        self.with_conn(|conn| collect_stats(conn, None))
    }

    /// Delete sessions (and their records) that started before `cutoff`.
    pub fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<usize, BanterError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| BanterError::Analytics(format!("Database lock poisoned: {}", e)))?;
        purge_sessions_before(&conn, cutoff)
    }

    fn record(&self, what: &str, result: Result<usize, BanterError>) {
        match result {
            Ok(_) => debug!(session_id = self.session_id, "Tracked {}", what),
            Err(e) => warn!(error = %e, "Failed to track {}", what),
        }
    }
}

impl AnalyticsSink for SqliteAnalytics {
    fn track_api_call(&self, record: ApiCallRecord) {
        let cost = self.rates.api_cost(record.input_tokens, record.output_tokens);
        let result = self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO api_calls
                    (session_id, provider, model, tokens_input, tokens_output, cost, latency_ms, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    self.session_id,
                    record.provider,
                    record.model,
                    record.input_tokens,
                    record.output_tokens,
                    cost,
                    record.latency_ms as i64,
                    Utc::now().timestamp(),
                ],
            )
        });
        self.record("api call", result);
    }

    fn track_tts(&self, record: TtsRecord) {
        let cost = self.rates.tts_cost(record.char_count);
        let result = self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO tts_usage
                    (session_id, provider, char_count, cost, latency_ms, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    self.session_id,
                    record.provider,
                    record.char_count as i64,
                    cost,
                    record.latency_ms as i64,
                    Utc::now().timestamp(),
                ],
            )
        });
        self.record("tts usage", result);
    }

    fn track_error(&self, component: &str, message: &str) {
        let result = self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO errors (session_id, component, error_msg, timestamp)
                 VALUES (?1, ?2, ?3, ?4)",
                params![self.session_id, component, message, Utc::now().timestamp()],
            )
        });
        self.record("error", result);
    }
}

impl std::fmt::Debug for SqliteAnalytics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteAnalytics")
            .field("session_id", &self.session_id)
            .field("rates", &self.rates)
            .finish()
    }
}

fn purge_sessions_before(conn: &Connection, cutoff: DateTime<Utc>) -> Result<usize, BanterError> {
    conn.execute(
        "DELETE FROM sessions WHERE start_time < ?1",
        params![cutoff.timestamp()],
    )
    .map_err(|e| BanterError::Analytics(format!("Failed to purge sessions: {}", e)))
}

fn collect_stats(conn: &Connection, session: Option<i64>) -> rusqlite::Result<UsageStats> {
    // NULL matches every session.
    let filter = "(?1 IS NULL OR session_id = ?1)";

    let mut stats = UsageStats::default();

    stats.sessions = conn.query_row(
        "SELECT COUNT(*) FROM sessions WHERE (?1 IS NULL OR id = ?1)",
        params![session],
        |row| row.get::<_, i64>(0),
    )? as u64;

    let api = conn
        .query_row(
            &format!(
                "SELECT COUNT(*), COALESCE(SUM(tokens_input), 0), COALESCE(SUM(tokens_output), 0),
                        COALESCE(SUM(cost), 0.0), COALESCE(AVG(latency_ms), 0.0)
                 FROM api_calls WHERE {}",
                filter
            ),
            params![session],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, f64>(3)?,
                    row.get::<_, f64>(4)?,
                ))
            },
        )
        .optional()?;
    if let Some((calls, input, output, cost, latency)) = api {
        stats.api_calls = calls as u64;
        stats.input_tokens = input as u64;
        stats.output_tokens = output as u64;
        stats.api_cost = cost;
        stats.avg_latency_ms = latency;
    }

    let (requests, chars, tts_cost) = conn.query_row(
        &format!(
            "SELECT COUNT(*), COALESCE(SUM(char_count), 0), COALESCE(SUM(cost), 0.0)
             FROM tts_usage WHERE {}",
            filter
        ),
        params![session],
        |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, f64>(2)?,
            ))
        },
    )?;
    stats.tts_requests = requests as u64;
    stats.tts_chars = chars as u64;
    stats.tts_cost = tts_cost;

    stats.errors = conn.query_row(
        &format!("SELECT COUNT(*) FROM errors WHERE {}", filter),
        params![session],
        |row| row.get::<_, i64>(0),
    )? as u64;

    Ok(stats)
}
