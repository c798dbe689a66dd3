use chrono::{DateTime, Local};
use rusqlite::{params, Connection, Result};
use std::path::{Path, PathBuf};

use crate::app_dirs::AppDirs;
use crate::proctor::reason::TerminationReason;

/// One finished attempt as stored in the history log.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptRecord {
    pub quiz_title: String,
    pub started_at: DateTime<Local>,
    pub ended_at: DateTime<Local>,
    /// Kebab-case termination code, e.g. `time-expired`.
    pub reason: String,
    pub correct: u32,
    pub total: u32,
    pub warnings: u32,
}

impl AttemptRecord {
    pub fn new(
        quiz_title: &str,
        started_at: DateTime<Local>,
        ended_at: DateTime<Local>,
        reason: TerminationReason,
        (correct, total): (usize, usize),
        warnings: u32,
    ) -> Self {
        Self {
            quiz_title: quiz_title.to_string(),
            started_at,
            ended_at,
            reason: reason.to_string(),
            correct: correct as u32,
            total: total as u32,
            warnings,
        }
    }

    pub fn elapsed_secs(&self) -> i64 {
        (self.ended_at - self.started_at).num_seconds()
    }
}

/// Database of finished attempts
#[derive(Debug)]
pub struct HistoryDb {
    conn: Connection,
}

impl HistoryDb {
    /// Open the history database under the state directory
    pub fn new() -> Result<Self> {
        let db_path =
            AppDirs::history_db_path().unwrap_or_else(|| PathBuf::from("quizguard_history.db"));
        Self::open(db_path)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CANTOPEN),
                    Some(format!("Failed to create directory: {}", e)),
                )
            })?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS attempts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                quiz_title TEXT NOT NULL,
                started_at TEXT NOT NULL,
                ended_at TEXT NOT NULL,
                reason TEXT NOT NULL,
                correct INTEGER NOT NULL,
                total INTEGER NOT NULL,
                warnings INTEGER NOT NULL
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_attempts_ended_at ON attempts(ended_at)",
            [],
        )?;

        Ok(HistoryDb { conn })
    }

    pub fn record(&self, attempt: &AttemptRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO attempts
            (quiz_title, started_at, ended_at, reason, correct, total, warnings)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                attempt.quiz_title,
                attempt.started_at.to_rfc3339(),
                attempt.ended_at.to_rfc3339(),
                attempt.reason,
                attempt.correct,
                attempt.total,
                attempt.warnings,
            ],
        )?;
        Ok(())
    }

    /// Most recent attempts first
    pub fn recent(&self, limit: usize) -> Result<Vec<AttemptRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT quiz_title, started_at, ended_at, reason, correct, total, warnings
            FROM attempts
            ORDER BY ended_at DESC, id DESC
            LIMIT ?1
            "#,
        )?;

        let rows = stmt.query_map(params![limit as i64], |row| {
            let started: String = row.get(1)?;
            let ended: String = row.get(2)?;
            Ok(AttemptRecord {
                quiz_title: row.get(0)?,
                started_at: parse_timestamp(&started, 1)?,
                ended_at: parse_timestamp(&ended, 2)?,
                reason: row.get(3)?,
                correct: row.get(4)?,
                total: row.get(5)?,
                warnings: row.get(6)?,
            })
        })?;

        rows.collect()
    }

    /// Attempt counts for every reason seen so far, most frequent first
    pub fn reason_counts(&self) -> Result<Vec<(String, u32)>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT reason, COUNT(*) AS n
            FROM attempts
            GROUP BY reason
            ORDER BY n DESC, reason ASC
            "#,
        )?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        rows.collect()
    }
}

fn parse_timestamp(s: &str, column: usize) -> Result<DateTime<Local>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Local))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
        })
}
