//! Persistent run log backed by SQLite.
//!
//! One row per stage transition:
//!
//! | column        | meaning                               |
//! |---------------|---------------------------------------|
//! | `run_id`      | ULID of the orchestration             |
//! | `node`        | node name, once known                 |
//! | `stage`       | [`Stage`] name                        |
//! | `outcome`     | `completed`, `skipped` or `failed`    |
//! | `detail`      | free text (error, instance id, ...)   |
//! | `recorded_at` | RFC 3339 UTC timestamp                |

use crate::pipeline::Stage;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::{Connection, ToSql, params};
use serde::{Deserialize, Serialize};
use std::path::Path;
use ulid::Ulid;
use vaultstrap_shared::errors::{VaultstrapError, VaultstrapResult};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS runs (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id      TEXT NOT NULL,
    node        TEXT NOT NULL,
    stage       TEXT NOT NULL,
    outcome     TEXT NOT NULL,
    detail      TEXT,
    recorded_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_runs_node ON runs(node);
CREATE INDEX IF NOT EXISTS idx_runs_run_id ON runs(run_id);
";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunOutcome {
    Completed,
    Skipped,
    Failed,
}

impl RunOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunOutcome::Completed => "completed",
            RunOutcome::Skipped => "skipped",
            RunOutcome::Failed => "failed",
        }
    }
}

impl std::fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql for RunOutcome {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::Borrowed(ValueRef::Text(self.as_str().as_bytes())))
    }
}

impl FromSql for RunOutcome {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "completed" => Ok(RunOutcome::Completed),
            "skipped" => Ok(RunOutcome::Skipped),
            "failed" => Ok(RunOutcome::Failed),
            _ => Err(FromSqlError::InvalidType),
        }
    }
}

impl ToSql for Stage {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::Borrowed(ValueRef::Text(self.as_str().as_bytes())))
    }
}

impl FromSql for Stage {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|_| FromSqlError::InvalidType)
    }
}

/// One logged stage transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub node: String,
    pub stage: Stage,
    pub outcome: RunOutcome,
    pub detail: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// SQLite-backed history of orchestration runs.
pub struct RunLog {
    conn: Mutex<Connection>,
}

impl RunLog {
    /// Open (creating if needed) the database at `path`.
    pub fn open(path: &Path) -> VaultstrapResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                VaultstrapError::Storage(format!(
                    "failed to create {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
        let conn = Connection::open(path).map_err(|e| {
            VaultstrapError::Storage(format!("failed to open {}: {}", path.display(), e))
        })?;
        Self::init(conn)
    }

    pub fn in_memory() -> VaultstrapResult<Self> {
        let conn = Connection::open_in_memory().map_err(storage_err)?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> VaultstrapResult<Self> {
        conn.execute_batch(SCHEMA).map_err(storage_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn record(
        &self,
        run_id: &Ulid,
        node: &str,
        stage: Stage,
        outcome: RunOutcome,
        detail: Option<&str>,
    ) -> VaultstrapResult<()> {
        self.conn
            .lock()
            .execute(
                "INSERT INTO runs (run_id, node, stage, outcome, detail, recorded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    run_id.to_string(),
                    node,
                    stage,
                    outcome,
                    detail,
                    Utc::now().to_rfc3339()
                ],
            )
            .map_err(storage_err)?;
        Ok(())
    }

    /// All records for `node`, oldest first.
    pub fn runs_for(&self, node: &str) -> VaultstrapResult<Vec<RunRecord>> {
        self.query(
            "SELECT run_id, node, stage, outcome, detail, recorded_at
             FROM runs WHERE node = ?1 ORDER BY id ASC",
            params![node],
        )
    }

    /// Records of the most recent run for `node`, oldest first. Empty when
    /// the node was never run.
    pub fn latest_run(&self, node: &str) -> VaultstrapResult<Vec<RunRecord>> {
        let mut records = self.runs_for(node)?;
        let Some(last) = records.last().map(|r| r.run_id.clone()) else {
            return Ok(records);
        };
        records.retain(|r| r.run_id == last);
        Ok(records)
    }

    /// Whether the most recent run for `node` ended in a failed stage.
    pub fn latest_run_failed(&self, node: &str) -> VaultstrapResult<bool> {
        Ok(self
            .latest_run(node)?
            .iter()
            .any(|r| r.outcome == RunOutcome::Failed))
    }

    /// The most recent `limit` records, newest first.
    pub fn recent(&self, limit: usize) -> VaultstrapResult<Vec<RunRecord>> {
        self.query(
            "SELECT run_id, node, stage, outcome, detail, recorded_at
             FROM runs ORDER BY id DESC LIMIT ?1",
            params![limit as i64],
        )
    }

    fn query(&self, sql: &str, params: impl rusqlite::Params) -> VaultstrapResult<Vec<RunRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(sql).map_err(storage_err)?;
        let rows = stmt
            .query_map(params, |row| {
                let recorded_at: String = row.get(5)?;
                let recorded_at = DateTime::parse_from_rfc3339(&recorded_at)
                    .map(|t| t.with_timezone(&Utc))
                    .map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(
                            5,
                            rusqlite::types::Type::Text,
                            Box::new(e),
                        )
                    })?;
                Ok(RunRecord {
                    run_id: row.get(0)?,
                    node: row.get(1)?,
                    stage: row.get(2)?,
                    outcome: row.get(3)?,
                    detail: row.get(4)?,
                    recorded_at,
                })
            })
            .map_err(storage_err)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(storage_err)
    }
}

fn storage_err(e: rusqlite::Error) -> VaultstrapError {
    VaultstrapError::Storage(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_query() {
        let log = RunLog::in_memory().unwrap();
        let run = Ulid::new();

        log.record(&run, "i-abc", Stage::Provision, RunOutcome::Completed, Some("i-abc"))
            .unwrap();
        log.record(&run, "i-abc", Stage::Identity, RunOutcome::Completed, None)
            .unwrap();
        log.record(&Ulid::new(), "web-1", Stage::Provision, RunOutcome::Skipped, None)
            .unwrap();

        let records = log.runs_for("i-abc").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].stage, Stage::Provision);
        assert_eq!(records[0].detail.as_deref(), Some("i-abc"));
        assert_eq!(records[1].stage, Stage::Identity);
        assert_eq!(records[1].run_id, run.to_string());

        let recent = log.recent(1).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].node, "web-1");
        assert_eq!(recent[0].outcome, RunOutcome::Skipped);
    }

    #[test]
    fn test_open_persists() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("state").join("runs.db");
        let run = Ulid::new();

        {
            let log = RunLog::open(&path).unwrap();
            log.record(&run, "i-abc", Stage::Bootstrap, RunOutcome::Failed, Some("exit 1"))
                .unwrap();
        }

        let log = RunLog::open(&path).unwrap();
        let records = log.runs_for("i-abc").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].outcome, RunOutcome::Failed);
    }

    #[test]
    fn test_latest_run() {
        let log = RunLog::in_memory().unwrap();
        assert!(log.latest_run("web-1").unwrap().is_empty());
        assert!(!log.latest_run_failed("web-1").unwrap());

        let first = Ulid::new();
        log.record(&first, "web-1", Stage::Identity, RunOutcome::Failed, Some("refused"))
            .unwrap();
        assert!(log.latest_run_failed("web-1").unwrap());

        let second = Ulid::new();
        log.record(&second, "web-1", Stage::Identity, RunOutcome::Completed, None)
            .unwrap();
        log.record(&second, "web-1", Stage::Bootstrap, RunOutcome::Completed, None)
            .unwrap();

        let latest = log.latest_run("web-1").unwrap();
        assert_eq!(latest.len(), 2);
        assert!(latest.iter().all(|r| r.run_id == second.to_string()));
        assert!(!log.latest_run_failed("web-1").unwrap());
    }
}
