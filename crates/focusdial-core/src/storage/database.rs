//! SQLite-based reference persistence.
//!
//! Provides persistent storage for:
//! - Session records, focus and break, completed or abandoned
//! - Tasks that focus sessions can be linked to
//! - Reward unlocks, at most one per session
//! - Key-value store for application state (the CLI keeps its engine snapshot here)

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use super::config::RewardsConfig;
use super::data_dir;
use crate::error::{CoreError, DatabaseError, PersistenceError};
use crate::integrations::{RewardStore, SessionStore};
use crate::reward::{RewardCatalog, RewardId};
use crate::session::{SessionId, SessionKind, SessionRecord, Task, TaskId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardUnlock {
    pub reward_id: RewardId,
    pub session_id: SessionId,
    pub unlocked_at: DateTime<Utc>,
}

/// SQLite database for sessions, tasks and rewards.
///
/// The connection sits behind a mutex so one `Arc<Database>` can serve as
/// both the session store and the reward store of a running engine.
pub struct Database {
    conn: Mutex<Connection>,
    catalog: RewardCatalog,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("catalog", &self.catalog)
            .finish_non_exhaustive()
    }
}

/// Raw session columns, decoded after the statement has finished.
struct SessionRow {
    id: String,
    kind: String,
    planned_secs: i64,
    actual_secs: i64,
    started_at: Option<String>,
    ended_at: Option<String>,
    is_completed: bool,
    task_id: Option<String>,
    break_secs: i64,
    was_interrupted: bool,
}

const SESSION_COLUMNS: &str = "id, kind, planned_secs, actual_secs, started_at, ended_at,
     is_completed, task_id, break_secs, was_interrupted";

impl SessionRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            kind: row.get(1)?,
            planned_secs: row.get(2)?,
            actual_secs: row.get(3)?,
            started_at: row.get(4)?,
            ended_at: row.get(5)?,
            is_completed: row.get(6)?,
            task_id: row.get(7)?,
            break_secs: row.get(8)?,
            was_interrupted: row.get(9)?,
        })
    }

    fn decode(self) -> Result<SessionRecord, DatabaseError> {
        let corrupt = |message: String| DatabaseError::CorruptRow {
            table: "sessions",
            message,
        };
        Ok(SessionRecord {
            id: SessionId::parse(&self.id).map_err(|e| corrupt(format!("id {}: {e}", self.id)))?,
            kind: self.kind.parse::<SessionKind>().map_err(corrupt)?,
            planned_duration: self.planned_secs,
            actual_duration: self.actual_secs,
            started_at: self
                .started_at
                .as_deref()
                .map(|s| parse_timestamp("sessions", s))
                .transpose()?,
            ended_at: self
                .ended_at
                .as_deref()
                .map(|s| parse_timestamp("sessions", s))
                .transpose()?,
            is_completed: self.is_completed,
            task: self.task_id.map(TaskId),
            break_time_accrued: self.break_secs,
            was_interrupted: self.was_interrupted,
        })
    }
}

fn parse_timestamp(table: &'static str, s: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::CorruptRow {
            table,
            message: format!("timestamp {s}: {e}"),
        })
}

impl Database {
    /// Open the database at `~/.config/focusdial/focusdial.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the data directory is unavailable or the database
    /// cannot be opened or migrated.
    pub fn open() -> Result<Self, CoreError> {
        let path = data_dir()?.join("focusdial.db");
        Ok(Self::open_at(&path)?)
    }

    pub fn open_at(path: &Path) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::with_connection(conn)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, DatabaseError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, DatabaseError> {
        let db = Self {
            conn: Mutex::new(conn),
            catalog: RewardCatalog::from_names(RewardsConfig::default().catalog),
        };
        db.migrate()?;
        Ok(db)
    }

    /// Replace the reward catalog draws are made from.
    pub fn with_catalog(mut self, catalog: RewardCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn catalog(&self) -> &RewardCatalog {
        &self.catalog
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, DatabaseError> {
        self.conn.lock().map_err(|_| DatabaseError::Poisoned)
    }

    fn migrate(&self) -> Result<(), DatabaseError> {
        self.conn()?.execute_batch(
            "CREATE TABLE IF NOT EXISTS sessions (
                id              TEXT PRIMARY KEY,
                kind            TEXT NOT NULL,
                planned_secs    INTEGER NOT NULL,
                actual_secs     INTEGER NOT NULL DEFAULT 0,
                started_at      TEXT,
                ended_at        TEXT,
                is_completed    INTEGER NOT NULL DEFAULT 0,
                task_id         TEXT,
                break_secs      INTEGER NOT NULL DEFAULT 0,
                was_interrupted INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS tasks (
                id            TEXT PRIMARY KEY,
                title         TEXT NOT NULL,
                completed     INTEGER NOT NULL DEFAULT 0,
                focus_minutes INTEGER NOT NULL DEFAULT 0,
                created_at    TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS reward_unlocks (
                session_id  TEXT PRIMARY KEY,
                reward_id   TEXT NOT NULL,
                unlocked_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_sessions_started_at ON sessions(started_at);
            CREATE INDEX IF NOT EXISTS idx_sessions_task_id ON sessions(task_id);",
        )?;
        Ok(())
    }

    // ── Sessions ─────────────────────────────────────────────────────

    /// Insert or replace a session record by id.
    pub fn save_session(&self, record: &SessionRecord) -> Result<(), DatabaseError> {
        self.conn()?.execute(
            "INSERT INTO sessions (id, kind, planned_secs, actual_secs, started_at, ended_at,
                                   is_completed, task_id, break_secs, was_interrupted)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(id) DO UPDATE SET
                kind = excluded.kind,
                planned_secs = excluded.planned_secs,
                actual_secs = excluded.actual_secs,
                started_at = excluded.started_at,
                ended_at = excluded.ended_at,
                is_completed = excluded.is_completed,
                task_id = excluded.task_id,
                break_secs = excluded.break_secs,
                was_interrupted = excluded.was_interrupted",
            params![
                record.id.to_string(),
                record.kind.as_str(),
                record.planned_duration,
                record.actual_duration,
                record.started_at.map(|t| t.to_rfc3339()),
                record.ended_at.map(|t| t.to_rfc3339()),
                record.is_completed,
                record.task.as_ref().map(|t| t.0.as_str()),
                record.break_time_accrued,
                record.was_interrupted,
            ],
        )?;
        Ok(())
    }

    pub fn session(&self, id: SessionId) -> Result<Option<SessionRecord>, DatabaseError> {
        let row = self
            .conn()?
            .query_row(
                &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1"),
                params![id.to_string()],
                SessionRow::from_row,
            )
            .optional()?;
        row.map(SessionRow::decode).transpose()
    }

    /// Most recent sessions first.
    pub fn list_sessions(&self, limit: usize) -> Result<Vec<SessionRecord>, DatabaseError> {
        let rows = {
            let conn = self.conn()?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions
                 ORDER BY COALESCE(ended_at, started_at) DESC
                 LIMIT ?1"
            ))?;
            let rows = stmt
                .query_map(params![limit as i64], SessionRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };
        rows.into_iter().map(SessionRow::decode).collect()
    }

    // ── Tasks ────────────────────────────────────────────────────────

    pub fn insert_task(&self, title: &str) -> Result<Task, DatabaseError> {
        let task = Task {
            id: TaskId(uuid::Uuid::new_v4().to_string()),
            title: title.to_string(),
            completed: false,
            focus_minutes: 0,
        };
        self.conn()?.execute(
            "INSERT INTO tasks (id, title, completed, focus_minutes, created_at)
             VALUES (?1, ?2, 0, 0, ?3)",
            params![task.id.0, task.title, Utc::now().to_rfc3339()],
        )?;
        Ok(task)
    }

    pub fn task(&self, id: &TaskId) -> Result<Option<Task>, DatabaseError> {
        let task = self
            .conn()?
            .query_row(
                "SELECT id, title, completed, focus_minutes FROM tasks WHERE id = ?1",
                params![id.0],
                task_from_row,
            )
            .optional()?;
        Ok(task)
    }

    pub fn list_tasks(&self) -> Result<Vec<Task>, DatabaseError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, title, completed, focus_minutes FROM tasks ORDER BY created_at",
        )?;
        let tasks = stmt
            .query_map([], task_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tasks)
    }

    /// Mark a task completed and credit focus minutes to it.
    /// Returns `false` if the task does not exist.
    pub fn complete_task(&self, id: &TaskId, additional_minutes: i64) -> Result<bool, DatabaseError> {
        let changed = self.conn()?.execute(
            "UPDATE tasks SET completed = 1, focus_minutes = focus_minutes + ?2 WHERE id = ?1",
            params![id.0, additional_minutes.max(0)],
        )?;
        Ok(changed > 0)
    }

    // ── Rewards ──────────────────────────────────────────────────────

    /// Record an unlock. A second unlock for the same session is ignored.
    /// Returns `true` if the row was inserted.
    pub fn record_unlock(&self, reward: &RewardId, session: SessionId) -> Result<bool, DatabaseError> {
        let inserted = self.conn()?.execute(
            "INSERT OR IGNORE INTO reward_unlocks (session_id, reward_id, unlocked_at)
             VALUES (?1, ?2, ?3)",
            params![session.to_string(), reward.0, Utc::now().to_rfc3339()],
        )?;
        Ok(inserted > 0)
    }

    pub fn list_reward_unlocks(&self) -> Result<Vec<RewardUnlock>, DatabaseError> {
        let rows = {
            let conn = self.conn()?;
            let mut stmt = conn.prepare(
                "SELECT reward_id, session_id, unlocked_at FROM reward_unlocks ORDER BY unlocked_at",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };

        rows.into_iter()
            .map(|(reward_id, session_id, unlocked_at)| {
                Ok(RewardUnlock {
                    reward_id: RewardId(reward_id),
                    session_id: SessionId::parse(&session_id).map_err(|e| {
                        DatabaseError::CorruptRow {
                            table: "reward_unlocks",
                            message: format!("session_id {session_id}: {e}"),
                        }
                    })?,
                    unlocked_at: parse_timestamp("reward_unlocks", &unlocked_at)?,
                })
            })
            .collect()
    }

    // ── Key-value ────────────────────────────────────────────────────

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, DatabaseError> {
        let value = self
            .conn()?
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), DatabaseError> {
        self.conn()?.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: TaskId(row.get(0)?),
        title: row.get(1)?,
        completed: row.get(2)?,
        focus_minutes: row.get(3)?,
    })
}

impl SessionStore for Database {
    fn save(&self, record: &SessionRecord) -> Result<(), PersistenceError> {
        Ok(self.save_session(record)?)
    }

    fn fetch_task_by_id(&self, id: &TaskId) -> Result<Option<Task>, PersistenceError> {
        Ok(self.task(id)?)
    }

    fn mark_task_completed(&self, id: &TaskId, additional_minutes: i64) -> Result<(), PersistenceError> {
        if self.complete_task(id, additional_minutes)? {
            Ok(())
        } else {
            Err(PersistenceError::NotFound {
                entity: "task",
                id: id.to_string(),
            })
        }
    }
}

impl RewardStore for Database {
    fn draw_random_reward(&self) -> Result<RewardId, PersistenceError> {
        self.catalog
            .draw(&mut rand::thread_rng())
            .ok_or(PersistenceError::EmptyCatalog)
    }

    fn record_reward_unlocked(&self, reward: &RewardId, from_session: SessionId) -> Result<(), PersistenceError> {
        self.record_unlock(reward, from_session)?;
        Ok(())
    }
}
