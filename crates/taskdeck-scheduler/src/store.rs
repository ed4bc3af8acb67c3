//! Durable action store — SQLite-backed persistence for delayed actions.
//!
//! Rows are never deleted: terminal actions stay behind for audit and
//! idempotence checks. The conditional status update in [`ActionStore::mark_fired`]
//! is the single concurrency primitive the scheduler relies on.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, Row, params};
use serde::{Deserialize, Serialize};
use taskdeck_core::error::{Result, TaskDeckError};

/// Status of a delayed action.
///
/// Transitions only `Pending → Fired` and `Pending → Cancelled`; terminal
/// states are never revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    Pending,
    Fired,
    Cancelled,
}

impl ActionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionStatus::Pending => "pending",
            ActionStatus::Fired => "fired",
            ActionStatus::Cancelled => "cancelled",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "fired" => ActionStatus::Fired,
            "cancelled" => ActionStatus::Cancelled,
            _ => ActionStatus::Pending,
        }
    }
}

/// One scheduled future side effect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelayedAction {
    pub id: String,
    /// Handler discriminator, e.g. `"task-due-recheck"`.
    pub kind: String,
    /// Immutable data needed to re-execute the action.
    pub payload: serde_json::Value,
    /// The action must not execute before this instant.
    pub fire_at: DateTime<Utc>,
    pub status: ActionStatus,
    pub created_at: DateTime<Utc>,
    /// Set when the scheduler claims the action.
    pub fired_at: Option<DateTime<Utc>>,
}

/// Timestamps are stored as fixed-width RFC 3339 text (millisecond
/// precision, `Z` offset) so SQL string comparison orders them correctly.
fn ts(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// SQLite-backed store for delayed actions — survives restarts.
pub struct ActionStore {
    conn: Mutex<Connection>,
}

impl ActionStore {
    /// Open or create the action store.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)
            .map_err(|e| TaskDeckError::Storage(format!("Action store open: {e}")))?;

        // WAL mode so scheduler reads don't block workflow enqueues
        conn.execute_batch("PRAGMA journal_mode=WAL;").ok();

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    /// Run migrations to create the actions table.
    fn migrate(&self) -> Result<()> {
        self.lock()?
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS delayed_actions (
                    id TEXT PRIMARY KEY,
                    kind TEXT NOT NULL,
                    payload TEXT NOT NULL,
                    fire_at TEXT NOT NULL,
                    status TEXT NOT NULL DEFAULT 'pending',
                    created_at TEXT NOT NULL,
                    fired_at TEXT
                );
                CREATE INDEX IF NOT EXISTS idx_delayed_actions_due
                    ON delayed_actions (status, fire_at);",
            )
            .map_err(|e| TaskDeckError::Storage(format!("Migration: {e}")))?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| TaskDeckError::Storage(format!("Store lock poisoned: {e}")))
    }

    /// Persist a new `Pending` action and return its id.
    ///
    /// A `fire_at` already in the past is accepted — the action becomes
    /// immediately eligible on the next cycle.
    pub fn enqueue(
        &self,
        kind: &str,
        payload: serde_json::Value,
        fire_at: DateTime<Utc>,
    ) -> Result<String> {
        if kind.trim().is_empty() {
            return Err(TaskDeckError::Validation(
                "action kind must not be empty".into(),
            ));
        }
        if !payload.is_object() {
            return Err(TaskDeckError::Validation(
                "action payload must be a JSON object".into(),
            ));
        }

        let id = uuid::Uuid::new_v4().to_string();
        self.lock()?
            .execute(
                "INSERT INTO delayed_actions (id, kind, payload, fire_at, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, 'pending', ?5)",
                params![id, kind, payload.to_string(), ts(fire_at), ts(Utc::now())],
            )
            .map_err(|e| TaskDeckError::Storage(format!("Enqueue action: {e}")))?;

        tracing::debug!("⏳ Action queued: {kind} ({id}), fires at {}", ts(fire_at));
        Ok(id)
    }

    /// All `Pending` actions with `fire_at <= now`, earliest-due first,
    /// ties broken by id. Callers may re-query after partial processing.
    pub fn due_actions(&self, now: DateTime<Utc>) -> Result<Vec<DelayedAction>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, kind, payload, fire_at, status, created_at, fired_at
                 FROM delayed_actions
                 WHERE status = 'pending' AND fire_at <= ?1
                 ORDER BY fire_at, id",
            )
            .map_err(|e| TaskDeckError::Storage(format!("Prepare due query: {e}")))?;

        let rows = stmt
            .query_map([ts(now)], row_to_action)
            .map_err(|e| TaskDeckError::Storage(format!("Due query: {e}")))?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| TaskDeckError::Storage(format!("Read due rows: {e}")))
    }

    /// Atomically transition `id` from `Pending` to `Fired`.
    ///
    /// Returns `false` when the action is already terminal or does not
    /// exist — the caller lost the claim and must not execute the effect.
    pub fn mark_fired(&self, id: &str) -> Result<bool> {
        let n = self
            .lock()?
            .execute(
                "UPDATE delayed_actions SET status = 'fired', fired_at = ?2
                 WHERE id = ?1 AND status = 'pending'",
                params![id, ts(Utc::now())],
            )
            .map_err(|e| TaskDeckError::Storage(format!("Mark fired: {e}")))?;
        Ok(n == 1)
    }

    /// Transition `Pending → Cancelled`; no-op on terminal or absent rows.
    pub fn cancel(&self, id: &str) -> Result<bool> {
        let n = self
            .lock()?
            .execute(
                "UPDATE delayed_actions SET status = 'cancelled'
                 WHERE id = ?1 AND status = 'pending'",
                [id],
            )
            .map_err(|e| TaskDeckError::Storage(format!("Cancel action: {e}")))?;
        Ok(n == 1)
    }

    /// Fetch a single action by id.
    pub fn get(&self, id: &str) -> Result<Option<DelayedAction>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, kind, payload, fire_at, status, created_at, fired_at
                 FROM delayed_actions WHERE id = ?1",
            )
            .map_err(|e| TaskDeckError::Storage(format!("Prepare get: {e}")))?;

        let mut rows = stmt
            .query_map([id], row_to_action)
            .map_err(|e| TaskDeckError::Storage(format!("Get action: {e}")))?;

        match rows.next() {
            Some(Ok(action)) => Ok(Some(action)),
            Some(Err(e)) => Err(TaskDeckError::Storage(format!("Read action row: {e}"))),
            None => Ok(None),
        }
    }

    /// Most recently created actions, newest first (audit view).
    pub fn recent(&self, limit: usize) -> Result<Vec<DelayedAction>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, kind, payload, fire_at, status, created_at, fired_at
                 FROM delayed_actions ORDER BY created_at DESC, id LIMIT ?1",
            )
            .map_err(|e| TaskDeckError::Storage(format!("Prepare recent: {e}")))?;

        let rows = stmt
            .query_map([limit as i64], row_to_action)
            .map_err(|e| TaskDeckError::Storage(format!("Recent query: {e}")))?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| TaskDeckError::Storage(format!("Read recent rows: {e}")))
    }
}

fn row_to_action(row: &Row<'_>) -> rusqlite::Result<DelayedAction> {
    let payload_str: String = row.get(2)?;
    let fired_at_str: Option<String> = row.get(6)?;
    Ok(DelayedAction {
        id: row.get(0)?,
        kind: row.get(1)?,
        payload: serde_json::from_str(&payload_str).unwrap_or_default(),
        fire_at: parse_ts(&row.get::<_, String>(3)?),
        status: ActionStatus::parse(&row.get::<_, String>(4)?),
        created_at: parse_ts(&row.get::<_, String>(5)?),
        fired_at: fired_at_str.as_deref().map(parse_ts),
    })
}
