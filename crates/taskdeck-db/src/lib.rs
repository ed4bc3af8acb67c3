//! # TaskDeck Project Database
//!
//! SQLite-backed task rows — the slice of the relational store the
//! reminder workflow reads. Rows arrive through idempotent upserts so the
//! mirroring layer upstream can deliver create/update events out of order.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use taskdeck_core::error::{Result, TaskDeckError};
use taskdeck_core::traits::TaskDirectory;
use taskdeck_core::types::{TaskSnapshot, TaskState};

/// Project database — persistent task storage.
pub struct ProjectDb {
    conn: Mutex<Connection>,
}

impl ProjectDb {
    /// Open or create the project database.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)
            .map_err(|e| TaskDeckError::Storage(format!("Project DB open: {e}")))?;

        // WAL mode for concurrent reads from the scheduler and the gateway
        conn.execute_batch("PRAGMA journal_mode=WAL;").ok();

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    /// Run schema migrations.
    fn migrate(&self) -> Result<()> {
        self.lock()?
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS tasks (
                    id TEXT PRIMARY KEY,
                    title TEXT NOT NULL,
                    project_name TEXT NOT NULL DEFAULT '',
                    assignee_name TEXT NOT NULL DEFAULT '',
                    assignee_email TEXT NOT NULL DEFAULT '',
                    state TEXT NOT NULL DEFAULT 'TODO',
                    due_date TEXT,
                    updated_at TEXT NOT NULL
                );",
            )
            .map_err(|e| TaskDeckError::Storage(format!("Migration: {e}")))?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| TaskDeckError::Storage(format!("DB lock poisoned: {e}")))
    }

    /// Insert or replace a task row. Idempotent: replaying the same
    /// snapshot leaves the table unchanged.
    pub fn upsert_task(&self, task: &TaskSnapshot) -> Result<()> {
        self.lock()?
            .execute(
                "INSERT OR REPLACE INTO tasks
                 (id, title, project_name, assignee_name, assignee_email, state, due_date, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    task.id,
                    task.title,
                    task.project_name,
                    task.assignee_name,
                    task.assignee_email,
                    task.state.as_str(),
                    task.due_date.map(|d| d.to_rfc3339()),
                    Utc::now().to_rfc3339(),
                ],
            )
            .map_err(|e| TaskDeckError::Storage(format!("Upsert task: {e}")))?;
        tracing::debug!("💾 Task upserted: {}", task.id);
        Ok(())
    }

    /// Update a task's lifecycle state. Returns `false` if the row is absent.
    pub fn set_task_state(&self, id: &str, state: TaskState) -> Result<bool> {
        let n = self
            .lock()?
            .execute(
                "UPDATE tasks SET state = ?2, updated_at = ?3 WHERE id = ?1",
                params![id, state.as_str(), Utc::now().to_rfc3339()],
            )
            .map_err(|e| TaskDeckError::Storage(format!("Set task state: {e}")))?;
        Ok(n == 1)
    }

    /// Delete a task row. Returns `false` if the row is absent.
    pub fn delete_task(&self, id: &str) -> Result<bool> {
        let n = self
            .lock()?
            .execute("DELETE FROM tasks WHERE id = ?1", [id])
            .map_err(|e| TaskDeckError::Storage(format!("Delete task: {e}")))?;
        Ok(n == 1)
    }

    fn query_task(&self, id: &str) -> Result<Option<TaskSnapshot>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, title, project_name, assignee_name, assignee_email, state, due_date
                 FROM tasks WHERE id = ?1",
            )
            .map_err(|e| TaskDeckError::Storage(format!("Prepare: {e}")))?;

        let mut rows = stmt
            .query_map([id], |row| {
                let due_date_str: Option<String> = row.get(6)?;
                Ok(TaskSnapshot {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    project_name: row.get(2)?,
                    assignee_name: row.get(3)?,
                    assignee_email: row.get(4)?,
                    state: TaskState::parse(&row.get::<_, String>(5)?),
                    due_date: due_date_str
                        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                        .map(|d| d.with_timezone(&Utc)),
                })
            })
            .map_err(|e| TaskDeckError::Storage(format!("Query task: {e}")))?;

        match rows.next() {
            Some(Ok(task)) => Ok(Some(task)),
            Some(Err(e)) => Err(TaskDeckError::Storage(format!("Read task row: {e}"))),
            None => Ok(None),
        }
    }
}

impl TaskDirectory for ProjectDb {
    fn get_task(&self, id: &str) -> Result<Option<TaskSnapshot>> {
        self.query_task(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample(id: &str) -> TaskSnapshot {
        TaskSnapshot {
            id: id.into(),
            title: "Ship the release notes".into(),
            project_name: "Website".into(),
            assignee_name: "Ada".into(),
            assignee_email: "ada@example.com".into(),
            state: TaskState::Todo,
            due_date: Some(Utc::now() + Duration::days(3)),
        }
    }

    #[test]
    fn test_upsert_and_get() {
        let dir = std::env::temp_dir().join("taskdeck-db-test1");
        std::fs::create_dir_all(&dir).ok();
        let db = ProjectDb::open(&dir.join("tasks.db")).unwrap();

        let task = sample("t-1");
        db.upsert_task(&task).unwrap();

        let loaded = db.get_task("t-1").unwrap().unwrap();
        assert_eq!(loaded.title, task.title);
        assert_eq!(loaded.state, TaskState::Todo);
        assert_eq!(
            loaded.due_date.unwrap().timestamp(),
            task.due_date.unwrap().timestamp()
        );
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let dir = std::env::temp_dir().join("taskdeck-db-test2");
        std::fs::create_dir_all(&dir).ok();
        let db = ProjectDb::open(&dir.join("tasks.db")).unwrap();

        let mut task = sample("t-1");
        db.upsert_task(&task).unwrap();
        task.title = "Ship the release notes (v2)".into();
        db.upsert_task(&task).unwrap();

        let loaded = db.get_task("t-1").unwrap().unwrap();
        assert_eq!(loaded.title, "Ship the release notes (v2)");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_missing_task_is_none() {
        let dir = std::env::temp_dir().join("taskdeck-db-test3");
        std::fs::create_dir_all(&dir).ok();
        let db = ProjectDb::open(&dir.join("tasks.db")).unwrap();

        assert!(db.get_task("nope").unwrap().is_none());
        assert!(!db.set_task_state("nope", TaskState::Done).unwrap());
        assert!(!db.delete_task("nope").unwrap());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_state_transition_and_delete() {
        let dir = std::env::temp_dir().join("taskdeck-db-test4");
        std::fs::create_dir_all(&dir).ok();
        let db = ProjectDb::open(&dir.join("tasks.db")).unwrap();

        db.upsert_task(&sample("t-1")).unwrap();
        assert!(db.set_task_state("t-1", TaskState::Done).unwrap());
        assert_eq!(db.get_task("t-1").unwrap().unwrap().state, TaskState::Done);

        assert!(db.delete_task("t-1").unwrap());
        assert!(db.get_task("t-1").unwrap().is_none());
        std::fs::remove_dir_all(&dir).ok();
    }
}
