//! Domain types shared between the workflow, scheduler, and gateway.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a task row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    Todo,
    InProgress,
    Done,
}

impl TaskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Todo => "TODO",
            TaskState::InProgress => "IN_PROGRESS",
            TaskState::Done => "DONE",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "DONE" => TaskState::Done,
            "IN_PROGRESS" => TaskState::InProgress,
            _ => TaskState::Todo,
        }
    }
}

/// Point-in-time view of a task row.
///
/// The reminder workflow reads one at assignment time and a second one at
/// fire time; the two may disagree (or the task may be gone entirely) and
/// the fire-time snapshot always wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub id: String,
    pub title: String,
    pub project_name: String,
    pub assignee_name: String,
    pub assignee_email: String,
    pub state: TaskState,
    /// Tasks without a due date never get a reminder scheduled.
    pub due_date: Option<DateTime<Utc>>,
}

/// Trigger event delivered by the web/event layer when a task is assigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskAssigned {
    pub task_id: String,
    /// Opaque link base embedded in notification bodies.
    pub origin: String,
}
