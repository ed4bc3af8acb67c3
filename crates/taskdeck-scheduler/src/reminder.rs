//! Task reminder workflow — immediate assignment email plus a durable
//! due-date recheck.
//!
//! The workflow itself is stateless between assignment and fire time: the
//! only persisted state is the `Pending` row in the action store. At fire
//! time the task is re-read from the directory — title, assignee, and
//! completion state may all have changed since assignment, and the latest
//! values always win.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use taskdeck_core::error::{Result, TaskDeckError};
use taskdeck_core::traits::{Notifier, TaskDirectory};
use taskdeck_core::types::{TaskAssigned, TaskSnapshot, TaskState};

use crate::engine::ActionHandler;
use crate::store::{ActionStore, DelayedAction};

/// Action kind registered for due-date rechecks.
pub const TASK_DUE_RECHECK: &str = "task-due-recheck";

/// Orchestrates the assignment notification and schedules the recheck.
pub struct ReminderWorkflow {
    directory: Arc<dyn TaskDirectory>,
    notifier: Arc<dyn Notifier>,
    store: Arc<ActionStore>,
}

impl ReminderWorkflow {
    pub fn new(
        directory: Arc<dyn TaskDirectory>,
        notifier: Arc<dyn Notifier>,
        store: Arc<ActionStore>,
    ) -> Self {
        Self {
            directory,
            notifier,
            store,
        }
    }

    /// Entry point for a task-assignment event.
    ///
    /// A delivery failure on the immediate email propagates to the caller.
    /// A storage failure while scheduling the recheck is logged and
    /// swallowed: the assignment email already went out, and the
    /// triggering request must not fail over a missing reminder.
    pub async fn on_task_assigned(&self, event: &TaskAssigned) -> Result<()> {
        let Some(task) = self.directory.get_task(&event.task_id)? else {
            tracing::debug!("Task {} vanished before assignment notice", event.task_id);
            return Ok(());
        };

        let (subject, body) = assignment_email(&task, &event.origin);
        self.notifier.send(&task.assignee_email, &subject, &body).await?;

        let Some(due) = task.due_date else {
            return Ok(());
        };
        if due <= Utc::now() {
            return Ok(());
        }

        let payload = json!({ "task_id": event.task_id, "origin": event.origin });
        match self.store.enqueue(TASK_DUE_RECHECK, payload, due) {
            Ok(id) => tracing::info!("📌 Due recheck queued for task {} ({id})", event.task_id),
            Err(e) => tracing::warn!(
                "⚠️ Could not queue due recheck for task {}: {e}",
                event.task_id
            ),
        }
        Ok(())
    }
}

/// Fire-time handler: re-reads the task and reminds only if still open.
pub struct DueRecheckHandler {
    directory: Arc<dyn TaskDirectory>,
    notifier: Arc<dyn Notifier>,
}

impl DueRecheckHandler {
    pub fn new(directory: Arc<dyn TaskDirectory>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            directory,
            notifier,
        }
    }
}

#[async_trait]
impl ActionHandler for DueRecheckHandler {
    async fn handle(&self, action: &DelayedAction) -> Result<()> {
        let task_id = action.payload["task_id"].as_str().ok_or_else(|| {
            TaskDeckError::Validation("recheck payload missing task_id".into())
        })?;
        let origin = action.payload["origin"].as_str().unwrap_or("");

        let Some(task) = self.directory.get_task(task_id)? else {
            tracing::info!("Task {task_id} deleted before due recheck — skipping");
            return Ok(());
        };
        if task.state == TaskState::Done {
            tracing::info!("Task {task_id} completed before its due date, no reminder");
            return Ok(());
        }

        let (subject, body) = reminder_email(&task, origin);
        self.notifier.send(&task.assignee_email, &subject, &body).await
    }
}

fn task_link(origin: &str, task_id: &str) -> String {
    format!("{}/tasks/{}", origin.trim_end_matches('/'), task_id)
}

fn assignment_email(task: &TaskSnapshot, origin: &str) -> (String, String) {
    let subject = format!("New task assigned: {}", task.title);
    let due_line = match task.due_date {
        Some(due) => format!("Due: {}", due.format("%Y-%m-%d %H:%M UTC")),
        None => "No due date set".into(),
    };
    let body = format!(
        "Hi {},\n\nYou have been assigned \"{}\" in project {}.\n{}\n\nView the task: {}\n",
        task.assignee_name,
        task.title,
        task.project_name,
        due_line,
        task_link(origin, &task.id),
    );
    (subject, body)
}

fn reminder_email(task: &TaskSnapshot, origin: &str) -> (String, String) {
    let subject = format!("Reminder: \"{}\" is due", task.title);
    let body = format!(
        "Hi {},\n\n\"{}\" in project {} has reached its due date and is still open.\n\nView the task: {}\n",
        task.assignee_name,
        task.title,
        task.project_name,
        task_link(origin, &task.id),
    );
    (subject, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Scheduler;
    use crate::store::ActionStatus;
    use chrono::{DateTime, Duration};
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct MemoryDirectory {
        tasks: Mutex<HashMap<String, TaskSnapshot>>,
    }

    impl MemoryDirectory {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                tasks: Mutex::new(HashMap::new()),
            })
        }

        fn put(&self, task: TaskSnapshot) {
            self.tasks.lock().unwrap().insert(task.id.clone(), task);
        }

        fn remove(&self, id: &str) {
            self.tasks.lock().unwrap().remove(id);
        }
    }

    impl TaskDirectory for MemoryDirectory {
        fn get_task(&self, id: &str) -> Result<Option<TaskSnapshot>> {
            Ok(self.tasks.lock().unwrap().get(id).cloned())
        }
    }

    struct RecordingNotifier {
        sent: Mutex<Vec<(String, String, String)>>,
    }

    impl RecordingNotifier {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
            })
        }

        fn count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push((to.into(), subject.into(), body.into()));
            Ok(())
        }
    }

    struct FailingNotifier;

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn send(&self, _to: &str, _subject: &str, _body: &str) -> Result<()> {
            Err(TaskDeckError::Delivery("relay refused".into()))
        }
    }

    fn snapshot(id: &str, due: Option<DateTime<Utc>>, state: TaskState) -> TaskSnapshot {
        TaskSnapshot {
            id: id.into(),
            title: "Write launch post".into(),
            project_name: "Marketing".into(),
            assignee_name: "Ada".into(),
            assignee_email: "ada@example.com".into(),
            state,
            due_date: due,
        }
    }

    fn open_store(name: &str) -> (Arc<ActionStore>, std::path::PathBuf) {
        let dir = std::env::temp_dir().join(name);
        std::fs::create_dir_all(&dir).ok();
        (
            Arc::new(ActionStore::open(&dir.join("actions.db")).unwrap()),
            dir,
        )
    }

    fn event(task_id: &str) -> TaskAssigned {
        TaskAssigned {
            task_id: task_id.into(),
            origin: "https://deck.example.com".into(),
        }
    }

    #[tokio::test]
    async fn test_assignment_sends_email_and_queues_recheck() {
        let (store, dir) = open_store("taskdeck-wf-test1");
        let directory = MemoryDirectory::new();
        let notifier = RecordingNotifier::new();
        let due = Utc::now() + Duration::days(10);
        directory.put(snapshot("t-1", Some(due), TaskState::Todo));

        let workflow = ReminderWorkflow::new(directory.clone(), notifier.clone(), store.clone());
        workflow.on_task_assigned(&event("t-1")).await.unwrap();

        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "ada@example.com");
        assert!(sent[0].1.contains("Write launch post"));
        assert!(sent[0].2.contains("https://deck.example.com/tasks/t-1"));
        drop(sent);

        let pending = store.recent(10).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].kind, TASK_DUE_RECHECK);
        assert_eq!(pending[0].status, ActionStatus::Pending);
        assert_eq!(pending[0].fire_at.timestamp_millis(), due.timestamp_millis());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_past_due_sends_email_but_skips_recheck() {
        let (store, dir) = open_store("taskdeck-wf-test2");
        let directory = MemoryDirectory::new();
        let notifier = RecordingNotifier::new();
        let due = Utc::now() - Duration::hours(1);
        directory.put(snapshot("t-1", Some(due), TaskState::Todo));

        let workflow = ReminderWorkflow::new(directory.clone(), notifier.clone(), store.clone());
        workflow.on_task_assigned(&event("t-1")).await.unwrap();

        assert_eq!(notifier.count(), 1);
        assert!(store.recent(10).unwrap().is_empty());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_no_due_date_skips_recheck() {
        let (store, dir) = open_store("taskdeck-wf-test3");
        let directory = MemoryDirectory::new();
        let notifier = RecordingNotifier::new();
        directory.put(snapshot("t-1", None, TaskState::Todo));

        let workflow = ReminderWorkflow::new(directory.clone(), notifier.clone(), store.clone());
        workflow.on_task_assigned(&event("t-1")).await.unwrap();

        assert_eq!(notifier.count(), 1);
        assert!(store.recent(10).unwrap().is_empty());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_vanished_task_is_silent_noop() {
        let (store, dir) = open_store("taskdeck-wf-test4");
        let directory = MemoryDirectory::new();
        let notifier = RecordingNotifier::new();

        let workflow = ReminderWorkflow::new(directory.clone(), notifier.clone(), store.clone());
        workflow.on_task_assigned(&event("ghost")).await.unwrap();

        assert_eq!(notifier.count(), 0);
        assert!(store.recent(10).unwrap().is_empty());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_delivery_failure_propagates_to_caller() {
        let (store, dir) = open_store("taskdeck-wf-test5");
        let directory = MemoryDirectory::new();
        directory.put(snapshot("t-1", Some(Utc::now() + Duration::days(1)), TaskState::Todo));

        let workflow =
            ReminderWorkflow::new(directory.clone(), Arc::new(FailingNotifier), store.clone());
        let err = workflow.on_task_assigned(&event("t-1")).await.unwrap_err();
        assert!(matches!(err, TaskDeckError::Delivery(_)));
        // the recheck is never queued when the assignment email fails
        assert!(store.recent(10).unwrap().is_empty());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_recheck_reminds_open_task_with_latest_snapshot() {
        let (store, dir) = open_store("taskdeck-wf-test6");
        let directory = MemoryDirectory::new();
        let notifier = RecordingNotifier::new();
        let due = Utc::now() + Duration::days(10);
        directory.put(snapshot("t-1", Some(due), TaskState::Todo));

        let workflow = ReminderWorkflow::new(directory.clone(), notifier.clone(), store.clone());
        workflow.on_task_assigned(&event("t-1")).await.unwrap();

        // title changes between assignment and fire time
        let mut changed = snapshot("t-1", Some(due), TaskState::InProgress);
        changed.title = "Write and schedule launch post".into();
        directory.put(changed);

        let mut scheduler = Scheduler::new(store.clone(), 1);
        scheduler.register_handler(
            TASK_DUE_RECHECK,
            Arc::new(DueRecheckHandler::new(directory.clone(), notifier.clone())),
        );

        // nothing due yet
        assert_eq!(scheduler.run_cycle(Utc::now()).await.unwrap(), 0);
        // past the due date: exactly one reminder, from the fresh snapshot
        assert_eq!(
            scheduler.run_cycle(due + Duration::seconds(1)).await.unwrap(),
            1
        );

        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert!(sent[1].1.contains("Write and schedule launch post"));
        drop(sent);

        // a later overlapping cycle must not re-send
        assert_eq!(
            scheduler.run_cycle(due + Duration::seconds(2)).await.unwrap(),
            0
        );
        assert_eq!(notifier.count(), 2);
        assert_eq!(store.recent(1).unwrap()[0].status, ActionStatus::Fired);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_recheck_suppressed_when_task_done() {
        let (store, dir) = open_store("taskdeck-wf-test7");
        let directory = MemoryDirectory::new();
        let notifier = RecordingNotifier::new();
        let due = Utc::now() + Duration::days(10);
        directory.put(snapshot("t-1", Some(due), TaskState::Todo));

        let workflow = ReminderWorkflow::new(directory.clone(), notifier.clone(), store.clone());
        workflow.on_task_assigned(&event("t-1")).await.unwrap();

        // completed before the due date — fire-time re-read must suppress
        directory.put(snapshot("t-1", Some(due), TaskState::Done));

        let mut scheduler = Scheduler::new(store.clone(), 1);
        scheduler.register_handler(
            TASK_DUE_RECHECK,
            Arc::new(DueRecheckHandler::new(directory.clone(), notifier.clone())),
        );
        assert_eq!(
            scheduler.run_cycle(due + Duration::seconds(1)).await.unwrap(),
            1
        );

        // only the assignment email; the action is still consumed
        assert_eq!(notifier.count(), 1);
        assert_eq!(store.recent(1).unwrap()[0].status, ActionStatus::Fired);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_recheck_tolerates_deleted_task() {
        let (store, dir) = open_store("taskdeck-wf-test8");
        let directory = MemoryDirectory::new();
        let notifier = RecordingNotifier::new();
        let due = Utc::now() + Duration::days(2);
        directory.put(snapshot("t-1", Some(due), TaskState::Todo));

        let workflow = ReminderWorkflow::new(directory.clone(), notifier.clone(), store.clone());
        workflow.on_task_assigned(&event("t-1")).await.unwrap();

        directory.remove("t-1");

        let handler = DueRecheckHandler::new(directory.clone(), notifier.clone());
        let action = store.recent(1).unwrap().remove(0);
        handler.handle(&action).await.unwrap();

        assert_eq!(notifier.count(), 1);
        std::fs::remove_dir_all(&dir).ok();
    }
}
