//! Component seams. The workflow and scheduler are constructed against
//! these traits so the task database and mail transport can be swapped
//! out (and faked in tests).

use async_trait::async_trait;

use crate::error::Result;
use crate::types::TaskSnapshot;

/// Read-only view into the project-management database.
///
/// Returns `Ok(None)` when the task does not exist — deletion between two
/// reads is a normal outcome, not an error.
pub trait TaskDirectory: Send + Sync {
    fn get_task(&self, id: &str) -> Result<Option<TaskSnapshot>>;
}

/// Outbound notification sender. Stateless: exactly one message per call,
/// no internal retries, no idempotence guarantee — callers needing
/// at-most-once delivery must call it at most once per logical event.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()>;
}
