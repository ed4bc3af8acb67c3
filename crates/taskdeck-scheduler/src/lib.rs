//! # TaskDeck Scheduler
//!
//! Durable delayed actions with at-most-once dispatch.
//!
//! ## Design
//! - SQLite persistence — a pending action survives restarts, whether it
//!   fires in thirty seconds or in six months
//! - No per-action timers — the engine polls the store on a fixed interval,
//!   so memory stays flat and missed wake-ups are harmless
//! - Claim-then-execute — an atomic status transition guards every dispatch,
//!   so an action fires at most once even with racing scheduler instances
//!
//! ## Architecture
//! ```text
//! ReminderWorkflow (task assigned)
//!   ├── Notifier.send → assignment email, immediately
//!   └── ActionStore.enqueue("task-due-recheck", fire_at = due date)
//!
//! Scheduler (tokio interval)
//!   └── each cycle: ActionStore.due_actions(now)
//!         → mark_fired(id)   — the claim; false = someone else won
//!         → ActionHandler.handle(action)
//!              └── DueRecheckHandler: re-read task, remind if still open
//! ```

pub mod engine;
pub mod reminder;
pub mod store;

pub use engine::{ActionHandler, Scheduler};
pub use reminder::{DueRecheckHandler, ReminderWorkflow, TASK_DUE_RECHECK};
pub use store::{ActionStatus, ActionStore, DelayedAction};
