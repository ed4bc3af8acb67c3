//! # TaskDeck Core
//!
//! Shared foundation for the TaskDeck backend: configuration loading,
//! the error taxonomy, domain types, and the traits the scheduler and
//! workflow are wired against.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::TaskDeckConfig;
pub use error::{Result, TaskDeckError};
pub use traits::{Notifier, TaskDirectory};
pub use types::{TaskAssigned, TaskSnapshot, TaskState};
