//! Scheduler engine — the polling loop that claims and dispatches due actions.
//!
//! There is no in-memory timer per action: fire times may be months out, so
//! the loop relies on store polling alone and durability across restarts
//! comes for free. Claim (`mark_fired`) happens before execute for every
//! action; a crash in between drops the effect rather than doubling it.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use taskdeck_core::error::Result;
use tokio::sync::Notify;

use crate::store::{ActionStore, DelayedAction};

/// Handles a claimed delayed action.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn handle(&self, action: &DelayedAction) -> Result<()>;
}

/// The delay scheduler — surfaces due actions and dispatches each at most once.
pub struct Scheduler {
    store: Arc<ActionStore>,
    handlers: HashMap<String, Arc<dyn ActionHandler>>,
    poll_interval: std::time::Duration,
    shutdown: Notify,
}

impl Scheduler {
    pub fn new(store: Arc<ActionStore>, poll_interval_secs: u64) -> Self {
        Self {
            store,
            handlers: HashMap::new(),
            poll_interval: std::time::Duration::from_secs(poll_interval_secs.max(1)),
            shutdown: Notify::new(),
        }
    }

    /// Register the handler invoked for actions of the given kind.
    pub fn register_handler(&mut self, kind: &str, handler: Arc<dyn ActionHandler>) {
        tracing::info!("📅 Handler registered for '{kind}'");
        self.handlers.insert(kind.to_string(), handler);
    }

    /// Signal the polling loop to stop after its current cycle.
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }

    /// Run the polling loop. Does not return until [`Scheduler::shutdown`]
    /// is called.
    pub async fn run(&self) {
        tracing::info!(
            "⏰ Scheduler started (check every {}s)",
            self.poll_interval.as_secs()
        );
        let mut interval = tokio::time::interval(self.poll_interval);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.run_cycle(Utc::now()).await {
                        Ok(0) => {}
                        Ok(n) => tracing::info!("🔔 Dispatched {n} due action(s)"),
                        // the next tick is the retry; no tighter backoff needed
                        Err(e) => tracing::warn!("⚠️ Scheduler cycle failed: {e}"),
                    }
                }
                _ = self.shutdown.notified() => {
                    tracing::info!("⏹️ Scheduler stopped");
                    break;
                }
            }
        }
    }

    /// One poll cycle: query due actions, claim each, then execute its
    /// handler. Returns the number of actions claimed.
    ///
    /// A handler failure is logged and the action stays `Fired` — the
    /// effect is considered lost, never retried, and never blocks the
    /// remaining due actions in the cycle.
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> Result<usize> {
        let due = self.store.due_actions(now)?;
        if due.is_empty() {
            return Ok(0);
        }

        let mut claimed = 0;
        for action in &due {
            // claim before execute: losing the claim means another
            // scheduler instance (or an overlapping cycle) owns this one
            if !self.store.mark_fired(&action.id)? {
                continue;
            }
            claimed += 1;

            match self.handlers.get(&action.kind) {
                Some(handler) => {
                    if let Err(e) = handler.handle(action).await {
                        tracing::error!(
                            "❌ Handler failed for '{}' ({}): {e}",
                            action.kind,
                            action.id
                        );
                    }
                }
                None => {
                    tracing::warn!("⚠️ No handler registered for kind '{}'", action.kind);
                }
            }
        }
        Ok(claimed)
    }
}
