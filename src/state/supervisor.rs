//! Inactivity supervisor
//!
//! Every applied action arms a delayed check carrying the activity sequence
//! observed at arm time. When the check fires it clears the context only if
//! the sequence is unchanged, so any later activity disarms all earlier
//! checks without bookkeeping. Stale checks wake up, see a newer sequence and
//! exit; no timer handles are tracked or cancelled.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::services::notification::Notifier;
use super::storage::StateStorage;

#[derive(Clone)]
pub struct InactivitySupervisor {
    storage: StateStorage,
    notifier: Arc<dyn Notifier>,
    idle_timeout: Duration,
}

impl InactivitySupervisor {
    pub fn new(storage: StateStorage, notifier: Arc<dyn Notifier>, idle_timeout: Duration) -> Self {
        Self {
            storage,
            notifier,
            idle_timeout,
        }
    }

    /// Arm an idle check for the activity sequence just observed. Returns the
    /// task handle; production callers drop it, tests await it.
    pub fn watch(&self, user_id: i64, seen_seq: u64) -> JoinHandle<()> {
        let storage = self.storage.clone();
        let notifier = self.notifier.clone();
        let idle_timeout = self.idle_timeout;

        tokio::spawn(async move {
            tokio::time::sleep(idle_timeout).await;

            if storage.clear_if_idle(user_id, seen_seq).await {
                info!(user_id = user_id, "Registration abandoned, context cleared");
                if let Err(e) = notifier.flow_timed_out(user_id).await {
                    warn!(user_id = user_id, error = %e, "Failed to deliver timeout notice");
                }
            }
        })
    }
}

impl std::fmt::Debug for InactivitySupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InactivitySupervisor")
            .field("idle_timeout", &self.idle_timeout)
            .finish_non_exhaustive()
    }
}
