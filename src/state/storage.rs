//! In-memory conversation state storage
//!
//! Contexts are volatile by design: a restart drops every in-flight
//! registration, and the durable record store is the single source of truth
//! for anything committed.
//!
//! Two locking layers: a short-held map mutex guarding the context table, and
//! one mutex per user serialising action processing so concurrent updates
//! from the same user apply one at a time.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use super::context::ConversationContext;

#[derive(Debug, Clone, Default)]
pub struct StateStorage {
    contexts: Arc<Mutex<HashMap<i64, ConversationContext>>>,
    user_locks: Arc<Mutex<HashMap<i64, Arc<Mutex<()>>>>>,
}

impl StateStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the per-user processing lock. Held by the caller for the whole
    /// load-apply-save sequence of one action.
    pub async fn lock_user(&self, user_id: i64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.user_locks.lock().await;
            locks.entry(user_id).or_default().clone()
        };
        lock.lock_owned().await
    }

    pub async fn save(&self, ctx: ConversationContext) {
        let mut contexts = self.contexts.lock().await;
        contexts.insert(ctx.user_id, ctx);
    }

    pub async fn load(&self, user_id: i64) -> Option<ConversationContext> {
        let contexts = self.contexts.lock().await;
        contexts.get(&user_id).cloned()
    }

    pub async fn delete(&self, user_id: i64) -> bool {
        let mut contexts = self.contexts.lock().await;
        contexts.remove(&user_id).is_some()
    }

    pub async fn exists(&self, user_id: i64) -> bool {
        let contexts = self.contexts.lock().await;
        contexts.contains_key(&user_id)
    }

    /// Drop the context only if no activity happened since `seen_seq` was
    /// observed. Returns true when the context was actually removed.
    pub async fn clear_if_idle(&self, user_id: i64, seen_seq: u64) -> bool {
        let mut contexts = self.contexts.lock().await;
        match contexts.get(&user_id) {
            Some(ctx) if ctx.activity_seq == seen_seq => {
                contexts.remove(&user_id);
                debug!(user_id = user_id, "Idle conversation context cleared");
                true
            }
            _ => false,
        }
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.contexts.lock().await.len()
    }
}
