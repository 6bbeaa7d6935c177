//! Services module
//!
//! Business logic above the repositories, bundled by `ServiceFactory` for
//! injection into the dispatcher.

pub mod matching;
pub mod notification;
pub mod user;

pub use matching::MatchingService;
pub use notification::{ApprovalRequest, Notifier, TelegramNotifier};
pub use user::UserService;

use std::sync::Arc;
use std::time::Duration;

use crate::config::Settings;
use crate::database::repositories::UserRepository;
use crate::database::DatabasePool;
use crate::state::{FlowEngine, InactivitySupervisor, StateStorage};

/// Everything the handlers need, wired once at startup.
#[derive(Clone)]
pub struct ServiceFactory {
    pub settings: Settings,
    pub users: UserService,
    pub matching: MatchingService,
    pub engine: FlowEngine,
    pub storage: StateStorage,
    pub supervisor: InactivitySupervisor,
    pub notifier: Arc<dyn Notifier>,
}

impl ServiceFactory {
    pub fn new(pool: DatabasePool, settings: Settings, notifier: Arc<dyn Notifier>) -> Self {
        let repository = UserRepository::new(pool);
        let users = UserService::new(repository.clone(), settings.flow.clone());
        let matching = MatchingService::new(repository, notifier.clone());
        let engine = FlowEngine::new(users.clone(), notifier.clone());
        let storage = StateStorage::new();
        let supervisor = InactivitySupervisor::new(
            storage.clone(),
            notifier.clone(),
            Duration::from_secs(settings.flow.idle_timeout_secs),
        );

        Self {
            settings,
            users,
            matching,
            engine,
            storage,
            supervisor,
            notifier,
        }
    }

    pub fn is_admin(&self, user_id: i64) -> bool {
        user_id == self.settings.bot.admin_id
    }
}

impl std::fmt::Debug for ServiceFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceFactory").finish_non_exhaustive()
    }
}
