//! Shared test infrastructure
//!
//! In-memory database wiring plus a recording notifier standing in for the
//! Telegram transport.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use RideMate::config::Settings;
use RideMate::database::connection::{create_pool, run_migrations, DatabaseConfig};
use RideMate::services::{ApprovalRequest, Notifier, ServiceFactory};
use RideMate::utils::errors::{Result, RideMateError};

/// Notifier that records every call instead of talking to Telegram.
#[derive(Debug, Default)]
pub struct MockNotifier {
    pub approvals: Mutex<Vec<ApprovalRequest>>,
    /// (driver_id, passenger_name, passenger_phone)
    pub bookings: Mutex<Vec<(i64, String, String)>>,
    pub timeouts: Mutex<Vec<i64>>,
    /// When set, booking notifications fail
    pub fail_bookings: AtomicBool,
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn approval_requested(&self, request: &ApprovalRequest) -> Result<()> {
        self.approvals.lock().await.push(request.clone());
        Ok(())
    }

    async fn booking_confirmed(
        &self,
        driver_id: i64,
        passenger_name: &str,
        passenger_phone: &str,
    ) -> Result<()> {
        if self.fail_bookings.load(Ordering::SeqCst) {
            return Err(RideMateError::Config("notification channel down".to_string()));
        }
        self.bookings.lock().await.push((
            driver_id,
            passenger_name.to_string(),
            passenger_phone.to_string(),
        ));
        Ok(())
    }

    async fn flow_timed_out(&self, user_id: i64) -> Result<()> {
        self.timeouts.lock().await.push(user_id);
        Ok(())
    }
}

/// Fully wired service stack over a fresh in-memory database.
pub async fn test_services() -> (ServiceFactory, Arc<MockNotifier>) {
    let config = DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
        acquire_timeout: Duration::from_secs(5),
    };
    let pool = create_pool(&config).await.expect("pool");
    run_migrations(&pool).await.expect("migrations");

    let settings = Settings::default();
    let notifier = Arc::new(MockNotifier::default());
    let services = ServiceFactory::new(pool, settings, notifier.clone());
    (services, notifier)
}
