//! Matching query engine
//!
//! Resolves a passenger's stored route into the list of available drivers on
//! it and records advisory bookings. A booking is a rides counter bump plus a
//! driver notification; it never flips availability or reserves capacity.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::database::repositories::UserRepository;
use crate::models::user::UserRecord;
use crate::services::notification::Notifier;
use crate::utils::errors::{Result, RideMateError};

#[derive(Clone)]
pub struct MatchingService {
    users: UserRepository,
    notifier: Arc<dyn Notifier>,
}

impl MatchingService {
    pub fn new(users: UserRepository, notifier: Arc<dyn Notifier>) -> Self {
        Self { users, notifier }
    }

    async fn require(&self, user_id: i64) -> Result<UserRecord> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or(RideMateError::UserNotFound { user_id })
    }

    /// Drivers currently offering the passenger's stored route: available,
    /// priced and on the same route, in stable id order.
    pub async fn find_drivers(&self, passenger_id: i64) -> Result<Vec<UserRecord>> {
        let passenger = self.require(passenger_id).await?;
        let route = passenger
            .route
            .ok_or(RideMateError::NoRouteSet { user_id: passenger_id })?;

        let drivers = self.users.list_available_drivers_on_route(route).await?;
        debug!(
            user_id = passenger_id,
            route = route.as_str(),
            candidates = drivers.len(),
            "Resolved matching query"
        );
        Ok(drivers)
    }

    /// Record a booking against a driver and notify them. Returns the
    /// driver's name for the passenger-side confirmation. The counter bump is
    /// the booking; a failed notification is logged and not rolled back.
    pub async fn book(&self, passenger_id: i64, driver_id: i64) -> Result<String> {
        let passenger = self.require(passenger_id).await?;
        let driver = self.require(driver_id).await?;

        self.users.increment_rides(driver_id).await?;
        info!(
            user_id = passenger_id,
            driver_id = driver_id,
            "Booking recorded"
        );

        if let Err(e) = self
            .notifier
            .booking_confirmed(driver_id, &passenger.name, &passenger.phone)
            .await
        {
            warn!(driver_id = driver_id, error = %e, "Failed to notify driver of booking");
        }

        Ok(driver.name)
    }
}

impl std::fmt::Debug for MatchingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchingService").finish_non_exhaustive()
    }
}
