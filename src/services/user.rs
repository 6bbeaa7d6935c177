//! User service implementation
//!
//! Record-commit logic above the user repository: registration commits for
//! both roles, the route/arrival-time rule, pricing, availability toggling
//! and moderation.

use chrono::{Duration, Utc};
use tracing::{debug, info, warn};

use crate::config::FlowConfig;
use crate::database::repositories::UserRepository;
use crate::models::user::{RegistrationFields, Role, Route, UserRecord};
use crate::utils::errors::{Result, RideMateError};

#[derive(Debug, Clone)]
pub struct UserService {
    users: UserRepository,
    flow: FlowConfig,
}

impl UserService {
    pub fn new(users: UserRepository, flow: FlowConfig) -> Self {
        Self { users, flow }
    }

    /// Commit a passenger record as soon as name and phone are known.
    pub async fn register_passenger(
        &self,
        user_id: i64,
        name: &str,
        phone: &str,
    ) -> Result<UserRecord> {
        debug!(user_id = user_id, "Committing passenger record");

        let record = self
            .users
            .upsert_registration(RegistrationFields {
                user_id,
                role: Role::Passenger,
                name: name.to_string(),
                phone: phone.to_string(),
                car_info: None,
                available: false,
                subscription_end: None,
            })
            .await?;

        info!(user_id = user_id, "Passenger registered");
        Ok(record)
    }

    /// Commit a driver record once the payment proof arrives. The driver
    /// stays unavailable until the operator approves the application.
    pub async fn register_driver(
        &self,
        user_id: i64,
        name: &str,
        phone: &str,
        car_info: &str,
        passport: &str,
        payment: &str,
    ) -> Result<UserRecord> {
        debug!(user_id = user_id, "Committing driver record pending approval");

        let subscription_end = Utc::now() + Duration::days(self.flow.subscription_days);
        let record = self
            .users
            .upsert_registration(RegistrationFields {
                user_id,
                role: Role::Driver,
                name: name.to_string(),
                phone: phone.to_string(),
                car_info: Some(car_info.to_string()),
                available: false,
                subscription_end: Some(subscription_end),
            })
            .await?;
        self.users.attach_documents(user_id, passport, payment).await?;

        info!(user_id = user_id, "Driver registered, awaiting approval");
        Ok(record)
    }

    pub async fn find(&self, user_id: i64) -> Result<Option<UserRecord>> {
        self.users.find_by_id(user_id).await
    }

    pub async fn require(&self, user_id: i64) -> Result<UserRecord> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or(RideMateError::UserNotFound { user_id })
    }

    /// Set the user's route. For a driver replacing a different, previously
    /// set route this also stamps `last_arrival_time` — the driver has just
    /// arrived at the new route's starting endpoint.
    pub async fn set_route(&self, user_id: i64, route: Route) -> Result<()> {
        let record = self.require(user_id).await?;

        let arrival = match (record.role, record.route) {
            (Role::Driver, Some(current)) if current != route => Some(Utc::now()),
            _ => None,
        };
        if arrival.is_some() {
            info!(user_id = user_id, route = route.as_str(), "Driver changed route, stamping arrival time");
        }

        self.users.set_route(user_id, route, arrival).await
    }

    /// Set the driver's per-ride price. Validation happens in the
    /// conversation flow; the store never sees a non-positive price.
    pub async fn set_price(&self, user_id: i64, price: i64) -> Result<()> {
        debug_assert!(price > 0);
        self.users.set_price(user_id, price).await
    }

    pub async fn set_availability(&self, user_id: i64, available: bool) -> Result<()> {
        info!(user_id = user_id, available = available, "Setting driver availability");
        self.users.set_availability(user_id, available).await
    }

    /// Operator action: flip a driver's availability, returning the new state.
    pub async fn toggle_driver_availability(&self, user_id: i64) -> Result<bool> {
        let record = self.require(user_id).await?;
        if record.role != Role::Driver {
            return Err(RideMateError::UserNotFound { user_id });
        }

        let next = !record.available;
        self.users.set_availability(user_id, next).await?;
        info!(user_id = user_id, available = next, "Operator toggled driver availability");
        Ok(next)
    }

    /// Operator action: ban a user.
    pub async fn ban(&self, user_id: i64, admin_id: i64) -> Result<()> {
        self.users.set_banned(user_id, true).await?;
        warn!(user_id = user_id, admin_id = admin_id, "User banned");
        Ok(())
    }

    /// Delete the user's record; used by mid-flow cancellation and rejection.
    pub async fn delete(&self, user_id: i64) -> Result<bool> {
        self.users.delete(user_id).await
    }

    pub async fn list_by_role(&self, role: Role) -> Result<Vec<UserRecord>> {
        self.users.list_by_role(role).await
    }

    /// A record counts as a completed registration once the role's terminal
    /// commit has happened: price for drivers, route for passengers.
    pub fn is_registration_complete(record: &UserRecord) -> bool {
        match record.role {
            Role::Driver => record.price.is_some(),
            Role::Passenger => record.route.is_some(),
        }
    }
}
