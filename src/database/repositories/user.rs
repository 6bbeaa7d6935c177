//! User repository implementation
//!
//! The single durable store of the system. Every mutation is one bounded
//! statement against one row; the upsert is atomic with respect to concurrent
//! upserts for the same user_id.

use chrono::{DateTime, Utc};
use sqlx::{Pool, Sqlite};
use crate::models::user::{RegistrationFields, Role, Route, UserRecord};
use crate::utils::errors::RideMateError;

const USER_COLUMNS: &str = "user_id, role, name, phone, car_info, route, available, rides_count, \
     banned, subscription_end, passport, payment, price, last_arrival_time";

#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: Pool<Sqlite>,
}

impl UserRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Create the record if absent, else overwrite the registration fields
    /// while preserving route, price, rides and document columns.
    pub async fn upsert_registration(
        &self,
        fields: RegistrationFields,
    ) -> Result<UserRecord, RideMateError> {
        let user = sqlx::query_as::<_, UserRecord>(&format!(
            r#"
            INSERT INTO users (user_id, role, name, phone, car_info, available, subscription_end)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(user_id) DO UPDATE SET
                role = excluded.role,
                name = excluded.name,
                phone = excluded.phone,
                car_info = excluded.car_info,
                available = excluded.available,
                subscription_end = excluded.subscription_end
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(fields.user_id)
        .bind(fields.role)
        .bind(&fields.name)
        .bind(&fields.phone)
        .bind(&fields.car_info)
        .bind(fields.available)
        .bind(fields.subscription_end)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    /// Find user by id
    pub async fn find_by_id(&self, user_id: i64) -> Result<Option<UserRecord>, RideMateError> {
        let user = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE user_id = ?1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Attach document references collected during the approval flow
    pub async fn attach_documents(
        &self,
        user_id: i64,
        passport: &str,
        payment: &str,
    ) -> Result<(), RideMateError> {
        let result = sqlx::query(
            "UPDATE users SET passport = ?2, payment = ?3 WHERE user_id = ?1",
        )
        .bind(user_id)
        .bind(passport)
        .bind(payment)
        .execute(&self.pool)
        .await?;

        self.require_affected(result.rows_affected(), user_id)
    }

    /// Flip the driver's availability flag
    pub async fn set_availability(
        &self,
        user_id: i64,
        available: bool,
    ) -> Result<(), RideMateError> {
        let result = sqlx::query("UPDATE users SET available = ?2 WHERE user_id = ?1")
            .bind(user_id)
            .bind(available)
            .execute(&self.pool)
            .await?;

        self.require_affected(result.rows_affected(), user_id)
    }

    /// Set the route; `arrival` carries the new last_arrival_time when the
    /// route replaces a different previously-set one.
    pub async fn set_route(
        &self,
        user_id: i64,
        route: Route,
        arrival: Option<DateTime<Utc>>,
    ) -> Result<(), RideMateError> {
        let result = match arrival {
            Some(at) => {
                sqlx::query(
                    "UPDATE users SET route = ?2, last_arrival_time = ?3 WHERE user_id = ?1",
                )
                .bind(user_id)
                .bind(route)
                .bind(at)
                .execute(&self.pool)
                .await?
            }
            None => {
                sqlx::query("UPDATE users SET route = ?2 WHERE user_id = ?1")
                    .bind(user_id)
                    .bind(route)
                    .execute(&self.pool)
                    .await?
            }
        };

        self.require_affected(result.rows_affected(), user_id)
    }

    /// Set the driver's per-ride price
    pub async fn set_price(&self, user_id: i64, price: i64) -> Result<(), RideMateError> {
        let result = sqlx::query("UPDATE users SET price = ?2 WHERE user_id = ?1")
            .bind(user_id)
            .bind(price)
            .execute(&self.pool)
            .await?;

        self.require_affected(result.rows_affected(), user_id)
    }

    /// Record one more booked ride for the driver
    pub async fn increment_rides(&self, user_id: i64) -> Result<(), RideMateError> {
        let result =
            sqlx::query("UPDATE users SET rides_count = rides_count + 1 WHERE user_id = ?1")
                .bind(user_id)
                .execute(&self.pool)
                .await?;

        self.require_affected(result.rows_affected(), user_id)
    }

    /// Set the moderation flag
    pub async fn set_banned(&self, user_id: i64, banned: bool) -> Result<(), RideMateError> {
        let result = sqlx::query("UPDATE users SET banned = ?2 WHERE user_id = ?1")
            .bind(user_id)
            .bind(banned)
            .execute(&self.pool)
            .await?;

        self.require_affected(result.rows_affected(), user_id)
    }

    /// Delete the record entirely; used by mid-flow cancellation.
    /// Deleting an absent record is not an error.
    pub async fn delete(&self, user_id: i64) -> Result<bool, RideMateError> {
        let result = sqlx::query("DELETE FROM users WHERE user_id = ?1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// List all users with the given role, in registration order
    pub async fn list_by_role(&self, role: Role) -> Result<Vec<UserRecord>, RideMateError> {
        let users = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE role = ?1 ORDER BY user_id"
        ))
        .bind(role)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    /// Drivers currently matchable on the route: available and priced
    pub async fn list_available_drivers_on_route(
        &self,
        route: Route,
    ) -> Result<Vec<UserRecord>, RideMateError> {
        let drivers = sqlx::query_as::<_, UserRecord>(&format!(
            r#"
            SELECT {USER_COLUMNS} FROM users
            WHERE role = 'driver' AND available = 1 AND route = ?1 AND price IS NOT NULL
            ORDER BY user_id
            "#
        ))
        .bind(route)
        .fetch_all(&self.pool)
        .await?;

        Ok(drivers)
    }

    /// Count total users
    pub async fn count(&self) -> Result<i64, RideMateError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }

    fn require_affected(&self, rows: u64, user_id: i64) -> Result<(), RideMateError> {
        if rows == 0 {
            Err(RideMateError::UserNotFound { user_id })
        } else {
            Ok(())
        }
    }
}
