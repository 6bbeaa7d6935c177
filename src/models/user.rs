//! User record model
//!
//! One durable row per Telegram user. Drivers and passengers share the table;
//! role-specific columns are nullable for the other role.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

/// Which side of a match the user is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Driver,
    Passenger,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Driver => "driver",
            Role::Passenger => "passenger",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "driver" => Ok(Role::Driver),
            "passenger" => Ok(Role::Passenger),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// One of the two fixed directions between the endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Route {
    TashkentNukus,
    NukusTashkent,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::TashkentNukus => "tashkent_nukus",
            Route::NukusTashkent => "nukus_tashkent",
        }
    }

    /// Human-readable label shown in chat
    pub fn label(&self) -> &'static str {
        match self {
            Route::TashkentNukus => "Tashkent ➡️ Nukus",
            Route::NukusTashkent => "Nukus ➡️ Tashkent",
        }
    }

    pub fn all() -> [Route; 2] {
        [Route::TashkentNukus, Route::NukusTashkent]
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Route {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tashkent_nukus" => Ok(Route::TashkentNukus),
            "nukus_tashkent" => Ok(Route::NukusTashkent),
            other => Err(format!("unknown route: {other}")),
        }
    }
}

/// Durable per-user record, keyed by the Telegram user id
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserRecord {
    pub user_id: i64,
    pub role: Role,
    pub name: String,
    pub phone: String,
    pub car_info: Option<String>,
    pub route: Option<Route>,
    pub available: bool,
    pub rides_count: i64,
    pub banned: bool,
    pub subscription_end: Option<DateTime<Utc>>,
    pub passport: Option<String>,
    pub payment: Option<String>,
    pub price: Option<i64>,
    pub last_arrival_time: Option<DateTime<Utc>>,
}

/// Fields for the registration upsert; absent fields are preserved on conflict
#[derive(Debug, Clone)]
pub struct RegistrationFields {
    pub user_id: i64,
    pub role: Role,
    pub name: String,
    pub phone: String,
    pub car_info: Option<String>,
    pub available: bool,
    pub subscription_end: Option<DateTime<Utc>>,
}
