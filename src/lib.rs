//! RideMate Telegram Bot
//!
//! A conversational ride-matching bot for intercity trips. Passengers and
//! drivers register through guided chat flows; approved drivers advertise a
//! route and price, passengers query available drivers and book seats.

#![allow(non_snake_case)]

pub mod config;
pub mod database;
pub mod handlers;
pub mod models;
pub mod services;
pub mod state;
pub mod texts;
pub mod utils;

// Re-export commonly used types
pub use config::Settings;
pub use utils::errors::{Result, RideMateError};

// Re-export main components for easy access
pub use services::ServiceFactory;
pub use state::{FlowEngine, InactivitySupervisor, StateStorage};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn info() -> String {
    format!("{} v{}", NAME, VERSION)
}
