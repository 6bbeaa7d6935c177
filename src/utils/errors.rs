//! Error handling for RideMate
//!
//! This module defines the main error types used throughout the application
//! and provides a unified error handling strategy.

use thiserror::Error;

/// Main error type for the RideMate application
#[derive(Error, Debug)]
pub enum RideMateError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Telegram API error: {0}")]
    Telegram(#[from] teloxide::RequestError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("User not found: {user_id}")]
    UserNotFound { user_id: i64 },

    #[error("Passenger {user_id} has no route set")]
    NoRouteSet { user_id: i64 },

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for RideMate operations
pub type Result<T> = std::result::Result<T, RideMateError>;

impl RideMateError {
    /// Check if the error is recoverable by resending the triggering input
    pub fn is_recoverable(&self) -> bool {
        match self {
            RideMateError::Database(_) => true,
            RideMateError::Migration(_) => false,
            RideMateError::Telegram(_) => true,
            RideMateError::Config(_) => false,
            RideMateError::UserNotFound { .. } => false,
            RideMateError::NoRouteSet { .. } => false,
            RideMateError::InvalidStateTransition { .. } => false,
            RideMateError::InvalidInput(_) => false,
            RideMateError::Serialization(_) => false,
            RideMateError::Io(_) => true,
        }
    }
}
