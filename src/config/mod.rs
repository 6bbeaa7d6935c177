//! Configuration management module

pub mod settings;
pub mod validation;

pub use settings::{BotConfig, DatabaseConfig, FlowConfig, LoggingConfig, Settings};
