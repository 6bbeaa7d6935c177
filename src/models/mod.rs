//! Data models module

pub mod user;

pub use user::{RegistrationFields, Role, Route, UserRecord};
