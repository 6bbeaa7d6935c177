//! Database module
//!
//! Connection pooling, migrations and repositories.

pub mod connection;
pub mod repositories;

pub use connection::{create_pool, health_check, run_migrations, DatabasePool};
pub use repositories::UserRepository;
