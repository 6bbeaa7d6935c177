//! Database repositories module

pub mod user;

pub use user::UserRepository;
