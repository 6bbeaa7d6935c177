//! Command handlers module

pub mod admin;
pub mod cancel;
pub mod help;
pub mod start;
