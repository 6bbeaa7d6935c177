//! Conversation state module
//!
//! The flow engine, the per-user contexts it advances, the in-memory storage
//! holding them and the inactivity supervisor that reaps abandoned ones.

pub mod context;
pub mod machine;
pub mod storage;
pub mod supervisor;

pub use context::{AdminStep, ConversationContext, FlowState, Step};
pub use machine::{Action, Applied, FlowEngine, Prompt, Rejection};
pub use storage::StateStorage;
pub use supervisor::InactivitySupervisor;
