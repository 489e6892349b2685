//! In-memory session cache for parsed conversations.
//!
//! Parsed conversations, including their decoded image bytes, are kept in RAM
//! keyed by an opaque session identifier. Two independent policies bound the
//! cache:
//! - memory pressure: [`SessionStore::cleanup`] evicts oldest sessions until the
//!   aggregate size fits the configured budget
//! - age: [`SessionStore::remove_old_sessions`] drops sessions older than the
//!   TTL, driven periodically by [`SessionSweeper`]

pub mod config;
pub mod conversation;
pub mod ids;
pub mod maintenance;
pub mod store;

pub use config::SessionConfig;
pub use conversation::ConversationSession;
pub use ids::SessionId;
pub use maintenance::{SessionSweeper, SweepStats};
pub use store::{EvictionStats, SessionStore, StoreStats};
