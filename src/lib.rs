//! Real-time delivery and presence-routing core of a two-party
//! direct-messaging service.
//!
//! Messages are persisted to a SQLite store, then routed best-effort to the
//! recipient's single live connection tracked in an in-process presence
//! registry. Clients keep a reconnect-safe subscription to the conversation
//! they have open and re-fetch history when switching.

pub mod assets;
pub mod config;
pub mod delivery;
pub mod error;
pub mod message;
pub mod presence;
pub mod server;
pub mod sidebar;
pub mod store;
pub mod subscription;
pub mod user;
