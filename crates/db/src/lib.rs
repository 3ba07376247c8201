//! SQLite persistence for conversation state.

pub mod connection;
pub mod migrations;
pub mod store;

pub use connection::{connect, connect_with_settings, DbPool, PoolSettings};
pub use store::{ConversationStore, StoreError, VersionedState};
