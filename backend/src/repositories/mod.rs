pub mod common;
pub mod memory_session;
pub mod session_store;
pub mod tracking_session;

pub use common::*;
pub use memory_session::MemorySessionStore;
pub use session_store::{bounded, EndedSessionFilter, SessionStore, SessionUpdate, StoreError};
pub use tracking_session::PgSessionStore;

// MockSessionStore is only available in test builds via #[cfg(test)]
#[cfg(test)]
pub use session_store::MockSessionStore;
