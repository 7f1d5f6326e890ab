//! Session state ownership
//!
//! The controller and the reminder scheduler share one injected `SessionStore`.
//! Tests use `MemorySessionStore` directly; a durable store only has to
//! implement the trait.

mod store;

pub use store::{MemorySessionStore, SessionRef, SessionStore};
