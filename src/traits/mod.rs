//! Trait definitions for the pluggable parts of the session layer
//!
//! Storage backends, refresh locks and identity providers are injected into
//! the loader through these traits; nothing is held in process-wide state.

pub mod cache;
pub mod lock;
pub mod provider;
pub mod session;
