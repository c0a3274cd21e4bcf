//! Error types for SensorLink core
//!
//! Re-exports the unified error type from the sl-error crate.

pub use sl_error::{Result, SensorLinkError};
