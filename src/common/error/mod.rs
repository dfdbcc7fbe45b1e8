//! Unified error types for csvtable.

// Submodule declarations
pub mod types;

// Re-exports
pub use types::{Error, Result};
