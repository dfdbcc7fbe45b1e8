//! Common types and utilities shared by the table store and the CSV codec.
//!
//! This module provides the crate-wide error type, the text encoding layer
//! (code point decoding/encoding and byte-order marks) and the character
//! literal syntax used by persisted format definitions.

// Submodule declarations
pub mod bom;
pub mod encoding;
pub mod error;
pub mod literal;

// Re-exports for convenience
pub use bom::{detect_bom, strip_bom, write_bom};
pub use encoding::{ByteOrder, TextEncoding};
pub use error::{Error, Result};
