//! # AuthLab Domain
//!
//! Data model for the AuthLab session layer.
//!
//! This crate contains:
//! - Session, auth-state, tab-sync and idle types
//! - `AuthLabError` and the `Result` alias
//! - Configuration structures with deployment defaults
//! - Storage key names and timing constants
//!
//! ## Architecture
//! - Depends only on `authlab-common` (error classification)
//! - No I/O, no runtime

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
