//! # AuthLab Infrastructure
//!
//! Infrastructure implementations of core session ports.
//!
//! This crate contains:
//! - Keycloak token endpoint client and resource API transport (reqwest)
//! - File-backed persistent store for the shared browser storage
//! - Configuration loading from environment and files
//! - Tracing subscriber setup
//!
//! ## Architecture
//! - Implements traits defined in `authlab-core`
//! - Depends on `authlab-common` and `authlab-core`
//! - Contains all "impure" code (network, filesystem, process env)

pub mod config;
pub mod errors;
pub mod http;
pub mod logging;
pub mod storage;

// Re-export commonly used items
pub use errors::InfraError;
pub use http::{HttpClient, HttpClientBuilder, KeycloakTokenClient, ReqwestTransport};
pub use logging::{init_tracing, LogFormat};
pub use storage::{browser_with_file_store, FileStore};
