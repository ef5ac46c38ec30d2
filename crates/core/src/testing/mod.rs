//! Test doubles for the session ports
//!
//! Enabled by the `test-utils` feature for integration tests and available to
//! unit tests inside this crate.

#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::expect_used)]

pub mod fixtures;
pub mod mocks;

pub use fixtures::{access_token, access_token_with, FIXTURE_SECRET};
pub use mocks::{MockHttpTransport, MockTokenEndpoint, RecordingNavigator};
