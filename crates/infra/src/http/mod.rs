//! HTTP adapters
//!
//! [`KeycloakTokenClient`] implements the token endpoint port and
//! [`ReqwestTransport`] the resource API port, both over one [`HttpClient`].

mod client;
mod token_client;
mod transport;

pub use client::{HttpClient, HttpClientBuilder};
pub use token_client::KeycloakTokenClient;
pub use transport::ReqwestTransport;
