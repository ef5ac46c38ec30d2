//! JSON Web Token codec
//!
//! Structural decoding (no signature check), signing and verification via
//! `jsonwebtoken`, and claim normalization for the session layer.
//!
//! Decoding never fails with an error: a token that is not three base64url
//! JSON segments comes back as [`Decoded::Undecodable`] so callers can treat
//! "no readable claims" as an ordinary state.

pub mod claims;
pub mod decode;
pub mod sign;

use thiserror::Error;

use crate::error::{ErrorClassification, ErrorSeverity};

pub use jsonwebtoken::Algorithm;

pub use claims::{expiry_of, ClaimChecks, ClaimReport, NormalizedClaims};
pub use decode::{decode, decode_payload, Decoded, DecodedToken};
pub use sign::{sign, verify, SigningKey, VerifyOptions};

/// Errors raised by the signing half of the codec
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Key material could not be parsed
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Algorithm does not match the key family
    #[error("algorithm {algorithm} cannot be used with a {key_kind} key")]
    AlgorithmMismatch {
        /// Requested algorithm
        algorithm: String,
        /// Supplied key family
        key_kind: &'static str,
    },

    /// Signing failed inside the JWT library
    #[error("signing failed: {0}")]
    Sign(String),

    /// Signature or registered-claim validation failed
    #[error("verification failed: {0}")]
    Verify(String),
}

/// Codec result type
pub type CodecResult<T> = Result<T, CodecError>;

impl ErrorClassification for CodecError {
    fn is_retryable(&self) -> bool {
        false
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Verify(_) => ErrorSeverity::Warning,
            _ => ErrorSeverity::Error,
        }
    }
}
