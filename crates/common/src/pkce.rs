//! PKCE (Proof Key for Code Exchange) implementation for OAuth 2.0
//!
//! Implements RFC 7636 S256 for authorization-code logins without a client
//! secret. The verifier is kept by the caller (session storage) until the
//! token exchange; only the challenge leaves the client during authorization.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Number of random bytes behind a generated verifier (512 bits, 86 chars).
pub const DEFAULT_VERIFIER_BYTES: usize = 64;

/// Minimum verifier length allowed by RFC 7636.
pub const MIN_VERIFIER_LEN: usize = 43;

/// Maximum verifier length allowed by RFC 7636.
pub const MAX_VERIFIER_LEN: usize = 128;

/// The only challenge method this client emits.
pub const CHALLENGE_METHOD: &str = "S256";

/// Errors raised while building PKCE material
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PkceError {
    /// Requested entropy would produce a verifier outside 43..=128 chars
    #[error("verifier of {bytes} random bytes would be {len} chars (allowed 43-128)")]
    InvalidLength {
        /// Requested random byte count
        bytes: usize,
        /// Resulting verifier length
        len: usize,
    },

    /// Verifier contains characters outside the unreserved set
    #[error("verifier contains characters outside [A-Za-z0-9-._~]")]
    InvalidCharacters,
}

/// Generate a cryptographically secure code verifier
///
/// Returns a URL-safe base64 string (no padding) of 64 random bytes.
#[must_use]
pub fn generate_code_verifier() -> String {
    encode_random(DEFAULT_VERIFIER_BYTES)
}

/// Generate a verifier from a caller-chosen amount of entropy
///
/// # Errors
/// Returns [`PkceError::InvalidLength`] when the encoded verifier would fall
/// outside the RFC 7636 bounds. 32 bytes is the smallest accepted value.
pub fn generate_code_verifier_with(bytes: usize) -> Result<String, PkceError> {
    let len = encoded_len(bytes);
    if !(MIN_VERIFIER_LEN..=MAX_VERIFIER_LEN).contains(&len) {
        return Err(PkceError::InvalidLength { bytes, len });
    }
    Ok(encode_random(bytes))
}

/// Generate code challenge from verifier using SHA256
///
/// Per RFC 7636, the challenge is BASE64URL(SHA256(ASCII(code_verifier)))
#[must_use]
pub fn generate_code_challenge(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Check that a challenge was derived from the given verifier
#[must_use]
pub fn verify_code_challenge(verifier: &str, challenge: &str) -> bool {
    generate_code_challenge(verifier) == challenge
}

/// Validate verifier length and alphabet against RFC 7636
///
/// # Errors
/// Returns the first violated constraint.
pub fn validate_code_verifier(verifier: &str) -> Result<(), PkceError> {
    let len = verifier.len();
    if !(MIN_VERIFIER_LEN..=MAX_VERIFIER_LEN).contains(&len) {
        return Err(PkceError::InvalidLength { bytes: 0, len });
    }
    let unreserved =
        |c: char| c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == '_' || c == '~';
    if !verifier.chars().all(unreserved) {
        return Err(PkceError::InvalidCharacters);
    }
    Ok(())
}

fn encode_random(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    URL_SAFE_NO_PAD.encode(buf)
}

// Saturates; any saturated length is far past the upper bound
fn encoded_len(bytes: usize) -> usize {
    bytes.saturating_mul(4).div_ceil(3)
}

/// PKCE verifier/challenge pair for one authorization round-trip
///
/// The verifier is secret until token exchange; the challenge is sent with
/// the authorization request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkcePair {
    /// Random string (base64url, no padding)
    pub code_verifier: String,

    /// SHA256 hash of `code_verifier` (base64url encoded)
    pub code_challenge: String,
}

impl PkcePair {
    /// Generate a new pair with a fresh 512-bit verifier
    ///
    /// # Examples
    /// ```
    /// use authlab_common::pkce::PkcePair;
    ///
    /// let pair = PkcePair::generate();
    /// assert!(pair.code_verifier.len() >= 43);
    /// assert!(pair.code_verifier.len() <= 128);
    /// ```
    #[must_use]
    pub fn generate() -> Self {
        Self::from_verifier(generate_code_verifier())
    }

    /// Build a pair around an existing verifier (e.g. one read back from
    /// storage for display)
    #[must_use]
    pub fn from_verifier(code_verifier: String) -> Self {
        let code_challenge = generate_code_challenge(&code_verifier);
        Self { code_verifier, code_challenge }
    }

    /// Get the challenge method (always "S256")
    #[must_use]
    pub fn challenge_method(&self) -> &'static str {
        CHALLENGE_METHOD
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for pkce.
    use super::*;

    /// Validates `PkcePair::generate` behavior for the generate pkce pair
    /// scenario.
    ///
    /// Assertions:
    /// - Ensures the verifier length sits inside the RFC 7636 bounds.
    /// - Ensures the verifier carries at least 256 bits (43 chars).
    #[test]
    fn test_generate_pkce_pair() {
        let pair = PkcePair::generate();

        assert_eq!(pair.code_verifier.len(), 86);
        assert!(validate_code_verifier(&pair.code_verifier).is_ok());
        assert!(!pair.code_challenge.is_empty());
    }

    #[test]
    fn test_unique_pairs() {
        let first = PkcePair::generate();
        let second = PkcePair::generate();

        assert_ne!(first.code_verifier, second.code_verifier);
        assert_ne!(first.code_challenge, second.code_challenge);
    }

    /// Validates the RFC 7636 appendix B example vector.
    ///
    /// Assertions:
    /// - Confirms the challenge equals the published S256 value.
    #[test]
    fn test_rfc7636_vector() {
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        assert_eq!(generate_code_challenge(verifier), "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
        assert!(verify_code_challenge(verifier, "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"));
        assert!(!verify_code_challenge(verifier, "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cN"));
    }

    #[test]
    fn test_base64url_encoding() {
        let pair = PkcePair::generate();

        for value in [&pair.code_verifier, &pair.code_challenge] {
            assert!(!value.contains('='));
            assert!(!value.contains('+'));
            assert!(!value.contains('/'));
        }
    }

    #[test]
    fn test_verifier_length_bounds() {
        assert!(generate_code_verifier_with(32).is_ok());
        assert!(generate_code_verifier_with(96).is_ok());
        assert_eq!(
            generate_code_verifier_with(16),
            Err(PkceError::InvalidLength { bytes: 16, len: 22 })
        );
        assert!(matches!(
            generate_code_verifier_with(97),
            Err(PkceError::InvalidLength { .. })
        ));
        assert!(matches!(
            generate_code_verifier_with(usize::MAX),
            Err(PkceError::InvalidLength { bytes: usize::MAX, .. })
        ));
    }

    #[test]
    fn test_validate_rejects_reserved_characters() {
        let verifier = format!("{}+", "a".repeat(50));
        assert_eq!(validate_code_verifier(&verifier), Err(PkceError::InvalidCharacters));
    }

    #[test]
    fn test_from_verifier_is_deterministic() {
        let pair = PkcePair::generate();
        let rebuilt = PkcePair::from_verifier(pair.code_verifier.clone());

        assert_eq!(pair, rebuilt);
        assert_eq!(rebuilt.challenge_method(), "S256");
    }
}
