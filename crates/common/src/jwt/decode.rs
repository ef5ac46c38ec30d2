//! Unverified structural decoding
//!
//! Splits a compact JWS into its three segments and parses header and payload
//! as JSON. Nothing here checks a signature; use [`super::verify`] for that.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use serde_json::Value;

/// base64url that accepts both padded and unpadded segments
const SEGMENT_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// A token split into its parts
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedToken {
    /// JOSE header (`alg`, `typ`, `kid`, ...)
    pub header: Value,
    /// Claims object
    pub payload: Value,
    /// Raw signature segment, still base64url encoded
    pub signature: String,
}

/// Result of a structural decode
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// Token had three segments with JSON header and payload
    Token(DecodedToken),
    /// Token could not be read; `reason` says which step failed
    Undecodable {
        /// Human readable cause
        reason: String,
    },
}

impl Decoded {
    /// Borrow the decoded token, if any
    #[must_use]
    pub fn token(&self) -> Option<&DecodedToken> {
        match self {
            Self::Token(token) => Some(token),
            Self::Undecodable { .. } => None,
        }
    }

    /// Consume into the decoded token, if any
    #[must_use]
    pub fn into_token(self) -> Option<DecodedToken> {
        match self {
            Self::Token(token) => Some(token),
            Self::Undecodable { .. } => None,
        }
    }

    /// Whether the token was readable
    #[must_use]
    pub fn is_decodable(&self) -> bool {
        matches!(self, Self::Token(_))
    }
}

/// Decode a compact token without verifying it
#[must_use]
pub fn decode(token: &str) -> Decoded {
    let parts: Vec<&str> = token.trim().split('.').collect();
    if parts.len() != 3 {
        return undecodable(format!("expected 3 segments, found {}", parts.len()));
    }

    let header = match parse_segment(parts[0]) {
        Ok(value) => value,
        Err(reason) => return undecodable(format!("header: {reason}")),
    };
    let payload = match parse_segment(parts[1]) {
        Ok(value) => value,
        Err(reason) => return undecodable(format!("payload: {reason}")),
    };

    Decoded::Token(DecodedToken { header, payload, signature: parts[2].to_string() })
}

/// Decode and return just the claims object
#[must_use]
pub fn decode_payload(token: &str) -> Option<Value> {
    decode(token).into_token().map(|t| t.payload)
}

fn parse_segment(segment: &str) -> Result<Value, String> {
    let bytes = SEGMENT_ENGINE.decode(segment).map_err(|e| format!("not base64url ({e})"))?;
    let value: Value = serde_json::from_slice(&bytes).map_err(|e| format!("not JSON ({e})"))?;
    if !value.is_object() {
        return Err("not a JSON object".to_string());
    }
    Ok(value)
}

fn undecodable(reason: String) -> Decoded {
    Decoded::Undecodable { reason }
}
