//! Signing and verification backed by `jsonwebtoken`

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde_json::Value;

use super::{CodecError, CodecResult};

/// Key material for signing or verifying
///
/// `Secret` serves both directions for HMAC. For RSA and EC the private PEM
/// signs and the public PEM verifies.
#[derive(Clone)]
pub enum SigningKey {
    /// Shared secret for HS256/384/512
    Secret(Vec<u8>),
    /// PEM encoded RSA key (RS*/PS*)
    RsaPem(Vec<u8>),
    /// PEM encoded EC key (ES256/ES384)
    EcPem(Vec<u8>),
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Secret(_) => "SigningKey::Secret(<redacted>)",
            Self::RsaPem(_) => "SigningKey::RsaPem(<redacted>)",
            Self::EcPem(_) => "SigningKey::EcPem(<redacted>)",
        })
    }
}

impl SigningKey {
    /// HMAC secret from a string
    #[must_use]
    pub fn secret(secret: impl AsRef<[u8]>) -> Self {
        Self::Secret(secret.as_ref().to_vec())
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Secret(_) => "shared-secret",
            Self::RsaPem(_) => "RSA",
            Self::EcPem(_) => "EC",
        }
    }

    fn accepts(&self, algorithm: Algorithm) -> bool {
        use Algorithm::{ES256, ES384, HS256, HS384, HS512, PS256, PS384, PS512, RS256, RS384, RS512};
        match self {
            Self::Secret(_) => matches!(algorithm, HS256 | HS384 | HS512),
            Self::RsaPem(_) => matches!(algorithm, RS256 | RS384 | RS512 | PS256 | PS384 | PS512),
            Self::EcPem(_) => matches!(algorithm, ES256 | ES384),
        }
    }

    fn check(&self, algorithm: Algorithm) -> CodecResult<()> {
        if self.accepts(algorithm) {
            Ok(())
        } else {
            Err(CodecError::AlgorithmMismatch {
                algorithm: format!("{algorithm:?}"),
                key_kind: self.kind(),
            })
        }
    }

    fn encoding_key(&self) -> CodecResult<EncodingKey> {
        match self {
            Self::Secret(secret) => Ok(EncodingKey::from_secret(secret)),
            Self::RsaPem(pem) => {
                EncodingKey::from_rsa_pem(pem).map_err(|e| CodecError::InvalidKey(e.to_string()))
            }
            Self::EcPem(pem) => {
                EncodingKey::from_ec_pem(pem).map_err(|e| CodecError::InvalidKey(e.to_string()))
            }
        }
    }

    fn decoding_key(&self) -> CodecResult<DecodingKey> {
        match self {
            Self::Secret(secret) => Ok(DecodingKey::from_secret(secret)),
            Self::RsaPem(pem) => {
                DecodingKey::from_rsa_pem(pem).map_err(|e| CodecError::InvalidKey(e.to_string()))
            }
            Self::EcPem(pem) => {
                DecodingKey::from_ec_pem(pem).map_err(|e| CodecError::InvalidKey(e.to_string()))
            }
        }
    }
}

/// Which registered claims [`verify`] enforces besides the signature
#[derive(Debug, Clone, Default)]
pub struct VerifyOptions {
    /// Reject tokens past `exp`
    pub validate_exp: bool,
    /// Required audience, if any
    pub audience: Option<String>,
    /// Required issuer, if any
    pub issuer: Option<String>,
    /// Seconds of clock skew tolerated on `exp`
    pub leeway_secs: u64,
}

/// Sign a claims object
///
/// # Errors
/// Fails when the key does not fit the algorithm or cannot be parsed.
pub fn sign(claims: &Value, algorithm: Algorithm, key: &SigningKey) -> CodecResult<String> {
    key.check(algorithm)?;
    let encoding_key = key.encoding_key()?;
    jsonwebtoken::encode(&Header::new(algorithm), claims, &encoding_key)
        .map_err(|e| CodecError::Sign(e.to_string()))
}

/// Verify a token's signature (and the claims selected in `options`)
///
/// Returns the payload on success.
///
/// # Errors
/// [`CodecError::Verify`] for a bad signature or failed claim check.
pub fn verify(
    token: &str,
    algorithm: Algorithm,
    key: &SigningKey,
    options: &VerifyOptions,
) -> CodecResult<Value> {
    key.check(algorithm)?;
    let decoding_key = key.decoding_key()?;

    let mut validation = Validation::new(algorithm);
    validation.required_spec_claims.clear();
    validation.validate_exp = options.validate_exp;
    validation.leeway = options.leeway_secs;
    match &options.audience {
        Some(aud) => validation.set_audience(&[aud]),
        None => validation.validate_aud = false,
    }
    if let Some(iss) = &options.issuer {
        validation.set_issuer(&[iss]);
    }

    jsonwebtoken::decode::<Value>(token, &decoding_key, &validation)
        .map(|data| data.claims)
        .map_err(|e| CodecError::Verify(e.to_string()))
}
