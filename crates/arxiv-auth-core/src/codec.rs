//! Session token codec
//!
//! The session token is carried in a cookie or header, so it has to stay
//! small. It is six comma-separated parts:
//!
//! ```text
//! <version>,<expiry>,<sub>,<id token>,<refresh token>,<signed payload>
//! ```
//!
//! Only the signed payload (an HMAC-signed JWS over the remaining claims) is
//! trusted. The expiry and subject are there for inspection without a
//! secret; the IdP tokens sit outside the signature to keep the payload
//! small and so a refresh token can still be reached once the payload has
//! expired.

use chrono::{DateTime, SecondsFormat, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde_json::{Map, Value};

use crate::{AuthError, ClaimsModel, ExtraFieldsPolicy};

/// Token format version
pub const TOKEN_VERSION: &str = "5";
/// Delimiter between token parts
pub const TOKEN_DELIMITER: char = ',';
/// Largest token we hand out, in bytes
pub const MAX_TOKEN_LENGTH: usize = 4096;

const PART_COUNT: usize = 6;

/// Claims never put into the signed payload
const UNSIGNED_CLAIMS: &[&str] = &["acc", "idt", "refresh"];

/// The plain parts of a session token, before verification.
///
/// Nothing here may be used for authorization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenParts<'a> {
    pub version: &'a str,
    pub expiry: &'a str,
    pub sub: &'a str,
    pub id_token: Option<&'a str>,
    pub refresh_token: Option<&'a str>,
    pub signed_payload: &'a str,
}

fn non_empty(s: &str) -> Option<&str> {
    (!s.is_empty()).then_some(s)
}

/// Encodes and decodes session tokens with a shared secret
#[derive(Clone)]
pub struct ClaimsCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    extra_fields: ExtraFieldsPolicy,
}

impl ClaimsCodec {
    /// Create a codec signing with HS256
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let secret = secret.as_ref();
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            algorithm: Algorithm::HS256,
            extra_fields: ExtraFieldsPolicy::Ignore,
        }
    }

    /// Sign with another member of the HMAC-SHA family
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Result<Self, AuthError> {
        match algorithm {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
                self.algorithm = algorithm;
                Ok(self)
            }
            other => Err(AuthError::Configuration(format!(
                "session tokens need an HMAC algorithm, got {other:?}"
            ))),
        }
    }

    /// Set how unknown fields in decoded payloads are treated
    pub fn with_extra_fields(mut self, policy: ExtraFieldsPolicy) -> Self {
        self.extra_fields = policy;
        self
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Encode claims into a session token
    pub fn encode(&self, claims: &ClaimsModel) -> Result<String, AuthError> {
        claims.validate()?;
        let mut payload = claims.to_map()?;
        for key in UNSIGNED_CLAIMS {
            payload.remove(*key);
        }

        let signed = encode(&Header::new(self.algorithm), &payload, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("failed to sign claims: {e}")))?;

        let expiry = DateTime::<Utc>::from_timestamp(claims.exp, 0)
            .ok_or_else(|| AuthError::Validation(format!("exp out of range: {}", claims.exp)))?
            .to_rfc3339_opts(SecondsFormat::Secs, false);

        let parts: [(&'static str, &str); PART_COUNT] = [
            ("version", TOKEN_VERSION),
            ("expiry", &expiry),
            ("sub", &claims.sub),
            ("idt", claims.idt.as_deref().unwrap_or_default()),
            ("refresh", claims.refresh.as_deref().unwrap_or_default()),
            ("payload", &signed),
        ];

        if let Some((field, _)) = parts.iter().find(|(_, v)| v.contains(TOKEN_DELIMITER)) {
            return Err(AuthError::DelimiterInToken { field: *field });
        }

        let token = parts
            .iter()
            .map(|(_, v)| *v)
            .collect::<Vec<_>>()
            .join(",");

        if token.len() > MAX_TOKEN_LENGTH {
            return Err(AuthError::TokenTooLarge {
                size: token.len(),
                limit: MAX_TOKEN_LENGTH,
            });
        }

        Ok(token)
    }

    /// Split a token into its plain parts without verifying anything
    pub fn split(token: &str) -> Result<TokenParts<'_>, AuthError> {
        let parts: Vec<&str> = token.split(TOKEN_DELIMITER).collect();
        if parts.len() != PART_COUNT {
            tracing::debug!("Session token has {} parts", parts.len());
            return Err(AuthError::InvalidToken);
        }
        if parts[0] != TOKEN_VERSION {
            tracing::debug!("Session token version {:?} not supported", parts[0]);
            return Err(AuthError::InvalidToken);
        }
        Ok(TokenParts {
            version: parts[0],
            expiry: parts[1],
            sub: parts[2],
            id_token: non_empty(parts[3]),
            refresh_token: non_empty(parts[4]),
            signed_payload: parts[5],
        })
    }

    /// Decode and verify a session token
    pub fn decode(&self, token: &str) -> Result<ClaimsModel, AuthError> {
        self.decode_with(token, true)
    }

    /// Decode a session token whose payload may have expired.
    ///
    /// The signature is still verified. Only for handing the claims to the
    /// IdP refresh, never for authorization.
    pub fn decode_for_refresh(&self, token: &str) -> Result<ClaimsModel, AuthError> {
        self.decode_with(token, false)
    }

    fn decode_with(&self, token: &str, validate_exp: bool) -> Result<ClaimsModel, AuthError> {
        let parts = Self::split(token)?;

        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 0;
        validation.validate_aud = false;
        validation.validate_exp = validate_exp;

        let verified = decode::<Map<String, Value>>(parts.signed_payload, &self.decoding_key, &validation)?;
        let mut payload = verified.claims;

        if payload.get("sub").and_then(Value::as_str) != Some(parts.sub) {
            tracing::debug!("Session token subject does not match its signed payload");
            return Err(AuthError::InvalidToken);
        }

        if let Some(idt) = parts.id_token {
            payload.insert("idt".to_string(), Value::String(idt.to_string()));
        }
        if let Some(refresh) = parts.refresh_token {
            payload.insert("refresh".to_string(), Value::String(refresh.to_string()));
        }

        ClaimsModel::from_map(payload, self.extra_fields).map_err(|e| {
            tracing::debug!("Signed session payload is not a valid claims record: {}", e);
            AuthError::InvalidToken
        })
    }
}

impl std::fmt::Debug for ClaimsCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaimsCodec")
            .field("algorithm", &self.algorithm)
            .field("extra_fields", &self.extra_fields)
            .finish_non_exhaustive()
    }
}
