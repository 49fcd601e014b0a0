//! Auth errors

use thiserror::Error;

/// Authentication errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Claims are missing required fields or are inconsistent
    #[error("invalid claims: {0}")]
    Validation(String),

    /// Invalid token (malformed, wrong version, bad signature, etc.)
    #[error("invalid token")]
    InvalidToken,

    /// Token signature is valid but the token has expired
    #[error("token expired")]
    TokenExpired,

    /// Encoded token does not fit the cookie budget
    #[error("token too large: {size} bytes exceeds {limit}")]
    TokenTooLarge { size: usize, limit: usize },

    /// A token part contains the wire delimiter
    #[error("token field {field} contains the delimiter")]
    DelimiterInToken { field: &'static str },

    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidToken | Self::TokenExpired => 401,
            Self::Validation(_) => 400,
            Self::TokenTooLarge { .. }
            | Self::DelimiterInToken { .. }
            | Self::Configuration(_)
            | Self::Internal(_) => 500,
        }
    }

    /// Get error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "INVALID_CLAIMS",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::TokenTooLarge { .. } => "TOKEN_TOO_LARGE",
            Self::DelimiterInToken { .. } => "TOKEN_DELIMITER",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the request should be treated as unauthenticated rather than failed
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, Self::InvalidToken | Self::TokenExpired)
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => Self::TokenExpired,
            _ => {
                tracing::debug!("Token rejected: {}", err);
                Self::InvalidToken
            }
        }
    }
}
