//! Configuration for the Auth API service.

use arxiv_auth_core::{AudiencePolicy, OidcConfig, DEFAULT_CLIENT_ID, DEFAULT_REALM, DEFAULT_SERVER_URL};
use arxiv_utils::config::{env_var, parse_flag};

/// Default session cookie name
pub const DEFAULT_COOKIE_NAME: &str = "arxiv_oidc_session";

/// Auth API configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub http_port: u16,

    /// OIDC client configuration
    pub oidc: OidcConfig,

    /// Secret for signing session tokens
    pub jwt_secret: String,

    /// Name of the session cookie
    pub session_cookie_name: String,

    /// Mark the session cookie `Secure`
    pub secure_cookie: bool,

    /// Take the client address from `X-Forwarded-For`. Only safe behind a
    /// proxy that overwrites the header.
    pub trust_forwarded_for: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_var)
    }

    /// Load configuration from any key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let http_port = lookup("HTTP_PORT")
            .unwrap_or_else(|| "8080".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("HTTP_PORT"))?;

        let redirect_uri =
            lookup("OIDC_REDIRECT_URI").ok_or(ConfigError::Missing("OIDC_REDIRECT_URI"))?;

        // Session secret (minimum 32 bytes)
        let jwt_secret = lookup("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;
        if jwt_secret.len() < 32 {
            return Err(ConfigError::Invalid("JWT_SECRET must be at least 32 characters"));
        }

        let client_id = lookup("OIDC_CLIENT_ID").unwrap_or_else(|| DEFAULT_CLIENT_ID.to_string());

        let mut oidc = OidcConfig::new(redirect_uri)
            .with_server_url(lookup("KEYCLOAK_SERVER_URL").unwrap_or_else(|| DEFAULT_SERVER_URL.to_string()))
            .with_realm(lookup("OIDC_REALM").unwrap_or_else(|| DEFAULT_REALM.to_string()))
            .with_client_id(client_id.clone());

        if let Some(secret) = lookup("OIDC_CLIENT_SECRET") {
            oidc = oidc.with_client_secret(secret);
        }

        if let Some(scope) = lookup("OIDC_SCOPE") {
            oidc = oidc.with_scopes(
                scope
                    .split(|c: char| c == ',' || c.is_whitespace())
                    .filter(|s| !s.is_empty())
                    .map(str::to_string),
            );
        }

        if let Some(uri) = lookup("OIDC_POST_LOGOUT_URI") {
            oidc = oidc.with_post_logout_redirect_uri(uri);
        }

        let verify_audience = match lookup("OIDC_VERIFY_AUDIENCE") {
            Some(v) => parse_flag(&v).ok_or(ConfigError::Invalid("OIDC_VERIFY_AUDIENCE"))?,
            None => false,
        };
        if verify_audience {
            oidc = oidc.with_audience(AudiencePolicy::Require(vec![client_id]));
        }

        let session_cookie_name =
            lookup("SESSION_COOKIE_NAME").unwrap_or_else(|| DEFAULT_COOKIE_NAME.to_string());

        let secure_cookie = match lookup("SESSION_COOKIE_SECURE") {
            Some(v) => parse_flag(&v).ok_or(ConfigError::Invalid("SESSION_COOKIE_SECURE"))?,
            None => true,
        };

        let trust_forwarded_for = match lookup("TRUST_FORWARDED_FOR") {
            Some(v) => parse_flag(&v).ok_or(ConfigError::Invalid("TRUST_FORWARDED_FOR"))?,
            None => false,
        };

        Ok(Self {
            http_port,
            oidc,
            jwt_secret,
            session_cookie_name,
            secure_cookie,
            trust_forwarded_for,
        })
    }
}

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
