//! Application state

use std::sync::Arc;

use arxiv_auth_core::{ClaimsCodec, OidcClient};

use crate::config::Config;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// IdP client for login, refresh and logout
    pub oidc: Arc<OidcClient>,
    /// Session token codec
    pub codec: Arc<ClaimsCodec>,
    /// Application configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Create new application state
    pub fn new(config: Config) -> Self {
        let oidc = OidcClient::new(config.oidc.clone());
        let codec = ClaimsCodec::new(config.jwt_secret.as_bytes());
        Self {
            oidc: Arc::new(oidc),
            codec: Arc::new(codec),
            config: Arc::new(config),
        }
    }

    /// Name of the session cookie
    pub fn cookie_name(&self) -> &str {
        &self.config.session_cookie_name
    }
}
