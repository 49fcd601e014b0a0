//! Configuration types for the OIDC client

use std::time::Duration;

/// Default IdP base URL
pub const DEFAULT_SERVER_URL: &str = "https://openid.arxiv.org";
/// Default Keycloak realm for arXiv users
pub const DEFAULT_REALM: &str = "arxiv";
/// Default registered client ID
pub const DEFAULT_CLIENT_ID: &str = "arxiv-user";
/// Scopes requested when none are configured
pub const DEFAULT_SCOPES: &[&str] = &[
    "openid",
    "basic",
    "profile",
    "email",
    "userid",
    "roles",
    "microprofile-jwt",
];

/// How the `aud` claim of IdP access tokens is checked
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AudiencePolicy {
    /// Do not verify the audience. Keycloak access tokens carry `account`
    /// as audience unless a mapper is configured.
    #[default]
    Skip,
    /// Require one of the listed audiences
    Require(Vec<String>),
}

/// OpenID Connect client configuration
#[derive(Debug, Clone)]
pub struct OidcConfig {
    /// IdP base URL (e.g., https://openid.arxiv.org)
    pub server_url: String,
    /// Keycloak realm
    pub realm: String,
    /// Registered client ID
    pub client_id: String,
    /// Registered client secret, for confidential clients
    pub client_secret: Option<String>,
    /// Callback URL the IdP redirects to with the authorization code
    pub redirect_uri: String,
    /// Requested OAuth2 scopes
    pub scopes: Vec<String>,
    /// Where the IdP sends the browser after logout
    pub post_logout_redirect_uri: Option<String>,
    /// Audience verification for access tokens
    pub audience: AudiencePolicy,
    /// Timeout for the signing key fetch
    pub certs_timeout: Duration,
    /// Timeout for the end-session call
    pub logout_timeout: Duration,
    /// Timeout for token endpoint calls
    pub request_timeout: Duration,
}

impl OidcConfig {
    /// Create a config with arXiv defaults for everything but the callback URL
    pub fn new(redirect_uri: impl Into<String>) -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            realm: DEFAULT_REALM.to_string(),
            client_id: DEFAULT_CLIENT_ID.to_string(),
            client_secret: None,
            redirect_uri: redirect_uri.into(),
            scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
            post_logout_redirect_uri: None,
            audience: AudiencePolicy::Skip,
            certs_timeout: Duration::from_secs(10),
            logout_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Set the IdP base URL
    pub fn with_server_url(mut self, server_url: impl Into<String>) -> Self {
        self.server_url = server_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the realm
    pub fn with_realm(mut self, realm: impl Into<String>) -> Self {
        self.realm = realm.into();
        self
    }

    /// Set the client ID
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    /// Set the client secret
    pub fn with_client_secret(mut self, client_secret: impl Into<String>) -> Self {
        self.client_secret = Some(client_secret.into());
        self
    }

    /// Replace the requested scopes. An empty list falls back to the defaults.
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let scopes: Vec<String> = scopes.into_iter().map(Into::into).collect();
        if !scopes.is_empty() {
            self.scopes = scopes;
        }
        self
    }

    /// Set the post-logout redirect
    pub fn with_post_logout_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.post_logout_redirect_uri = Some(uri.into());
        self
    }

    /// Set the audience policy
    pub fn with_audience(mut self, audience: AudiencePolicy) -> Self {
        self.audience = audience;
        self
    }

    /// Set the signing key fetch timeout
    pub fn with_certs_timeout(mut self, timeout: Duration) -> Self {
        self.certs_timeout = timeout;
        self
    }

    /// Set the logout timeout
    pub fn with_logout_timeout(mut self, timeout: Duration) -> Self {
        self.logout_timeout = timeout;
        self
    }

    /// Base URL of the realm's OpenID Connect endpoints
    pub fn oidc_base(&self) -> String {
        format!(
            "{}/realms/{}/protocol/openid-connect",
            self.server_url, self.realm
        )
    }

    /// Expected `iss` of tokens minted by the realm
    pub fn issuer(&self) -> String {
        format!("{}/realms/{}", self.server_url, self.realm)
    }

    pub fn auth_url(&self) -> String {
        format!("{}/auth", self.oidc_base())
    }

    pub fn token_url(&self) -> String {
        format!("{}/token", self.oidc_base())
    }

    pub fn token_introspect_url(&self) -> String {
        format!("{}/token/introspect", self.oidc_base())
    }

    pub fn certs_url(&self) -> String {
        format!("{}/certs", self.oidc_base())
    }

    pub fn user_info_url(&self) -> String {
        format!("{}/userinfo", self.oidc_base())
    }

    pub fn end_session_url(&self) -> String {
        format!("{}/logout", self.oidc_base())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_urls() {
        let config = OidcConfig::new("https://example.com/callback");
        assert!(config.oidc_base().starts_with("https://openid.arxiv.org"));
        assert!(config.oidc_base().ends_with("openid-connect"));
        assert!(config.auth_url().ends_with("/auth"));
        assert!(config.token_url().ends_with("/token"));
        assert!(config.token_introspect_url().ends_with("/token/introspect"));
        assert!(config.certs_url().ends_with("/certs"));
        assert!(config.user_info_url().ends_with("/userinfo"));
        assert!(config.end_session_url().ends_with("/logout"));
        assert_eq!(config.issuer(), "https://openid.arxiv.org/realms/arxiv");
    }

    #[test]
    fn test_builder_overrides() {
        let config = OidcConfig::new("https://example.com/callback")
            .with_server_url("http://localhost:8080/")
            .with_realm("test")
            .with_client_id("smoke-test")
            .with_scopes(Vec::<String>::new());
        assert_eq!(config.issuer(), "http://localhost:8080/realms/test");
        assert_eq!(config.client_id, "smoke-test");
        assert_eq!(config.scopes.len(), DEFAULT_SCOPES.len());

        let config = config.with_scopes(["openid"]);
        assert_eq!(config.scopes, vec!["openid".to_string()]);
    }
}
