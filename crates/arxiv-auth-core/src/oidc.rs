//! OpenID Connect IdP client
//!
//! Implemented against Keycloak. Every call that touches the network returns
//! `Option` or `bool`: a failed login or logout sends the user back to the
//! login page, it is never an error for the caller to handle.

use std::fmt;
use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{ArxivUserClaims, AudiencePolicy, AuthError, OidcConfig};

/// Allowed clock skew when checking `iat`
const IAT_LEEWAY_SECS: i64 = 60;

/// Token endpoint response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdpToken {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_expires_in: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_state: Option<String>,
}

impl IdpToken {
    pub fn to_map(&self) -> Result<Map<String, Value>, AuthError> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(AuthError::Internal("token response is not an object".to_string())),
            Err(e) => Err(AuthError::Internal(e.to_string())),
        }
    }
}

/// JWKS (JSON Web Key Set) structure
#[derive(Debug, Clone, Deserialize)]
pub struct Jwks {
    pub keys: Vec<Jwk>,
}

/// Individual JWK. Keycloak also publishes EC and encryption keys, so the
/// RSA components are optional.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    #[serde(default)]
    pub kid: Option<String>,
    pub kty: String,
    #[serde(default)]
    pub alg: Option<String>,
    #[serde(default)]
    pub n: Option<String>,
    #[serde(default)]
    pub e: Option<String>,
}

/// Where a login attempt is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    Idle,
    CodeReceived,
    TokenAcquired,
    ClaimsValidated,
    Complete,
    Failed,
}

impl fmt::Display for LoginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::CodeReceived => write!(f, "code_received"),
            Self::TokenAcquired => write!(f, "token_acquired"),
            Self::ClaimsValidated => write!(f, "claims_validated"),
            Self::Complete => write!(f, "complete"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Outcome of one run through the login state machine
#[derive(Debug, Clone)]
pub struct LoginAttempt {
    /// Final state
    pub state: LoginState,
    /// Last state reached before completing or failing
    pub last_step: LoginState,
    /// Claims, present only when `state` is `Complete`
    pub claims: Option<ArxivUserClaims>,
}

impl LoginAttempt {
    fn new() -> Self {
        Self {
            state: LoginState::Idle,
            last_step: LoginState::Idle,
            claims: None,
        }
    }

    fn advance(&mut self, next: LoginState) {
        tracing::debug!(from = %self.state, to = %next, "Login state change");
        self.state = next;
        self.last_step = next;
    }

    fn fail(mut self) -> Self {
        tracing::info!(step = %self.last_step, "Login failed");
        self.state = LoginState::Failed;
        self.claims = None;
        self
    }

    pub fn is_complete(&self) -> bool {
        self.state == LoginState::Complete
    }
}

/// What a refresh starts from
#[derive(Debug, Clone, Copy)]
pub enum RefreshSource<'a> {
    Claims(&'a ArxivUserClaims),
    Token(&'a str),
}

impl<'a> From<&'a ArxivUserClaims> for RefreshSource<'a> {
    fn from(claims: &'a ArxivUserClaims) -> Self {
        Self::Claims(claims)
    }
}

impl<'a> From<&'a str> for RefreshSource<'a> {
    fn from(refresh_token: &'a str) -> Self {
        Self::Token(refresh_token)
    }
}

fn is_rsa_family(alg: Algorithm) -> bool {
    matches!(
        alg,
        Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512
    )
}

/// arXiv OpenID Connect client for a Keycloak realm
#[derive(Clone)]
pub struct OidcClient {
    config: OidcConfig,
    http_client: reqwest::Client,
}

impl OidcClient {
    /// Create a client with its own connection pool
    pub fn new(config: OidcConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(config.request_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_nodelay(true)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            config,
            http_client,
        }
    }

    /// Create a client sharing an existing HTTP client
    pub fn with_client(config: OidcConfig, http_client: reqwest::Client) -> Self {
        Self {
            config,
            http_client,
        }
    }

    pub fn config(&self) -> &OidcConfig {
        &self.config
    }

    /// URL to send the browser to for login
    pub fn login_url(&self) -> String {
        let scope = self.config.scopes.join(" ");
        let mut params = vec![
            ("client_id", self.config.client_id.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("response_type", "code"),
        ];
        if !scope.is_empty() {
            params.push(("scope", scope.as_str()));
        }
        let auth_url = self.config.auth_url();
        match Url::parse_with_params(&auth_url, &params) {
            Ok(url) => url.to_string(),
            Err(e) => {
                tracing::error!("Invalid IdP auth URL {}: {}", auth_url, e);
                auth_url
            }
        }
    }

    /// End-session URL for the user. `redirect` overrides the configured
    /// post-logout redirect.
    pub fn logout_url(&self, claims: &ArxivUserClaims, redirect: Option<&str>) -> String {
        let mut params = vec![("id_token_hint", claims.id_token().unwrap_or_default())];
        if let Some(uri) = redirect.or(self.config.post_logout_redirect_uri.as_deref()) {
            params.push(("post_logout_redirect_uri", uri));
        }
        let end_session_url = self.config.end_session_url();
        match Url::parse_with_params(&end_session_url, &params) {
            Ok(url) => url.to_string(),
            Err(e) => {
                tracing::error!("Invalid IdP logout URL {}: {}", end_session_url, e);
                end_session_url
            }
        }
    }

    /// Exchange the callback's authorization code for the IdP token
    pub async fn acquire_idp_token(&self, code: &str) -> Option<IdpToken> {
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("client_id", self.config.client_id.as_str()),
        ];
        self.post_token_endpoint(&form).await
    }

    /// Get a fresh IdP token with a refresh token
    pub async fn refresh_access_token(&self, refresh_token: &str) -> Option<IdpToken> {
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.config.client_id.as_str()),
        ];
        self.post_token_endpoint(&form).await
    }

    async fn post_token_endpoint(&self, form: &[(&str, &str)]) -> Option<IdpToken> {
        let mut request = self.http_client.post(self.config.token_url()).form(form);
        if let Some(secret) = &self.config.client_secret {
            request = request.basic_auth(&self.config.client_id, Some(secret));
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!("Failed to reach IdP token endpoint: {}", e);
                return None;
            }
        };

        if response.status() != StatusCode::OK {
            tracing::warn!("IdP token endpoint returned status: {}", response.status());
            return None;
        }

        match response.json::<IdpToken>().await {
            Ok(token) => Some(token),
            Err(e) => {
                tracing::warn!("Failed to parse IdP token response: {}", e);
                None
            }
        }
    }

    /// Fetch the realm's signing keys. Never cached so key rotation is seen immediately.
    pub async fn server_certs(&self) -> Option<Jwks> {
        let url = self.config.certs_url();
        tracing::debug!("Fetching JWKS from {}", url);

        let response = match self
            .http_client
            .get(&url)
            .timeout(self.config.certs_timeout)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::error!("Failed to fetch JWKS: {}", e);
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::error!("JWKS fetch returned status: {}", response.status());
            return None;
        }

        match response.json::<Jwks>().await {
            Ok(jwks) => Some(jwks),
            Err(e) => {
                tracing::error!("Failed to parse JWKS: {}", e);
                None
            }
        }
    }

    /// Find the RSA public key with the given key ID
    pub async fn get_public_key(&self, kid: &str) -> Option<DecodingKey> {
        let jwks = self.server_certs().await?;
        let jwk = jwks
            .keys
            .iter()
            .find(|k| k.kty == "RSA" && k.kid.as_deref() == Some(kid))?;

        let (Some(n), Some(e)) = (&jwk.n, &jwk.e) else {
            tracing::warn!("RSA key {} has no modulus or exponent", kid);
            return None;
        };

        match DecodingKey::from_rsa_components(n, e) {
            Ok(key) => Some(key),
            Err(e) => {
                tracing::error!("Failed to create decoding key: {}", e);
                None
            }
        }
    }

    /// Verify an IdP access token and return its payload.
    ///
    /// `None` means unauthenticated: unknown key, expired, malformed or
    /// otherwise unverifiable.
    pub async fn validate_access_token(&self, access_token: &str) -> Option<Map<String, Value>> {
        let header = match decode_header(access_token) {
            Ok(header) => header,
            Err(e) => {
                tracing::warn!("Token is invalid: {}", e);
                return None;
            }
        };

        let Some(kid) = header.kid else {
            tracing::warn!("Token has no key ID");
            return None;
        };

        if !is_rsa_family(header.alg) {
            tracing::warn!("Token algorithm {:?} is not accepted", header.alg);
            return None;
        }

        let Some(public_key) = self.get_public_key(&kid).await else {
            tracing::info!("Validating the token failed. kid={} alg={:?}", kid, header.alg);
            return None;
        };

        let mut validation = Validation::new(header.alg);
        validation.set_issuer(&[self.config.issuer()]);
        validation.set_required_spec_claims(&["exp", "iss"]);
        validation.validate_nbf = true;
        match &self.config.audience {
            AudiencePolicy::Skip => validation.validate_aud = false,
            AudiencePolicy::Require(audiences) => validation.set_audience(audiences),
        }

        let claims = match decode::<Map<String, Value>>(access_token, &public_key, &validation) {
            Ok(data) => data.claims,
            Err(e) => {
                match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                        tracing::warn!("IdP token is expired");
                    }
                    _ => tracing::warn!("Token is invalid: {}", e),
                }
                return None;
            }
        };

        let now = Utc::now().timestamp();
        match claims.get("iat").and_then(Value::as_i64) {
            Some(iat) if iat <= now + IAT_LEEWAY_SECS => Some(claims),
            Some(iat) => {
                tracing::warn!("Token issued in the future: iat={}", iat);
                None
            }
            None => {
                tracing::warn!("Token has no iat");
                None
            }
        }
    }

    /// Map the IdP token and its verified payload to arXiv claims
    pub fn to_arxiv_user_claims(
        &self,
        idp_token: &IdpToken,
        kc_claims: &Map<String, Value>,
        client_ip: Option<&str>,
    ) -> Result<ArxivUserClaims, AuthError> {
        ArxivUserClaims::from_keycloak_claims(idp_token, kc_claims, client_ip)
    }

    /// Run the login state machine for a callback code
    pub async fn login(&self, code: &str, client_ip: Option<&str>) -> LoginAttempt {
        let mut attempt = LoginAttempt::new();
        if code.is_empty() {
            return attempt.fail();
        }
        attempt.advance(LoginState::CodeReceived);

        let Some(idp_token) = self.acquire_idp_token(code).await else {
            return attempt.fail();
        };
        if idp_token.access_token.is_empty() {
            tracing::warn!("IdP token response has no access token");
            return attempt.fail();
        }
        attempt.advance(LoginState::TokenAcquired);

        let Some(kc_claims) = self.validate_access_token(&idp_token.access_token).await else {
            return attempt.fail();
        };
        attempt.advance(LoginState::ClaimsValidated);

        match self.to_arxiv_user_claims(&idp_token, &kc_claims, client_ip) {
            Ok(claims) => {
                attempt.claims = Some(claims);
                attempt.advance(LoginState::Complete);
                attempt
            }
            Err(e) => {
                tracing::warn!("IdP claims do not make an arXiv user: {}", e);
                attempt.fail()
            }
        }
    }

    /// Code -> IdP token -> verified claims -> arXiv claims
    pub async fn from_code_to_user_claims(
        &self,
        code: &str,
        client_ip: Option<&str>,
    ) -> Option<ArxivUserClaims> {
        self.login(code, client_ip).await.claims
    }

    /// Refresh -> verified claims -> arXiv claims.
    ///
    /// Refreshing from existing claims keeps their tapir session ID.
    pub async fn refresh_user_claims<'a>(
        &self,
        source: impl Into<RefreshSource<'a>>,
        client_ip: Option<&str>,
    ) -> Option<ArxivUserClaims> {
        let (refresh_token, tapir_session_id) = match source.into() {
            RefreshSource::Claims(claims) => {
                let Some(refresh_token) = claims.refresh_token() else {
                    tracing::debug!(user = %claims.username(), "No refresh token to refresh with");
                    return None;
                };
                (refresh_token, claims.tapir_session_id())
            }
            RefreshSource::Token(refresh_token) => (refresh_token, None),
        };

        let idp_token = self.refresh_access_token(refresh_token).await?;
        let kc_claims = self.validate_access_token(&idp_token.access_token).await?;
        match self.to_arxiv_user_claims(&idp_token, &kc_claims, client_ip) {
            Ok(mut claims) => {
                claims.set_tapir_session_id(tapir_session_id);
                Some(claims)
            }
            Err(e) => {
                tracing::warn!("Refreshed IdP claims do not make an arXiv user: {}", e);
                None
            }
        }
    }

    /// Log the user out at the IdP.
    ///
    /// 400 means the IdP no longer knows the session, which is as logged
    /// out as it gets.
    pub async fn logout_user(&self, claims: &ArxivUserClaims) -> bool {
        let url = self.logout_url(claims, None);

        let mut form = vec![("client_id", self.config.client_id.as_str())];
        if let Some(secret) = &self.config.client_secret {
            form.push(("client_secret", secret.as_str()));
        }

        let mut request = self
            .http_client
            .post(&url)
            .form(&form)
            .timeout(self.config.logout_timeout);
        if let Some(access_token) = claims.access_token() {
            request = request.bearer_auth(access_token);
        }

        match request.send().await {
            Ok(response) => match response.status() {
                StatusCode::OK => {
                    tracing::warn!(
                        "Keycloak is misconfigured. Turn front channel logout off in the logout settings of the client."
                    );
                    tracing::info!(user = %claims.username(), "User logged out");
                    true
                }
                StatusCode::NO_CONTENT => {
                    tracing::info!(user = %claims.username(), "User logged out");
                    true
                }
                StatusCode::BAD_REQUEST => {
                    tracing::debug!(user = %claims.username(), "User was not logged in");
                    true
                }
                status => {
                    tracing::warn!("IdP logout returned status: {}", status);
                    false
                }
            },
            Err(e) => {
                tracing::error!("Failed to connect to {}: {}", url, e);
                false
            }
        }
    }
}

impl fmt::Debug for OidcClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OidcClient")
            .field("server_url", &self.config.server_url)
            .field("realm", &self.config.realm)
            .field("client_id", &self.config.client_id)
            .finish_non_exhaustive()
    }
}
