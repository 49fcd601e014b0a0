//! Authentication handlers (login, callback, refresh, logout, me)

use axum::extract::{Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use arxiv_auth_core::{ArxivUserClaims, AuthError, ClaimsCodec, RefreshSource};
use arxiv_types::Session;

use crate::error::{ApiError, ApiResult};
use crate::extractors::{ClientIp, SessionToken};
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserInfo {
    pub id: String,
    pub username: String,
    pub email: String,
    pub roles: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: UserInfo,
    pub expires_at: String,
    pub session: Session,
}

impl From<&ArxivUserClaims> for MeResponse {
    fn from(claims: &ArxivUserClaims) -> Self {
        Self {
            user: UserInfo {
                id: claims.user_id().to_string(),
                username: claims.username().to_string(),
                email: claims.email().to_string(),
                roles: claims.roles().to_vec(),
            },
            expires_at: claims.expires_at().to_rfc3339(),
            session: claims.domain_session().clone(),
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn session_cookie(state: &AppState, token: &str) -> String {
    let secure = if state.config.secure_cookie { "; Secure" } else { "" };
    format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/{}",
        state.cookie_name(),
        token,
        secure
    )
}

fn expired_cookie(state: &AppState) -> String {
    format!("{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0", state.cookie_name())
}

fn with_cookie(mut response: Response, cookie: String) -> Response {
    match HeaderValue::from_str(&cookie) {
        Ok(value) => {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
        Err(e) => tracing::error!("Session cookie is not a valid header value: {}", e),
    }
    response
}

/// 302 to `location`
fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// Refresh the session behind `token` with the IdP.
///
/// The stale payload is used when its signature checks out so the tapir
/// session survives. Otherwise only the plain refresh token is used.
async fn refresh_session(
    state: &AppState,
    token: &str,
    client_ip: Option<&str>,
) -> Option<ArxivUserClaims> {
    let parts = ClaimsCodec::split(token).ok()?;
    let stale = state
        .codec
        .decode_for_refresh(token)
        .ok()
        .and_then(|model| ArxivUserClaims::new(model).ok());

    match &stale {
        Some(claims) => state.oidc.refresh_user_claims(claims, client_ip).await,
        None => {
            let refresh_token = parts.refresh_token?;
            state
                .oidc
                .refresh_user_claims(RefreshSource::Token(refresh_token), client_ip)
                .await
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /login
///
/// Send the browser to the IdP
pub async fn login(State(state): State<AppState>) -> Response {
    found(&state.oidc.login_url())
}

/// GET /callback
///
/// Exchange the authorization code for a session cookie
pub async fn callback(
    State(state): State<AppState>,
    ClientIp(client_ip): ClientIp,
    Query(params): Query<CallbackParams>,
) -> ApiResult<Response> {
    if let Some(error) = &params.error {
        tracing::info!(error = %error, "IdP returned an error to the callback");
    }

    let Some(code) = params.code.filter(|c| !c.is_empty()) else {
        return Ok(found("/login"));
    };

    let attempt = state.oidc.login(&code, client_ip.as_deref()).await;
    let Some(claims) = attempt.claims else {
        tracing::info!(step = %attempt.last_step, "Login did not complete");
        return Ok(found("/login"));
    };

    let token = claims.to_token(&state.codec)?;
    tracing::info!(user = %claims.username(), "User logged in");

    Ok(with_cookie(found("/"), session_cookie(&state, &token)))
}

/// POST /refresh
///
/// Refresh the session with the refresh token carried in the cookie
pub async fn refresh(
    State(state): State<AppState>,
    ClientIp(client_ip): ClientIp,
    SessionToken(token): SessionToken,
) -> ApiResult<Response> {
    let token = token.ok_or(ApiError::NotLoggedIn)?;

    let Some(claims) = refresh_session(&state, &token, client_ip.as_deref()).await else {
        let response = ApiError::RefreshFailed.into_response();
        return Ok(with_cookie(response, expired_cookie(&state)));
    };

    let new_token = claims.to_token(&state.codec)?;
    let response = Json(MeResponse::from(&claims)).into_response();
    Ok(with_cookie(response, session_cookie(&state, &new_token)))
}

/// GET|POST /logout
///
/// End the IdP session and clear the cookie
pub async fn logout(
    State(state): State<AppState>,
    ClientIp(client_ip): ClientIp,
    SessionToken(token): SessionToken,
) -> Response {
    if let Some(token) = token {
        let claims = match ArxivUserClaims::from_token(&state.codec, &token) {
            Ok(claims) => Some(claims),
            // The IdP session may outlive the payload
            Err(AuthError::TokenExpired) => {
                refresh_session(&state, &token, client_ip.as_deref()).await
            }
            Err(e) => {
                tracing::debug!(error = %e, "Logout with an unusable session token");
                None
            }
        };

        if let Some(claims) = claims {
            if !state.oidc.logout_user(&claims).await {
                tracing::warn!(user = %claims.username(), "IdP logout failed");
            }
        }
    }

    let location = state
        .config
        .oidc
        .post_logout_redirect_uri
        .as_deref()
        .unwrap_or("/");
    with_cookie(found(location), expired_cookie(&state))
}

/// GET /me
///
/// Current user and authorization session. An expired session is refreshed
/// transparently.
pub async fn me(
    State(state): State<AppState>,
    ClientIp(client_ip): ClientIp,
    SessionToken(token): SessionToken,
) -> ApiResult<Response> {
    let token = token.ok_or(ApiError::NotLoggedIn)?;

    match ArxivUserClaims::from_token(&state.codec, &token) {
        Ok(claims) => Ok(Json(MeResponse::from(&claims)).into_response()),
        Err(AuthError::TokenExpired) => {
            let Some(claims) = refresh_session(&state, &token, client_ip.as_deref()).await else {
                let response = ApiError::Auth(AuthError::TokenExpired).into_response();
                return Ok(with_cookie(response, expired_cookie(&state)));
            };
            tracing::debug!(user = %claims.username(), "Session refreshed");
            let new_token = claims.to_token(&state.codec)?;
            let response = Json(MeResponse::from(&claims)).into_response();
            Ok(with_cookie(response, session_cookie(&state, &new_token)))
        }
        Err(e) => Err(e.into()),
    }
}
