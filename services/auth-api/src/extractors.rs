//! Axum extractors for the session cookie and client address

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum::http::{header, Extensions, HeaderMap};

use crate::state::AppState;

/// Session token from the `Authorization: Bearer` header or session cookie
#[derive(Debug, Clone)]
pub struct SessionToken(pub Option<String>);

impl<S> FromRequestParts<S> for SessionToken
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut Parts,
        state: &'life1 S,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self, Self::Rejection>> + Send + 'async_trait>,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            let app_state = AppState::from_ref(state);
            Ok(SessionToken(extract_token(&parts.headers, app_state.cookie_name())))
        })
    }
}

/// Client IPv4/IPv6 address, for the `client_ipv4` claim.
///
/// `X-Forwarded-For` is only read when the service is configured to trust it.
#[derive(Debug, Clone)]
pub struct ClientIp(pub Option<String>);

impl<S> FromRequestParts<S> for ClientIp
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut Parts,
        state: &'life1 S,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self, Self::Rejection>> + Send + 'async_trait>,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            let app_state = AppState::from_ref(state);
            let trust_forwarded = app_state.config.trust_forwarded_for;
            Ok(ClientIp(client_ip(&parts.headers, &parts.extensions, trust_forwarded)))
        })
    }
}

fn client_ip(headers: &HeaderMap, extensions: &Extensions, trust_forwarded: bool) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .filter(|_| trust_forwarded)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    forwarded.or_else(|| {
        extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
    })
}

/// Extract the token from the Authorization header or session cookie
fn extract_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    // Try Authorization header first (Bearer token)
    if let Some(token) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        return Some(token.to_string());
    }

    // Try session cookie
    let prefix = format!("{}=", cookie_name);
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .map(str::trim)
        .find_map(|cookie| cookie.strip_prefix(prefix.as_str()))
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_cookie_token() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("other=1; arxiv_oidc_session=5,2024-01-01T00:00:00Z,1,,,abc"),
        );
        assert_eq!(
            extract_token(&headers, "arxiv_oidc_session").as_deref(),
            Some("5,2024-01-01T00:00:00Z,1,,,abc")
        );
        assert_eq!(extract_token(&headers, "missing"), None);
    }

    #[test]
    fn test_bearer_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer tok"));
        headers.insert(header::COOKIE, HeaderValue::from_static("s=cookie"));
        assert_eq!(extract_token(&headers, "s").as_deref(), Some("tok"));
    }

    #[test]
    fn test_empty_cookie_is_none() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("s="));
        assert_eq!(extract_token(&headers, "s"), None);
    }

    #[test]
    fn test_forwarded_for_ignored_unless_trusted() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("6.6.6.6, 10.0.0.1"));
        let mut extensions = Extensions::new();
        extensions.insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 7], 4000))));

        assert_eq!(
            client_ip(&headers, &extensions, false).as_deref(),
            Some("192.0.2.7")
        );
        assert_eq!(
            client_ip(&headers, &extensions, true).as_deref(),
            Some("6.6.6.6")
        );
        assert_eq!(client_ip(&headers, &Extensions::new(), false), None);
    }
}
