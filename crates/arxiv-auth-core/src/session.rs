//! Projection of verified claims onto a domain session

use arxiv_types::{scopes, Authorizations, Scope, Session, User, UserFullName};

use crate::ArxivUserClaims;

/// Session ID used when no legacy tapir session exists
pub const NO_TAPIR_SESSION_ID: &str = "no-tapir-session-id";

/// Builds the authorization [`Session`] the rest of the application uses.
///
/// There are two tiers: administrators get the admin scope set, every other
/// user the general one. Finer legacy levels survive only as the classic
/// capability code.
#[derive(Debug, Clone)]
pub struct SessionProjector {
    admin_scopes: Vec<Scope>,
    general_scopes: Vec<Scope>,
}

impl Default for SessionProjector {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionProjector {
    pub fn new() -> Self {
        Self {
            admin_scopes: scopes::admin_user(),
            general_scopes: scopes::general_user(),
        }
    }

    /// Project claims onto a session. Pure; the same claims always give the same session.
    pub fn project(&self, claims: &ArxivUserClaims) -> Session {
        let scopes = if claims.is_admin() {
            self.admin_scopes.clone()
        } else {
            self.general_scopes.clone()
        };

        let user = User {
            username: claims.username().to_string(),
            email: claims.email().to_string(),
            user_id: Some(claims.user_id().to_string()),
            name: Some(UserFullName::new(claims.first_name(), claims.last_name())),
            verified: claims.email_verified(),
        };

        let session_id = claims
            .tapir_session_id()
            .map_or_else(|| NO_TAPIR_SESSION_ID.to_string(), |id| id.to_string());

        Session {
            session_id,
            start_time: claims.issued_at(),
            end_time: Some(claims.expires_at()),
            user: Some(user),
            authorizations: Some(Authorizations {
                classic: claims.classic_capability_code(),
                endorsements: vec![],
                scopes,
            }),
            ip_address: claims.client_ipv4().map(str::to_string),
        }
    }
}
