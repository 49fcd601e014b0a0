//! User claims
//!
//! When a user is authenticated, the claims say who that is and what they
//! may do. [`ClaimsModel`] is the validated record carried inside the
//! session token; [`ArxivUserClaims`] wraps it with role predicates, the
//! legacy capability code and the projected domain session.

use arxiv_types::Session;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::OnceLock;

use crate::{AuthError, ClaimsCodec, IdpToken, SessionProjector};

/// Role names granted by the IdP realm
pub mod roles {
    pub const TEX_PRODUCED: &str = "AllowTexProduced";
    pub const APPROVED: &str = "Approved";
    pub const BANNED: &str = "Banned";
    pub const CAN_LOCK: &str = "CanLock";
    pub const OWNER: &str = "Owner";
    pub const ADMINISTRATOR: &str = "Administrator";
    pub const MODERATOR: &str = "Moderator";
    pub const LEGACY_USER: &str = "Legacy user";
    pub const PUBLIC_USER: &str = "Public user";
}

/// Legacy `tapir_policy_classes`, in priority order
const POLICY_CLASSES: &[(&str, i32)] = &[
    (roles::ADMINISTRATOR, 1),
    (roles::PUBLIC_USER, 2),
    (roles::LEGACY_USER, 3),
];

/// IdP field name -> claim name
pub const CLAIM_RENAMES: &[(&str, &str)] = &[
    ("sub", "sub"),
    ("exp", "exp"),
    ("iat", "iat"),
    ("email_verified", "email_verified"),
    ("email", "email"),
    ("access_token", "acc"),
    ("id_token", "idt"),
    ("refresh_token", "refresh"),
    ("given_name", "first_name"),
    ("family_name", "last_name"),
    ("preferred_username", "username"),
    ("client_ipv4", "client_ipv4"),
];

/// Every field of [`ClaimsModel`]
pub const CLAIM_FIELDS: &[&str] = &[
    "sub",
    "exp",
    "iat",
    "roles",
    "email_verified",
    "email",
    "acc",
    "idt",
    "refresh",
    "first_name",
    "last_name",
    "username",
    "client_ipv4",
    "ts_id",
];

/// What to do with claim fields the model does not know
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExtraFieldsPolicy {
    /// Drop unknown fields, logging them at debug level
    #[default]
    Ignore,
    /// Fail with a validation error
    Reject,
}

/// The validated claims record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimsModel {
    /// Subject (user ID)
    pub sub: String,
    /// Expiration timestamp (seconds)
    pub exp: i64,
    /// Issued at timestamp (seconds)
    pub iat: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,
    pub email_verified: bool,
    pub email: String,
    /// IdP access token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acc: Option<String>,
    /// IdP id token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idt: Option<String>,
    /// IdP refresh token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_ipv4: Option<String>,
    /// Legacy tapir session ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts_id: Option<i64>,
}

impl ClaimsModel {
    /// Build a model from a JSON object, applying `policy` to unknown keys
    pub fn from_map(map: Map<String, Value>, policy: ExtraFieldsPolicy) -> Result<Self, AuthError> {
        for key in map.keys() {
            if CLAIM_FIELDS.contains(&key.as_str()) {
                continue;
            }
            match policy {
                ExtraFieldsPolicy::Ignore => tracing::debug!(field = %key, "Ignoring unknown claim"),
                ExtraFieldsPolicy::Reject => {
                    return Err(AuthError::Validation(format!("unknown claim: {key}")));
                }
            }
        }

        let mut model: Self = serde_json::from_value(Value::Object(map))
            .map_err(|e| AuthError::Validation(e.to_string()))?;
        // an empty IdP token is no token
        model.idt = model.idt.filter(|t| !t.is_empty());
        model.refresh = model.refresh.filter(|t| !t.is_empty());
        model.validate()?;
        Ok(model)
    }

    /// Check invariants serde cannot express
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.exp <= self.iat {
            return Err(AuthError::Validation(format!(
                "exp ({}) must be after iat ({})",
                self.exp, self.iat
            )));
        }
        for (field, token) in [("idt", &self.idt), ("refresh", &self.refresh)] {
            if token.as_deref() == Some("") {
                return Err(AuthError::Validation(format!("{field} must not be empty")));
            }
        }
        Ok(())
    }

    /// The model as a JSON object, without absent optional fields
    pub fn to_map(&self) -> Result<Map<String, Value>, AuthError> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(AuthError::Internal("claims did not serialize to an object".to_string())),
            Err(e) => Err(AuthError::Internal(e.to_string())),
        }
    }
}

/// Pull `realm_access.roles` out of a Keycloak payload
fn realm_roles(source: &Map<String, Value>) -> Option<Value> {
    source
        .get("realm_access")
        .and_then(|access| access.get("roles"))
        .filter(|roles| roles.is_array())
        .cloned()
}

fn timestamp_to_utc(secs: i64, fallback: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(secs, 0).unwrap_or(fallback)
}

/// arXiv logged-in user claims
#[derive(Debug, Clone)]
pub struct ArxivUserClaims {
    claims: ClaimsModel,
    extra: Map<String, Value>,
    domain_session: OnceLock<Session>,
}

impl ArxivUserClaims {
    /// Wrap a claims model, checking its invariants
    pub fn new(claims: ClaimsModel) -> Result<Self, AuthError> {
        claims.validate()?;
        Ok(Self {
            claims,
            extra: Map::new(),
            domain_session: OnceLock::new(),
        })
    }

    /// Build claims from the IdP token response and the verified access
    /// token payload.
    ///
    /// Fails with [`AuthError::Validation`] when the IdP does not provide
    /// enough to identify an arXiv user.
    pub fn from_keycloak_claims(
        idp_token: &IdpToken,
        kc_claims: &Map<String, Value>,
        client_ip: Option<&str>,
    ) -> Result<Self, AuthError> {
        let token_fields = idp_token.to_map()?;
        let mut flat = Map::new();

        for source in [&token_fields, kc_claims] {
            for (from, to) in CLAIM_RENAMES {
                match source.get(*from) {
                    Some(Value::Null) | None => {}
                    Some(value) => {
                        flat.insert((*to).to_string(), value.clone());
                    }
                }
            }
            if let Some(roles) = realm_roles(source) {
                flat.insert("roles".to_string(), roles);
            }
        }

        if let Some(ip) = client_ip {
            flat.insert("client_ipv4".to_string(), Value::String(ip.to_string()));
        }

        Self::new(ClaimsModel::from_map(flat, ExtraFieldsPolicy::Ignore)?)
    }

    /// Encode into the session token
    pub fn to_token(&self, codec: &ClaimsCodec) -> Result<String, AuthError> {
        codec.encode(&self.claims)
    }

    /// Decode and verify a session token
    pub fn from_token(codec: &ClaimsCodec, token: &str) -> Result<Self, AuthError> {
        Self::new(codec.decode(token)?)
    }

    /// Plain JSON form of the claims
    pub fn to_json_string(&self) -> Result<String, AuthError> {
        serde_json::to_string(&self.claims).map_err(|e| AuthError::Internal(e.to_string()))
    }

    /// Parse the plain JSON form of the claims
    pub fn from_json_string(json: &str) -> Result<Self, AuthError> {
        match serde_json::from_str(json) {
            Ok(Value::Object(map)) => Self::new(ClaimsModel::from_map(map, ExtraFieldsPolicy::Ignore)?),
            Ok(_) => Err(AuthError::Validation("claims must be a JSON object".to_string())),
            Err(e) => Err(AuthError::Validation(e.to_string())),
        }
    }

    /// The underlying claims record
    pub fn claims(&self) -> &ClaimsModel {
        &self.claims
    }

    pub fn into_claims(self) -> ClaimsModel {
        self.claims
    }

    pub fn user_id(&self) -> &str {
        &self.claims.sub
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        timestamp_to_utc(self.claims.iat, DateTime::<Utc>::MIN_UTC)
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        timestamp_to_utc(self.claims.exp, DateTime::<Utc>::MAX_UTC)
    }

    pub fn roles(&self) -> &[String] {
        self.claims.roles.as_deref().unwrap_or_default()
    }

    pub fn email(&self) -> &str {
        &self.claims.email
    }

    pub fn email_verified(&self) -> bool {
        self.claims.email_verified
    }

    pub fn first_name(&self) -> &str {
        &self.claims.first_name
    }

    pub fn last_name(&self) -> &str {
        &self.claims.last_name
    }

    pub fn username(&self) -> &str {
        &self.claims.username
    }

    pub fn access_token(&self) -> Option<&str> {
        self.claims.acc.as_deref()
    }

    pub fn id_token(&self) -> Option<&str> {
        self.claims.idt.as_deref()
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.claims.refresh.as_deref()
    }

    pub fn client_ipv4(&self) -> Option<&str> {
        self.claims.client_ipv4.as_deref()
    }

    pub fn tapir_session_id(&self) -> Option<i64> {
        self.claims.ts_id
    }

    /// Attach the legacy tapir session once it has been created
    pub fn set_tapir_session_id(&mut self, session_id: Option<i64>) {
        self.claims.ts_id = session_id;
        self.domain_session.take();
    }

    /// Exact, case-sensitive role membership
    pub fn has_role(&self, role: &str) -> bool {
        self.roles().iter().any(|r| r == role)
    }

    pub fn is_tex_pro(&self) -> bool {
        self.has_role(roles::TEX_PRODUCED)
    }

    pub fn is_approved(&self) -> bool {
        self.has_role(roles::APPROVED)
    }

    pub fn is_banned(&self) -> bool {
        self.has_role(roles::BANNED)
    }

    pub fn can_lock(&self) -> bool {
        self.has_role(roles::CAN_LOCK)
    }

    pub fn is_owner(&self) -> bool {
        self.has_role(roles::OWNER)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(roles::ADMINISTRATOR)
    }

    pub fn is_mod(&self) -> bool {
        self.has_role(roles::MODERATOR)
    }

    pub fn is_legacy_user(&self) -> bool {
        self.has_role(roles::LEGACY_USER)
    }

    pub fn is_public_user(&self) -> bool {
        self.has_role(roles::PUBLIC_USER)
    }

    /// Legacy policy class code; 0 means no special capability
    pub fn classic_capability_code(&self) -> i32 {
        POLICY_CLASSES
            .iter()
            .find(|(role, _)| self.has_role(role))
            .map_or(0, |(_, code)| *code)
    }

    /// Check if the claims are expired now
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Check if the claims are expired at `at`
    pub fn is_expired_at(&self, at: DateTime<Utc>) -> bool {
        at > self.expires_at()
    }

    /// Set a claim by name.
    ///
    /// Known fields are replaced and re-validated. Unknown names are kept as
    /// request-local extras and are not carried in the session token.
    pub fn update_claims(&mut self, field: &str, value: Value) -> Result<(), AuthError> {
        if CLAIM_FIELDS.contains(&field) {
            let mut map = self.claims.to_map()?;
            map.insert(field.to_string(), value);
            self.claims = ClaimsModel::from_map(map, ExtraFieldsPolicy::Reject)?;
        } else {
            self.extra.insert(field.to_string(), value);
        }
        self.domain_session.take();
        Ok(())
    }

    /// Read a claim set through [`update_claims`](Self::update_claims) under an unknown name
    pub fn extra_claim(&self, field: &str) -> Option<&Value> {
        self.extra.get(field)
    }

    /// Store the tokens of a refreshed IdP token response
    pub fn update_keycloak_access_token(&mut self, idp_token: &IdpToken) {
        self.claims.acc = Some(idp_token.access_token.clone());
        if let Some(idt) = idp_token.id_token.as_ref().filter(|t| !t.is_empty()) {
            self.claims.idt = Some(idt.clone());
        }
        if let Some(refresh) = idp_token.refresh_token.as_ref().filter(|t| !t.is_empty()) {
            self.claims.refresh = Some(refresh.clone());
        }
    }

    /// The authorization session for these claims, computed on first use
    pub fn domain_session(&self) -> &Session {
        self.domain_session
            .get_or_init(|| SessionProjector::new().project(self))
    }
}
