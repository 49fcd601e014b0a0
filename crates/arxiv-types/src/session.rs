//! Session and authorization types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Scope, User};

/// Authorization information associated with a [`Session`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorizations {
    /// Legacy capability code associated with the session
    #[serde(default)]
    pub classic: i32,
    /// Categories the user may submit to
    #[serde(default)]
    pub endorsements: Vec<String>,
    /// Authorized scopes
    #[serde(default)]
    pub scopes: Vec<Scope>,
}

impl Authorizations {
    /// Check whether a category is covered by the endorsements.
    ///
    /// Endorsements may be compressed to `archive.*` for a whole archive or
    /// `*.*` for every category.
    pub fn endorsed_for(&self, category: &str) -> bool {
        let archive = category.split('.').next().unwrap_or(category);
        let archive_wildcard = format!("{archive}.*");
        self.endorsements
            .iter()
            .any(|e| e == category || *e == archive_wildcard || e == "*.*")
    }
}

/// An authenticated session in the arXiv system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Session identifier
    pub session_id: String,
    /// When the session was created
    pub start_time: DateTime<Utc>,
    /// When the session ends, if bounded
    pub end_time: Option<DateTime<Utc>>,
    /// The user the session belongs to
    pub user: Option<User>,
    /// Authorizations for the session
    pub authorizations: Option<Authorizations>,
    /// Client IP address the session was created from
    pub ip_address: Option<String>,
}

impl Session {
    /// Check whether this session may perform `scope` on `resource`
    pub fn is_authorized(&self, scope: &Scope, resource: &str) -> bool {
        self.authorizations.as_ref().is_some_and(|auth| {
            let global = scope.as_global();
            let specific = scope.for_resource(resource);
            auth.scopes.iter().any(|s| *s == global || *s == specific)
        })
    }

    /// Check if the session has ended
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Check if the session has ended at the given instant
    pub fn is_expired_at(&self, at: DateTime<Utc>) -> bool {
        self.end_time.is_some_and(|end| at >= end)
    }

    /// Seconds until the session ends, floored at zero
    pub fn expires_in(&self) -> Option<i64> {
        self.end_time
            .map(|end| (end - Utc::now()).num_seconds().max(0))
    }
}
