//! Authorization scopes
//!
//! A scope is written `domain:action[:resource]`, e.g. `submission:create`
//! or `upload:read:1234`. A resource of `*` grants the action on every
//! resource in the domain.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ScopeParseError;

/// Resource marker meaning "any resource"
pub const GLOBAL_RESOURCE: &str = "*";

/// An authorization policy
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Scope {
    /// The domain (usually a service) the scope applies to
    pub domain: String,
    /// An action within the domain
    pub action: Option<String>,
    /// The specific resource this policy applies to
    pub resource: Option<String>,
}

impl Scope {
    /// Create a scope for an action over a domain
    pub fn new(domain: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            action: Some(action.into()),
            resource: None,
        }
    }

    /// Copy of this scope bound to a specific resource
    #[must_use]
    pub fn for_resource(&self, resource_id: impl Into<String>) -> Self {
        Self {
            domain: self.domain.clone(),
            action: self.action.clone(),
            resource: Some(resource_id.into()),
        }
    }

    /// Copy of this scope bound to every resource
    #[must_use]
    pub fn as_global(&self) -> Self {
        self.for_resource(GLOBAL_RESOURCE)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.domain)?;
        if let Some(action) = &self.action {
            write!(f, ":{action}")?;
        }
        if let Some(resource) = &self.resource {
            write!(f, ":{resource}")?;
        }
        Ok(())
    }
}

impl FromStr for Scope {
    type Err = ScopeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(':');
        let domain = parts.next().unwrap_or_default();
        if domain.is_empty() {
            return Err(ScopeParseError::EmptyDomain);
        }
        let action = parts.next().map(str::to_string);
        let resource = parts.next().map(str::to_string);
        if parts.next().is_some() {
            return Err(ScopeParseError::TooManyParts(s.to_string()));
        }
        Ok(Self {
            domain: domain.to_string(),
            action,
            resource,
        })
    }
}

impl TryFrom<String> for Scope {
    type Error = ScopeParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Scope> for String {
    fn from(scope: Scope) -> Self {
        scope.to_string()
    }
}

/// The scope catalogue granted to sessions
pub mod scopes {
    use super::Scope;

    const GENERAL: &[(&str, &str)] = &[
        ("public", "read"),
        ("submission", "create"),
        ("submission", "update"),
        ("submission", "read"),
        ("submission", "delete"),
        ("upload", "read"),
        ("upload", "update"),
        ("upload", "delete_file"),
        ("upload", "read_logs"),
        ("compile", "read"),
        ("compile", "create"),
        ("fulltext", "read"),
        ("fulltext", "create"),
        ("preview", "read"),
        ("preview", "create"),
    ];

    const ADMIN_ONLY: &[(&str, &str)] = &[
        ("submission", "proxy"),
        ("submission", "review"),
        ("submission", "moderate"),
        ("upload", "create"),
        ("upload", "delete"),
        ("upload", "release"),
        ("upload", "read_service_logs"),
        ("public", "update"),
    ];

    fn build(entries: &[(&str, &str)]) -> Vec<Scope> {
        entries
            .iter()
            .map(|(domain, action)| Scope::new(*domain, *action).as_global())
            .collect()
    }

    /// Scopes granted to every verified user
    pub fn general_user() -> Vec<Scope> {
        build(GENERAL)
    }

    /// Scopes granted to administrators (a superset of [`general_user`])
    pub fn admin_user() -> Vec<Scope> {
        let mut all = build(GENERAL);
        all.extend(build(ADMIN_ONLY));
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let scope: Scope = "upload:read:1234".parse().unwrap();
        assert_eq!(scope.domain, "upload");
        assert_eq!(scope.action.as_deref(), Some("read"));
        assert_eq!(scope.resource.as_deref(), Some("1234"));
        assert_eq!(scope.to_string(), "upload:read:1234");

        let bare: Scope = "public".parse().unwrap();
        assert_eq!(bare.action, None);
        assert_eq!(bare.to_string(), "public");
    }

    #[test]
    fn test_parse_rejects_bad_scopes() {
        assert_eq!("".parse::<Scope>(), Err(ScopeParseError::EmptyDomain));
        assert_eq!(":read".parse::<Scope>(), Err(ScopeParseError::EmptyDomain));
        assert!(matches!(
            "a:b:c:d".parse::<Scope>(),
            Err(ScopeParseError::TooManyParts(_))
        ));
    }

    #[test]
    fn test_global_and_resource() {
        let scope = Scope::new("submission", "read");
        assert_eq!(scope.as_global().to_string(), "submission:read:*");
        assert_eq!(scope.for_resource("42").to_string(), "submission:read:42");
    }

    #[test]
    fn test_serde_as_string() {
        let scope = Scope::new("compile", "create").as_global();
        let json = serde_json::to_string(&scope).unwrap();
        assert_eq!(json, "\"compile:create:*\"");
        let back: Scope = serde_json::from_str(&json).unwrap();
        assert_eq!(back, scope);
        assert!(serde_json::from_str::<Scope>("\"\"").is_err());
    }

    #[test]
    fn test_admin_is_superset_of_general() {
        let general = scopes::general_user();
        let admin = scopes::admin_user();
        assert!(admin.len() > general.len());
        assert!(general.iter().all(|s| admin.contains(s)));
    }
}
