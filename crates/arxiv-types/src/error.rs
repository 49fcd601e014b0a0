//! Common error types

use thiserror::Error;

/// Errors raised while parsing a scope string
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScopeParseError {
    /// The scope string was empty or had an empty domain
    #[error("scope has no domain")]
    EmptyDomain,

    /// The scope string had more than `domain:action:resource`
    #[error("too many parts in scope: {0}")]
    TooManyParts(String),
}
