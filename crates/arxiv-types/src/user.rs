//! User types

use serde::{Deserialize, Serialize};

/// A user's full name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserFullName {
    /// First name or given name
    pub forename: String,
    /// Last name or family name
    pub surname: String,
    /// Any title or qualifier used as a suffix
    #[serde(default)]
    pub suffix: String,
}

impl UserFullName {
    pub fn new(forename: impl Into<String>, surname: impl Into<String>) -> Self {
        Self {
            forename: forename.into(),
            surname: surname.into(),
            suffix: String::new(),
        }
    }
}

impl std::fmt::Display for UserFullName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.forename, self.surname)?;
        if !self.suffix.is_empty() {
            write!(f, " {}", self.suffix)?;
        }
        Ok(())
    }
}

/// An arXiv user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Slug-like username
    pub username: String,
    /// Primary e-mail address
    pub email: String,
    /// Unique identifier; `None` if the user does not exist yet
    pub user_id: Option<String>,
    /// Full name, if available
    pub name: Option<UserFullName>,
    /// Whether the e-mail address has been verified
    #[serde(default)]
    pub verified: bool,
}
