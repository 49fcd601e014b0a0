//! arXiv Types - Shared domain types
//!
//! This crate contains domain types used across arXiv auth services:
//! - Authorization scopes and the scope catalogue
//! - User identity
//! - Authenticated sessions and their authorizations

pub mod error;
pub mod scope;
pub mod session;
pub mod user;

pub use error::*;
pub use scope::*;
pub use session::*;
pub use user::*;
