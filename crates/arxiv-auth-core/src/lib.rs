//! arXiv Auth Core - user claims and OpenID Connect login
//!
//! Core authentication functionality: the user claims model, the compact
//! session token codec, the Keycloak OIDC client, and the projection from
//! verified claims to a domain session.

pub mod claims;
pub mod codec;
pub mod config;
pub mod error;
pub mod oidc;
pub mod session;

pub use claims::*;
pub use codec::*;
pub use config::*;
pub use error::*;
pub use oidc::*;
pub use session::*;
