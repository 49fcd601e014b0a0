//! HTTP handlers

mod auth;
mod health;

pub use auth::{callback, login, logout, me, refresh};
pub use health::health;
