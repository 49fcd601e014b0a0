//! Common test utilities for arxiv-auth-core integration tests

pub mod idp_mock;

#[allow(unused_imports)]
pub use idp_mock::{IdpMockServer, TestKeyPair, TestKeycloakClaims, TEST_CLIENT_ID, TEST_REALM};
