//! arXiv Utils - shared helpers for the workspace

pub mod cache;
pub mod config;

pub use cache::{CacheError, CacheStatus, LoadOnceCache};
