//! Load-once cache for process-wide datasets
//!
//! A dataset is loaded on first use and kept for the life of the process. A
//! failed load is remembered so the source is not hammered on every call;
//! it is retried only after [`LoadOnceCache::invalidate`].

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("dataset has not been loaded")]
    NotLoaded,

    #[error("dataset load failed: {0}")]
    LoadFailed(String),

    #[error("previous load failed, not retrying until invalidated: {0}")]
    PreviousLoadFailed(String),
}

/// Observable cache state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Empty,
    Loaded,
    Failed,
}

enum CacheState<T> {
    Empty,
    Loaded(Arc<T>),
    Failed(String),
}

pub struct LoadOnceCache<T> {
    state: RwLock<CacheState<T>>,
}

impl<T> Default for LoadOnceCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> LoadOnceCache<T> {
    /// Create an empty cache. Usable in a `static`.
    pub const fn new() -> Self {
        Self {
            state: RwLock::new(CacheState::Empty),
        }
    }

    /// Return the dataset, running `load` if nothing has been tried yet.
    ///
    /// Only one caller runs `load`; concurrent callers wait for it.
    pub fn init<F, E>(&self, load: F) -> Result<Arc<T>, CacheError>
    where
        F: FnOnce() -> Result<T, E>,
        E: fmt::Display,
    {
        if let Some(result) = self.peek() {
            return result;
        }

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        match &*state {
            CacheState::Loaded(data) => return Ok(Arc::clone(data)),
            CacheState::Failed(reason) => return Err(CacheError::PreviousLoadFailed(reason.clone())),
            CacheState::Empty => {}
        }

        match load() {
            Ok(data) => {
                let data = Arc::new(data);
                *state = CacheState::Loaded(Arc::clone(&data));
                tracing::debug!("Dataset loaded");
                Ok(data)
            }
            Err(e) => {
                let reason = e.to_string();
                tracing::error!("Dataset load failed: {}", reason);
                *state = CacheState::Failed(reason.clone());
                Err(CacheError::LoadFailed(reason))
            }
        }
    }

    /// Return the dataset without loading it
    pub fn get(&self) -> Result<Arc<T>, CacheError> {
        self.peek().unwrap_or(Err(CacheError::NotLoaded))
    }

    /// Forget the dataset or the failure, so the next `init` loads again
    pub fn invalidate(&self) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        *state = CacheState::Empty;
    }

    pub fn status(&self) -> CacheStatus {
        match &*self.state.read().unwrap_or_else(PoisonError::into_inner) {
            CacheState::Empty => CacheStatus::Empty,
            CacheState::Loaded(_) => CacheStatus::Loaded,
            CacheState::Failed(_) => CacheStatus::Failed,
        }
    }

    fn peek(&self) -> Option<Result<Arc<T>, CacheError>> {
        match &*self.state.read().unwrap_or_else(PoisonError::into_inner) {
            CacheState::Empty => None,
            CacheState::Loaded(data) => Some(Ok(Arc::clone(data))),
            CacheState::Failed(reason) => Some(Err(CacheError::PreviousLoadFailed(reason.clone()))),
        }
    }
}

impl<T> fmt::Debug for LoadOnceCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadOnceCache")
            .field("status", &self.status())
            .finish()
    }
}
