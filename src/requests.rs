//! Request generations
//!
//! A caller that re-issues a query (new view, new window) must never have an
//! older, slower run overwrite the newer result. Each new request bumps a
//! shared generation counter; a token remembers the generation it was issued
//! with and is stale as soon as the counter moves on.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{AnalyticsError, Result};

/// Issues request tokens for one logical query
#[derive(Debug, Clone, Default)]
pub struct RequestTracker {
    latest: Arc<AtomicU64>,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new request, superseding every earlier token
    pub fn begin(&self) -> RequestToken {
        let generation = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        RequestToken {
            generation,
            latest: Some(Arc::clone(&self.latest)),
        }
    }

    /// Supersede every outstanding token without starting a new request
    pub fn cancel_all(&self) {
        self.latest.fetch_add(1, Ordering::SeqCst);
    }

    pub fn current_generation(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }
}

/// Handle carried through one request's pipeline
#[derive(Debug, Clone)]
pub struct RequestToken {
    generation: u64,
    latest: Option<Arc<AtomicU64>>,
}

impl RequestToken {
    /// A token that is never superseded, for one-shot synchronous calls
    pub fn detached() -> Self {
        RequestToken {
            generation: 0,
            latest: None,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self) -> bool {
        match &self.latest {
            Some(latest) => latest.load(Ordering::SeqCst) == self.generation,
            None => true,
        }
    }

    /// `Err(Superseded)` once a newer request has begun
    pub fn ensure_current(&self) -> Result<()> {
        if self.is_current() {
            Ok(())
        } else {
            Err(AnalyticsError::Superseded {
                generation: self.generation,
            })
        }
    }
}

#[derive(Debug)]
struct SlotState<T> {
    value: Option<T>,
    loading: bool,
    last_error: Option<String>,
}

/// Latest accepted result of a repeatable query
///
/// Only the most recent request may write. Whatever the outcome, completing
/// the current request clears `loading`; stale completions change nothing.
#[derive(Debug)]
pub struct ResultSlot<T> {
    tracker: RequestTracker,
    state: Mutex<SlotState<T>>,
}

impl<T> Default for ResultSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ResultSlot<T> {
    pub fn new() -> Self {
        ResultSlot {
            tracker: RequestTracker::new(),
            state: Mutex::new(SlotState {
                value: None,
                loading: false,
                last_error: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SlotState<T>> {
        // a panic while holding the lock cannot leave the plain-data state torn
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Mark a new request as loading and hand out its token
    pub fn begin(&self) -> RequestToken {
        let token = self.tracker.begin();
        self.lock().loading = true;
        token
    }

    /// Record a request outcome; returns false when the token was stale
    pub fn complete(&self, token: &RequestToken, outcome: Result<T>) -> bool {
        let mut state = self.lock();
        if !token.is_current() {
            return false;
        }
        state.loading = false;
        match outcome {
            Ok(value) => {
                state.value = Some(value);
                state.last_error = None;
            }
            Err(err) => {
                state.last_error = Some(err.to_string());
            }
        }
        true
    }

    pub fn is_loading(&self) -> bool {
        self.lock().loading
    }

    pub fn last_error(&self) -> Option<String> {
        self.lock().last_error.clone()
    }
}

impl<T: Clone> ResultSlot<T> {
    pub fn value(&self) -> Option<T> {
        self.lock().value.clone()
    }
}
