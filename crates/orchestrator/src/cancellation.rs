//! One-shot cancellation token shared by the controller and orchestrator.
//!
//! Tripping the token is synchronous: the abort reason is stored, every
//! registered listener runs inline, and any task awaiting
//! [`CancellationToken::cancelled`] is woken. The token cannot be reset.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use summon_core::AbortReason;
use tokio::sync::watch;
use tracing::debug;

type Listener = Box<dyn FnOnce(AbortReason) + Send>;

struct Inner {
    state: watch::Sender<Option<AbortReason>>,
    listeners: Mutex<Vec<Listener>>,
}

/// Write-once "abort requested" flag with listener callbacks.
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

impl CancellationToken {
    pub fn new() -> Self {
        let (state, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                state,
                listeners: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Trip the token. Returns `true` only for the call that tripped it.
    pub fn cancel(&self, reason: AbortReason) -> bool {
        let tripped = self.inner.state.send_if_modified(|current| {
            if current.is_some() {
                false
            } else {
                *current = Some(reason);
                true
            }
        });
        if !tripped {
            return false;
        }

        let listeners = std::mem::take(&mut *self.listeners());
        debug!(
            reason = reason.as_str(),
            listeners = listeners.len(),
            "Cancellation requested"
        );
        for listener in listeners {
            listener(reason);
        }
        true
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.state.borrow().is_some()
    }

    pub fn reason(&self) -> Option<AbortReason> {
        *self.inner.state.borrow()
    }

    /// Register a callback for the moment the token trips.
    ///
    /// If the token has already tripped the callback runs immediately.
    pub fn on_cancel<F>(&self, listener: F)
    where
        F: FnOnce(AbortReason) + Send + 'static,
    {
        let mut listeners = self.listeners();
        if let Some(reason) = self.reason() {
            drop(listeners);
            listener(reason);
            return;
        }
        listeners.push(Box::new(listener));
    }

    /// Resolve once the token trips, yielding the abort reason.
    pub async fn cancelled(&self) -> AbortReason {
        let mut rx = self.inner.state.subscribe();
        let tripped = rx
            .wait_for(Option::is_some)
            .await
            .map(|state| (*state).unwrap_or(AbortReason::Caller));
        match tripped {
            Ok(reason) => reason,
            // The sender lives as long as `self`, so the channel cannot close.
            Err(_) => std::future::pending().await,
        }
    }

    fn listeners(&self) -> MutexGuard<'_, Vec<Listener>> {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("reason", &self.reason())
            .finish()
    }
}
