//! Shared playback plumbing for effect units.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;

use crate::clock::FrameClock;
use crate::core::UnitKind;
use crate::error::UnitError;

/// Sticky cancellation flag for one unit.
///
/// Once cancelled, every frame wait returns `None` immediately until the
/// gate is cleared by `reset`.
#[derive(Debug)]
pub struct PlaybackGate {
    cancelled: watch::Sender<bool>,
}

impl PlaybackGate {
    pub fn new() -> Self {
        let (cancelled, _) = watch::channel(false);
        Self { cancelled }
    }

    pub fn cancel(&self) {
        self.cancelled.send_replace(true);
    }

    pub fn clear(&self) {
        self.cancelled.send_replace(false);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancelled.borrow()
    }

    pub async fn cancelled(&self) {
        let mut rx = self.cancelled.subscribe();
        // The sender lives as long as `self`, so this only returns on cancel
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    /// Wait one frame. Returns the animation step, or `None` if cancelled.
    pub async fn frame(&self, clock: &FrameClock) -> Option<f32> {
        if self.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            _ = self.cancelled() => None,
            dt = clock.next_frame() => Some(dt),
        }
    }

    /// Sleep unless cancelled first. Returns false on cancel.
    pub async fn sleep(&self, duration: Duration) -> bool {
        if self.is_cancelled() {
            return false;
        }
        tokio::select! {
            biased;
            _ = self.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }
}

impl Default for PlaybackGate {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Idle,
    Prepared,
    Disposed,
}

/// Prepare/dispose bookkeeping shared by the concrete units.
#[derive(Debug)]
pub(crate) struct Lifecycle {
    kind: UnitKind,
    stage: Mutex<Stage>,
}

impl Lifecycle {
    pub(crate) fn new(kind: UnitKind) -> Self {
        Self {
            kind,
            stage: Mutex::new(Stage::Idle),
        }
    }

    fn stage(&self) -> std::sync::MutexGuard<'_, Stage> {
        self.stage.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn check_can_prepare(&self) -> Result<(), UnitError> {
        match *self.stage() {
            Stage::Prepared => Err(UnitError::AlreadyPrepared(self.kind)),
            Stage::Idle | Stage::Disposed => Ok(()),
        }
    }

    pub(crate) fn mark_prepared(&self) {
        *self.stage() = Stage::Prepared;
    }

    pub(crate) fn ensure_prepared(&self) -> Result<(), UnitError> {
        match *self.stage() {
            Stage::Prepared => Ok(()),
            Stage::Idle | Stage::Disposed => Err(UnitError::NotPrepared(self.kind)),
        }
    }

    /// Returns true only for the call that actually disposes.
    pub(crate) fn dispose(&self) -> bool {
        let mut stage = self.stage();
        if *stage == Stage::Prepared {
            *stage = Stage::Disposed;
            true
        } else {
            false
        }
    }
}
