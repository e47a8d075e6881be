//! RAII guard for the detail-view hand-off.

use tracing::{debug, warn};
use uuid::Uuid;

use events::Event;

use crate::core::OrderedEventEmitter;

/// Tracks the one hand-off a presentation owes its caller.
///
/// The first `mark_delivered` wins; later calls are rejected so the detail
/// view is never opened twice. Dropping the guard undelivered emits an
/// error event.
pub struct HandoffGuard {
    invocation_id: Uuid,
    project_id: String,
    emitter: Option<OrderedEventEmitter>,
    delivered: bool,
}

impl HandoffGuard {
    pub fn new(
        invocation_id: Uuid,
        project_id: impl Into<String>,
        emitter: Option<OrderedEventEmitter>,
    ) -> Self {
        let project_id = project_id.into();
        debug!(
            invocation_id = %invocation_id,
            project_id = %project_id,
            "Hand-off guard created"
        );

        Self {
            invocation_id,
            project_id,
            emitter,
            delivered: false,
        }
    }

    /// Claim the hand-off. Returns false if it already happened.
    pub fn claim(&mut self) -> bool {
        if self.delivered {
            warn!(
                invocation_id = %self.invocation_id,
                "Hand-off already delivered - ignoring"
            );
            return false;
        }
        self.delivered = true;
        true
    }

    /// Record the presenter's result.
    pub fn mark_delivered(&self, success: bool) {
        if let Some(ref emitter) = self.emitter {
            emitter.emit(Event::HandoffDelivered {
                invocation_id: self.invocation_id,
                project_id: self.project_id.clone(),
                success,
            });
        }
    }
}

impl Drop for HandoffGuard {
    fn drop(&mut self) {
        if !self.delivered {
            warn!(
                invocation_id = %self.invocation_id,
                project_id = %self.project_id,
                "Hand-off guard dropped without delivery"
            );
            if let Some(ref emitter) = self.emitter {
                emitter.emit(Event::Error {
                    message: format!("hand-off for {} was never delivered", self.project_id),
                    context: Some(self.invocation_id.to_string()),
                });
            }
        }
    }
}
