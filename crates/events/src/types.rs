//! Event types for the summoning engine event system

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Envelope wrapping all events with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct EventEnvelope {
    /// Unique event ID
    pub id: Uuid,
    /// When the event occurred
    pub timestamp: DateTime<Utc>,
    /// Position in the emitting sequence, if the emitter tracks ordering
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,
    /// The actual event
    pub event: Event,
}

impl EventEnvelope {
    /// Create a new event envelope with auto-generated ID and timestamp
    pub fn new(event: Event) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            sequence: None,
            event,
        }
    }

    /// Attach an ordering sequence number
    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = Some(sequence);
        self
    }
}

/// All possible events emitted while presenting a project
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    // Sequence events
    /// A presentation started and its tier was decided
    #[serde(rename = "sequence.started")]
    SequenceStarted {
        invocation_id: Uuid,
        project_id: String,
        tier: String,
    },

    /// The sequence was interrupted
    #[serde(rename = "sequence.aborted")]
    SequenceAborted {
        invocation_id: Uuid,
        reason: String,
        phase: Option<String>,
    },

    /// The sequence reached a terminal state
    #[serde(rename = "sequence.finished")]
    SequenceFinished {
        invocation_id: Uuid,
        outcome: String,
        elapsed_ms: u64,
    },

    // Unit events
    /// An effect unit allocated its resources
    #[serde(rename = "unit.prepared")]
    UnitPrepared { invocation_id: Uuid, unit: String },

    /// An effect unit could not be prepared and was excluded
    #[serde(rename = "unit.setup_failed")]
    UnitSetupFailed {
        invocation_id: Uuid,
        unit: String,
        reason: String,
    },

    // Phase events
    /// A phase boundary was crossed
    #[serde(rename = "phase.started")]
    PhaseStarted {
        invocation_id: Uuid,
        phase: String,
        index: usize,
        elapsed_ms: u64,
    },

    /// A phase was satisfied (or force-advanced)
    #[serde(rename = "phase.completed")]
    PhaseCompleted {
        invocation_id: Uuid,
        phase: String,
        elapsed_ms: u64,
    },

    /// A unit failed while playing a phase
    #[serde(rename = "phase.failed")]
    PhaseFailed {
        invocation_id: Uuid,
        phase: String,
        unit: String,
        reason: String,
    },

    /// A phase hit its hard ceiling and was force-advanced
    #[serde(rename = "phase.timing_warning")]
    TimingWarning {
        invocation_id: Uuid,
        phase: String,
        budget_ms: u64,
        waited_ms: u64,
    },

    // Hand-off events
    /// The detail presenter was invoked
    #[serde(rename = "handoff.delivered")]
    HandoffDelivered {
        invocation_id: Uuid,
        project_id: String,
        success: bool,
    },

    // System events
    /// Generic error event
    #[serde(rename = "error")]
    Error {
        message: String,
        context: Option<String>,
    },
}

impl Event {
    /// Get the invocation ID associated with this event, if any
    pub fn invocation_id(&self) -> Option<Uuid> {
        match self {
            Event::SequenceStarted { invocation_id, .. }
            | Event::SequenceAborted { invocation_id, .. }
            | Event::SequenceFinished { invocation_id, .. }
            | Event::UnitPrepared { invocation_id, .. }
            | Event::UnitSetupFailed { invocation_id, .. }
            | Event::PhaseStarted { invocation_id, .. }
            | Event::PhaseCompleted { invocation_id, .. }
            | Event::PhaseFailed { invocation_id, .. }
            | Event::TimingWarning { invocation_id, .. }
            | Event::HandoffDelivered { invocation_id, .. } => Some(*invocation_id),
            Event::Error { .. } => None,
        }
    }

    /// Dotted event name as it appears on the wire
    pub fn name(&self) -> &'static str {
        match self {
            Event::SequenceStarted { .. } => "sequence.started",
            Event::SequenceAborted { .. } => "sequence.aborted",
            Event::SequenceFinished { .. } => "sequence.finished",
            Event::UnitPrepared { .. } => "unit.prepared",
            Event::UnitSetupFailed { .. } => "unit.setup_failed",
            Event::PhaseStarted { .. } => "phase.started",
            Event::PhaseCompleted { .. } => "phase.completed",
            Event::PhaseFailed { .. } => "phase.failed",
            Event::TimingWarning { .. } => "phase.timing_warning",
            Event::HandoffDelivered { .. } => "handoff.delivered",
            Event::Error { .. } => "error",
        }
    }
}
