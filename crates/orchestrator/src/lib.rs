//! Animation orchestration engine for the card summoning transition.
//!
//! A [`TransitionController`] classifies the device, runs an [`Orchestrator`]
//! over the [`PhaseTimeline`] with tier-selected effect units, and always
//! finishes by handing the project to a [`DetailPresenter`] exactly once.

pub mod backend;
pub mod cancellation;
pub mod clock;
pub mod config;
pub mod controller;
pub mod core;
pub mod easing;
pub mod error;
pub mod profiler;
pub mod resources;
pub mod sequencer;
pub mod skip;
pub mod state_machine;
pub mod timeline;
pub mod units;

pub use backend::{AudioBackend, Capabilities, RenderBackend, RenderFrame};
pub use cancellation::CancellationToken;
pub use config::EngineConfig;
pub use controller::{DetailPresenter, PresentError, TransitionController, TransitionReport};
pub use error::{OrchestratorError, Result, UnitError};
pub use profiler::{DeviceProfiler, DeviceSignals, EnvironmentProbe};
pub use sequencer::{Orchestrator, SequenceConfig, SequenceReport};
pub use skip::{SkipChannel, SkipInput};
pub use state_machine::SequenceStateMachine;
pub use timeline::PhaseTimeline;
