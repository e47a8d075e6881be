mod support;

use std::sync::Arc;
use std::time::Duration;

use events::{Event, EventBus, EventEnvelope};
use orchestrator::core::UnitKind;
use orchestrator::{Capabilities, Orchestrator, SequenceConfig};
use summon_core::{
    AbortReason, PerformanceTier, PhaseName, SequenceOutcome, SequenceStatus,
};
use support::*;
use tokio::sync::broadcast;

fn drain(rx: &mut broadcast::Receiver<EventEnvelope>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(envelope) = rx.try_recv() {
        events.push(envelope.event);
    }
    events
}

fn scripted(factory: ScriptedUnits, config: SequenceConfig) -> (Orchestrator, Arc<Tally>) {
    let tally = factory.tally.clone();
    let orchestrator = Orchestrator::new(config).with_factory(Arc::new(factory));
    (orchestrator, tally)
}

#[tokio::test(start_paused = true)]
async fn test_full_tier_runs_every_phase_in_order() {
    init_tracing();
    let bus = EventBus::new();
    let mut rx = bus.subscribe();
    let (orchestrator, tally) = scripted(ScriptedUnits::new(), full_config());
    let orchestrator = orchestrator.with_event_bus(bus);

    let report = orchestrator
        .start(Arc::new(descriptor()), PerformanceTier::Full)
        .await
        .unwrap();

    assert_eq!(report.outcome, SequenceOutcome::Completed);
    assert_eq!(report.state.completed_phases, PhaseName::ALL.to_vec());
    assert_eq!(
        report.prepared_units,
        vec![
            UnitKind::Emblem,
            UnitKind::Particle,
            UnitKind::CardReveal,
            UnitKind::Sound
        ]
    );
    assert!(report.elapsed >= Duration::from_millis(9000));
    assert!(report.elapsed < Duration::from_millis(9010));

    let played: Vec<PhaseName> = tally
        .plays()
        .into_iter()
        .filter(|(kind, _)| *kind == UnitKind::Sound)
        .map(|(_, phase)| phase)
        .collect();
    assert_eq!(played, PhaseName::ALL.to_vec());
    assert_eq!(tally.prepares(), 4);
    assert_eq!(tally.disposes(), 4);
    assert_eq!(tally.cancels(), 0);

    let started: Vec<String> = drain(&mut rx)
        .into_iter()
        .filter_map(|event| match event {
            Event::PhaseStarted { phase, .. } => Some(phase),
            _ => None,
        })
        .collect();
    let expected: Vec<String> = PhaseName::ALL.iter().map(|p| p.to_string()).collect();
    assert_eq!(started, expected);
}

#[tokio::test(start_paused = true)]
async fn test_abort_during_burst_cancels_every_unit() {
    init_tracing();
    let (orchestrator, tally) = scripted(ScriptedUnits::new(), full_config());

    let (report, _) = tokio::join!(
        orchestrator.start(Arc::new(descriptor()), PerformanceTier::Full),
        async {
            tokio::time::sleep(Duration::from_millis(3600)).await;
            assert!(orchestrator.abort(AbortReason::SkipKey));
        }
    );
    let report = report.unwrap();

    assert_eq!(
        report.outcome,
        SequenceOutcome::Aborted {
            reason: AbortReason::SkipKey,
            phase: Some(PhaseName::Burst)
        }
    );
    assert_eq!(report.elapsed, Duration::from_millis(3600));
    assert_eq!(report.state.status, SequenceStatus::Aborted);
    assert_eq!(
        report.state.completed_phases,
        vec![PhaseName::Emblem, PhaseName::EnergyGather]
    );
    assert_eq!(tally.cancels(), 4);
    assert_eq!(tally.disposes(), tally.prepares());
}

#[tokio::test(start_paused = true)]
async fn test_failed_particle_setup_still_completes() {
    init_tracing();
    let bus = EventBus::new();
    let mut rx = bus.subscribe();
    let (orchestrator, tally) =
        scripted(ScriptedUnits::new().failing(UnitKind::Particle), full_config());
    let orchestrator = orchestrator.with_event_bus(bus);

    let report = orchestrator
        .start(Arc::new(descriptor()), PerformanceTier::Full)
        .await
        .unwrap();

    assert_eq!(report.outcome, SequenceOutcome::Completed);
    assert!(!report.prepared_units.contains(&UnitKind::Particle));
    assert!(report
        .state
        .last_error
        .as_deref()
        .is_some_and(|e| e.contains("particle")));
    assert_eq!(report.state.completed_phases.last(), Some(&PhaseName::Handoff));
    assert!(tally.plays().iter().all(|(kind, _)| *kind != UnitKind::Particle));
    assert!(tally
        .plays()
        .contains(&(UnitKind::CardReveal, PhaseName::Reveal)));
    assert_eq!(tally.prepares(), 3);
    assert_eq!(tally.disposes(), 3);

    let failed = drain(&mut rx)
        .into_iter()
        .filter(|event| matches!(event, Event::UnitSetupFailed { unit, .. } if unit == "particle"))
        .count();
    assert_eq!(failed, 1);
}

#[tokio::test(start_paused = true)]
async fn test_panicking_setup_is_contained() {
    let (orchestrator, tally) =
        scripted(ScriptedUnits::new().panicking(UnitKind::Particle), full_config());

    let report = orchestrator
        .start(Arc::new(descriptor()), PerformanceTier::Full)
        .await
        .unwrap();

    assert_eq!(report.outcome, SequenceOutcome::Completed);
    assert!(report
        .state
        .last_error
        .as_deref()
        .is_some_and(|e| e.contains("particle lost its context")));
    assert_eq!(tally.prepares(), 3);
    assert_eq!(tally.disposes(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_failed_play_is_recorded_and_sequence_continues() {
    init_tracing();
    let bus = EventBus::new();
    let mut rx = bus.subscribe();
    let factory = ScriptedUnits::new().failing_play(UnitKind::Particle, PhaseName::Burst);
    let (orchestrator, tally) = scripted(factory, full_config());
    let orchestrator = orchestrator.with_event_bus(bus);

    let report = orchestrator
        .start(Arc::new(descriptor()), PerformanceTier::Full)
        .await
        .unwrap();

    assert_eq!(report.outcome, SequenceOutcome::Completed);
    assert!(report
        .state
        .last_error
        .as_deref()
        .is_some_and(|e| e.contains("particle dropped a frame")));
    assert_eq!(report.state.completed_phases, PhaseName::ALL.to_vec());
    assert!(tally
        .plays()
        .contains(&(UnitKind::CardReveal, PhaseName::Reveal)));
    assert_eq!(tally.disposes(), tally.prepares());

    let failed: Vec<(String, String)> = drain(&mut rx)
        .into_iter()
        .filter_map(|event| match event {
            Event::PhaseFailed { phase, unit, .. } => Some((phase, unit)),
            _ => None,
        })
        .collect();
    assert_eq!(failed, vec![("burst".to_string(), "particle".to_string())]);
}

#[tokio::test(start_paused = true)]
async fn test_panicking_play_is_contained() {
    let factory = ScriptedUnits::new().panicking_play(UnitKind::CardReveal, PhaseName::Reveal);
    let (orchestrator, tally) = scripted(factory, full_config());

    let report = orchestrator
        .start(Arc::new(descriptor()), PerformanceTier::Full)
        .await
        .unwrap();

    assert_eq!(report.outcome, SequenceOutcome::Completed);
    assert!(report
        .state
        .last_error
        .as_deref()
        .is_some_and(|e| e.contains("card_reveal shader crashed")));
    assert_eq!(report.state.completed_phases.last(), Some(&PhaseName::Handoff));
    // The phase still lasts its scheduled duration
    assert!(report.elapsed >= Duration::from_millis(9000));
    assert_eq!(tally.disposes(), tally.prepares());
}

#[tokio::test(start_paused = true)]
async fn test_no_visual_units_skips_to_completion() {
    let factory = ScriptedUnits::new()
        .failing(UnitKind::Emblem)
        .failing(UnitKind::Particle)
        .failing(UnitKind::CardReveal);
    let (orchestrator, tally) = scripted(factory, full_config());

    let report = orchestrator
        .start(Arc::new(descriptor()), PerformanceTier::Full)
        .await
        .unwrap();

    assert_eq!(
        report.outcome,
        SequenceOutcome::Skipped {
            reason: summon_core::SkipReason::SetupFailed
        }
    );
    assert_eq!(report.elapsed, Duration::ZERO);
    // Sound prepared fine but is disposed unplayed
    assert_eq!(tally.prepares(), 1);
    assert_eq!(tally.disposes(), 1);
    assert!(tally.plays().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_stalled_unit_is_force_advanced() {
    init_tracing();
    let bus = EventBus::new();
    let mut rx = bus.subscribe();
    let factory = ScriptedUnits::new().stalling(UnitKind::CardReveal, PhaseName::Reveal);
    let (orchestrator, tally) = scripted(factory, full_config());
    let orchestrator = orchestrator.with_event_bus(bus);

    let report = orchestrator
        .start(Arc::new(descriptor()), PerformanceTier::Full)
        .await
        .unwrap();

    assert_eq!(report.outcome, SequenceOutcome::Completed);
    assert_eq!(report.state.timing_warnings, 1);
    assert_eq!(report.state.completed_phases, PhaseName::ALL.to_vec());
    // Reveal starts at 4.5s and is cut at 1.5x its 3s duration
    assert!(report.elapsed >= Duration::from_millis(10_500));
    assert!(report.elapsed < Duration::from_millis(10_510));
    assert_eq!(tally.disposes(), 4);

    let warnings: Vec<(String, u64)> = drain(&mut rx)
        .into_iter()
        .filter_map(|event| match event {
            Event::TimingWarning {
                phase, budget_ms, ..
            } => Some((phase, budget_ms)),
            _ => None,
        })
        .collect();
    assert_eq!(warnings, vec![("reveal".to_string(), 4500)]);
}

#[tokio::test(start_paused = true)]
async fn test_abort_at_any_time_releases_everything() {
    for at_ms in (0..9000).step_by(700) {
        let (orchestrator, tally) = scripted(ScriptedUnits::new(), full_config());

        let (report, _) = tokio::join!(
            orchestrator.start(Arc::new(descriptor()), PerformanceTier::Full),
            async {
                tokio::time::sleep(Duration::from_millis(at_ms)).await;
                orchestrator.abort(AbortReason::Caller);
            }
        );
        let report = report.unwrap();

        assert!(
            matches!(
                report.outcome,
                SequenceOutcome::Aborted {
                    reason: AbortReason::Caller,
                    ..
                }
            ),
            "abort at {at_ms}ms gave {:?}",
            report.outcome
        );
        assert_eq!(report.state.status, SequenceStatus::Aborted);
        assert_eq!(tally.prepares(), 4, "abort at {at_ms}ms");
        assert_eq!(tally.disposes(), 4, "abort at {at_ms}ms");
        assert!(report.elapsed <= Duration::from_millis(at_ms + 20));
    }
}

#[tokio::test(start_paused = true)]
async fn test_observed_phases_never_go_backwards() {
    let (orchestrator, _tally) = scripted(ScriptedUnits::new(), full_config());
    let mut rx = orchestrator.subscribe();

    let (report, observed) = tokio::join!(
        orchestrator.start(Arc::new(descriptor()), PerformanceTier::Full),
        async {
            let mut seen = Vec::new();
            while rx.changed().await.is_ok() {
                let state = rx.borrow_and_update().clone();
                if let Some(phase) = state.current_phase {
                    if seen.last() != Some(&phase) {
                        seen.push(phase);
                    }
                }
                if state.is_finished() {
                    break;
                }
            }
            seen
        }
    );

    assert_eq!(report.unwrap().outcome, SequenceOutcome::Completed);
    assert!(!observed.is_empty());
    assert!(observed.windows(2).all(|pair| pair[0] < pair[1]));
}

#[tokio::test(start_paused = true)]
async fn test_standard_units_drive_the_back_ends() {
    init_tracing();
    let renderer = Arc::new(CountingRenderer::default());
    let audio = Arc::new(CountingAudio::default());
    let capabilities = Capabilities::new()
        .with_renderer(renderer.clone())
        .with_audio(audio.clone());
    let config = SequenceConfig {
        timeline: short_timeline(),
        ..SequenceConfig::default()
    };
    let orchestrator = Orchestrator::new(config).with_capabilities(capabilities);

    let report = orchestrator
        .start(Arc::new(descriptor()), PerformanceTier::Full)
        .await
        .unwrap();

    assert_eq!(report.outcome, SequenceOutcome::Completed);
    assert!(report.elapsed >= SHORT_TOTAL);
    assert_eq!(renderer.allocated.lock().unwrap().len(), 3);
    assert_eq!(renderer.released.load(std::sync::atomic::Ordering::SeqCst), 3);
    assert!(renderer.frames.load(std::sync::atomic::Ordering::SeqCst) > 0);
    assert!(audio.clips.lock().unwrap().contains(&PhaseName::Burst));
    assert_eq!(audio.closes.load(std::sync::atomic::Ordering::SeqCst), 1);
}
