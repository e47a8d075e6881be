use summon_core::SequenceStatus;

use crate::error::{OrchestratorError, Result};

pub struct SequenceStateMachine;

impl SequenceStateMachine {
    pub fn validate_transition(from: &SequenceStatus, to: &SequenceStatus) -> Result<()> {
        let allowed = Self::allowed_transitions(from);

        if allowed.contains(to) {
            Ok(())
        } else {
            Err(OrchestratorError::InvalidTransition {
                from: from.as_str().to_string(),
                to: to.as_str().to_string(),
            })
        }
    }

    fn allowed_transitions(from: &SequenceStatus) -> Vec<SequenceStatus> {
        match from {
            SequenceStatus::Idle => vec![SequenceStatus::Setup],
            SequenceStatus::Setup => vec![
                SequenceStatus::Running,
                SequenceStatus::Completing,
                SequenceStatus::Aborting,
            ],
            // Running -> Running is a phase advance.
            SequenceStatus::Running => vec![
                SequenceStatus::Running,
                SequenceStatus::Completing,
                SequenceStatus::Aborting,
            ],
            SequenceStatus::Completing => vec![SequenceStatus::Completed],
            SequenceStatus::Aborting => vec![SequenceStatus::Aborted],
            SequenceStatus::Completed | SequenceStatus::Aborted => vec![],
        }
    }

    pub fn can_transition(from: &SequenceStatus, to: &SequenceStatus) -> bool {
        Self::validate_transition(from, to).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        assert!(SequenceStateMachine::can_transition(
            &SequenceStatus::Idle,
            &SequenceStatus::Setup
        ));
        assert!(SequenceStateMachine::can_transition(
            &SequenceStatus::Setup,
            &SequenceStatus::Running
        ));
        assert!(SequenceStateMachine::can_transition(
            &SequenceStatus::Running,
            &SequenceStatus::Running
        ));
        assert!(SequenceStateMachine::can_transition(
            &SequenceStatus::Running,
            &SequenceStatus::Completing
        ));
        assert!(SequenceStateMachine::can_transition(
            &SequenceStatus::Completing,
            &SequenceStatus::Completed
        ));
    }

    #[test]
    fn test_abort_edges() {
        assert!(SequenceStateMachine::can_transition(
            &SequenceStatus::Running,
            &SequenceStatus::Aborting
        ));
        assert!(SequenceStateMachine::can_transition(
            &SequenceStatus::Setup,
            &SequenceStatus::Aborting
        ));
        assert!(SequenceStateMachine::can_transition(
            &SequenceStatus::Aborting,
            &SequenceStatus::Aborted
        ));
    }

    #[test]
    fn test_invalid_transitions() {
        assert!(!SequenceStateMachine::can_transition(
            &SequenceStatus::Idle,
            &SequenceStatus::Running
        ));
        assert!(!SequenceStateMachine::can_transition(
            &SequenceStatus::Completed,
            &SequenceStatus::Running
        ));
        assert!(!SequenceStateMachine::can_transition(
            &SequenceStatus::Aborted,
            &SequenceStatus::Setup
        ));
        assert!(!SequenceStateMachine::can_transition(
            &SequenceStatus::Completing,
            &SequenceStatus::Aborting
        ));
    }

    #[test]
    fn test_invalid_transition_error() {
        let err = SequenceStateMachine::validate_transition(
            &SequenceStatus::Completed,
            &SequenceStatus::Running,
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid state transition from completed to running"
        );
    }
}
