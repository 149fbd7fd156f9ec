use landing_zone_core::FlightStatus;

use crate::error::{OrchestratorError, Result};

pub struct FlightStateMachine;

impl FlightStateMachine {
    pub fn validate_transition(from: &FlightStatus, to: &FlightStatus) -> Result<()> {
        if Self::allowed_transitions(from).contains(to) {
            Ok(())
        } else {
            Err(OrchestratorError::InvalidTransition {
                from: from.as_str().to_string(),
                to: to.as_str().to_string(),
            })
        }
    }

    fn allowed_transitions(from: &FlightStatus) -> &'static [FlightStatus] {
        match from {
            // A flight that cannot even be built fails before running
            FlightStatus::Queued => &[FlightStatus::Running, FlightStatus::Error],
            FlightStatus::Running => &[
                FlightStatus::Success,
                FlightStatus::RollingBack,
                // A failure before any step completed has nothing to undo
                FlightStatus::Error,
            ],
            FlightStatus::RollingBack => &[FlightStatus::Error, FlightStatus::Fatal],
            FlightStatus::Success | FlightStatus::Error | FlightStatus::Fatal => &[],
        }
    }

    pub fn can_transition(from: &FlightStatus, to: &FlightStatus) -> bool {
        Self::validate_transition(from, to).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        assert!(FlightStateMachine::can_transition(
            &FlightStatus::Queued,
            &FlightStatus::Running
        ));
        assert!(FlightStateMachine::can_transition(
            &FlightStatus::Running,
            &FlightStatus::RollingBack
        ));
        assert!(FlightStateMachine::can_transition(
            &FlightStatus::RollingBack,
            &FlightStatus::Fatal
        ));
    }

    #[test]
    fn test_rollback_cannot_end_in_success() {
        assert!(!FlightStateMachine::can_transition(
            &FlightStatus::RollingBack,
            &FlightStatus::Success
        ));
        assert!(!FlightStateMachine::can_transition(
            &FlightStatus::RollingBack,
            &FlightStatus::Running
        ));
    }

    #[test]
    fn test_terminal_statuses_are_final() {
        for terminal in [FlightStatus::Success, FlightStatus::Error, FlightStatus::Fatal] {
            assert!(!FlightStateMachine::can_transition(
                &terminal,
                &FlightStatus::Running
            ));
        }
    }

    #[test]
    fn test_cannot_skip_running() {
        let result =
            FlightStateMachine::validate_transition(&FlightStatus::Queued, &FlightStatus::Success);
        assert!(matches!(
            result,
            Err(OrchestratorError::InvalidTransition { .. })
        ));
    }
}
