//! Command façade: one variant per supported operation.
//!
//! Front ends build a [`RoasterCommand`] and hand it to [`execute`], which runs
//! the controller operation and then mirrors the saved record on the actuator.

use tracing::{debug, error, info};

use crate::controller::Controller;
use crate::core::types::{Channel, RoasterState};
use crate::error::{ActuatorError, CommandError, ControlError};
use crate::io::actuator::Actuator;
use crate::io::state_store::StateStore;

/// Closed set of roaster operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoasterCommand {
    /// Read the record; no mutation, no actuation.
    Status,
    SetFan(i64),
    SetHeat(i64),
    Preheat { heat: i64, fan: i64 },
    /// Heat off, fan at maximum.
    Cool,
    /// Heat and fan off, outputs released.
    Stop,
}

impl RoasterCommand {
    pub fn name(&self) -> &'static str {
        match self {
            RoasterCommand::Status => "get_status",
            RoasterCommand::SetFan(_) => "set_fan",
            RoasterCommand::SetHeat(_) => "set_heat",
            RoasterCommand::Preheat { .. } => "preheat",
            RoasterCommand::Cool => "cool",
            RoasterCommand::Stop => "stop",
        }
    }

    pub fn mutates(&self) -> bool {
        !matches!(self, RoasterCommand::Status)
    }
}

/// Successful command result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub command: RoasterCommand,
    /// Record as persisted (and applied, for mutating commands).
    pub state: RoasterState,
    pub actuated: bool,
}

/// Run `command` against the controller, then reflect the result physically.
pub fn execute<S, A>(
    command: RoasterCommand,
    controller: &mut Controller<S>,
    actuator: &mut A,
) -> Result<CommandOutcome, CommandError>
where
    S: StateStore,
    A: Actuator + ?Sized,
{
    debug!(command = command.name(), "executing command");
    let result = match command {
        RoasterCommand::Status => {
            let state = controller.get_status()?;
            return Ok(CommandOutcome {
                command,
                state,
                actuated: false,
            });
        }
        RoasterCommand::SetFan(level) => controller.set_fan(level),
        RoasterCommand::SetHeat(level) => controller.set_heat(level),
        RoasterCommand::Preheat { heat, fan } => controller.preheat(heat, fan),
        RoasterCommand::Cool => controller.cool(),
        RoasterCommand::Stop => controller.stop(),
    };

    let state = match result {
        Ok(state) => state,
        Err(err) => {
            if let RoasterCommand::Preheat { .. } = command {
                resync_after_partial_preheat(controller, actuator, &err)?;
            }
            return Err(err.into());
        }
    };

    actuate(actuator, &state)?;
    if command == RoasterCommand::Stop {
        actuator.release().map_err(|source| diverged(&state, source))?;
    }
    info!(
        command = command.name(),
        heat_level = state.heat_level,
        fan_level = state.fan_level,
        "command applied"
    );
    Ok(CommandOutcome {
        command,
        state,
        actuated: true,
    })
}

/// The fan step of a failed preheat may already be saved; push the stored
/// record to the outputs so hardware and record agree before reporting the
/// heat failure. Only a fan-range rejection is known to have saved nothing.
fn resync_after_partial_preheat<S, A>(
    controller: &mut Controller<S>,
    actuator: &mut A,
    err: &ControlError,
) -> Result<(), CommandError>
where
    S: StateStore,
    A: Actuator + ?Sized,
{
    let fan_step_rejected = matches!(
        err,
        ControlError::OutOfRange {
            channel: Channel::Fan,
            ..
        }
    );
    if fan_step_rejected {
        return Ok(());
    }
    let state = match controller.get_status() {
        Ok(state) => state,
        Err(reread) => {
            debug!(error = %reread, "cannot re-read record after failed preheat");
            return Ok(());
        }
    };
    debug!(
        heat_level = state.heat_level,
        fan_level = state.fan_level,
        "applying committed fan step of failed preheat"
    );
    actuate(actuator, &state)
}

fn actuate<A>(actuator: &mut A, state: &RoasterState) -> Result<(), CommandError>
where
    A: Actuator + ?Sized,
{
    actuator
        .apply(state.heat_level, state.fan_level)
        .map_err(|source| diverged(state, source))
}

fn diverged(state: &RoasterState, source: ActuatorError) -> CommandError {
    error!(
        heat_level = state.heat_level,
        fan_level = state.fan_level,
        error = %source,
        "outputs may not match the recorded state"
    );
    CommandError::Diverged {
        state: state.clone(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        ActuatorCall, FailingActuator, MemoryStore, RecordingActuator, state,
    };

    fn controller_at(heat: u8, fan: u8) -> Controller<MemoryStore> {
        Controller::new(MemoryStore::with_state(state(heat, fan)))
    }

    #[test]
    fn status_does_not_touch_actuator() {
        let mut controller = controller_at(80, 5);
        let mut actuator = RecordingActuator::new();
        let outcome =
            execute(RoasterCommand::Status, &mut controller, &mut actuator).expect("status");
        assert_eq!(outcome.state, state(80, 5));
        assert!(!outcome.actuated);
        assert!(actuator.calls().is_empty());
    }

    #[test]
    fn mutating_commands_apply_saved_state() {
        let mut controller = controller_at(0, 0);
        let mut actuator = RecordingActuator::new();
        execute(RoasterCommand::SetFan(5), &mut controller, &mut actuator).expect("fan");
        execute(RoasterCommand::SetHeat(80), &mut controller, &mut actuator).expect("heat");
        assert_eq!(actuator.last_applied(), Some((80, 5)));
        execute(RoasterCommand::Cool, &mut controller, &mut actuator).expect("cool");
        assert_eq!(actuator.last_applied(), Some((0, 15)));
    }

    #[test]
    fn stop_applies_then_releases() {
        let mut controller = controller_at(40, 6);
        let mut actuator = RecordingActuator::new();
        execute(RoasterCommand::Stop, &mut controller, &mut actuator).expect("stop");
        assert_eq!(
            actuator.calls(),
            vec![
                ActuatorCall::Apply {
                    heat_level: 0,
                    fan_level: 0
                },
                ActuatorCall::Release,
            ]
        );
    }

    #[test]
    fn rejected_command_does_not_actuate() {
        let mut controller = controller_at(0, 1);
        let mut actuator = RecordingActuator::new();
        let err = execute(RoasterCommand::SetHeat(50), &mut controller, &mut actuator).unwrap_err();
        assert!(matches!(
            err,
            CommandError::Control(ControlError::InterlockBlocked { .. })
        ));
        assert!(actuator.calls().is_empty());
    }

    #[test]
    fn failed_preheat_still_applies_committed_fan() {
        let mut controller = controller_at(0, 0);
        let mut actuator = RecordingActuator::new();
        let err = execute(
            RoasterCommand::Preheat { heat: 100, fan: 1 },
            &mut controller,
            &mut actuator,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CommandError::Control(ControlError::InterlockBlocked { .. })
        ));
        assert_eq!(actuator.last_applied(), Some((0, 1)));
    }

    #[test]
    fn preheat_heat_save_failure_still_applies_committed_fan() {
        let mut store = MemoryStore::with_state(state(0, 0));
        store.fail_saves_after = Some(1);
        let mut controller = Controller::new(store);
        let mut actuator = RecordingActuator::new();
        let err = execute(
            RoasterCommand::Preheat { heat: 60, fan: 8 },
            &mut controller,
            &mut actuator,
        )
        .unwrap_err();
        assert!(matches!(err, CommandError::Control(ControlError::Storage(_))));
        assert_eq!(actuator.last_applied(), Some((0, 8)));
    }

    #[test]
    fn preheat_with_bad_fan_does_not_actuate() {
        let mut controller = controller_at(30, 4);
        let mut actuator = RecordingActuator::new();
        let err = execute(
            RoasterCommand::Preheat { heat: 50, fan: 16 },
            &mut controller,
            &mut actuator,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CommandError::Control(ControlError::OutOfRange {
                channel: Channel::Fan,
                ..
            })
        ));
        assert!(actuator.calls().is_empty());
    }

    #[test]
    fn actuator_failure_after_save_is_divergence() {
        let mut controller = controller_at(0, 0);
        let mut actuator = FailingActuator;
        let err = execute(RoasterCommand::SetFan(6), &mut controller, &mut actuator).unwrap_err();
        match err {
            CommandError::Diverged { state: saved, source } => {
                assert_eq!(saved, state(0, 6));
                assert_eq!(source.output, "gpio26");
            }
            other => panic!("expected divergence, got {other:?}"),
        }
        assert_eq!(controller.get_status().expect("status"), state(0, 6));
    }

    #[test]
    fn storage_failure_skips_actuation() {
        let mut store = MemoryStore::with_state(state(0, 0));
        store.fail_saves = true;
        let mut controller = Controller::new(store);
        let mut actuator = RecordingActuator::new();
        let err = execute(RoasterCommand::Cool, &mut controller, &mut actuator).unwrap_err();
        assert!(matches!(err, CommandError::Control(ControlError::Storage(_))));
        assert!(actuator.calls().is_empty());
    }

    #[test]
    fn boxed_actuator_dispatches() {
        let mut controller = controller_at(0, 0);
        let recorder = RecordingActuator::new();
        let mut boxed: Box<dyn Actuator> = Box::new(recorder.clone());
        execute(RoasterCommand::SetFan(9), &mut controller, boxed.as_mut()).expect("fan");
        assert_eq!(recorder.last_applied(), Some((0, 9)));
    }
}
