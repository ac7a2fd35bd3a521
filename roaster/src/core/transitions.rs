//! Pure state transitions for roaster commands.
//!
//! Each function takes the current record and returns the candidate record
//! the controller should persist. Validation order is fixed: interlock gate,
//! then range check, then mutation. Nothing here touches the store.

use crate::core::types::{Channel, MAX_FAN_LEVEL, MAX_HEAT_LEVEL, RoasterState};
use crate::error::ControlError;

/// Fan change. Dropping below `min_fan_level` also cuts the heater.
pub fn set_fan(
    prev: &RoasterState,
    requested: i64,
    min_fan_level: u8,
) -> Result<RoasterState, ControlError> {
    let fan_level = check_range(Channel::Fan, requested)?;
    let heat_level = if fan_level < min_fan_level {
        0
    } else {
        prev.heat_level
    };
    Ok(prev.with_levels(heat_level, fan_level))
}

/// Heat change. Rejected outright while airflow is below `min_fan_level`.
pub fn set_heat(
    prev: &RoasterState,
    requested: i64,
    min_fan_level: u8,
) -> Result<RoasterState, ControlError> {
    if prev.fan_level < min_fan_level {
        return Err(ControlError::InterlockBlocked {
            min_fan_level,
            fan_level: prev.fan_level,
        });
    }
    let heat_level = check_range(Channel::Heat, requested)?;
    Ok(prev.with_levels(heat_level, prev.fan_level))
}

/// Heater off, fan at maximum.
pub fn cool(prev: &RoasterState) -> RoasterState {
    prev.with_levels(0, MAX_FAN_LEVEL)
}

/// Heater and fan off.
pub fn stop(prev: &RoasterState) -> RoasterState {
    prev.with_levels(0, 0)
}

fn check_range(channel: Channel, requested: i64) -> Result<u8, ControlError> {
    let max = channel.max_level();
    u8::try_from(requested)
        .ok()
        .filter(|level| *level <= max)
        .ok_or(ControlError::OutOfRange {
            channel,
            min: 0,
            max,
            value: requested,
        })
}

/// Check a record against the name and range invariants.
///
/// Returns a list of stable error messages (empty on success).
pub fn validate_state(state: &RoasterState) -> Vec<String> {
    let mut errors = Vec::new();
    if state.name.trim().is_empty() {
        errors.push("name must not be empty".to_string());
    }
    if state.heat_level > MAX_HEAT_LEVEL {
        errors.push(format!(
            "heat_level {} exceeds {}",
            state.heat_level, MAX_HEAT_LEVEL
        ));
    }
    if state.fan_level > MAX_FAN_LEVEL {
        errors.push(format!(
            "fan_level {} exceeds {}",
            state.fan_level, MAX_FAN_LEVEL
        ));
    }
    errors
}

/// True if the heater is on while the fan is below `min_fan_level`.
///
/// Only reachable through a record written under a lower threshold; every
/// transition above produces records that satisfy the interlock.
pub fn violates_interlock(state: &RoasterState, min_fan_level: u8) -> bool {
    state.fan_level < min_fan_level && state.heat_level > 0
}
