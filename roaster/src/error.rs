//! Typed errors callers are expected to match on.
//!
//! Infrastructure code returns `anyhow::Result`; these enums sit at the
//! boundaries where a caller has to tell a rejected command apart from a
//! broken store or a failed pin write.

use thiserror::Error;

use crate::core::types::{Channel, RoasterState};

/// Why the controller refused or failed a command.
#[derive(Debug, Error)]
pub enum ControlError {
    /// Requested level lies outside the channel's domain.
    #[error("{channel} level value must be in [{min}-{max}], got {value}")]
    OutOfRange {
        channel: Channel,
        min: u8,
        max: u8,
        value: i64,
    },

    /// Heat change attempted while the fan runs below the interlock threshold.
    #[error(
        "heat level control is disabled while fan is lower than {min_fan_level} (fan is {fan_level})"
    )]
    InterlockBlocked { min_fan_level: u8, fan_level: u8 },

    /// The store could not be read or written.
    #[error("storage error")]
    Storage(#[from] anyhow::Error),
}

impl ControlError {
    /// True for rejections detected before any mutation.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            ControlError::OutOfRange { .. } | ControlError::InterlockBlocked { .. }
        )
    }
}

/// A physical output write failed.
#[derive(Debug, Error)]
#[error("failed to drive {output}")]
pub struct ActuatorError {
    /// Human-readable output identifier (e.g. `gpio26`, `pwmchip0/pwm0`).
    pub output: String,
    #[source]
    pub source: anyhow::Error,
}

impl ActuatorError {
    pub fn new(output: impl Into<String>, source: anyhow::Error) -> Self {
        Self {
            output: output.into(),
            source,
        }
    }
}

/// Failure of a whole front-end command (controller + actuation).
#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Control(#[from] ControlError),

    /// State was saved but the hardware may not match it.
    #[error(
        "recorded state (heat {heat}, fan {fan}) was saved but the roaster outputs may not match it",
        heat = .state.heat_level,
        fan = .state.fan_level
    )]
    Diverged {
        state: RoasterState,
        #[source]
        source: ActuatorError,
    },
}
