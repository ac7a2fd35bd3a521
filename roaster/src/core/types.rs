//! Shared deterministic types for roaster core logic.
//!
//! These types define the persisted record and the level domains. They must
//! not depend on external state or I/O.

use serde::{Deserialize, Serialize};

/// Highest accepted heater duty-cycle percentage.
pub const MAX_HEAT_LEVEL: u8 = 100;
/// Highest accepted fan speed (four fan-stage bits).
pub const MAX_FAN_LEVEL: u8 = 15;
/// Interlock threshold used when the configuration does not set one.
pub const DEFAULT_MIN_FAN_LEVEL: u8 = 2;
/// Label given to the roaster when its record is first created.
pub const DEFAULT_ROASTER_NAME: &str = "Beast";
/// Primary key of the singleton record.
pub const ROASTER_ID: u32 = 1;

/// The single persisted roaster record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoasterState {
    /// Opaque primary key; always [`ROASTER_ID`].
    pub id: u32,
    /// Display label. No command changes it.
    pub name: String,
    /// Heater duty cycle in percent, `0..=100`.
    pub heat_level: u8,
    /// Fan speed, `0..=15`.
    pub fan_level: u8,
}

impl RoasterState {
    /// Fresh record with heat and fan off.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: ROASTER_ID,
            name: name.into(),
            heat_level: 0,
            fan_level: 0,
        }
    }

    /// Copy of this record with both levels replaced.
    pub fn with_levels(&self, heat_level: u8, fan_level: u8) -> Self {
        Self {
            heat_level,
            fan_level,
            ..self.clone()
        }
    }
}

impl Default for RoasterState {
    fn default() -> Self {
        Self::new(DEFAULT_ROASTER_NAME)
    }
}

/// Output channel a level belongs to; used in range errors and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Heat,
    Fan,
}

impl Channel {
    /// Inclusive upper bound of the channel's level domain.
    pub fn max_level(self) -> u8 {
        match self {
            Channel::Heat => MAX_HEAT_LEVEL,
            Channel::Fan => MAX_FAN_LEVEL,
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::Heat => f.write_str("heat"),
            Channel::Fan => f.write_str("fan"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_is_beast_with_everything_off() {
        let state = RoasterState::default();
        assert_eq!(state.id, ROASTER_ID);
        assert_eq!(state.name, "Beast");
        assert_eq!((state.heat_level, state.fan_level), (0, 0));
    }

    #[test]
    fn state_serializes_to_stable_json() {
        let state = RoasterState::default().with_levels(80, 5);
        let json = serde_json::to_string(&state).expect("serialize");
        assert_eq!(
            json,
            r#"{"id":1,"name":"Beast","heat_level":80,"fan_level":5}"#
        );
    }
}
