//! Safety-gated controller: load → transition → save.
//!
//! Every operation reads the record from the store, computes the candidate
//! with [`crate::core::transitions`], and persists it before returning.
//! Rejected commands never reach `save`. Actuation is left to the caller
//! (see [`crate::command`]).

use anyhow::anyhow;
use tracing::{debug, info, warn};

use crate::core::transitions::{self, validate_state, violates_interlock};
use crate::core::types::{DEFAULT_MIN_FAN_LEVEL, DEFAULT_ROASTER_NAME, RoasterState};
use crate::error::ControlError;
use crate::io::config::RoasterConfig;
use crate::io::state_store::StateStore;

/// Controller over a single roaster record.
#[derive(Debug)]
pub struct Controller<S: StateStore> {
    store: S,
    min_fan_level: u8,
    default_name: String,
}

impl<S: StateStore> Controller<S> {
    /// Controller with the default interlock threshold and roaster name.
    pub fn new(store: S) -> Self {
        Self {
            store,
            min_fan_level: DEFAULT_MIN_FAN_LEVEL,
            default_name: DEFAULT_ROASTER_NAME.to_string(),
        }
    }

    /// Controller using the threshold and name from `cfg`.
    pub fn from_config(store: S, cfg: &RoasterConfig) -> Self {
        Self::new(store)
            .with_min_fan_level(cfg.min_fan_level)
            .with_default_name(cfg.roaster.name.clone())
    }

    pub fn with_min_fan_level(mut self, min_fan_level: u8) -> Self {
        self.min_fan_level = min_fan_level;
        self
    }

    /// Name used only if the record does not exist yet.
    pub fn with_default_name(mut self, name: impl Into<String>) -> Self {
        self.default_name = name.into();
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Current record. Creates it on the very first run.
    pub fn get_status(&mut self) -> Result<RoasterState, ControlError> {
        self.current()
    }

    pub fn set_fan(&mut self, new_fan_level: i64) -> Result<RoasterState, ControlError> {
        let prev = self.current()?;
        let next = transitions::set_fan(&prev, new_fan_level, self.min_fan_level)?;
        if next.heat_level != prev.heat_level {
            info!(
                fan_level = next.fan_level,
                min_fan_level = self.min_fan_level,
                "fan below interlock threshold, heat forced off"
            );
        }
        self.commit(next)
    }

    pub fn set_heat(&mut self, new_heat_level: i64) -> Result<RoasterState, ControlError> {
        let prev = self.current()?;
        let next = transitions::set_heat(&prev, new_heat_level, self.min_fan_level)?;
        self.commit(next)
    }

    /// Fan first, then heat.
    ///
    /// Not atomic: if the heat step is rejected the fan change has already
    /// been saved and stays in place. The heat step's error is returned.
    pub fn preheat(
        &mut self,
        new_heat_level: i64,
        new_fan_level: i64,
    ) -> Result<RoasterState, ControlError> {
        self.set_fan(new_fan_level)?;
        self.set_heat(new_heat_level).inspect_err(|err| {
            warn!(error = %err, "preheat heat step failed; fan change remains committed");
        })
    }

    /// Heat off, fan at maximum.
    pub fn cool(&mut self) -> Result<RoasterState, ControlError> {
        let prev = self.current()?;
        self.commit(transitions::cool(&prev))
    }

    /// Heat and fan off.
    pub fn stop(&mut self) -> Result<RoasterState, ControlError> {
        let prev = self.current()?;
        self.commit(transitions::stop(&prev))
    }

    fn current(&mut self) -> Result<RoasterState, ControlError> {
        let state = self
            .store
            .initialize(RoasterState::new(self.default_name.clone()))?;
        let errors = validate_state(&state);
        if !errors.is_empty() {
            return Err(ControlError::Storage(anyhow!(
                "stored roaster record is invalid: {}",
                errors.join("; ")
            )));
        }
        if violates_interlock(&state, self.min_fan_level) {
            warn!(
                heat_level = state.heat_level,
                fan_level = state.fan_level,
                min_fan_level = self.min_fan_level,
                "stored record has heat on below the interlock threshold"
            );
        }
        Ok(state)
    }

    fn commit(&mut self, next: RoasterState) -> Result<RoasterState, ControlError> {
        self.store.save(&next)?;
        debug!(
            heat_level = next.heat_level,
            fan_level = next.fan_level,
            "roaster record committed"
        );
        Ok(next)
    }
}
