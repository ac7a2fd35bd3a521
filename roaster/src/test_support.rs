//! Test-only helpers: in-memory store, scripted actuators and a fake sysfs tree.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{Context, Result, anyhow};
use tempfile::TempDir;

use crate::core::types::RoasterState;
use crate::error::ActuatorError;
use crate::io::actuator::Actuator;
use crate::io::config::{ActuatorBackend, RoasterConfig};
use crate::io::state_store::StateStore;

/// Default-named record with the given levels.
pub fn state(heat_level: u8, fan_level: u8) -> RoasterState {
    RoasterState::default().with_levels(heat_level, fan_level)
}

/// In-memory store; `fail_saves` makes every `save` return an error,
/// `fail_saves_after` only those after the given number of successful saves.
#[derive(Debug, Default)]
pub struct MemoryStore {
    pub state: Option<RoasterState>,
    pub fail_saves: bool,
    pub fail_saves_after: Option<usize>,
    pub saves: usize,
}

impl MemoryStore {
    pub fn with_state(state: RoasterState) -> Self {
        Self {
            state: Some(state),
            ..Self::default()
        }
    }
}

impl StateStore for MemoryStore {
    fn load(&mut self) -> Result<Option<RoasterState>> {
        Ok(self.state.clone())
    }

    fn save(&mut self, state: &RoasterState) -> Result<()> {
        if self.fail_saves || self.fail_saves_after.is_some_and(|limit| self.saves >= limit) {
            return Err(anyhow!("injected save failure"));
        }
        self.saves += 1;
        self.state = Some(state.clone());
        Ok(())
    }
}

/// Actuator call observed by a [`RecordingActuator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorCall {
    Apply { heat_level: u8, fan_level: u8 },
    Release,
}

/// Actuator that records every call. Clones share one log.
#[derive(Debug, Clone, Default)]
pub struct RecordingActuator {
    calls: Rc<RefCell<Vec<ActuatorCall>>>,
}

impl RecordingActuator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<ActuatorCall> {
        self.calls.borrow().clone()
    }

    /// Last applied `(heat_level, fan_level)`.
    pub fn last_applied(&self) -> Option<(u8, u8)> {
        self.calls.borrow().iter().rev().find_map(|call| match call {
            ActuatorCall::Apply {
                heat_level,
                fan_level,
            } => Some((*heat_level, *fan_level)),
            ActuatorCall::Release => None,
        })
    }
}

impl Actuator for RecordingActuator {
    fn apply(&mut self, heat_level: u8, fan_level: u8) -> Result<(), ActuatorError> {
        self.calls.borrow_mut().push(ActuatorCall::Apply {
            heat_level,
            fan_level,
        });
        Ok(())
    }

    fn release(&mut self) -> Result<(), ActuatorError> {
        self.calls.borrow_mut().push(ActuatorCall::Release);
        Ok(())
    }
}

/// Actuator whose every write fails.
#[derive(Debug, Clone, Default)]
pub struct FailingActuator;

impl Actuator for FailingActuator {
    fn apply(&mut self, _heat_level: u8, _fan_level: u8) -> Result<(), ActuatorError> {
        Err(ActuatorError::new("gpio26", anyhow!("injected write failure")))
    }
}

/// Write `cfg` as TOML to `path`.
pub fn write_config(path: &Path, cfg: &RoasterConfig) -> Result<()> {
    cfg.validate()?;
    let contents = toml::to_string_pretty(cfg).context("serialize config toml")?;
    fs::write(path, contents).with_context(|| format!("write config {}", path.display()))
}

/// Temporary directory laid out like `/sys/class/gpio` and `/sys/class/pwm`
/// with the default pins already exported.
pub struct FakeSysfs {
    temp: TempDir,
}

impl FakeSysfs {
    pub fn new() -> Result<Self> {
        let temp = tempfile::tempdir()?;
        let fake = Self { temp };
        let cfg = RoasterConfig::default();
        for pin in &cfg.pins.fan {
            fs::create_dir_all(fake.gpio_root().join(format!("gpio{}", pin)))?;
        }
        fs::create_dir_all(fake.pwm_channel_dir())?;
        Ok(fake)
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    pub fn gpio_root(&self) -> PathBuf {
        self.root().join("gpio")
    }

    pub fn pwm_root(&self) -> PathBuf {
        self.root().join("pwm")
    }

    pub fn pwm_channel_dir(&self) -> PathBuf {
        self.pwm_root().join("pwmchip0").join("pwm0")
    }

    pub fn gpio_attr(&self, pin: u32, attr: &str) -> PathBuf {
        self.gpio_root().join(format!("gpio{}", pin)).join(attr)
    }

    pub fn pwm_attr(&self, attr: &str) -> PathBuf {
        self.pwm_channel_dir().join(attr)
    }

    pub fn pwm_chip_attr(&self, attr: &str) -> PathBuf {
        self.pwm_root().join("pwmchip0").join(attr)
    }

    /// Default config pointed at this tree with the sysfs back end.
    pub fn config(&self) -> RoasterConfig {
        let mut cfg = RoasterConfig::default();
        cfg.actuator.backend = ActuatorBackend::Sysfs;
        cfg.actuator.gpio_root = self.gpio_root();
        cfg.actuator.pwm_root = self.pwm_root();
        cfg
    }
}
