//! Roaster configuration stored in `roaster.toml`.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::outputs::FAN_PIN_COUNT;
use crate::core::types::{DEFAULT_MIN_FAN_LEVEL, DEFAULT_ROASTER_NAME, MAX_FAN_LEVEL};

/// Default config file name, resolved against the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "roaster.toml";

/// Roaster configuration (TOML).
///
/// Every field is optional on disk; missing fields default to the wiring of
/// the original Beast roaster on a Raspberry Pi.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RoasterConfig {
    /// Where the roaster record lives. Relative paths resolve against the
    /// directory holding the config file.
    pub state_path: PathBuf,

    /// Interlock threshold: heat is forced off and locked below this fan level.
    pub min_fan_level: u8,

    pub roaster: RoasterSection,
    pub pins: PinConfig,
    pub actuator: ActuatorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RoasterSection {
    /// Name written into the record on first run.
    pub name: String,
}

/// Pin assignments (BCM numbering).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PinConfig {
    /// Fan-stage outputs, most significant bit first.
    pub fan: Vec<u32>,
    /// PWM-capable heater output.
    pub heat: u32,
    pub pwm_frequency_hz: u32,
}

/// Which adapter drives the outputs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ActuatorBackend {
    /// Linux sysfs GPIO + PWM.
    Sysfs,
    /// No hardware; print what would be written.
    Console,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ActuatorConfig {
    pub backend: ActuatorBackend,
    pub gpio_root: PathBuf,
    pub pwm_root: PathBuf,
    pub pwm_chip: u32,
    /// Overrides the channel derived from `pins.heat`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pwm_channel: Option<u32>,
}

impl Default for RoasterSection {
    fn default() -> Self {
        Self {
            name: DEFAULT_ROASTER_NAME.to_string(),
        }
    }
}

impl Default for PinConfig {
    fn default() -> Self {
        Self {
            fan: vec![26, 19, 13, 6],
            heat: 12,
            pwm_frequency_hz: 60,
        }
    }
}

impl Default for ActuatorConfig {
    fn default() -> Self {
        Self {
            backend: ActuatorBackend::Sysfs,
            gpio_root: PathBuf::from("/sys/class/gpio"),
            pwm_root: PathBuf::from("/sys/class/pwm"),
            pwm_chip: 0,
            pwm_channel: None,
        }
    }
}

impl Default for RoasterConfig {
    fn default() -> Self {
        Self {
            state_path: PathBuf::from("roaster.json"),
            min_fan_level: DEFAULT_MIN_FAN_LEVEL,
            roaster: RoasterSection::default(),
            pins: PinConfig::default(),
            actuator: ActuatorConfig::default(),
        }
    }
}

impl RoasterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_fan_level > MAX_FAN_LEVEL {
            return Err(anyhow!("min_fan_level must be in [0-{}]", MAX_FAN_LEVEL));
        }
        if self.roaster.name.trim().is_empty() {
            return Err(anyhow!("roaster.name must not be empty"));
        }
        if self.pins.fan.len() != FAN_PIN_COUNT {
            return Err(anyhow!(
                "pins.fan must list exactly {} pins, got {}",
                FAN_PIN_COUNT,
                self.pins.fan.len()
            ));
        }
        let unique: HashSet<u32> = self.pins.fan.iter().copied().collect();
        if unique.len() != self.pins.fan.len() {
            return Err(anyhow!("pins.fan must not repeat a pin"));
        }
        if unique.contains(&self.pins.heat) {
            return Err(anyhow!(
                "pins.heat {} is also used as a fan pin",
                self.pins.heat
            ));
        }
        if self.pins.pwm_frequency_hz == 0 {
            return Err(anyhow!("pins.pwm_frequency_hz must be > 0"));
        }
        if self.actuator.backend == ActuatorBackend::Sysfs
            && self.actuator.pwm_channel.is_none()
            && pwm_channel_for_pin(self.pins.heat).is_none()
        {
            return Err(anyhow!(
                "pins.heat {} has no hardware PWM channel; set actuator.pwm_channel",
                self.pins.heat
            ));
        }
        Ok(())
    }

    /// PWM channel for the heater: explicit override, else derived from the pin.
    pub fn heat_pwm_channel(&self) -> Option<u32> {
        self.actuator
            .pwm_channel
            .or_else(|| pwm_channel_for_pin(self.pins.heat))
    }

    /// Resolve `state_path` against `base` when it is relative.
    pub fn resolved_state_path(&self, base: &Path) -> PathBuf {
        if self.state_path.is_absolute() {
            self.state_path.clone()
        } else {
            base.join(&self.state_path)
        }
    }
}

/// Hardware PWM channel behind a BCM pin on the Raspberry Pi PWM block.
pub fn pwm_channel_for_pin(pin: u32) -> Option<u32> {
    match pin {
        12 | 18 => Some(0),
        13 | 19 => Some(1),
        _ => None,
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `RoasterConfig::default()`.
pub fn load_config(path: &Path) -> Result<RoasterConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "config missing, using defaults");
        let cfg = RoasterConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: RoasterConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    debug!(path = %path.display(), backend = ?cfg.actuator.backend, min_fan_level = cfg.min_fan_level, "config loaded");
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::write_config;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, RoasterConfig::default());
        assert_eq!(cfg.min_fan_level, 2);
        assert_eq!(cfg.heat_pwm_channel(), Some(0));
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("roaster.toml");
        let mut cfg = RoasterConfig::default();
        cfg.min_fan_level = 3;
        cfg.actuator.backend = ActuatorBackend::Console;
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_fields() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("roaster.toml");
        fs::write(&path, "min_fan_level = 3\n[actuator]\nbackend = \"console\"\n")
            .expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.min_fan_level, 3);
        assert_eq!(cfg.actuator.backend, ActuatorBackend::Console);
        assert_eq!(cfg.pins, PinConfig::default());
        assert_eq!(cfg.roaster.name, "Beast");
    }

    #[test]
    fn validate_rejects_bad_wiring() {
        let mut cfg = RoasterConfig::default();
        cfg.pins.fan = vec![26, 19, 13];
        assert!(cfg.validate().is_err());

        let mut cfg = RoasterConfig::default();
        cfg.pins.fan = vec![26, 26, 13, 6];
        assert!(cfg.validate().is_err());

        let mut cfg = RoasterConfig::default();
        cfg.pins.heat = 26;
        assert!(cfg.validate().is_err());

        let mut cfg = RoasterConfig::default();
        cfg.min_fan_level = 16;
        assert!(cfg.validate().is_err());

        let mut cfg = RoasterConfig::default();
        cfg.pins.heat = 4;
        assert!(cfg.validate().is_err());
        cfg.actuator.pwm_channel = Some(1);
        cfg.validate().expect("explicit channel");
    }

    #[test]
    fn relative_state_path_resolves_against_base() {
        let cfg = RoasterConfig::default();
        let base = Path::new("/etc/roaster");
        assert_eq!(
            cfg.resolved_state_path(base),
            PathBuf::from("/etc/roaster/roaster.json")
        );
    }
}
