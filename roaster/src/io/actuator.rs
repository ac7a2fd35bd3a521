//! Actuator abstraction for the roaster outputs.
//!
//! The [`Actuator`] trait decouples the command façade from the pin driver.
//! Back ends are chosen by `actuator.backend` in the config; tests use
//! recording actuators that never touch hardware.

use anyhow::{Result, anyhow};
use tracing::{info, instrument};

use crate::core::outputs::{fan_pattern, heat_timing, pattern_string};
use crate::error::ActuatorError;
use crate::io::config::{ActuatorBackend, RoasterConfig};
use crate::io::sysfs::SysfsActuator;

/// Drives the heater PWM and the fan-stage pins.
///
/// Callers pass levels that already satisfy the controller's invariants;
/// implementations do not re-validate them.
pub trait Actuator {
    /// Reflect `(heat_level, fan_level)` on the physical outputs.
    fn apply(&mut self, heat_level: u8, fan_level: u8) -> Result<(), ActuatorError>;

    /// Hand the outputs back to the OS after a full stop.
    fn release(&mut self) -> Result<(), ActuatorError> {
        Ok(())
    }
}

impl<A: Actuator + ?Sized> Actuator for Box<A> {
    fn apply(&mut self, heat_level: u8, fan_level: u8) -> Result<(), ActuatorError> {
        (**self).apply(heat_level, fan_level)
    }

    fn release(&mut self) -> Result<(), ActuatorError> {
        (**self).release()
    }
}

/// Open the back end selected by `cfg`.
pub fn open_actuator(cfg: &RoasterConfig) -> Result<Box<dyn Actuator>> {
    match cfg.actuator.backend {
        ActuatorBackend::Sysfs => Ok(Box::new(SysfsActuator::open(cfg)?)),
        ActuatorBackend::Console => Ok(Box::new(ConsoleActuator::new(cfg))),
    }
}

/// Dry-run back end: prints every pin write instead of performing it.
#[derive(Debug, Clone)]
pub struct ConsoleActuator {
    fan_pins: Vec<u32>,
    heat_pin: u32,
    pwm_frequency_hz: u32,
}

impl ConsoleActuator {
    pub fn new(cfg: &RoasterConfig) -> Self {
        Self {
            fan_pins: cfg.pins.fan.clone(),
            heat_pin: cfg.pins.heat,
            pwm_frequency_hz: cfg.pins.pwm_frequency_hz,
        }
    }
}

impl Actuator for ConsoleActuator {
    #[instrument(skip(self))]
    fn apply(&mut self, heat_level: u8, fan_level: u8) -> Result<(), ActuatorError> {
        let bits = fan_pattern(fan_level);
        for (pin, bit) in self.fan_pins.iter().zip(bits) {
            println!("fan pin {} -> {}", pin, u8::from(bit));
        }
        let timing = heat_timing(heat_level, self.pwm_frequency_hz);
        println!(
            "heat pin {} -> {}% ({}/{} ns @ {} Hz)",
            self.heat_pin, heat_level, timing.duty_ns, timing.period_ns, self.pwm_frequency_hz
        );
        info!(pattern = %pattern_string(&bits), duty_ns = timing.duty_ns, "console outputs applied");
        Ok(())
    }

    fn release(&mut self) -> Result<(), ActuatorError> {
        println!("outputs released");
        Ok(())
    }
}

/// Stand-in for read-only commands, which must never drive outputs.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadOnly;

impl Actuator for ReadOnly {
    fn apply(&mut self, _heat_level: u8, _fan_level: u8) -> Result<(), ActuatorError> {
        Err(ActuatorError::new(
            "read-only",
            anyhow!("read-only command attempted to drive outputs"),
        ))
    }
}
