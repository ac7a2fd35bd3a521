//! Linux sysfs back end: `/sys/class/gpio` for the fan stages and
//! `/sys/class/pwm` for the heater.
//!
//! Outputs stay exported and driven when the process exits so the roaster
//! keeps its last commanded state between invocations. Only
//! [`Actuator::release`] unexports them.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::core::outputs::{FAN_PIN_COUNT, fan_pattern, heat_timing, pattern_string};
use crate::error::ActuatorError;
use crate::io::actuator::Actuator;
use crate::io::config::RoasterConfig;

/// Owned handles on the fan GPIOs and the heater PWM channel.
#[derive(Debug)]
pub struct SysfsActuator {
    fan: Vec<GpioOutput>,
    heat: PwmOutput,
    pwm_frequency_hz: u32,
}

impl SysfsActuator {
    /// Export and configure every output named in `cfg`.
    #[instrument(skip_all, fields(gpio_root = %cfg.actuator.gpio_root.display(), pwm_root = %cfg.actuator.pwm_root.display()))]
    pub fn open(cfg: &RoasterConfig) -> Result<Self> {
        let fan = cfg
            .pins
            .fan
            .iter()
            .map(|pin| GpioOutput::open(&cfg.actuator.gpio_root, *pin))
            .collect::<Result<Vec<_>>>()?;
        let channel = cfg
            .heat_pwm_channel()
            .ok_or_else(|| anyhow!("pin {} has no PWM channel", cfg.pins.heat))?;
        let heat = PwmOutput::open(
            &cfg.actuator.pwm_root,
            cfg.actuator.pwm_chip,
            channel,
            cfg.pins.pwm_frequency_hz,
        )?;
        debug!(fan_pins = ?cfg.pins.fan, channel, "sysfs outputs ready");
        Ok(Self {
            fan,
            heat,
            pwm_frequency_hz: cfg.pins.pwm_frequency_hz,
        })
    }
}

impl SysfsActuator {
    fn write_fan(&self, bits: [bool; FAN_PIN_COUNT]) -> Result<(), ActuatorError> {
        for (output, bit) in self.fan.iter().zip(bits) {
            output.set(bit)?;
        }
        Ok(())
    }
}

impl Actuator for SysfsActuator {
    /// Heat never leads airflow: a lower duty is written before the fan pins,
    /// a higher one only after all fan pins took their new value.
    #[instrument(skip(self))]
    fn apply(&mut self, heat_level: u8, fan_level: u8) -> Result<(), ActuatorError> {
        let bits = fan_pattern(fan_level);
        let timing = heat_timing(heat_level, self.pwm_frequency_hz);
        match self.heat.duty_ns {
            Some(current) if timing.duty_ns <= current => {
                self.heat.set_duty(timing.duty_ns)?;
                self.write_fan(bits)?;
            }
            current => {
                // Unknown duty: assume the heater may be on.
                if current.is_none() {
                    self.heat.set_duty(0)?;
                }
                if let Err(err) = self.write_fan(bits) {
                    self.heat.force_off();
                    return Err(err);
                }
                self.heat.set_duty(timing.duty_ns)?;
            }
        }
        info!(
            pattern = %pattern_string(&bits),
            duty_ns = timing.duty_ns,
            period_ns = timing.period_ns,
            "outputs applied"
        );
        Ok(())
    }

    #[instrument(skip(self))]
    fn release(&mut self) -> Result<(), ActuatorError> {
        self.heat.release()?;
        for output in &self.fan {
            output.release()?;
        }
        info!("outputs released");
        Ok(())
    }
}

#[derive(Debug)]
struct GpioOutput {
    pin: u32,
    root: PathBuf,
    dir: PathBuf,
}

impl GpioOutput {
    fn open(root: &Path, pin: u32) -> Result<Self> {
        let dir = root.join(format!("gpio{}", pin));
        if !dir.is_dir() {
            debug!(pin, "exporting gpio");
            write_attr(&root.join("export"), &pin.to_string())?;
            if !dir.is_dir() {
                return Err(anyhow!("gpio{} did not appear after export", pin));
            }
        }
        let output = Self {
            pin,
            root: root.to_path_buf(),
            dir,
        };
        // Stages are active low; come up de-asserted unless already driven.
        let direction = read_attr(&output.dir.join("direction")).unwrap_or_default();
        if direction != "out" {
            write_attr(&output.dir.join("direction"), "high")?;
        }
        Ok(output)
    }

    fn label(&self) -> String {
        format!("gpio{}", self.pin)
    }

    fn set(&self, high: bool) -> Result<(), ActuatorError> {
        let value = if high { "1" } else { "0" };
        write_attr(&self.dir.join("value"), value)
            .map_err(|err| ActuatorError::new(self.label(), err))
    }

    fn release(&self) -> Result<(), ActuatorError> {
        write_attr(&self.root.join("unexport"), &self.pin.to_string())
            .map_err(|err| ActuatorError::new(self.label(), err))
    }
}

#[derive(Debug)]
struct PwmOutput {
    chip: u32,
    channel: u32,
    chip_dir: PathBuf,
    dir: PathBuf,
    /// Last duty written or read back; `None` when unknown.
    duty_ns: Option<u64>,
}

impl PwmOutput {
    fn open(root: &Path, chip: u32, channel: u32, frequency_hz: u32) -> Result<Self> {
        let chip_dir = root.join(format!("pwmchip{}", chip));
        if !chip_dir.is_dir() {
            return Err(anyhow!("pwm chip {} not found", chip_dir.display()));
        }
        let dir = chip_dir.join(format!("pwm{}", channel));
        if !dir.is_dir() {
            debug!(chip, channel, "exporting pwm channel");
            write_attr(&chip_dir.join("export"), &channel.to_string())?;
            if !dir.is_dir() {
                return Err(anyhow!(
                    "pwmchip{}/pwm{} did not appear after export",
                    chip,
                    channel
                ));
            }
        }
        let mut output = Self {
            chip,
            channel,
            chip_dir,
            dir,
            duty_ns: None,
        };
        let period_ns = heat_timing(0, frequency_hz).period_ns.to_string();
        let current = read_attr(&output.dir.join("period")).unwrap_or_default();
        if current != period_ns {
            // The kernel rejects a period shorter than the active duty cycle.
            write_attr(&output.dir.join("duty_cycle"), "0")?;
            write_attr(&output.dir.join("period"), &period_ns)?;
            output.duty_ns = Some(0);
        } else {
            output.duty_ns = read_attr(&output.dir.join("duty_cycle"))
                .ok()
                .and_then(|raw| raw.parse().ok());
        }
        Ok(output)
    }

    fn label(&self) -> String {
        format!("pwmchip{}/pwm{}", self.chip, self.channel)
    }

    fn set_duty(&mut self, duty_ns: u64) -> Result<(), ActuatorError> {
        let result = write_attr(&self.dir.join("duty_cycle"), &duty_ns.to_string())
            .and_then(|()| write_attr(&self.dir.join("enable"), "1"));
        self.duty_ns = result.is_ok().then_some(duty_ns);
        result.map_err(|err| ActuatorError::new(self.label(), err))
    }

    /// Best effort after a failed fan write; the fan error is what gets reported.
    fn force_off(&mut self) {
        if let Err(err) = self.set_duty(0) {
            warn!(output = %self.label(), error = %err, "could not cut heater");
        }
    }

    fn release(&self) -> Result<(), ActuatorError> {
        let result = write_attr(&self.dir.join("enable"), "0")
            .and_then(|()| write_attr(&self.chip_dir.join("unexport"), &self.channel.to_string()));
        if let Err(err) = &result {
            warn!(output = %self.label(), error = %err, "pwm release failed");
        }
        result.map_err(|err| ActuatorError::new(self.label(), err))
    }
}

fn write_attr(path: &Path, value: &str) -> Result<()> {
    fs::write(path, value).with_context(|| format!("write {} to {}", value, path.display()))
}

fn read_attr(path: &Path) -> Result<String> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    Ok(raw.trim().to_string())
}
