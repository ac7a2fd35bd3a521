//! Mapping from roaster levels to physical output values.
//!
//! Fan speed is driven through four discrete stage pins using the inverted
//! pattern `15 - fan_level`, most significant bit first. A `1` bit leaves the
//! pin high, which the common-cathode driver reads as "stage off".

use crate::core::types::MAX_FAN_LEVEL;

/// Number of discrete fan-stage outputs.
pub const FAN_PIN_COUNT: usize = 4;

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Pin values for the fan stages, MSB first.
pub fn fan_pattern(fan_level: u8) -> [bool; FAN_PIN_COUNT] {
    debug_assert!(fan_level <= MAX_FAN_LEVEL, "fan level {fan_level} out of range");
    let inverted = MAX_FAN_LEVEL - fan_level.min(MAX_FAN_LEVEL);
    let mut bits = [false; FAN_PIN_COUNT];
    for (idx, bit) in bits.iter_mut().enumerate() {
        let shift = FAN_PIN_COUNT - 1 - idx;
        *bit = (inverted >> shift) & 1 == 1;
    }
    bits
}

/// Render a fan pattern as `0`/`1` characters, MSB first.
pub fn pattern_string(bits: &[bool; FAN_PIN_COUNT]) -> String {
    bits.iter().map(|bit| if *bit { '1' } else { '0' }).collect()
}

/// PWM timing for the heater channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PwmTiming {
    pub period_ns: u64,
    pub duty_ns: u64,
}

/// Linear duty cycle for `heat_level` percent at `frequency_hz`.
pub fn heat_timing(heat_level: u8, frequency_hz: u32) -> PwmTiming {
    debug_assert!(heat_level <= 100, "heat level {heat_level} out of range");
    debug_assert!(frequency_hz > 0, "pwm frequency must be positive");
    let period_ns = NANOS_PER_SEC / u64::from(frequency_hz.max(1));
    let duty_ns = period_ns * u64::from(heat_level.min(100)) / 100;
    PwmTiming { period_ns, duty_ns }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fan_pattern_is_inverted_msb_first() {
        assert_eq!(pattern_string(&fan_pattern(0)), "1111");
        assert_eq!(pattern_string(&fan_pattern(15)), "0000");
        assert_eq!(pattern_string(&fan_pattern(5)), "1010");
        assert_eq!(pattern_string(&fan_pattern(1)), "1110");
        assert_eq!(pattern_string(&fan_pattern(8)), "0111");
    }

    #[test]
    fn heat_timing_scales_linearly() {
        let off = heat_timing(0, 60);
        assert_eq!(off.period_ns, 16_666_666);
        assert_eq!(off.duty_ns, 0);

        let half = heat_timing(50, 60);
        assert_eq!(half.duty_ns, 8_333_333);

        let full = heat_timing(100, 60);
        assert_eq!(full.duty_ns, full.period_ns);
    }
}
