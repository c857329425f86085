use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Logic level written to a GPIO pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Level {
    Low,
    High,
}

impl Level {
    pub fn invert(self) -> Level {
        match self {
            Level::Low => Level::High,
            Level::High => Level::Low,
        }
    }
}

impl TryFrom<u8> for Level {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, u8> {
        match value {
            0 => Ok(Level::Low),
            1 => Ok(Level::High),
            other => Err(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    On,
    Off,
}

/// Linear transfer function of the air sensor: pressure = m * raw + c.
/// `raw` is the normalized ADC sample in 0.0..=1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub m: f64,
    pub c: f64,
    pub units: String,
}

impl Calibration {
    pub fn apply(&self, raw: f64) -> f64 {
        self.m * raw + self.c
    }

    /// Raw sample that would produce `pressure`. Used by the simulator
    /// and by scripted test sensors.
    pub fn invert(&self, pressure: f64) -> f64 {
        (pressure - self.c) / self.m
    }

    pub fn equation(&self) -> String {
        format!("y = {}x + {}", self.m, self.c)
    }
}

/// One relay channel: the pin it switches and the level that leaves the
/// relay open-circuit. Relay boards are commonly active-low, so "off"
/// may mean driving the pin high.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayChannelSpec {
    pub pin: u8,
    pub off_level: Level,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayLayout {
    pub max_channels: usize,
    pub inlet: RelayChannelSpec,
    pub outlet: RelayChannelSpec,
}

/// Tunables of the closed-loop controller. Flow rates are in mol/s
/// (converted from the configured L/s), temperature in kelvin, pressures
/// in the sensor's calibrated units.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressorSettings {
    pub init_inflate: Duration,
    pub init_deflate: Duration,
    pub flow_rate_in: f64,
    pub flow_out_m: f64,
    pub flow_out_c: f64,
    pub balance_delay: Duration,
    pub error_margin: f64,
    pub ambient_temp: f64,
}

/// Outcome of one `reach_target` run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetReport {
    pub target: f64,
    pub start_pressure: f64,
    pub final_pressure: f64,
    pub rounds: u32,
    pub inflations: u32,
    pub deflations: u32,
    /// Accumulated valve-open time across all corrections, in seconds.
    pub actuation_secs: f64,
}

/// One measurement from the deflation flow-rate survey.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowSample {
    pub pressure_pa: f64,
    pub flow_rate_mols: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calibration_apply_and_invert_are_inverse() {
        let cal = Calibration {
            m: -80.0,
            c: 56.0,
            units: "PSI".to_string(),
        };

        let raw = 0.4;
        let pressure = cal.apply(raw);
        assert!((cal.invert(pressure) - raw).abs() < 1e-12);
    }

    #[test]
    fn test_level_invert() {
        assert_eq!(Level::Low.invert(), Level::High);
        assert_eq!(Level::High.invert(), Level::Low);
    }

    #[test]
    fn test_level_from_u8() {
        assert_eq!(Level::try_from(0).unwrap(), Level::Low);
        assert_eq!(Level::try_from(1).unwrap(), Level::High);
        assert!(Level::try_from(2).is_err());
    }
}
