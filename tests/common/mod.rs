#![allow(dead_code)]

use auto_compressor::core::relays::{RelayBank, INLET, OUTLET};
use auto_compressor::core::sensor::AirSensor;
use auto_compressor::domain::model::{RelayChannelSpec, RelayLayout};
pub use auto_compressor::domain::model::Level;
use auto_compressor::{Adc, Calibration, Compressor, CompressorSettings, Gpio, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

pub const SAMPLES_PER_READ: usize = 20;

pub const INLET_PIN: u8 = 17;
pub const OUTLET_PIN: u8 = 27;

pub fn psi_calibration() -> Calibration {
    Calibration {
        m: -80.0,
        c: 56.0,
        units: "PSI".to_string(),
    }
}

pub fn test_layout() -> RelayLayout {
    RelayLayout {
        max_channels: 4,
        inlet: RelayChannelSpec {
            pin: INLET_PIN,
            off_level: Level::High,
        },
        outlet: RelayChannelSpec {
            pin: OUTLET_PIN,
            off_level: Level::High,
        },
    }
}

/// The reference tuning used across the control-loop tests: 5s probes,
/// 0.5 L/s pump, the surveyed outflow line, 1 PSI margin at 20 degrees.
pub fn reference_settings() -> CompressorSettings {
    CompressorSettings {
        init_inflate: Duration::from_secs(5),
        init_deflate: Duration::from_secs(5),
        flow_rate_in: 2.1,
        flow_out_m: 1e-6,
        flow_out_c: 0.05,
        balance_delay: Duration::from_millis(500),
        error_margin: 1.0,
        ambient_temp: 293.15,
    }
}

/// ADC that plays back a script of logical pressure readings. Each logical
/// reading is expanded to `samples` identical raw values, since the sensor
/// averages that many samples per reading. Once the script is exhausted the
/// last value repeats.
pub struct ScriptedAdc {
    values: Vec<f64>,
    index: Arc<AtomicUsize>,
}

impl ScriptedAdc {
    pub fn from_pressures(calibration: &Calibration, pressures: &[f64], samples: usize) -> Self {
        let values = pressures
            .iter()
            .flat_map(|p| std::iter::repeat(calibration.invert(*p)).take(samples))
            .collect();
        Self {
            values,
            index: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shared raw-sample counter, for asserting consumption.
    pub fn reads(&self) -> Arc<AtomicUsize> {
        self.index.clone()
    }
}

impl Adc for ScriptedAdc {
    fn read(&mut self) -> Result<f64> {
        let i = self.index.fetch_add(1, Ordering::SeqCst);
        Ok(self.values[i.min(self.values.len() - 1)])
    }
}

/// GPIO double that timestamps every write, so tests can reconstruct how
/// long each valve was held open.
#[derive(Clone, Default)]
pub struct RecordingGpio {
    pub writes: Arc<Mutex<Vec<(Instant, u8, Level)>>>,
}

impl Gpio for RecordingGpio {
    fn setup_output(&mut self, _pin: u8) -> Result<()> {
        Ok(())
    }

    fn write(&mut self, pin: u8, level: Level) -> Result<()> {
        self.writes.lock().unwrap().push((Instant::now(), pin, level));
        Ok(())
    }
}

/// Seconds each on/off pair held `pin` away from `off_level`.
pub fn open_durations(
    writes: &[(Instant, u8, Level)],
    pin: u8,
    off_level: Level,
) -> Vec<f64> {
    let mut durations = Vec::new();
    let mut opened_at: Option<Instant> = None;

    for (at, wrote_pin, level) in writes {
        if *wrote_pin != pin {
            continue;
        }
        if *level != off_level {
            opened_at = Some(*at);
        } else if let Some(start) = opened_at.take() {
            durations.push((*at - start).as_secs_f64());
        }
    }

    durations
}

pub struct ScriptedRig {
    pub compressor: Compressor<ScriptedAdc, RecordingGpio>,
    pub reads: Arc<AtomicUsize>,
    pub writes: Arc<Mutex<Vec<(Instant, u8, Level)>>>,
}

/// Compressor over a scripted sensor and a recording relay board, with the
/// reference tuning.
pub fn scripted_rig(pressures: &[f64]) -> ScriptedRig {
    let calibration = psi_calibration();
    let adc = ScriptedAdc::from_pressures(&calibration, pressures, SAMPLES_PER_READ);
    let reads = adc.reads();

    let gpio = RecordingGpio::default();
    let writes = gpio.writes.clone();

    let sensor = AirSensor::new(adc, calibration, SAMPLES_PER_READ);
    let relays =
        RelayBank::from_layout(gpio, &test_layout()).expect("relay layout should register");

    ScriptedRig {
        compressor: Compressor::new(sensor, relays, reference_settings()),
        reads,
        writes,
    }
}
