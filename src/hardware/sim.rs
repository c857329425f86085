//! Software tyre rig.
//!
//! A fixed-volume vessel whose mol count moves with the valve states:
//! constant molar inflow while the pump relay is on, pressure-dependent
//! linear outflow while the bleed relay is on. The same gas relations the
//! estimator uses drive the model, so the rig behaves like a well-behaved
//! real system. Drives the demo binaries and the integration tests.

use crate::core::gas;
use crate::domain::model::{Calibration, Level, RelayLayout};
use crate::domain::ports::{Adc, Gpio};
use crate::utils::error::Result;
use std::sync::{Arc, Mutex};
use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
pub struct SimOptions {
    pub volume_m3: f64,
    pub flow_in_lps: f64,
    pub flow_out_m: f64,
    pub flow_out_c: f64,
    pub temperature_c: f64,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            volume_m3: 1.5,
            flow_in_lps: 0.5,
            flow_out_m: 1e-6,
            flow_out_c: 0.05,
            temperature_c: 20.0,
        }
    }
}

struct SimState {
    moles: f64,
    inlet_open: bool,
    outlet_open: bool,
    last_tick: Instant,
    opts: SimOptions,
    temp_k: f64,
}

impl SimState {
    fn pressure_pa(&self) -> f64 {
        self.moles * gas::UNIVERSAL_GAS_CONSTANT * self.temp_k / self.opts.volume_m3
    }

    /// Integrate the vessel forward to `now`. The outflow depends on the
    /// instantaneous pressure, so long intervals are integrated in small
    /// sub-steps.
    fn advance_to(&mut self, now: Instant) {
        let mut remaining = now.saturating_duration_since(self.last_tick).as_secs_f64();
        self.last_tick = now;

        if !self.inlet_open && !self.outlet_open {
            return;
        }

        let flow_in = gas::flow_lps_to_mols(self.opts.flow_in_lps);
        const STEP_SECS: f64 = 0.05;
        while remaining > 0.0 {
            let dt = remaining.min(STEP_SECS);
            if self.inlet_open {
                self.moles += flow_in * dt;
            }
            if self.outlet_open {
                let p = self.pressure_pa();
                let out =
                    gas::flow_lps_to_mols(-(self.opts.flow_out_m * p + self.opts.flow_out_c));
                self.moles = (self.moles + out * dt).max(0.0);
            }
            remaining -= dt;
        }
    }
}

/// Handle to a simulated rig; hands out the `Adc` and `Gpio` halves that
/// plug into the compressor. Must be created inside a tokio runtime.
pub struct SimulatedTyre {
    state: Arc<Mutex<SimState>>,
    calibration: Calibration,
    layout: RelayLayout,
}

impl SimulatedTyre {
    pub fn new(
        initial_pressure: f64,
        calibration: Calibration,
        layout: RelayLayout,
        opts: SimOptions,
    ) -> Self {
        let temp_k = gas::celsius_to_kelvin(opts.temperature_c);
        let moles = gas::moles(opts.volume_m3, gas::psi_to_pa(initial_pressure), temp_k);

        Self {
            state: Arc::new(Mutex::new(SimState {
                moles,
                inlet_open: false,
                outlet_open: false,
                last_tick: Instant::now(),
                opts,
                temp_k,
            })),
            calibration,
            layout,
        }
    }

    pub fn adc(&self) -> SimAdc {
        SimAdc {
            state: self.state.clone(),
            calibration: self.calibration.clone(),
        }
    }

    pub fn gpio(&self) -> SimGpio {
        SimGpio {
            state: self.state.clone(),
            layout: self.layout,
        }
    }

    /// Current simulated pressure in sensor units.
    pub fn pressure(&self) -> f64 {
        let mut state = self.state.lock().unwrap();
        state.advance_to(Instant::now());
        gas::pa_to_psi(state.pressure_pa())
    }
}

pub struct SimAdc {
    state: Arc<Mutex<SimState>>,
    calibration: Calibration,
}

impl Adc for SimAdc {
    fn read(&mut self) -> Result<f64> {
        let mut state = self.state.lock().unwrap();
        state.advance_to(Instant::now());
        let pressure = gas::pa_to_psi(state.pressure_pa());
        Ok(self.calibration.invert(pressure))
    }
}

pub struct SimGpio {
    state: Arc<Mutex<SimState>>,
    layout: RelayLayout,
}

impl Gpio for SimGpio {
    fn setup_output(&mut self, _pin: u8) -> Result<()> {
        Ok(())
    }

    fn write(&mut self, pin: u8, level: Level) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.advance_to(Instant::now());

        if pin == self.layout.inlet.pin {
            state.inlet_open = level != self.layout.inlet.off_level;
        } else if pin == self.layout.outlet.pin {
            state.outlet_open = level != self.layout.outlet.off_level;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::RelayChannelSpec;
    use std::time::Duration;

    fn test_layout() -> RelayLayout {
        RelayLayout {
            max_channels: 4,
            inlet: RelayChannelSpec {
                pin: 17,
                off_level: Level::High,
            },
            outlet: RelayChannelSpec {
                pin: 27,
                off_level: Level::High,
            },
        }
    }

    fn test_calibration() -> Calibration {
        Calibration {
            m: -80.0,
            c: 56.0,
            units: "PSI".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_pressure_holds_while_valves_closed() {
        let rig = SimulatedTyre::new(20.0, test_calibration(), test_layout(), SimOptions::default());
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!((rig.pressure() - 20.0).abs() < 1e-6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_inlet_raises_pressure() {
        let rig = SimulatedTyre::new(20.0, test_calibration(), test_layout(), SimOptions::default());
        let mut gpio = rig.gpio();

        gpio.write(17, Level::Low).unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
        gpio.write(17, Level::High).unwrap();

        let after = rig.pressure();
        assert!(after > 22.0, "pressure was {}", after);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!((rig.pressure() - after).abs() < 1e-6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_outlet_lowers_pressure() {
        let rig = SimulatedTyre::new(40.0, test_calibration(), test_layout(), SimOptions::default());
        let mut gpio = rig.gpio();

        gpio.write(27, Level::Low).unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
        gpio.write(27, Level::High).unwrap();

        assert!(rig.pressure() < 38.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_adc_reports_calibrated_raw_value() {
        let cal = test_calibration();
        let rig = SimulatedTyre::new(24.0, cal.clone(), test_layout(), SimOptions::default());
        let mut adc = rig.adc();

        let raw = adc.read().unwrap();
        assert!((cal.apply(raw) - 24.0).abs() < 1e-9);
    }
}
