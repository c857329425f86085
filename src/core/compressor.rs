//! Closed-loop inflation controller.
//!
//! One control round measures the pressure, estimates from ideal-gas
//! physics how long the pump or bleed valve must run to land on the
//! target, applies that single correction and re-measures. The system
//! volume is unknown up front, so a short probe actuation bootstraps the
//! mol-count and volume estimates before the loop starts.

use crate::core::relays::{RelayBank, INLET, OUTLET};
use crate::core::sensor::AirSensor;
use crate::core::{gas, ConfigProvider};
use crate::domain::model::{CompressorSettings, FlowSample, TargetReport};
use crate::domain::ports::{Adc, Gpio, PressureController};
use crate::utils::error::{CompressorError, Result};
use async_trait::async_trait;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
struct SystemEstimate {
    moles: f64,
    volume: f64,
}

pub struct Compressor<A: Adc, G: Gpio> {
    sensor: AirSensor<A>,
    relays: RelayBank<G>,
    settings: CompressorSettings,
    inflations: u32,
    deflations: u32,
}

impl<A: Adc, G: Gpio> Compressor<A, G> {
    pub fn new(sensor: AirSensor<A>, relays: RelayBank<G>, settings: CompressorSettings) -> Self {
        Self {
            sensor,
            relays,
            settings,
            inflations: 0,
            deflations: 0,
        }
    }

    pub fn from_config<C: ConfigProvider>(adc: A, gpio: G, config: &C) -> Result<Self> {
        let sensor = AirSensor::new(adc, config.calibration(), config.samples_per_read());
        let relays = RelayBank::from_layout(gpio, &config.relay_layout())?;
        Ok(Self::new(sensor, relays, config.compressor_settings()))
    }

    pub fn settings(&self) -> &CompressorSettings {
        &self.settings
    }

    pub fn open_inlet(&mut self) -> Result<()> {
        self.relays.set_on(INLET)
    }

    pub fn close_inlet(&mut self) -> Result<()> {
        self.relays.set_off(INLET)
    }

    pub fn open_outlet(&mut self) -> Result<()> {
        self.relays.set_on(OUTLET)
    }

    pub fn close_outlet(&mut self) -> Result<()> {
        self.relays.set_off(OUTLET)
    }

    pub fn is_inlet_open(&self) -> Result<bool> {
        self.relays.is_on(INLET)
    }

    pub fn is_outlet_open(&self) -> Result<bool> {
        self.relays.is_on(OUTLET)
    }

    /// Run the pump for `duration`, then let the pressure settle.
    pub async fn inflate(&mut self, duration: Duration) -> Result<()> {
        self.open_inlet()?;
        tokio::time::sleep(duration).await;
        self.close_inlet()?;
        tokio::time::sleep(self.settings.balance_delay).await;
        self.inflations += 1;
        Ok(())
    }

    /// Hold the bleed valve open for `duration`, then let the pressure settle.
    pub async fn deflate(&mut self, duration: Duration) -> Result<()> {
        self.open_outlet()?;
        tokio::time::sleep(duration).await;
        self.close_outlet()?;
        tokio::time::sleep(self.settings.balance_delay).await;
        self.deflations += 1;
        Ok(())
    }

    /// Averaged pressure reading in sensor units. Any open valve is closed
    /// first and the reading waits out the balance delay, since a moving
    /// air column swamps the transducer.
    pub async fn check_pressure(&mut self) -> Result<f64> {
        let mut flow_changed = false;
        if self.is_outlet_open()? {
            self.close_outlet()?;
            flow_changed = true;
        }
        if self.is_inlet_open()? {
            self.close_inlet()?;
            flow_changed = true;
        }

        if flow_changed {
            tokio::time::sleep(self.settings.balance_delay).await;
        }

        self.sensor.read_pressure()
    }

    /// Expected outflow through the bleed valve at the given pressure, in
    /// mol/s. The linear model comes from the flow-rate survey; the sign is
    /// negative while gas leaves the system.
    fn out_flow_rate(&self, pressure_pa: f64) -> f64 {
        gas::flow_lps_to_mols(-(self.settings.flow_out_m * pressure_pa + self.settings.flow_out_c))
    }

    fn within_margin(&self, target: f64, pressure: f64) -> bool {
        (target - self.settings.error_margin) <= pressure
            && pressure <= (target + self.settings.error_margin)
    }

    /// Bootstrap the mol-count and volume estimates with a short probe
    /// actuation toward the target.
    async fn estimate_system(&mut self, p_curr_pa: f64, target_pa: f64) -> Result<SystemEstimate> {
        let (flow_rate, probe) = if p_curr_pa > target_pa {
            let probe = self.settings.init_deflate;
            tracing::trace!(
                "Initial estimation probe: deflating for {:.1}s",
                probe.as_secs_f64()
            );
            let flow = self.out_flow_rate(p_curr_pa);
            self.deflate(probe).await?;
            (flow, probe)
        } else {
            let probe = self.settings.init_inflate;
            tracing::trace!(
                "Initial estimation probe: inflating for {:.1}s",
                probe.as_secs_f64()
            );
            let flow = self.settings.flow_rate_in;
            self.inflate(probe).await?;
            (flow, probe)
        };

        let probe_secs = probe.as_secs_f64();
        let p_after_pa = gas::psi_to_pa(self.check_pressure().await?);
        // The probe itself moved gas, so correct the pre-probe estimate by
        // the amount transferred.
        let moles = gas::moles_from_pressure_delta(p_curr_pa, p_after_pa, probe_secs, flow_rate)?
            + flow_rate * probe_secs;

        let p_now_pa = gas::psi_to_pa(self.check_pressure().await?);
        let volume = gas::volume(p_now_pa, moles, self.settings.ambient_temp);

        Ok(SystemEstimate { moles, volume })
    }

    /// Inflate or deflate until the reading is within the error margin of
    /// `target` (sensor units).
    pub async fn reach_target(&mut self, target: f64) -> Result<TargetReport> {
        self.inflations = 0;
        self.deflations = 0;

        let units = self.sensor.calibration().units.clone();
        let start_pressure = self.check_pressure().await?;
        tracing::info!(
            "Inflate/deflate to target {}{} from {:.2}{}",
            target,
            units,
            start_pressure,
            units
        );

        if start_pressure.round() == target.round() {
            tracing::info!(
                "Current reading of {:.0}{} is already at target of {}{}",
                start_pressure,
                units,
                target,
                units
            );
            return Ok(TargetReport {
                target,
                start_pressure,
                final_pressure: start_pressure,
                rounds: 0,
                inflations: 0,
                deflations: 0,
                actuation_secs: 0.0,
            });
        }

        let target_pa = gas::psi_to_pa(target);
        let estimate = self
            .estimate_system(gas::psi_to_pa(start_pressure), target_pa)
            .await?;
        tracing::debug!(
            "Estimated current mols as {} and volume as {} m3",
            estimate.moles,
            estimate.volume
        );

        let p_loop_start = self.check_pressure().await?;
        tracing::info!(
            "Starting control loop: {:.0}{} -> {}{}",
            p_loop_start,
            units,
            target,
            units
        );

        let mut time_taken = 0.0;
        let mut rounds = 0u32;
        let mut p_curr;
        loop {
            p_curr = self.check_pressure().await?;
            let p_curr_pa = gas::psi_to_pa(p_curr);
            tracing::info!("Currently at {:.0}{}", p_curr, units);

            if self.within_margin(target, p_curr) {
                tracing::info!(
                    "Pressure {:.2}{} is within {}{} +/- {}",
                    p_curr,
                    units,
                    target,
                    units,
                    self.settings.error_margin
                );
                tracing::info!(
                    "Target {}{} reached in {:.2}s and {} rounds",
                    target,
                    units,
                    time_taken,
                    rounds
                );
                break;
            }

            let mol_curr = gas::moles(estimate.volume, p_curr_pa, self.settings.ambient_temp);
            let (flow_rate, inflating) = if p_curr > target {
                (self.out_flow_rate(p_curr_pa), false)
            } else {
                (self.settings.flow_rate_in, true)
            };

            let est_secs = gas::time_to_target(p_curr_pa, target_pa, mol_curr, flow_rate)?;
            if !est_secs.is_finite() || est_secs <= 0.0 {
                return Err(CompressorError::EstimationError {
                    message: format!(
                        "estimated run time {:.2}s is not usable (at {:.2}{}, target {}{})",
                        est_secs, p_curr, units, target, units
                    ),
                });
            }
            tracing::debug!("Estimated time to target is {:.0}s", est_secs);

            let correction = Duration::from_secs_f64(est_secs);
            if inflating {
                self.inflate(correction).await?;
            } else {
                self.deflate(correction).await?;
            }
            time_taken += est_secs;
            rounds += 1;
        }

        Ok(TargetReport {
            target,
            start_pressure,
            final_pressure: p_curr,
            rounds,
            inflations: self.inflations,
            deflations: self.deflations,
            actuation_secs: time_taken,
        })
    }

    /// Survey the bleed valve's flow rate: step the pressure down from
    /// `start` to `end` in fixed deflation intervals and record the flow
    /// observed across each step. The samples feed an offline linear fit
    /// of the outflow model.
    pub async fn calibrate_flow_rate(
        &mut self,
        start: f64,
        end: f64,
        interval: Duration,
    ) -> Result<Vec<FlowSample>> {
        tracing::info!("Starting flow-rate survey from {} down to {}", start, end);
        let p_curr = self.check_pressure().await?;
        tracing::info!("Starting pressure is {:.0}", p_curr);

        // Probe upward a little to size the system, as reach_target does.
        let p_curr_pa = gas::psi_to_pa(p_curr);
        let estimate = self
            .estimate_system(p_curr_pa, gas::psi_to_pa(p_curr + 5.0))
            .await?;

        let p_now = self.check_pressure().await?;
        if !self.within_margin(start, p_now) {
            self.reach_target(start).await?;
        }

        tracing::info!(
            "Deflating in {:.1}s steps until {}",
            interval.as_secs_f64(),
            end
        );

        let mut samples = Vec::new();
        let mut p_curr = self.check_pressure().await?;
        while p_curr > end {
            let p_prev_pa = gas::psi_to_pa(p_curr);
            self.deflate(interval).await?;

            p_curr = self.check_pressure().await?;
            let p_curr_pa = gas::psi_to_pa(p_curr);
            let mol_curr = gas::moles(estimate.volume, p_curr_pa, self.settings.ambient_temp);
            let flow_rate =
                gas::flow_rate_from_delta(p_prev_pa, p_curr_pa, interval.as_secs_f64(), mol_curr)?;

            samples.push(FlowSample {
                pressure_pa: p_curr_pa,
                flow_rate_mols: flow_rate,
            });
        }

        tracing::info!("Flow-rate survey captured {} samples", samples.len());
        Ok(samples)
    }

    /// Drive both valves closed, e.g. before process exit.
    pub fn shutdown(&mut self) -> Result<()> {
        tracing::info!("Stopping compressor, closing all valves");
        self.relays.all_off()
    }
}

#[async_trait]
impl<A: Adc, G: Gpio> PressureController for Compressor<A, G> {
    async fn current_pressure(&mut self) -> Result<f64> {
        self.check_pressure().await
    }

    async fn reach_target(&mut self, target: f64) -> Result<TargetReport> {
        Compressor::reach_target(self, target).await
    }
}
