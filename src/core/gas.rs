//! Ideal-gas estimation math for the inflation loop.
//!
//! All pressures are in pascal, temperatures in kelvin, amounts in mol and
//! flow rates in mol/s. Sensor-facing code converts from the calibrated
//! sensor units (PSI) at the boundary.

use crate::utils::error::{CompressorError, Result};

/// m3.Pa.mol^-1.K^-1
pub const UNIVERSAL_GAS_CONSTANT: f64 = 8.3145;

/// Average mol count per m3 of air at ambient conditions.
pub const MOLES_PER_M3: f64 = 0.0042 * 1000.0;

const PA_PER_PSI: f64 = 6894.76;

/// Initial mol count derived from the pressure change a known flow produced
/// over `t` seconds:
///
/// n = flow_rate * p1 * t / (p2 - p1)
pub fn moles_from_pressure_delta(p1: f64, p2: f64, t: f64, flow_rate: f64) -> Result<f64> {
    // Real actuations move thousands of pascal; anything this small is a
    // dead pump, a stuck valve or a frozen sensor.
    if (p2 - p1).abs() < 1e-6 {
        return Err(CompressorError::EstimationError {
            message: format!("no pressure change observed over {:.1}s probe", t),
        });
    }

    let result = (flow_rate * p1 * t) / (p2 - p1);
    tracing::trace!(
        "Moles from pressure delta: (p1, p2, t, flow_rate) ({}, {}, {}, {}) = {}",
        p1,
        p2,
        t,
        flow_rate,
        result
    );
    Ok(result)
}

/// Inverse of [`moles_from_pressure_delta`], used by the flow-rate survey:
///
/// flow = n0 * (p2 - p1) / (p1 * t)
pub fn flow_rate_from_delta(p1: f64, p2: f64, t: f64, n0: f64) -> Result<f64> {
    if p1 == 0.0 || t == 0.0 {
        return Err(CompressorError::EstimationError {
            message: "flow rate is undefined for zero pressure or zero interval".to_string(),
        });
    }

    let result = (n0 * (p2 - p1)) / (p1 * t);
    tracing::trace!(
        "Flow rate from delta: (p1, p2, t, n0) ({}, {}, {}, {}) = {}",
        p1,
        p2,
        t,
        n0,
        result
    );
    Ok(result)
}

/// n = pV / RT
pub fn moles(volume: f64, pressure: f64, temp: f64) -> f64 {
    let result = (pressure * volume) / (UNIVERSAL_GAS_CONSTANT * temp);
    tracing::trace!(
        "Moles: (v, p, T) ({}, {}, {}) = {}",
        volume,
        pressure,
        temp,
        result
    );
    result
}

/// V = nRT / p
pub fn volume(pressure: f64, n: f64, temp: f64) -> f64 {
    let result = (n * UNIVERSAL_GAS_CONSTANT * temp) / pressure;
    tracing::trace!(
        "Volume: (p, n, T) ({}, {}, {}) = {}",
        pressure,
        n,
        temp,
        result
    );
    result
}

/// Seconds of constant `flow_rate` needed to move `n0` mol of gas from
/// pressure `p1` to `p2`:
///
/// t = n0 * (p2 - p1) / (flow_rate * p1)
pub fn time_to_target(p1: f64, p2: f64, n0: f64, flow_rate: f64) -> Result<f64> {
    if flow_rate == 0.0 {
        return Err(CompressorError::EstimationError {
            message: "cannot reach target with zero flow rate".to_string(),
        });
    }

    let result = (n0 * (p2 - p1)) / (flow_rate * p1);
    tracing::trace!(
        "Est. time to target: (p1, p2, n0, flow_rate) ({}, {}, {}, {}) = {}",
        p1,
        p2,
        n0,
        flow_rate,
        result
    );
    Ok(result)
}

pub fn psi_to_pa(pressure: f64) -> f64 {
    pressure * PA_PER_PSI
}

pub fn pa_to_psi(pressure: f64) -> f64 {
    pressure / PA_PER_PSI
}

pub fn celsius_to_kelvin(temp: f64) -> f64 {
    temp + 273.15
}

/// Convert a pump rating in L/s to mol/s using the average molar density
/// of air. The per-m3 density is applied directly against the L/s figure;
/// the flow-rate calibration absorbs the scale, so both rates just have to
/// share the convention.
pub fn flow_lps_to_mols(rate: f64) -> f64 {
    let result = rate * MOLES_PER_M3;
    tracing::trace!("{} L/s in mols = {}", rate, result);
    result
}
