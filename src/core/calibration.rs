//! Sensor calibration capture and fitting.
//!
//! A calibration session takes batches of raw samples at known reference
//! pressures, then fits the linear transfer function through the batch
//! means. The deflation flow-rate survey output is written as CSV for
//! offline fitting of the outflow model.

use crate::domain::model::FlowSample;
use crate::domain::ports::{Adc, Storage};
use crate::utils::error::{CompressorError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

/// One labelled batch of raw samples captured at a known pressure.
#[derive(Debug, Clone, Serialize)]
pub struct CalibrationSample {
    pub label: String,
    pub captured_at: DateTime<Utc>,
    pub data: Vec<f64>,
    pub avg: f64,
    pub variance: f64,
    pub std_dev: f64,
}

impl CalibrationSample {
    /// Read `count` raw samples spread evenly over `duration`.
    pub async fn capture<A: Adc>(
        label: &str,
        adc: &mut A,
        duration: Duration,
        count: usize,
    ) -> Result<Self> {
        let count = count.max(1);
        let interval = duration / count as u32;

        let mut data = Vec::with_capacity(count);
        while data.len() < count {
            data.push(adc.read()?);
            tokio::time::sleep(interval).await;
        }

        let avg = data.iter().sum::<f64>() / count as f64;
        let variance = data.iter().map(|x| (x - avg).powi(2)).sum::<f64>() / count as f64;

        Ok(Self {
            label: label.to_string(),
            captured_at: Utc::now(),
            data,
            avg,
            variance,
            std_dev: variance.sqrt(),
        })
    }

    pub async fn save<S: Storage>(&self, storage: &S, path: &str) -> Result<()> {
        let data = serde_json::to_vec_pretty(self)?;
        storage.write_file(path, &data).await
    }
}

/// Ordinary least-squares fit of y = m*x + c through the given points.
pub fn fit_line(xs: &[f64], ys: &[f64]) -> Result<(f64, f64)> {
    if xs.len() != ys.len() {
        return Err(CompressorError::EstimationError {
            message: format!(
                "calibration points mismatched: {} readings vs {} pressures",
                xs.len(),
                ys.len()
            ),
        });
    }
    if xs.len() < 2 {
        return Err(CompressorError::EstimationError {
            message: "need at least two calibration points to fit a line".to_string(),
        });
    }

    let n = xs.len() as f64;
    let sum_x: f64 = xs.iter().sum();
    let sum_y: f64 = ys.iter().sum();
    let sum_xx: f64 = xs.iter().map(|x| x * x).sum();
    let sum_xy: f64 = xs.iter().zip(ys).map(|(x, y)| x * y).sum();

    let denom = n * sum_xx - sum_x * sum_x;
    if denom.abs() < f64::EPSILON {
        return Err(CompressorError::EstimationError {
            message: "calibration readings are all identical; cannot fit a gradient".to_string(),
        });
    }

    let m = (n * sum_xy - sum_x * sum_y) / denom;
    let c = (sum_y - m * sum_x) / n;

    tracing::debug!("Fitted calibration line m = {}, c = {}", m, c);
    Ok((m, c))
}

/// Write the flow-rate survey as CSV (pressure_pa, flow_rate_mols).
pub fn write_flow_samples<W: std::io::Write>(writer: W, samples: &[FlowSample]) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for sample in samples {
        csv_writer.serialize(sample)?;
    }
    csv_writer.flush()?;
    Ok(())
}
