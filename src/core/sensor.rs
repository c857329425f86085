use crate::domain::model::Calibration;
use crate::domain::ports::{Adc, Storage};
use crate::utils::error::{CompressorError, Result};

pub const DEFAULT_SAMPLES_PER_READ: usize = 20;

/// Air pressure sensor read through an ADC channel, with a linear
/// calibration mapping the normalized sample to pressure units.
pub struct AirSensor<A: Adc> {
    adc: A,
    calibration: Calibration,
    samples_per_read: usize,
}

impl<A: Adc> AirSensor<A> {
    pub fn new(adc: A, calibration: Calibration, samples_per_read: usize) -> Self {
        Self {
            adc,
            calibration,
            samples_per_read: samples_per_read.max(1),
        }
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    /// One uncalibrated sample in 0.0..=1.0.
    pub fn read_raw(&mut self) -> Result<f64> {
        self.adc.read()
    }

    /// One calibrated sample.
    pub fn read_single(&mut self) -> Result<f64> {
        Ok(self.calibration.apply(self.adc.read()?))
    }

    /// Averaged calibrated reading. The transducer output is noisy, so a
    /// logical reading is the mean of `samples_per_read` samples.
    pub fn read_pressure(&mut self) -> Result<f64> {
        let mut sum = 0.0;
        for _ in 0..self.samples_per_read {
            sum += self.read_single()?;
        }
        Ok(sum / self.samples_per_read as f64)
    }
}

/// Calibration persistence through the storage port. The file keeps the
/// human-readable `equation` field alongside the coefficients.
pub struct CalibrationStore<S: Storage> {
    storage: S,
}

impl<S: Storage> CalibrationStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub async fn load(&self, path: &str) -> Result<Calibration> {
        let data = self.storage.read_file(path).await?;
        let calibration: Calibration = serde_json::from_slice(&data)?;
        tracing::info!(
            "Loaded calibration {} ({})",
            calibration.equation(),
            calibration.units
        );
        Ok(calibration)
    }

    pub async fn save(&self, path: &str, calibration: &Calibration) -> Result<()> {
        if calibration.m == 0.0 {
            return Err(CompressorError::SensorError {
                message: "refusing to save a calibration with zero gradient".to_string(),
            });
        }

        let body = serde_json::json!({
            "equation": calibration.equation(),
            "m": calibration.m,
            "c": calibration.c,
            "units": calibration.units,
        });
        let data = serde_json::to_vec_pretty(&body)?;
        self.storage.write_file(path, &data).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedAdc {
        values: Vec<f64>,
        index: usize,
    }

    impl Adc for FixedAdc {
        fn read(&mut self) -> Result<f64> {
            let value = self.values[self.index.min(self.values.len() - 1)];
            self.index += 1;
            Ok(value)
        }
    }

    fn psi_calibration() -> Calibration {
        Calibration {
            m: -80.0,
            c: 56.0,
            units: "PSI".to_string(),
        }
    }

    #[test]
    fn test_read_single_applies_calibration() {
        let adc = FixedAdc {
            values: vec![0.2],
            index: 0,
        };
        let mut sensor = AirSensor::new(adc, psi_calibration(), 1);
        let reading = sensor.read_single().unwrap();
        assert!((reading - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_read_pressure_averages_samples() {
        // Raw values for 40 and 30 PSI; the mean should land on 35.
        let cal = psi_calibration();
        let adc = FixedAdc {
            values: vec![cal.invert(40.0), cal.invert(30.0)],
            index: 0,
        };
        let mut sensor = AirSensor::new(adc, cal, 2);
        let reading = sensor.read_pressure().unwrap();
        assert!((reading - 35.0).abs() < 1e-9);
    }

    #[test]
    fn test_samples_per_read_is_at_least_one() {
        let adc = FixedAdc {
            values: vec![0.5],
            index: 0,
        };
        let mut sensor = AirSensor::new(adc, psi_calibration(), 0);
        assert!(sensor.read_pressure().is_ok());
    }
}
