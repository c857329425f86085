use crate::domain::model::{Calibration, CompressorSettings, Level, RelayLayout, TargetReport};
use crate::utils::error::Result;
use async_trait::async_trait;

/// One normalized sample from an analog-to-digital converter, in 0.0..=1.0.
pub trait Adc: Send {
    fn read(&mut self) -> Result<f64>;
}

/// Digital output pins, as much of them as the relay bank needs.
pub trait Gpio: Send {
    fn setup_output(&mut self, pin: u8) -> Result<()>;
    fn write(&mut self, pin: u8, level: Level) -> Result<()>;
}

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn calibration(&self) -> Calibration;
    fn samples_per_read(&self) -> usize;
    fn relay_layout(&self) -> RelayLayout;
    fn compressor_settings(&self) -> CompressorSettings;
}

#[async_trait]
pub trait PressureController: Send {
    async fn current_pressure(&mut self) -> Result<f64>;
    async fn reach_target(&mut self, target: f64) -> Result<TargetReport>;
}
