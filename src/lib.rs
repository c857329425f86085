pub mod config;
pub mod core;
pub mod domain;
pub mod hardware;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::{cli::LocalStorage, CliConfig};
pub use config::TomlConfig;

pub use core::compressor::Compressor;
pub use core::engine::ControlEngine;
pub use core::relays::RelayBank;
pub use core::sensor::{AirSensor, CalibrationStore};
pub use domain::model::{Calibration, CompressorSettings, RelayLayout, TargetReport};
pub use domain::ports::{Adc, ConfigProvider, Gpio, PressureController, Storage};
pub use utils::error::{CompressorError, Result};
