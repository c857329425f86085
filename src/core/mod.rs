pub mod calibration;
pub mod compressor;
pub mod engine;
pub mod gas;
pub mod relays;
pub mod sensor;

pub use crate::domain::model::{
    Calibration, CompressorSettings, FlowSample, Level, RelayLayout, TargetReport,
};
pub use crate::domain::ports::{Adc, ConfigProvider, Gpio, PressureController, Storage};
pub use crate::utils::error::Result;
