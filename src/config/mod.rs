pub mod toml_config;

pub use toml_config::TomlConfig;

#[cfg(feature = "cli")]
pub mod cli;

#[cfg(feature = "cli")]
use crate::utils::error::{CompressorError, Result};
#[cfg(feature = "cli")]
use crate::utils::validation::{validate_path, Validate};
#[cfg(feature = "cli")]
use clap::Parser;
#[cfg(feature = "cli")]
use serde::{Deserialize, Serialize};

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "auto-compressor")]
#[command(about = "Closed-loop tyre inflation controller")]
pub struct CliConfig {
    #[arg(long, default_value = "config.toml")]
    pub config: String,

    #[arg(long, help = "Target pressure in the sensor's calibrated units")]
    pub target: Option<f64>,

    #[arg(long, help = "Run against the simulated rig instead of hardware")]
    pub simulate: bool,

    #[arg(
        long,
        default_value = "20.0",
        help = "Starting pressure of the simulated rig"
    )]
    pub sim_pressure: f64,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log process CPU/memory usage between phases")]
    pub monitor: bool,
}

#[cfg(feature = "cli")]
impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validate_path("--config", &self.config)?;

        match self.target {
            None => Err(CompressorError::MissingConfigError {
                field: "--target".to_string(),
            }),
            Some(target) if !target.is_finite() || target <= 0.0 || target > 200.0 => {
                Err(CompressorError::InvalidConfigValueError {
                    field: "--target".to_string(),
                    value: target.to_string(),
                    reason: "Target pressure must be a positive number up to 200".to_string(),
                })
            }
            Some(_) => Ok(()),
        }
    }
}
