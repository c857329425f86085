use crate::core::gas;
use crate::core::sensor::DEFAULT_SAMPLES_PER_READ;
use crate::core::ConfigProvider;
use crate::domain::model::{
    Calibration, CompressorSettings, Level, RelayChannelSpec, RelayLayout,
};
use crate::utils::error::{CompressorError, Result};
use crate::utils::validation::{
    validate_finite, validate_gpio_pin, validate_logic_level, validate_non_empty_string,
    validate_positive_number, validate_range, Validate,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

const DEFAULT_MAX_CHANNELS: usize = 4;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub controller: ControllerConfig,
    pub sensor: SensorConfig,
    pub relays: RelaysConfig,
    pub compressor: CompressorConfig,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorConfig {
    /// Gradient and offset of the linear calibration, from the calibrate tool.
    pub m: f64,
    pub c: f64,
    pub units: String,
    pub channel: u8,
    pub samples_per_read: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelaysConfig {
    pub max_channels: Option<usize>,
    pub inlet_pin: u8,
    pub outlet_pin: u8,
    /// 0 or 1; the level that leaves the relay open-circuit.
    pub inlet_off_level: u8,
    pub outlet_off_level: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressorConfig {
    /// Pump inflow in L/s.
    pub flow_rate_in: f64,
    /// Linear outflow model over pascal, from the flow-rate survey.
    pub flow_rate_out_m: f64,
    pub flow_rate_out_c: f64,
    /// Probe durations for the initial system estimation, seconds.
    pub init_check_inflate: f64,
    pub init_check_deflate: f64,
    /// Settle time after closing a valve before trusting a reading, seconds.
    pub pressure_balance_delay: f64,
    /// Acceptable distance from the target, sensor units.
    pub error_margin: f64,
    /// Ambient temperature assumption, celsius.
    pub temperature: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: Option<String>,
    pub stdout: Option<bool>,
}

impl TomlConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(CompressorError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| CompressorError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replace `${VAR}` references with environment values. Unresolved
    /// variables are left as-is so validation can point at them.
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").unwrap();

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        validate_non_empty_string("controller.name", &self.controller.name)?;

        validate_finite("sensor.m", self.sensor.m)?;
        validate_finite("sensor.c", self.sensor.c)?;
        if self.sensor.m == 0.0 {
            return Err(CompressorError::InvalidConfigValueError {
                field: "sensor.m".to_string(),
                value: "0".to_string(),
                reason: "A zero gradient cannot map readings to pressure".to_string(),
            });
        }
        validate_non_empty_string("sensor.units", &self.sensor.units)?;
        validate_range("sensor.channel", self.sensor.channel, 0, 7)?;
        validate_positive_number("sensor.samples_per_read", self.samples_per_read(), 1)?;

        validate_gpio_pin("relays.inlet_pin", self.relays.inlet_pin)?;
        validate_gpio_pin("relays.outlet_pin", self.relays.outlet_pin)?;
        if self.relays.inlet_pin == self.relays.outlet_pin {
            return Err(CompressorError::InvalidConfigValueError {
                field: "relays.outlet_pin".to_string(),
                value: self.relays.outlet_pin.to_string(),
                reason: "Inlet and outlet cannot share a pin".to_string(),
            });
        }
        validate_logic_level("relays.inlet_off_level", self.relays.inlet_off_level)?;
        validate_logic_level("relays.outlet_off_level", self.relays.outlet_off_level)?;
        validate_positive_number("relays.max_channels", self.max_channels(), 2)?;

        let compressor = &self.compressor;
        if compressor.flow_rate_in <= 0.0 {
            return Err(CompressorError::InvalidConfigValueError {
                field: "compressor.flow_rate_in".to_string(),
                value: compressor.flow_rate_in.to_string(),
                reason: "Pump inflow must be positive".to_string(),
            });
        }
        validate_range(
            "compressor.init_check_inflate",
            compressor.init_check_inflate,
            0.1,
            60.0,
        )?;
        validate_range(
            "compressor.init_check_deflate",
            compressor.init_check_deflate,
            0.1,
            60.0,
        )?;
        validate_range(
            "compressor.pressure_balance_delay",
            compressor.pressure_balance_delay,
            0.0,
            30.0,
        )?;
        if compressor.error_margin < 0.0 {
            return Err(CompressorError::InvalidConfigValueError {
                field: "compressor.error_margin".to_string(),
                value: compressor.error_margin.to_string(),
                reason: "Error margin cannot be negative".to_string(),
            });
        }
        validate_range("compressor.temperature", compressor.temperature, -50.0, 60.0)?;

        if let Some(logging) = &self.logging {
            if let Some(level) = &logging.level {
                let valid_levels = ["trace", "debug", "info", "warn", "error"];
                if !valid_levels.contains(&level.to_lowercase().as_str()) {
                    return Err(CompressorError::InvalidConfigValueError {
                        field: "logging.level".to_string(),
                        value: level.clone(),
                        reason: format!("Valid levels: {}", valid_levels.join(", ")),
                    });
                }
            }
        }

        Ok(())
    }

    pub fn samples_per_read(&self) -> usize {
        self.sensor
            .samples_per_read
            .unwrap_or(DEFAULT_SAMPLES_PER_READ)
    }

    pub fn max_channels(&self) -> usize {
        self.relays.max_channels.unwrap_or(DEFAULT_MAX_CHANNELS)
    }

    pub fn log_level(&self) -> &str {
        self.logging
            .as_ref()
            .and_then(|l| l.level.as_deref())
            .unwrap_or("info")
    }

    /// Human console output when true, JSON lines when false.
    pub fn log_stdout(&self) -> bool {
        self.logging
            .as_ref()
            .and_then(|l| l.stdout)
            .unwrap_or(true)
    }

    fn off_level(value: u8) -> Level {
        // validate_config has already rejected anything but 0/1.
        Level::try_from(value).unwrap_or(Level::Low)
    }
}

impl ConfigProvider for TomlConfig {
    fn calibration(&self) -> Calibration {
        Calibration {
            m: self.sensor.m,
            c: self.sensor.c,
            units: self.sensor.units.clone(),
        }
    }

    fn samples_per_read(&self) -> usize {
        self.samples_per_read()
    }

    fn relay_layout(&self) -> RelayLayout {
        RelayLayout {
            max_channels: self.max_channels(),
            inlet: RelayChannelSpec {
                pin: self.relays.inlet_pin,
                off_level: Self::off_level(self.relays.inlet_off_level),
            },
            outlet: RelayChannelSpec {
                pin: self.relays.outlet_pin,
                off_level: Self::off_level(self.relays.outlet_off_level),
            },
        }
    }

    fn compressor_settings(&self) -> CompressorSettings {
        let compressor = &self.compressor;
        CompressorSettings {
            init_inflate: Duration::from_secs_f64(compressor.init_check_inflate.max(0.0)),
            init_deflate: Duration::from_secs_f64(compressor.init_check_deflate.max(0.0)),
            flow_rate_in: gas::flow_lps_to_mols(compressor.flow_rate_in),
            flow_out_m: compressor.flow_rate_out_m,
            flow_out_c: compressor.flow_rate_out_c,
            balance_delay: Duration::from_secs_f64(compressor.pressure_balance_delay.max(0.0)),
            error_margin: compressor.error_margin,
            ambient_temp: gas::celsius_to_kelvin(compressor.temperature),
        }
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
