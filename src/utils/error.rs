use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompressorError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("CSV output error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing configuration field '{field}'")]
    MissingConfigError { field: String },

    #[error("Hardware error: {message}")]
    HardwareError { message: String },

    #[error("Sensor error: {message}")]
    SensorError { message: String },

    #[error("Cannot register more than {limit} relay channels")]
    MaxChannelsError { limit: usize },

    #[error("Unknown relay channel '{name}'")]
    UnknownRelayError { name: String },

    #[error("Estimation error: {message}")]
    EstimationError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Io,
    Data,
    Config,
    Hardware,
    Estimation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl CompressorError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::IoError(_) => ErrorCategory::Io,
            Self::SerializationError(_) | Self::CsvError(_) => ErrorCategory::Data,
            Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => ErrorCategory::Config,
            Self::HardwareError { .. }
            | Self::SensorError { .. }
            | Self::MaxChannelsError { .. }
            | Self::UnknownRelayError { .. } => ErrorCategory::Hardware,
            Self::EstimationError { .. } => ErrorCategory::Estimation,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Config => ErrorSeverity::Medium,
            ErrorCategory::Data | ErrorCategory::Estimation => ErrorSeverity::High,
            ErrorCategory::Io | ErrorCategory::Hardware => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            Self::IoError(_) => {
                "Check file permissions and that the calibration/output directories exist"
                    .to_string()
            }
            Self::SerializationError(_) => {
                "The calibration file is corrupt; re-run the calibrate tool".to_string()
            }
            Self::CsvError(_) => "Check that the output path is writable".to_string(),
            Self::ConfigValidationError { field, .. }
            | Self::InvalidConfigValueError { field, .. } => {
                format!("Fix '{}' in the config file and retry", field)
            }
            Self::MissingConfigError { field } => {
                format!("Add '{}' to the config file or command line", field)
            }
            Self::HardwareError { .. } => {
                "Check SPI/GPIO wiring and that the process can access /dev/spidev and /dev/gpiomem"
                    .to_string()
            }
            Self::SensorError { .. } => {
                "Check the sensor connection and calibration; re-run the calibrate tool if readings drift"
                    .to_string()
            }
            Self::MaxChannelsError { .. } => {
                "Raise relays.max_channels or remove unused channels".to_string()
            }
            Self::UnknownRelayError { name } => {
                format!("Register relay channel '{}' before switching it", name)
            }
            Self::EstimationError { .. } => {
                "Verify the pump and bleed valve actually move air; a longer probe duration may help"
                    .to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Io => format!("File system problem: {}", self),
            ErrorCategory::Data => format!("Data problem: {}", self),
            ErrorCategory::Config => format!("Configuration problem: {}", self),
            ErrorCategory::Hardware => format!("Hardware problem: {}", self),
            ErrorCategory::Estimation => format!("Estimation problem: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, CompressorError>;
