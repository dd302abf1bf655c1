use thiserror::Error;

/// Errors while loading and validating configuration files
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IoError: {0}")]
    IoError(#[from] std::io::Error),
    #[error("TomlError: {0}")]
    TomlError(#[from] toml::de::Error),
    #[error("JsonError: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("LoggingError: {0}")]
    LoggingError(String),
    #[error("TariffError: {0}")]
    TariffError(String),
}

impl From<log4rs::config::runtime::ConfigErrors> for ConfigError {
    fn from(e: log4rs::config::runtime::ConfigErrors) -> Self {
        ConfigError::LoggingError(e.to_string())
    }
}
impl From<log::SetLoggerError> for ConfigError {
    fn from(e: log::SetLoggerError) -> Self {
        ConfigError::LoggingError(e.to_string())
    }
}

/// Errors while reading pipeline input files
#[derive(Error, Debug)]
pub enum InputError {
    #[error("MissingInput: {0}")]
    MissingInput(String),
    #[error("CsvError: {0}")]
    CsvError(#[from] csv::Error),
    #[error("JsonError: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("IoError: {0}")]
    IoError(#[from] std::io::Error),
    #[error("BadHeader: {0}")]
    BadHeader(String),
    #[error("BadTime: {0}")]
    BadTime(String),
}

/// Fatal errors while running a (house, tariff) pipeline
///
/// Per-event scheduling failures are values in the schedule table, never
/// variants here.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("InputError: {0}")]
    InputError(#[from] InputError),
    #[error("InvariantViolation: {0}")]
    InvariantViolation(String),
    #[error("UnknownTariff: {0}")]
    UnknownTariff(String),
    #[error("OutputError: {0}")]
    OutputError(String),
}

impl From<csv::Error> for PipelineError {
    fn from(e: csv::Error) -> Self {
        PipelineError::OutputError(e.to_string())
    }
}
impl From<std::io::Error> for PipelineError {
    fn from(e: std::io::Error) -> Self {
        PipelineError::OutputError(e.to_string())
    }
}
impl From<serde_json::Error> for PipelineError {
    fn from(e: serde_json::Error) -> Self {
        PipelineError::OutputError(e.to_string())
    }
}
