use thiserror::Error;

#[derive(Error, Debug)]
pub enum CheckError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("HTTP request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Date/time parsing error: {0}")]
    DateTimeError(#[from] chrono::ParseError),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration value: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Required column '{column}' is missing from the input table")]
    MissingColumnError { column: String },

    #[error("Row {row}: cannot parse {field} value '{value}'")]
    ParseError {
        row: usize,
        field: String,
        value: String,
    },

    #[error("Row {row}: species '{species}' is not in the expectation catalog")]
    UnknownSpeciesError { row: usize, species: String },

    #[error("Trektellen login failed: {message}")]
    AuthenticationError { message: String },

    #[error("Source data unavailable: {message}")]
    SourceUnavailableError { message: String },

    #[error("Storage error: {message}")]
    StorageError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Data,
    Configuration,
    Storage,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl CheckError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            CheckError::ApiError(_)
            | CheckError::AuthenticationError { .. }
            | CheckError::SourceUnavailableError { .. } => ErrorCategory::Network,
            CheckError::CsvError(_)
            | CheckError::SerializationError(_)
            | CheckError::DateTimeError(_)
            | CheckError::MissingColumnError { .. }
            | CheckError::ParseError { .. }
            | CheckError::UnknownSpeciesError { .. } => ErrorCategory::Data,
            CheckError::ConfigError { .. }
            | CheckError::MissingConfigError { .. }
            | CheckError::InvalidConfigValueError { .. }
            | CheckError::ConfigValidationError { .. } => ErrorCategory::Configuration,
            CheckError::ZipError(_) | CheckError::StorageError { .. } => ErrorCategory::Storage,
            CheckError::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            CheckError::SourceUnavailableError { .. } => ErrorSeverity::Low,
            CheckError::ApiError(_) | CheckError::StorageError { .. } => ErrorSeverity::Medium,
            CheckError::IoError(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Network => match self {
                CheckError::AuthenticationError { .. } => {
                    "Check the Trektellen username, password and login URLs"
                }
                CheckError::SourceUnavailableError { .. } => {
                    "Wait until both stations have uploaded their counts, or rerun with --forced"
                }
                _ => "Check network connectivity and retry",
            },
            ErrorCategory::Data => {
                "Inspect the export for missing columns or malformed values and correct them in Trektellen"
            }
            ErrorCategory::Configuration => "Review the configuration file and environment variables",
            ErrorCategory::Storage => "Check that the output location exists and is writable",
            ErrorCategory::System => "Check file permissions and available disk space",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Network => format!("Could not talk to the count database: {}", self),
            ErrorCategory::Data => format!("The count data could not be read: {}", self),
            ErrorCategory::Configuration => format!("The configuration is invalid: {}", self),
            ErrorCategory::Storage => format!("The results could not be stored: {}", self),
            ErrorCategory::System => format!("System error: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, CheckError>;
