use thiserror::Error;

/// Main error type for the slow-log advisor
#[derive(Error, Debug)]
pub enum AdvisorError {
    /// A header line carried its marker but not the expected layout. Never fatal.
    #[error("Log format error at line {line}: {message}")]
    LogFormat { line: usize, message: String },

    #[error("Cannot access log file {path}: {message}")]
    FileAccess { path: String, message: String },

    #[error("Query execution error: {message}")]
    QueryExecution { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type AdvisorResult<T> = Result<T, AdvisorError>;

impl AdvisorError {
    pub fn log_format(line: usize, message: impl Into<String>) -> Self {
        Self::LogFormat { line, message: message.into() }
    }

    pub fn file_access(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::FileAccess { path: path.into(), message: message.into() }
    }

    pub fn query_execution(message: impl Into<String>) -> Self {
        Self::QueryExecution { message: message.into() }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }

    /// Fatal errors abort the whole run; the rest are recorded and skipped.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::FileAccess { .. } | Self::Configuration { .. } | Self::Io(_))
    }
}
