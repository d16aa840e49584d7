//! CLI error types
//!
//! Every CLI error ends the process with a non-zero exit code.

use std::fmt;
use std::io;

use crate::error::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Input file missing or malformed
    InputError,
    /// stdout failure
    IoError,
    /// Error raised by the engine
    EngineError,
}

impl CliErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InputError => "BINDERY_CLI_INPUT_ERROR",
            Self::IoError => "BINDERY_CLI_IO_ERROR",
            Self::EngineError => "BINDERY_CLI_ENGINE_ERROR",
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn input_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::InputError, msg)
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<Error> for CliError {
    fn from(e: Error) -> Self {
        match e {
            Error::Io(io) => Self::input_error(io.to_string()),
            Error::Serialization(json) => Self::input_error(format!("JSON error: {}", json)),
            other => Self::new(
                CliErrorCode::EngineError,
                format!("{} ({})", other, other.code()),
            ),
        }
    }
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::input_error(format!("JSON error: {}", e))
    }
}

pub type CliResult<T> = Result<T, CliError>;
