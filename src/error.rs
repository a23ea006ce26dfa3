//! Error type shared by every instrument family.
//!
//! Transport failures, malformed replies and vendor limitations all funnel into
//! [`Error`] so callers can use `?` from the socket up to the CLI.

use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "visa")]
    #[error("VISA error: {0}")]
    Visa(#[from] visa_rs::Error),

    #[error("Invalid resource address '{0}'. Use GPIB0::00::INSTR or TCPIP0::192.168.0.10::5025::SOCKET")]
    InvalidAddress(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Could not connect to {address}: {reason}")]
    Connection { address: String, reason: String },

    #[error("Could not parse reply to '{command}': '{response}'")]
    Parse { command: String, response: String },

    #[error("Instrument not recognized: {0}")]
    UnknownInstrument(String),

    #[error("{operation} is not supported by {model}")]
    Unsupported { operation: String, model: String },

    #[error("Feature '{0}' is not enabled. Please build with --features {0}")]
    FeatureNotEnabled(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("CSV export error: {0}")]
    Csv(#[from] csv::Error),
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}

impl Error {
    pub(crate) fn parse(command: &str, response: &str) -> Self {
        Error::Parse {
            command: command.to_string(),
            response: response.to_string(),
        }
    }

    pub(crate) fn unsupported(operation: &str, model: impl ToString) -> Self {
        Error::Unsupported {
            operation: operation.to_string(),
            model: model.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::parse("INP1:ATT?", "garbage");
        assert_eq!(
            err.to_string(),
            "Could not parse reply to 'INP1:ATT?': 'garbage'"
        );
    }

    #[test]
    fn test_unsupported_display() {
        let err = Error::unsupported("enable", "EXFO chassis");
        assert_eq!(err.to_string(), "enable is not supported by EXFO chassis");
    }
}
