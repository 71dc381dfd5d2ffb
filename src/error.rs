//! Error types

use std::fmt;

/// Errors surfaced by the server's outer layers
///
/// Nothing on the broadcast path returns an error: publishing is fire and
/// forget, and failing subscribers are dropped instead of reported.
#[derive(Debug)]
pub enum Error {
    /// Socket bind or accept failure
    Io(std::io::Error),
    /// The hub's coordinator has stopped
    HubClosed,
    /// Invalid configuration value
    Config(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::HubClosed => write!(f, "Hub has been shut down"),
            Error::Config(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

/// Result alias for this crate
pub type Result<T> = std::result::Result<T, Error>;
