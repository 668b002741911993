use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Normalized failure categories reported in every failed result envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    InvalidArgument,
    NotFound,
    Unsupported,
    Permission,
    Runtime,
    Timeout,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidArgument => "InvalidArgument",
            Self::NotFound => "NotFound",
            Self::Unsupported => "Unsupported",
            Self::Permission => "Permission",
            Self::Runtime => "Runtime",
            Self::Timeout => "Timeout",
        }
    }

    /// Process exit code used by the command-line front end.
    pub fn exit_code(self) -> u8 {
        match self {
            Self::NotFound => 1,
            Self::InvalidArgument => 3,
            Self::Runtime => 4,
            Self::Unsupported => 5,
            Self::Permission => 6,
            Self::Timeout => 7,
        }
    }

    pub fn from_exit_code(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::NotFound),
            3 => Some(Self::InvalidArgument),
            4 => Some(Self::Runtime),
            5 => Some(Self::Unsupported),
            6 => Some(Self::Permission),
            7 => Some(Self::Timeout),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorKind {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "InvalidArgument" => Ok(Self::InvalidArgument),
            "NotFound" => Ok(Self::NotFound),
            "Unsupported" => Ok(Self::Unsupported),
            "Permission" => Ok(Self::Permission),
            "Runtime" => Ok(Self::Runtime),
            "Timeout" => Ok(Self::Timeout),
            _ => Err(()),
        }
    }
}

/// Failure raised by the live document itself.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct HostError {
    pub kind: ErrorKind,
    pub message: String,
}

impl HostError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unsupported, message)
    }
}

pub type HostResult<T> = Result<T, HostError>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BridgeError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("permission denied: {0}")]
    Permission(String),

    #[error("runtime failure: {0}")]
    Runtime(String),

    #[error("timed out: {0}")]
    Timeout(String),
}

impl BridgeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Unsupported(_) => ErrorKind::Unsupported,
            Self::Permission(_) => ErrorKind::Permission,
            Self::Runtime(_) => ErrorKind::Runtime,
            Self::Timeout(_) => ErrorKind::Timeout,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::InvalidArgument(message)
            | Self::NotFound(message)
            | Self::Unsupported(message)
            | Self::Permission(message)
            | Self::Runtime(message)
            | Self::Timeout(message) => message,
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}

impl From<HostError> for BridgeError {
    fn from(err: HostError) -> Self {
        let HostError { kind, message } = err;
        match kind {
            ErrorKind::InvalidArgument => Self::InvalidArgument(message),
            ErrorKind::NotFound => Self::NotFound(message),
            ErrorKind::Unsupported => Self::Unsupported(message),
            ErrorKind::Permission => Self::Permission(message),
            ErrorKind::Runtime => Self::Runtime(message),
            ErrorKind::Timeout => Self::Timeout(message),
        }
    }
}

pub type BridgeResult<T> = Result<T, BridgeError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Warning,
    Error,
}

/// One entry of the `diagnostics` list attached to a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub level: Level,
    pub message: String,
}

impl Diagnostic {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: Level::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: Level::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: Level::Error,
            message: message.into(),
        }
    }
}
