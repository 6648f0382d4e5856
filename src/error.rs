//! Error types and exit codes for dirshare

use std::process::ExitCode;
use thiserror::Error;

/// Main error type for dirshare operations
#[derive(Error, Debug)]
pub enum DirshareError {
    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: String },

    #[error("Not a directory: {path}")]
    NotADirectory { path: String },

    #[error("Protocol error: {message}")]
    Protocol { message: String },

    #[error("Archive error: {message}")]
    Archive { message: String },

    #[error("Upload failed: {message}")]
    Upload { message: String },

    #[error("Failed to bind port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not bind to any port between {first} and {last}")]
    PortsExhausted { first: u16, last: u16 },

    #[error("Tunnel error: {message}")]
    Tunnel { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DirshareError {
    /// Convert error to a process exit code:
    /// - 1: Directory not found / IO error
    /// - 2: Port binding failed
    /// - 3: Tunnel failure
    /// - 4: Request-level failure (never fatal inside the server)
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::DirectoryNotFound { .. } => ExitCode::from(1),
            Self::NotADirectory { .. } => ExitCode::from(1),
            Self::Io(_) => ExitCode::from(1),
            Self::Bind { .. } => ExitCode::from(2),
            Self::PortsExhausted { .. } => ExitCode::from(2),
            Self::Tunnel { .. } => ExitCode::from(3),
            Self::Protocol { .. } => ExitCode::from(4),
            Self::Archive { .. } => ExitCode::from(4),
            Self::Upload { .. } => ExitCode::from(4),
        }
    }
}

impl From<zip::result::ZipError> for DirshareError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(e) => Self::Io(e),
            other => Self::Archive {
                message: other.to_string(),
            },
        }
    }
}

/// Result type alias for dirshare operations
pub type Result<T> = std::result::Result<T, DirshareError>;
