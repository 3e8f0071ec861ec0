//! Error types for netimpair

use thiserror::Error;

/// Result type alias using the netimpair `Error`
pub type Result<T> = std::result::Result<T, Error>;

/// netimpair error kinds, mapped to an exit code in `main`
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("cannot open tunnel device {path}: {source}")]
    Device {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("poll failed: {0}")]
    Poll(#[source] nix::errno::Errno),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Process exit code for this error, per the CLI surface's exit-code contract.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Config(_) => 64,
            Error::Device { .. } => 74,
            Error::Poll(_) => 70,
            Error::Io(_) => 70,
        }
    }
}
