use std::io;

/// Errors returned while building, saving or loading a network.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested topology or parameter placement is invalid.
    #[error("invalid network configuration: {0}")]
    Config(String),

    /// The stream does not hold a network in a format this crate can read.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
