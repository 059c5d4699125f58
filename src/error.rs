use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the ingestion and playback services
#[derive(Error, Debug)]
pub enum KioskError {
    /// The block-device event source could not be opened or read
    #[error("Device event source error: {0}")]
    DeviceSource(String),

    /// A copy task hit an I/O failure on a specific path
    #[error("Copy failed at {}: {source}", .path.display())]
    Copy {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// GPIO line claim or read failure
    #[error("GPIO error: {0}")]
    Gpio(String),

    /// The playback engine rejected or failed an operation
    #[error("Playback error: {0}")]
    Player(String),
}

impl KioskError {
    pub(crate) fn copy(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Copy {
            path: path.into(),
            source,
        }
    }
}

#[cfg(feature = "gpio")]
impl From<rppal::gpio::Error> for KioskError {
    fn from(err: rppal::gpio::Error) -> Self {
        Self::Gpio(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, KioskError>;
