use std::time::Duration;

use self::frame::MalformedFrame;

pub mod codec;
pub mod conv;
pub mod frame;
pub mod segment;

#[cfg(test)]
pub mod fake;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProtoError {
    #[error("I/O error: {:?}", _0)]
    Io(#[from] std::io::Error),

    #[error("Serial I/O error: {:?}", _0)]
    Serial(#[from] tokio_serial::Error),

    #[error("Connection was closed")]
    Abort,
    #[error("No frame received within {:?}", _0)]
    Timeout(Duration),
    #[error("Malformed frame: {}", _0)]
    MalformedFrame(#[from] MalformedFrame),

    #[error("Sampler is already running")]
    AlreadyRunning,
    #[error("Sample buffer capacity must be at least 1")]
    InvalidCapacity,
    #[error("Sampling interval must not be zero")]
    InvalidInterval,
}

impl ProtoError {
    /// Failures of the frame source itself: the device is gone, silent or
    /// the port reported an error.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::Serial(_) | Self::Abort | Self::Timeout(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ProtoError>;
