//! Error types for frame encoding and device transport

use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

/// Errors raised while assembling a frame
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("payload of {len} bytes at offset {offset} overflows a {size}-byte frame")]
    PayloadTooLarge { offset: usize, len: usize, size: usize },

    #[error("subcommand argument of {len} bytes does not fit in the frame")]
    ArgumentTooLarge { len: usize },

    #[error("key-color request for {count} keys only carries {colors} colors")]
    ColorCountMismatch { count: usize, colors: usize },
}

/// Errors raised while exchanging frames with the device
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("No reply from device within {0} ms")]
    Timeout(u64),

    #[error("Short write: sent {sent} of {expected} bytes")]
    ShortWrite { sent: usize, expected: usize },

    #[error("Short reply: got {got} of {expected} bytes")]
    ShortReply { got: usize, expected: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}
