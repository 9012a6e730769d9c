//! Lighting control for GMMK keyboards.
//!
//! [`protocol`] builds the 64-byte frames, [`keycolors`] splits per-key color
//! uploads into frames, and [`transaction`] wraps body frames with the
//! start/end framing the keyboard expects.

pub mod config;
pub mod device;
pub mod error;
pub mod keyboard;
pub mod keycolors;
pub mod protocol;
pub mod source;
pub mod transaction;

pub use error::{Error, ProtocolError, Result, TransportError};
pub use keyboard::Keyboard;
pub use keycolors::{KeyColorRequest, Rgb};
pub use protocol::{Frame, Setting};
