//! Transport abstraction and transaction sequencing
//!
//! A transaction is `START, body..., END`. Start and end frames are written
//! without reading a reply; every body frame is followed by exactly one
//! 64-byte reply before the next body frame is built.

use std::time::Duration;

use crate::error::{ProtocolError, Result, TransportError};
use crate::protocol::{hex, Frame, Reply};

/// Frame-level access to the keyboard
pub trait Transport {
    /// Write one 64-byte frame
    fn write_frame(&mut self, frame: &Frame) -> std::result::Result<(), TransportError>;

    /// Read one 64-byte reply, failing with [`TransportError::Timeout`] after `timeout`
    fn read_reply(&mut self, timeout: Duration) -> std::result::Result<Reply, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn write_frame(&mut self, frame: &Frame) -> std::result::Result<(), TransportError> {
        (**self).write_frame(frame)
    }

    fn read_reply(&mut self, timeout: Duration) -> std::result::Result<Reply, TransportError> {
        (**self).read_reply(timeout)
    }
}

/// Run one transaction over `transport`.
///
/// Body frames are pulled from `body` one at a time, so a lazy chunker only
/// builds the next frame once the previous one has been acknowledged. Any
/// error aborts the transaction immediately; the end frame is not sent.
pub fn run_transaction<T, I>(transport: &mut T, body: I, timeout: Duration) -> Result<()>
where
    T: Transport + ?Sized,
    I: IntoIterator<Item = std::result::Result<Frame, ProtocolError>>,
{
    log::debug!("Transaction start");
    send(transport, &Frame::start())?;

    let mut count = 0usize;
    for frame in body {
        let frame = frame?;
        send(transport, &frame)?;
        let reply = transport.read_reply(timeout)?;
        log::trace!("<- {}", hex(&reply));
        count += 1;
    }

    send(transport, &Frame::end())?;
    log::debug!("Transaction end ({} body frames)", count);
    Ok(())
}

fn send<T: Transport + ?Sized>(transport: &mut T, frame: &Frame) -> Result<()> {
    log::trace!("-> {}", frame.to_hex());
    transport.write_frame(frame)?;
    Ok(())
}

/// Transport that records frames instead of sending them, replying with zeros
#[derive(Debug, Default)]
pub struct DryRun {
    frames: Vec<Frame>,
}

impl DryRun {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }
}

impl Transport for DryRun {
    fn write_frame(&mut self, frame: &Frame) -> std::result::Result<(), TransportError> {
        self.frames.push(frame.clone());
        Ok(())
    }

    fn read_reply(&mut self, _timeout: Duration) -> std::result::Result<Reply, TransportError> {
        Ok([0u8; crate::protocol::PACKET_SIZE])
    }
}
