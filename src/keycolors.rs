//! Per-key color requests and the key-color frame chunker

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::protocol::{split_u16, Command, Frame, Tag, PACKET_SIZE};

/// Highest valid key index
pub const MAX_KEY: usize = 126;

pub const KEYCOLORS_COUNT_OFFSET: usize = 4;
pub const KEYCOLORS_START_OFFSET: usize = 5;
pub const KEYCOLORS_DATA_OFFSET: usize = 8;
pub const KEYCOLORS_DATA_SIZE: usize = PACKET_SIZE - KEYCOLORS_DATA_OFFSET;

/// Whole keys that fit in one frame (56 / 3)
pub const KEYS_PER_FRAME: usize = KEYCOLORS_DATA_SIZE / 3;

/// RGB color for a single key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const fn to_bytes(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

/// Colors for `count` consecutive keys starting at key `start`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyColorRequest {
    start: usize,
    count: usize,
    colors: Vec<Rgb>,
}

impl KeyColorRequest {
    /// Colors past `count` are dropped. Fewer colors than `count` is an error.
    pub fn new(start: usize, count: usize, mut colors: Vec<Rgb>) -> Result<Self, ProtocolError> {
        if colors.len() < count {
            return Err(ProtocolError::ColorCountMismatch {
                count,
                colors: colors.len(),
            });
        }
        colors.truncate(count);
        Ok(Self {
            start,
            count,
            colors,
        })
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn colors(&self) -> &[Rgb] {
        &self.colors
    }

    /// Number of keys actually sent to the device.
    ///
    /// A start past [`MAX_KEY`] sends nothing, and a range running past it
    /// is cut down to `MAX_KEY - start` keys.
    pub fn clamped_count(&self) -> usize {
        if self.start > MAX_KEY {
            0
        } else {
            self.count.min(MAX_KEY - self.start)
        }
    }

    /// Lazily split the request into key-color frames, lowest key first
    pub fn frames(&self) -> KeyColorFrames<'_> {
        let count = self.clamped_count();
        if count == 0 {
            log::debug!(
                "Key-color request start={} count={} sends no frames",
                self.start,
                self.count
            );
        }
        KeyColorFrames {
            request: self,
            count,
            offset: 0,
        }
    }
}

/// Iterator over the key-color frames of one request.
///
/// Each frame must be transmitted and its reply read before the next one is
/// requested.
pub struct KeyColorFrames<'a> {
    request: &'a KeyColorRequest,
    count: usize,
    offset: usize,
}

impl Iterator for KeyColorFrames<'_> {
    type Item = Result<Frame, ProtocolError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.count {
            return None;
        }
        let packet_key_count = (self.count - self.offset).min(KEYS_PER_FRAME);
        let packet_key_start = self.request.start + self.offset;
        let colors = &self.request.colors[self.offset..self.offset + packet_key_count];
        self.offset += packet_key_count;
        Some(key_color_frame(packet_key_start, colors))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let frames = (self.count - self.offset).div_ceil(KEYS_PER_FRAME);
        (frames, Some(frames))
    }
}

/// Build one checksummed key-color frame for `colors` starting at key `key_start`
pub fn key_color_frame(key_start: usize, colors: &[Rgb]) -> Result<Frame, ProtocolError> {
    let byte_count = colors.len() * 3;
    if colors.len() > KEYS_PER_FRAME {
        return Err(ProtocolError::PayloadTooLarge {
            offset: KEYCOLORS_DATA_OFFSET,
            len: byte_count,
            size: PACKET_SIZE,
        });
    }
    // byte offset into the device color table
    let table_offset = key_start
        .checked_mul(3)
        .and_then(|offset| u16::try_from(offset).ok())
        .ok_or(ProtocolError::PayloadTooLarge {
            offset: KEYCOLORS_START_OFFSET,
            len: 2,
            size: PACKET_SIZE,
        })?;
    let (lo, hi) = split_u16(table_offset);

    let data: Vec<u8> = colors.iter().flat_map(|c| c.to_bytes()).collect();

    let mut frame = Frame::new(Tag::KeyColors, Command::KeyColors);
    frame.write_at(KEYCOLORS_COUNT_OFFSET, &[byte_count as u8])?;
    frame.write_at(KEYCOLORS_START_OFFSET, &[lo, hi])?;
    frame.write_at(KEYCOLORS_DATA_OFFSET, &data)?;
    Ok(frame.sealed())
}

/// Recover the first key index and colors carried by a key-color frame
pub fn decode_key_colors(frame: &Frame) -> Option<(usize, Vec<Rgb>)> {
    if frame.tag() != Some(Tag::KeyColors) || frame.command() != Some(Command::KeyColors) {
        return None;
    }
    let byte_count = usize::from(*frame.read_at(KEYCOLORS_COUNT_OFFSET, 1)?.first()?);
    if byte_count % 3 != 0 {
        return None;
    }
    let start = frame.read_at(KEYCOLORS_START_OFFSET, 2)?;
    let table_offset = usize::from(start[0]) + usize::from(start[1]) * 256;
    let colors = frame
        .read_at(KEYCOLORS_DATA_OFFSET, byte_count)?
        .chunks_exact(3)
        .map(|c| Rgb::new(c[0], c[1], c[2]))
        .collect();
    Some((table_offset / 3, colors))
}
