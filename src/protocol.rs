//! GMMK frame layout, frame builder and checksum
//!
//! Every exchange with the keyboard is a fixed 64-byte frame:
//!
//! | Offset | Field    |                                              |
//! |--------|----------|----------------------------------------------|
//! | 0      | tag      | 0 = control, 4 = key colors                  |
//! | 1..3   | checksum | sum of bytes `[3..64)`, low byte first       |
//! | 3      | command  | START, END, SUBCOMMAND or KEYCOLORS          |
//! | 4..    | payload  | layout depends on the command                |

use std::fmt;

use crate::error::ProtocolError;
use crate::keycolors::Rgb;

pub const PACKET_SIZE: usize = 64;

pub const TAG_OFFSET: usize = 0;
pub const SUM_OFFSET: usize = 1;
pub const COMMAND_OFFSET: usize = 3;

pub const SUBCMD_CMD_OFFSET: usize = 4;
pub const SUBCMD_ARG_OFFSET: usize = 8;

/// Raw reply read back from the device
pub type Reply = [u8; PACKET_SIZE];

/// Frame kind stored in byte 0
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Control = 0x00,
    KeyColors = 0x04,
}

impl Tag {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Tag::Control),
            0x04 => Some(Tag::KeyColors),
            _ => None,
        }
    }
}

/// Command code stored in byte 3
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start = 0x01,
    End = 0x02,
    Subcommand = 0x06,
    KeyColors = 0x11,
}

impl Command {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Command::Start),
            0x02 => Some(Command::End),
            0x06 => Some(Command::Subcommand),
            0x11 => Some(Command::KeyColors),
            _ => None,
        }
    }
}

/// One 64-byte USB packet
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    buf: [u8; PACKET_SIZE],
}

impl Frame {
    /// Zero-filled frame carrying only a tag and a command code
    pub fn new(tag: Tag, command: Command) -> Self {
        let mut buf = [0u8; PACKET_SIZE];
        buf[TAG_OFFSET] = tag as u8;
        buf[COMMAND_OFFSET] = command as u8;
        Self { buf }
    }

    /// Build a frame with `payload` copied in at `offset`.
    ///
    /// The checksum is left at zero; call [`Frame::seal`] once every
    /// payload byte is in place.
    pub fn build(
        tag: Tag,
        command: Command,
        payload: &[u8],
        offset: usize,
    ) -> Result<Self, ProtocolError> {
        let mut frame = Self::new(tag, command);
        frame.write_at(offset, payload)?;
        Ok(frame)
    }

    /// Start-of-transaction frame
    pub fn start() -> Self {
        Self::new(Tag::Control, Command::Start).sealed()
    }

    /// End-of-transaction frame
    pub fn end() -> Self {
        Self::new(Tag::Control, Command::End).sealed()
    }

    /// Parse a frame read back from the wire
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        let buf: [u8; PACKET_SIZE] = data.try_into().ok()?;
        Some(Self { buf })
    }

    /// Copy `bytes` into the frame starting at `offset`
    pub fn write_at(&mut self, offset: usize, bytes: &[u8]) -> Result<(), ProtocolError> {
        let end = offset
            .checked_add(bytes.len())
            .filter(|&end| end <= PACKET_SIZE)
            .ok_or(ProtocolError::PayloadTooLarge {
                offset,
                len: bytes.len(),
                size: PACKET_SIZE,
            })?;
        self.buf[offset..end].copy_from_slice(bytes);
        Ok(())
    }

    /// Bytes `[offset, offset + len)`, or `None` when the range leaves the frame
    pub fn read_at(&self, offset: usize, len: usize) -> Option<&[u8]> {
        let end = offset.checked_add(len)?;
        self.buf.get(offset..end)
    }

    pub fn tag(&self) -> Option<Tag> {
        Tag::from_byte(self.buf[TAG_OFFSET])
    }

    pub fn command(&self) -> Option<Command> {
        Command::from_byte(self.buf[COMMAND_OFFSET])
    }

    /// Checksum computed over the current contents
    pub fn checksum(&self) -> (u8, u8) {
        checksum(&self.buf)
    }

    /// Checksum bytes currently stored at offsets 1 and 2
    pub fn stored_checksum(&self) -> (u8, u8) {
        (self.buf[SUM_OFFSET], self.buf[SUM_OFFSET + 1])
    }

    pub fn verify_checksum(&self) -> bool {
        self.stored_checksum() == self.checksum()
    }

    /// Write the checksum into offsets 1 and 2. Must run last.
    pub fn seal(&mut self) {
        let (lo, hi) = self.checksum();
        self.buf[SUM_OFFSET] = lo;
        self.buf[SUM_OFFSET + 1] = hi;
    }

    pub fn sealed(mut self) -> Self {
        self.seal();
        self
    }

    pub fn as_bytes(&self) -> &[u8; PACKET_SIZE] {
        &self.buf
    }

    /// Space separated hex dump of the whole frame
    pub fn to_hex(&self) -> String {
        hex(&self.buf)
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame[{}]", self.to_hex())
    }
}

/// Space separated hex dump of raw bytes
pub fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Additive checksum over the command byte and payload, split low byte first.
///
/// The sum covers at most 61 bytes, so it always fits in 16 bits.
pub fn checksum(buf: &[u8; PACKET_SIZE]) -> (u8, u8) {
    let sum: u16 = buf[COMMAND_OFFSET..].iter().map(|&b| u16::from(b)).sum();
    split_u16(sum)
}

/// Split a 16-bit value into `(value % 256, value / 256)`
pub fn split_u16(value: u16) -> (u8, u8) {
    ((value % 256) as u8, (value / 256) as u8)
}

/// Named device settings, each addressed by a 4-byte descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subcommand {
    Mode,
    Brightness,
    Delay,
    Direction,
    Colorful,
    Color,
    Rate,
}

impl Subcommand {
    pub const ALL: [Subcommand; 7] = [
        Subcommand::Mode,
        Subcommand::Brightness,
        Subcommand::Delay,
        Subcommand::Direction,
        Subcommand::Colorful,
        Subcommand::Color,
        Subcommand::Rate,
    ];

    pub const fn descriptor(self) -> [u8; 4] {
        match self {
            Subcommand::Mode => [0x01, 0x00, 0x00, 0x00],
            Subcommand::Brightness => [0x01, 0x01, 0x00, 0x00],
            Subcommand::Delay => [0x01, 0x02, 0x00, 0x00],
            Subcommand::Direction => [0x01, 0x03, 0x00, 0x00],
            Subcommand::Colorful => [0x01, 0x04, 0x00, 0x00],
            Subcommand::Color => [0x03, 0x05, 0x00, 0x00],
            Subcommand::Rate => [0x01, 0x0f, 0x00, 0x00],
        }
    }

    pub fn from_descriptor(bytes: &[u8]) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|sub| sub.descriptor().as_slice() == bytes)
    }
}

/// Subcommand argument placed at offset 8
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Argument {
    Scalar(u8),
    Bytes(Vec<u8>),
}

impl Argument {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Argument::Scalar(value) => std::slice::from_ref(value),
            Argument::Bytes(bytes) => bytes,
        }
    }
}

/// Build a checksummed SUBCOMMAND frame: descriptor at offset 4, argument at offset 8
pub fn build_subcommand_frame(sub: Subcommand, arg: &Argument) -> Result<Frame, ProtocolError> {
    let mut frame = Frame::build(
        Tag::Control,
        Command::Subcommand,
        &sub.descriptor(),
        SUBCMD_CMD_OFFSET,
    )?;
    let bytes = arg.as_bytes();
    frame
        .write_at(SUBCMD_ARG_OFFSET, bytes)
        .map_err(|_| ProtocolError::ArgumentTooLarge { len: bytes.len() })?;
    Ok(frame.sealed())
}

/// Recover the subcommand and the argument region (offset 8 to the end) of a SUBCOMMAND frame
pub fn decode_subcommand(frame: &Frame) -> Option<(Subcommand, &[u8])> {
    if frame.command() != Some(Command::Subcommand) {
        return None;
    }
    let sub = Subcommand::from_descriptor(frame.read_at(SUBCMD_CMD_OFFSET, 4)?)?;
    let arg = frame.read_at(SUBCMD_ARG_OFFSET, PACKET_SIZE - SUBCMD_ARG_OFFSET)?;
    Some((sub, arg))
}

/// Animation direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
}

impl Direction {
    pub const fn arg(self) -> u8 {
        match self {
            Direction::Left => 0xff,
            Direction::Right => 0x00,
        }
    }
}

/// A single device setting with its value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Setting {
    /// Lighting mode (1-20)
    Mode(u8),
    /// Brightness (0-4)
    Brightness(u8),
    /// Delay between animation frames
    Delay(u8),
    Direction(Direction),
    /// Colorful (true) or single color (false)
    Colorful(bool),
    /// Color used in single color mode
    Color(Rgb),
    /// Polling rate: 0=125Hz, 1=250Hz, 2=500Hz, 3=1000Hz
    Rate(u8),
}

impl Setting {
    pub fn subcommand(&self) -> Subcommand {
        match self {
            Setting::Mode(_) => Subcommand::Mode,
            Setting::Brightness(_) => Subcommand::Brightness,
            Setting::Delay(_) => Subcommand::Delay,
            Setting::Direction(_) => Subcommand::Direction,
            Setting::Colorful(_) => Subcommand::Colorful,
            Setting::Color(_) => Subcommand::Color,
            Setting::Rate(_) => Subcommand::Rate,
        }
    }

    pub fn argument(&self) -> Argument {
        match *self {
            Setting::Mode(v) | Setting::Brightness(v) | Setting::Delay(v) | Setting::Rate(v) => {
                Argument::Scalar(v)
            }
            Setting::Direction(dir) => Argument::Scalar(dir.arg()),
            Setting::Colorful(on) => Argument::Scalar(u8::from(on)),
            Setting::Color(rgb) => Argument::Bytes(rgb.to_bytes().to_vec()),
        }
    }

    pub fn frame(&self) -> Result<Frame, ProtocolError> {
        build_subcommand_frame(self.subcommand(), &self.argument())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sum_region(frame: &Frame) -> u32 {
        frame.as_bytes()[COMMAND_OFFSET..]
            .iter()
            .map(|&b| u32::from(b))
            .sum()
    }

    #[test]
    fn test_build_places_tag_command_payload() {
        let frame = Frame::build(Tag::KeyColors, Command::KeyColors, &[1, 2, 3], 8).unwrap();
        let bytes = frame.as_bytes();
        assert_eq!(bytes.len(), PACKET_SIZE);
        assert_eq!(bytes[0], 4);
        assert_eq!(bytes[3], 0x11);
        assert_eq!(&bytes[8..11], &[1, 2, 3]);
        assert!(bytes[11..].iter().all(|&b| b == 0));
        // not sealed yet
        assert_eq!(frame.stored_checksum(), (0, 0));
    }

    #[test]
    fn test_build_rejects_overflow() {
        let err = Frame::build(Tag::Control, Command::Subcommand, &[0u8; 57], 8).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::PayloadTooLarge {
                offset: 8,
                len: 57,
                size: 64
            }
        );
        assert!(Frame::build(Tag::Control, Command::Subcommand, &[0u8; 56], 8).is_ok());
        assert!(Frame::build(Tag::Control, Command::Subcommand, &[], usize::MAX).is_err());
    }

    #[test]
    fn test_any_payload_up_to_56_fits_at_offset_8() {
        for len in 0..=56 {
            let payload = vec![0xffu8; len];
            let frame = Frame::build(Tag::KeyColors, Command::KeyColors, &payload, 8).unwrap();
            assert_eq!(frame.as_bytes().len(), PACKET_SIZE);
        }
    }

    #[test]
    fn test_start_end_frames() {
        let start = Frame::start();
        assert_eq!(start.tag(), Some(Tag::Control));
        assert_eq!(start.command(), Some(Command::Start));
        assert_eq!(&start.as_bytes()[..4], &[0, 1, 0, 1]);

        let end = Frame::end();
        assert_eq!(end.command(), Some(Command::End));
        assert_eq!(&end.as_bytes()[..4], &[0, 2, 0, 2]);
        assert!(end.as_bytes()[4..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_checksum_excludes_tag_and_sum_bytes() {
        let mut frame = Frame::build(Tag::KeyColors, Command::KeyColors, &[0xff; 56], 8).unwrap();
        frame.write_at(1, &[0xaa, 0xbb]).unwrap();
        let expected = 0x11 + 56 * 0xff;
        assert_eq!(frame.checksum(), ((expected % 256) as u8, (expected / 256) as u8));
    }

    #[test]
    fn test_checksum_self_consistent() {
        let mut frame = Setting::Color(Rgb::new(255, 0, 128)).frame().unwrap();
        let stored = frame.stored_checksum();
        assert!(frame.verify_checksum());
        frame.write_at(SUM_OFFSET, &[0, 0]).unwrap();
        assert_eq!(frame.checksum(), stored);
    }

    #[test]
    fn test_split_u16() {
        assert_eq!(split_u16(0), (0, 0));
        assert_eq!(split_u16(255), (255, 0));
        assert_eq!(split_u16(256), (0, 1));
        assert_eq!(split_u16(378), (122, 1));
    }

    #[test]
    fn test_set_mode_frame() {
        let frame = Setting::Mode(3).frame().unwrap();
        let bytes = frame.as_bytes();
        assert_eq!(bytes[0], 0);
        assert_eq!(bytes[3], 0x06);
        assert_eq!(&bytes[4..8], &[1, 0, 0, 0]);
        assert_eq!(&bytes[8..12], &[3, 0, 0, 0]);

        let sum = sum_region(&frame);
        assert_eq!(sum, 0x06 + 1 + 3);
        assert_eq!(frame.stored_checksum(), ((sum % 256) as u8, (sum / 256) as u8));
    }

    #[test]
    fn test_set_color_frame() {
        let frame = Setting::Color(Rgb::new(255, 0, 128)).frame().unwrap();
        let bytes = frame.as_bytes();
        assert_eq!(&bytes[4..8], &[3, 5, 0, 0]);
        assert_eq!(&bytes[8..11], &[255, 0, 128]);
        // 0x06 + 3 + 5 + 255 + 128 = 397
        assert_eq!(frame.stored_checksum(), (141, 1));
    }

    #[test]
    fn test_direction_and_colorful_args() {
        let left = Setting::Direction(Direction::Left).frame().unwrap();
        assert_eq!(&left.as_bytes()[4..9], &[1, 3, 0, 0, 0xff]);
        let right = Setting::Direction(Direction::Right).frame().unwrap();
        assert_eq!(right.as_bytes()[8], 0);

        let on = Setting::Colorful(true).frame().unwrap();
        assert_eq!(&on.as_bytes()[4..9], &[1, 4, 0, 0, 1]);
        let off = Setting::Colorful(false).frame().unwrap();
        assert_eq!(off.as_bytes()[8], 0);

        let rate = Setting::Rate(3).frame().unwrap();
        assert_eq!(&rate.as_bytes()[4..9], &[1, 0x0f, 0, 0, 3]);
    }

    #[test]
    fn test_argument_too_large() {
        let arg = Argument::Bytes(vec![1; 57]);
        assert_eq!(
            build_subcommand_frame(Subcommand::Color, &arg).unwrap_err(),
            ProtocolError::ArgumentTooLarge { len: 57 }
        );
        assert!(build_subcommand_frame(Subcommand::Color, &Argument::Bytes(vec![1; 56])).is_ok());
    }

    #[test]
    fn test_decode_subcommand_recovers_values() {
        let settings = [
            Setting::Mode(7),
            Setting::Brightness(4),
            Setting::Delay(200),
            Setting::Direction(Direction::Left),
            Setting::Colorful(true),
            Setting::Color(Rgb::new(1, 2, 3)),
            Setting::Rate(2),
        ];
        for setting in settings {
            let frame = setting.frame().unwrap();
            let (sub, region) = decode_subcommand(&frame).unwrap();
            assert_eq!(sub, setting.subcommand());
            let arg = setting.argument();
            let arg = arg.as_bytes();
            assert_eq!(&region[..arg.len()], arg);
            assert!(region[arg.len()..].iter().all(|&b| b == 0));
        }
    }

    #[test]
    fn test_decode_rejects_other_commands() {
        assert!(decode_subcommand(&Frame::start()).is_none());
    }

    #[test]
    fn test_hex_matches_frame_dump() {
        assert_eq!(hex(&[0x00, 0x11, 0xff]), "00 11 ff");
        assert_eq!(Frame::start().to_hex(), hex(Frame::start().as_bytes()));
        assert!(Frame::end().to_hex().starts_with("00 02 00 02 00"));
    }

    #[test]
    fn test_from_bytes() {
        let frame = Setting::Mode(1).frame().unwrap();
        assert_eq!(Frame::from_bytes(frame.as_bytes()), Some(frame));
        assert!(Frame::from_bytes(&[0u8; 63]).is_none());
    }
}
