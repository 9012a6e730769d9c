//! High level keyboard API: one transaction per call

use std::iter;
use std::time::Duration;

use crate::error::Result;
use crate::keycolors::{KeyColorRequest, Rgb};
use crate::protocol::{Direction, Setting};
use crate::transaction::{run_transaction, Transport};

/// Default wait for a reply to a body frame
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);

pub struct Keyboard<T: Transport> {
    transport: T,
    timeout: Duration,
}

impl<T: Transport> Keyboard<T> {
    pub fn new(transport: T, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Apply a single setting as one START/SUBCOMMAND/END transaction
    pub fn apply(&mut self, setting: Setting) -> Result<()> {
        log::info!("Applying {:?}", setting);
        // built up front so a bad argument never opens a transaction
        let frame = setting.frame()?;
        run_transaction(&mut self.transport, iter::once(Ok(frame)), self.timeout)
    }

    pub fn set_mode(&mut self, mode: u8) -> Result<()> {
        self.apply(Setting::Mode(mode))
    }

    pub fn set_brightness(&mut self, brightness: u8) -> Result<()> {
        self.apply(Setting::Brightness(brightness))
    }

    pub fn set_delay(&mut self, delay: u8) -> Result<()> {
        self.apply(Setting::Delay(delay))
    }

    pub fn set_direction(&mut self, direction: Direction) -> Result<()> {
        self.apply(Setting::Direction(direction))
    }

    pub fn set_colorful(&mut self, colorful: bool) -> Result<()> {
        self.apply(Setting::Colorful(colorful))
    }

    pub fn set_color(&mut self, color: Rgb) -> Result<()> {
        self.apply(Setting::Color(color))
    }

    /// Set the USB polling rate (0=125Hz, 1=250Hz, 2=500Hz, 3=1000Hz)
    pub fn set_rate(&mut self, rate: u8) -> Result<()> {
        self.apply(Setting::Rate(rate))
    }

    /// Upload per-key colors, one acknowledged frame per chunk of up to 18 keys
    pub fn set_keys(&mut self, request: &KeyColorRequest) -> Result<()> {
        log::info!(
            "Setting {} key colors from key {}",
            request.clamped_count(),
            request.start()
        );
        if request.clamped_count() < request.count() {
            log::debug!(
                "Dropping {} keys past key {}",
                request.count() - request.clamped_count(),
                crate::keycolors::MAX_KEY
            );
        }
        run_transaction(&mut self.transport, request.frames(), self.timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keycolors::decode_key_colors;
    use crate::protocol::{decode_subcommand, Command, Frame, Subcommand};
    use crate::transaction::mock::{MockTransport, Op};

    fn keyboard() -> Keyboard<MockTransport> {
        Keyboard::new(MockTransport::default(), DEFAULT_TIMEOUT)
    }

    #[test]
    fn test_set_mode_transaction() {
        let mut kb = keyboard();
        kb.set_mode(3).unwrap();
        let mock = kb.into_inner();

        assert_eq!(mock.ops.len(), 4);
        assert_eq!(mock.ops[0], Op::Write(Frame::start()));
        assert_eq!(mock.ops[2], Op::Read);
        assert_eq!(mock.ops[3], Op::Write(Frame::end()));

        let Op::Write(body) = &mock.ops[1] else {
            panic!("expected body frame");
        };
        let (sub, arg) = decode_subcommand(body).unwrap();
        assert_eq!(sub, Subcommand::Mode);
        assert_eq!(&arg[..4], &[3, 0, 0, 0]);
    }

    #[test]
    fn test_each_setter_sends_its_descriptor() {
        type Kb = Keyboard<MockTransport>;
        let cases: [(fn(&mut Kb) -> Result<()>, [u8; 4], &[u8]); 8] = [
            (|kb: &mut Kb| kb.set_brightness(4), [1, 1, 0, 0], &[4]),
            (|kb: &mut Kb| kb.set_delay(9), [1, 2, 0, 0], &[9]),
            (|kb: &mut Kb| kb.set_direction(Direction::Left), [1, 3, 0, 0], &[0xff]),
            (|kb: &mut Kb| kb.set_direction(Direction::Right), [1, 3, 0, 0], &[0]),
            (|kb: &mut Kb| kb.set_colorful(true), [1, 4, 0, 0], &[1]),
            (|kb: &mut Kb| kb.set_colorful(false), [1, 4, 0, 0], &[0]),
            (|kb: &mut Kb| kb.set_color(Rgb::new(255, 0, 128)), [3, 5, 0, 0], &[255, 0, 128]),
            (|kb: &mut Kb| kb.set_rate(2), [1, 0x0f, 0, 0], &[2]),
        ];

        for (call, descriptor, arg) in cases {
            let mut kb = keyboard();
            call(&mut kb).unwrap();
            let writes = kb.transport().writes();
            assert_eq!(writes.len(), 3);
            let body = writes[1].as_bytes();
            assert_eq!(body[3], 0x06);
            assert_eq!(&body[4..8], &descriptor);
            assert_eq!(&body[8..8 + arg.len()], arg);
            assert!(writes[1].verify_checksum());
        }
    }

    #[test]
    fn test_set_keys_full_keyboard() {
        let colors: Vec<Rgb> = (0..126).map(|i| Rgb::new(i as u8, 0, 0)).collect();
        let req = KeyColorRequest::new(0, 126, colors.clone()).unwrap();
        let mut kb = keyboard();
        kb.set_keys(&req).unwrap();

        let mock = kb.into_inner();
        let writes = mock.writes();
        assert_eq!(writes.len(), 9);
        assert_eq!(writes[0].command(), Some(Command::Start));
        assert_eq!(writes[8].command(), Some(Command::End));

        let sent: Vec<Rgb> = writes[1..8]
            .iter()
            .flat_map(|f| decode_key_colors(f).unwrap().1)
            .collect();
        assert_eq!(sent, colors);
        assert_eq!(mock.ops.iter().filter(|op| **op == Op::Read).count(), 7);
    }

    #[test]
    fn test_set_keys_out_of_range_sends_only_framing() {
        let req = KeyColorRequest::new(127, 3, vec![Rgb::default(); 3]).unwrap();
        let mut kb = keyboard();
        kb.set_keys(&req).unwrap();
        let writes = kb.transport().writes();
        assert_eq!(writes, vec![&Frame::start(), &Frame::end()]);
    }

    #[test]
    fn test_works_over_borrowed_transport() {
        let mut mock = MockTransport::default();
        {
            let mut kb = Keyboard::new(&mut mock, DEFAULT_TIMEOUT);
            kb.set_mode(1).unwrap();
        }
        assert_eq!(mock.writes().len(), 3);
    }
}
