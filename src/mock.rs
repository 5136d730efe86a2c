//! Recording doubles for the embedded-hal traits the driver consumes.
//!
//! The sequence tests need to observe tens of thousands of SPI frames per
//! update, which is out of reach for expectation-list mocks; these doubles
//! record everything and answer read frames from a scripted queue.

use core::convert::Infallible;
use core::time::Duration;

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::vec::Vec;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{self, InputPin, OutputPin};
use embedded_hal::spi::{self, Operation, SpiDevice};

use crate::traits::CountdownTimer;

/// One chip-select-framed SPI transaction, all operations concatenated.
pub(crate) type Frame = Vec<u8>;

/// Records every SPI frame and answers read operations from a queue.
///
/// Replies feed the last byte of an in-place transfer, one reply per frame,
/// matching the read framing of the COG (header out, value back on the
/// closing byte).
#[derive(Default)]
pub(crate) struct RecordingSpi {
    pub frames: Vec<Frame>,
    pub read_replies: VecDeque<u8>,
}

impl RecordingSpi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_replies(replies: &[u8]) -> Self {
        Self {
            frames: Vec::new(),
            read_replies: replies.iter().copied().collect(),
        }
    }
}

impl spi::ErrorType for RecordingSpi {
    type Error = Infallible;
}

impl SpiDevice for RecordingSpi {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Infallible> {
        let mut frame = Frame::new();
        for operation in operations.iter_mut() {
            match operation {
                Operation::Write(words) => frame.extend_from_slice(words),
                Operation::TransferInPlace(words) => {
                    frame.extend_from_slice(words);
                    if let (Some(reply), Some(last)) =
                        (self.read_replies.pop_front(), words.last_mut())
                    {
                        *last = reply;
                    }
                }
                Operation::Transfer(read, write) => {
                    frame.extend_from_slice(write);
                    for word in read.iter_mut() {
                        *word = self.read_replies.pop_front().unwrap_or(0);
                    }
                }
                Operation::Read(words) => {
                    for word in words.iter_mut() {
                        *word = self.read_replies.pop_front().unwrap_or(0);
                    }
                }
                Operation::DelayNs(_) => {}
            }
        }
        self.frames.push(frame);
        Ok(())
    }
}

/// Shared edge log so one test can observe ordering across several pins.
pub(crate) type PinLog = Rc<RefCell<Vec<(&'static str, bool)>>>;

pub(crate) fn pin_log() -> PinLog {
    Rc::new(RefCell::new(Vec::new()))
}

/// Output pin appending every edge to a shared log.
pub(crate) struct RecordingPin {
    name: &'static str,
    log: PinLog,
}

impl RecordingPin {
    pub fn new(name: &'static str, log: &PinLog) -> Self {
        Self {
            name,
            log: Rc::clone(log),
        }
    }
}

impl digital::ErrorType for RecordingPin {
    type Error = Infallible;
}

impl OutputPin for RecordingPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.log.borrow_mut().push((self.name, false));
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.log.borrow_mut().push((self.name, true));
        Ok(())
    }
}

/// Busy input scripted with a run of high reads; idles low once drained.
#[derive(Default)]
pub(crate) struct BusyPin {
    reads: VecDeque<bool>,
}

impl BusyPin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn high_for(reads: usize) -> Self {
        Self {
            reads: core::iter::repeat(true).take(reads).collect(),
        }
    }
}

impl digital::ErrorType for BusyPin {
    type Error = Infallible;
}

impl InputPin for BusyPin {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(self.reads.pop_front().unwrap_or(false))
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(!self.is_high()?)
    }
}

/// Counts every sleep the driver takes, in microseconds.
#[derive(Default)]
pub(crate) struct SleepLog {
    pub sleeps_us: Vec<u32>,
}

impl SleepLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many sleeps of exactly `ms` milliseconds were taken.
    pub fn count_ms(&self, ms: u32) -> usize {
        self.sleeps_us.iter().filter(|&&us| us == ms * 1000).count()
    }
}

impl DelayNs for SleepLog {
    fn delay_ns(&mut self, ns: u32) {
        self.sleeps_us.push(ns / 1000);
    }

    fn delay_us(&mut self, us: u32) {
        self.sleeps_us.push(us);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.sleeps_us.push(ms * 1000);
    }
}

/// Countdown scripted with the values `remaining` should report; reports
/// expiry once the script runs dry.
#[derive(Default)]
pub(crate) struct ScriptedTimer {
    pub started: Vec<Duration>,
    pub remaining: VecDeque<Duration>,
}

impl CountdownTimer for ScriptedTimer {
    fn start(&mut self, duration: Duration) {
        self.started.push(duration);
    }

    fn remaining(&mut self) -> Duration {
        self.remaining.pop_front().unwrap_or(Duration::ZERO)
    }
}
