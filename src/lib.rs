//! A driver for [Pervasive Displays](https://www.pervasivedisplays.com/) gen-2 (G2 COG)
//! E-Ink panels via SPI
//!
//! - Built using [`embedded-hal`] traits.
//! - Supports the 1.44", 2.0" and 2.7" panel sizes driven by the G2 chip-on-glass controller.
//!
//! [`embedded-hal`]: https://docs.rs/embedded-hal
//!
//! The G2 COG has no framebuffer of its own: every update is a timed sequence
//! of per-line SPI frames, and the erase/flicker/write staging plus the
//! charge-pump power sequencing live in the host driver. This crate owns the
//! five control lines (panel-on, border, discharge, reset, busy) and a
//! pre-allocated line assembly buffer; the SPI device and delay provider are
//! borrowed per call.
//!
//! # Example
//!
//!```rust, no_run
//!# use embedded_hal_mock::eh1::*;
//!# fn main() -> Result<(), embedded_hal::spi::ErrorKind> {
//!use epd_g2::{buffer_len, prelude::*};
//!#
//!# struct Timer;
//!# impl CountdownTimer for Timer {
//!#     fn start(&mut self, _duration: core::time::Duration) {}
//!#     fn remaining(&mut self) -> core::time::Duration {
//!#         core::time::Duration::ZERO
//!#     }
//!# }
//!# let expectations = [];
//!# let mut spi = spi::Mock::new(&expectations);
//!# let expectations = [];
//!# let panel_on = digital::Mock::new(&expectations);
//!# let expectations = [];
//!# let border = digital::Mock::new(&expectations);
//!# let expectations = [];
//!# let discharge = digital::Mock::new(&expectations);
//!# let expectations = [];
//!# let reset = digital::Mock::new(&expectations);
//!# let expectations = [];
//!# let busy = digital::Mock::new(&expectations);
//!# let mut delay = delay::NoopDelay::new();
//!
//!// Setup the EPD
//!let mut epd = Epd::new(PanelSize::Epd2in0, panel_on, border, discharge, reset, busy, Timer);
//!epd.set_temperature(25);
//!
//!// One full update: power up the COG, push the image, power back down
//!let image = [0u8; buffer_len(PanelSize::Epd2in0)];
//!epd.begin(&mut spi, &mut delay)?;
//!epd.update(&mut spi, &image, &mut delay)?;
//!epd.end(&mut spi, &mut delay)?;
//!
//!assert_eq!(epd.status(), Status::Ok);
//!# Ok(())
//!# }
//!```
//!
//! # Other information and requirements
//!
//! - Image buffers are always `buffer_len(size)` bytes: one row per scan
//!   line, row-major, MSB-first within each byte. Bit polarity and any
//!   bit-order fixups are the caller's responsibility.
//! - A full update blocks for several seconds (the charge-pump bring-up
//!   alone can take over a second); there are no suspension points.
//!
//! ### SPI
//!
//! MISO is required: the COG identification, breakage and DC/DC probes read
//! back over the bus. SPI_MODE_0 is used (CPHL = 0, CPOL = 0) with 8 bits
//! per word, MSB first.

#![no_std]
#![deny(missing_docs)]

#[cfg(test)]
extern crate std;

mod command;
mod compensation;
mod error;
mod interface;
mod traits;

pub mod driver;
pub mod panel;

#[cfg(test)]
pub(crate) mod mock;

pub use crate::driver::Epd;
pub use crate::error::Status;
pub use crate::panel::PanelSize;
pub use crate::traits::CountdownTimer;

/// Includes everything important besides the chosen panel size
pub mod prelude {
    pub use crate::driver::Epd;
    pub use crate::error::Status;
    pub use crate::panel::PanelSize;
    pub use crate::traits::CountdownTimer;

    pub use crate::SPI_MODE;
}

/// Computes the needed image buffer length for a panel size.
///
/// Eight horizontally adjacent pixels pack into one byte, one row per scan
/// line, so the 2.0" panel (200 x 96) needs `25 * 96 = 2400` bytes.
pub const fn buffer_len(size: PanelSize) -> usize {
    let geometry = size.geometry();
    geometry.bytes_per_line * geometry.lines as usize
}

use embedded_hal::spi::{Mode, Phase, Polarity};

/// SPI mode -
/// For more infos see [Requirements: SPI](index.html#spi)
pub const SPI_MODE: Mode = Mode {
    phase: Phase::CaptureOnFirstTransition,
    polarity: Polarity::IdleLow,
};
