//! The G2 COG panel driver
//!
//! The controller latches one scan line at a time: a full update is three
//! stages of repeated line writes (erase the old image, flicker, write the
//! new one), bracketed by the charge-pump power-up and the discharge
//! shutdown. All of that sequencing happens here, on the caller's thread,
//! blocking until the panel has physically changed.

use core::time::Duration;

use embedded_hal::{
    delay::DelayNs,
    digital::{InputPin, OutputPin},
    spi::SpiDevice,
};

use crate::command::Command;
use crate::compensation::{self, Compensation};
use crate::error::Status;
use crate::interface::{ControlInterface, DATA_HEADER};
use crate::panel::{Geometry, PanelSize};
use crate::traits::CountdownTimer;

/// Sentinel row address: the COG matches no scan position, discards the
/// frame, and still spends one frame time of SPI traffic on it. The stage
/// scheduler leans on that to keep its cadence at the display edges.
const DUMMY_LINE: u16 = 0x7fff;

/// Line assembly buffer size: header + border + odd pixels + scan selector
/// + even pixels + one filler byte, for the largest supported panel (2.7").
const LINE_BUFFER_LEN: usize = line_buffer_len(PanelSize::Epd2in7);

const fn line_buffer_len(size: PanelSize) -> usize {
    let geometry = size.geometry();
    2 * geometry.bytes_per_line + geometry.bytes_per_scan + 3
}

/// Pixel recoding applied while shipping a line.
///
/// A full update drives the complement of the image first (stage 1), then
/// the image itself (stage 3); driving only the final polarity leaves
/// ghosting in the film.
#[derive(Copy, Clone, Eq, PartialEq)]
enum Stage {
    /// B -> W, W -> B (erase pass)
    Inverse,
    /// B -> B, W -> W (write pass)
    Normal,
}

/// Epd driver for the gen-2 COG panels
///
/// Owns the five control lines, the countdown timer bounding the flicker
/// stage, and the line assembly buffer; the SPI device and the delay
/// provider are borrowed per call. The SPI bus is released between line
/// frames, so other devices can share it at the cost of per-line latency.
pub struct Epd<SPI, ON, BORDER, DISCHARGE, RST, BUSY, DELAY, TIMER> {
    /// Connection Interface
    interface: ControlInterface<SPI, ON, BORDER, DISCHARGE, RST, BUSY, DELAY>,
    /// Flicker-stage deadline
    timer: TIMER,
    size: PanelSize,
    geometry: &'static Geometry,
    channel_select: &'static [u8],
    compensation: &'static Compensation,
    /// One line frame, assembled in place and reused for every transfer
    line_buffer: [u8; LINE_BUFFER_LEN],
    status: Status,
}

impl<SPI, ON, BORDER, DISCHARGE, RST, BUSY, DELAY, TIMER>
    Epd<SPI, ON, BORDER, DISCHARGE, RST, BUSY, DELAY, TIMER>
where
    SPI: SpiDevice,
    ON: OutputPin,
    BORDER: OutputPin,
    DISCHARGE: OutputPin,
    RST: OutputPin,
    BUSY: InputPin,
    DELAY: DelayNs,
    TIMER: CountdownTimer,
{
    /// Creates a new driver from the five control pins and a countdown
    /// timer.
    ///
    /// Touches no hardware; the panel stays unpowered until
    /// [`begin`](Self::begin). Compensation starts at the 25 °C band, so
    /// callers that never measure temperature get room-temperature timing.
    pub fn new(
        size: PanelSize,
        panel_on: ON,
        border: BORDER,
        discharge: DISCHARGE,
        rst: RST,
        busy: BUSY,
        timer: TIMER,
    ) -> Self {
        Epd {
            interface: ControlInterface::new(panel_on, border, discharge, rst, busy),
            timer,
            size,
            geometry: size.geometry(),
            channel_select: size.channel_select(),
            compensation: compensation::lookup(size, 25),
            line_buffer: [0; LINE_BUFFER_LEN],
            status: Status::Ok,
        }
    }

    /// Selects the compensation band for the ambient temperature in Celsius.
    ///
    /// Valid in any state; the new timing takes effect on the next
    /// [`clear`](Self::clear) or [`update`](Self::update).
    pub fn set_temperature(&mut self, celsius: i16) {
        self.compensation = compensation::lookup(self.size, celsius);
    }

    /// The latched fault state.
    pub fn status(&self) -> Status {
        self.status
    }

    /// The panel size this driver was created for.
    pub fn size(&self) -> PanelSize {
        self.size
    }

    /// Get the width of the display
    pub fn width(&self) -> u32 {
        self.geometry.dots as u32
    }

    /// Get the height of the display
    pub fn height(&self) -> u32 {
        self.geometry.lines as u32
    }

    /// Powers the COG up from cold to ready-to-drive.
    ///
    /// Runs the reset dance, probes the COG generation and panel integrity,
    /// programs the per-size channel select, and brings the charge pumps up
    /// with up to four attempts. On a protocol fault the matching
    /// [`Status`] latches, the panel is discharged, and the call returns
    /// `Ok(())`; only transport errors surface as `Err`.
    ///
    /// Blocks for roughly 350 ms on a healthy panel, and for up to ~1.3 s
    /// when the charge pumps refuse to start.
    pub fn begin(&mut self, spi: &mut SPI, delay: &mut DELAY) -> Result<(), SPI::Error> {
        // a fresh attempt clears any earlier fault
        self.status = Status::Ok;

        self.interface.set_reset(false);
        self.interface.set_panel_on(false);
        self.interface.set_discharge(false);
        self.interface.set_border(false);

        delay.delay_ms(5);
        self.interface.set_panel_on(true);
        delay.delay_ms(10);

        self.interface.set_reset(true);
        self.interface.set_border(true);
        delay.delay_ms(5);

        self.interface.set_reset(false);
        delay.delay_ms(5);

        self.interface.set_reset(true);
        delay.delay_ms(5);

        // wait for COG to become ready
        self.interface.wait_until_idle(delay);

        let cog_id = self.interface.read_cog_id(spi)?;
        if cog_id & 0x0f != 0x02 {
            self.status = Status::UnsupportedCog;
            self.power_off(delay);
            return Ok(());
        }

        // disable OE
        self.interface
            .cmd_with_data(spi, Command::OutputEnable, &[0x40])?;

        // check breakage
        let broken_panel = self.interface.read_register(spi, Command::ChipStatus)?;
        if broken_panel & 0x80 == 0 {
            self.status = Status::PanelBroken;
            self.power_off(delay);
            return Ok(());
        }

        // power saving mode
        self.interface
            .cmd_with_data(spi, Command::PowerSaving, &[0x02])?;

        // channel select
        self.interface.cmd(spi, Command::ChannelSelect)?;
        self.interface.data(spi, self.channel_select)?;

        // high power mode osc
        self.interface
            .cmd_with_data(spi, Command::Oscillator, &[0xd1])?;

        // power setting
        self.interface
            .cmd_with_data(spi, Command::PowerSetting, &[0x02])?;

        // Vcom level
        self.interface
            .cmd_with_data(spi, Command::VcomLevel, &[0xc2])?;

        // power setting
        self.interface
            .cmd_with_data(spi, Command::PowerControl, &[0x03])?;

        // driver latch on, then off
        self.interface
            .cmd_with_data(spi, Command::LatchControl, &[0x01])?;
        self.interface
            .cmd_with_data(spi, Command::LatchControl, &[0x00])?;

        delay.delay_ms(5);

        let mut dc_ok = false;
        for _ in 0..4 {
            // charge pump positive voltage on - VGH/VDH on
            self.interface
                .cmd_with_data(spi, Command::ChargePump, &[0x01])?;
            delay.delay_ms(240);

            // charge pump negative voltage on - VGL/VDL on
            self.interface
                .cmd_with_data(spi, Command::ChargePump, &[0x03])?;
            delay.delay_ms(40);

            // charge pump Vcom on - Vcom driver on
            self.interface
                .cmd_with_data(spi, Command::ChargePump, &[0x0f])?;
            delay.delay_ms(40);

            // check DC/DC
            let dc_state = self.interface.read_register(spi, Command::ChipStatus)?;
            if dc_state & 0x40 != 0 {
                dc_ok = true;
                break;
            }
        }
        if !dc_ok {
            self.status = Status::DcFailed;
            self.power_off(delay);
            return Ok(());
        }

        // output enable to disable
        self.interface
            .cmd_with_data(spi, Command::OutputEnable, &[0x40])
    }

    /// Clear display (anything -> white).
    ///
    /// Skips silently while a fault is latched.
    pub fn clear(&mut self, spi: &mut SPI, delay: &mut DELAY) -> Result<(), SPI::Error> {
        if self.status != Status::Ok {
            return Ok(());
        }
        self.frame_fixed(spi, delay, 0xff, Stage::Inverse)?;
        self.frame_stage2(spi, delay)?;
        self.frame_fixed(spi, delay, 0xaa, Stage::Normal)
    }

    /// Change from the old image to a new image.
    ///
    /// `image` is `buffer_len(size)` bytes, one row per scan line, MSB
    /// first. Takes on the order of seconds; skips silently while a fault
    /// is latched.
    pub fn update(
        &mut self,
        spi: &mut SPI,
        image: &[u8],
        delay: &mut DELAY,
    ) -> Result<(), SPI::Error> {
        if self.status != Status::Ok {
            return Ok(());
        }
        debug_assert_eq!(
            image.len(),
            self.geometry.lines as usize * self.geometry.bytes_per_line
        );
        self.frame_data(spi, delay, image, Stage::Inverse)?;
        self.frame_stage2(spi, delay)?;
        self.frame_data(spi, delay, image, Stage::Normal)
    }

    /// Shuts the COG down and discharges the panel.
    ///
    /// Runs unconditionally, fault or not; leaving the rails up (or the
    /// panel charged) degrades the film. A DC/DC regulation loss detected
    /// on the way down latches [`Status::DcFailed`].
    pub fn end(&mut self, spi: &mut SPI, delay: &mut DELAY) -> Result<(), SPI::Error> {
        // dummy line and border
        if self.size == PanelSize::Epd2in7 {
            // only for 2.70" EPD
            delay.delay_ms(25);
            self.interface.set_border(false);
            delay.delay_ms(250);
            self.interface.set_border(true);
        } else {
            // for 1.44" and 2.0"
            self.one_line(spi, delay, DUMMY_LINE, None, 0x00, Stage::Normal, 0xff)?;
            delay.delay_ms(40);
            self.one_line(spi, delay, DUMMY_LINE, None, 0x00, Stage::Normal, 0xaa)?;
            delay.delay_ms(200);
            self.one_line(spi, delay, DUMMY_LINE, None, 0x00, Stage::Normal, 0x00)?;
            delay.delay_ms(25);
        }

        // check DC/DC
        let dc_state = self.interface.read_register(spi, Command::ChipStatus)?;
        if dc_state & 0x40 == 0 {
            self.status = Status::DcFailed;
            self.power_off(delay);
            return Ok(());
        }

        // latch reset turn on
        self.interface
            .cmd_with_data(spi, Command::LatchControl, &[0x01])?;

        // output enable off
        self.interface
            .cmd_with_data(spi, Command::OutputEnable, &[0x05])?;

        // power off positive charge pump
        self.interface
            .cmd_with_data(spi, Command::ChargePump, &[0x0e])?;

        // power off Vcom charge pump
        self.interface
            .cmd_with_data(spi, Command::ChargePump, &[0x02])?;

        // power off all charge pumps
        self.interface
            .cmd_with_data(spi, Command::ChargePump, &[0x00])?;

        // turn off osc
        self.interface
            .cmd_with_data(spi, Command::Oscillator, &[0x0d])?;

        // discharge internal on
        self.interface
            .cmd_with_data(spi, Command::PowerControl, &[0x83])?;
        delay.delay_ms(120);

        // discharge internal off
        self.interface
            .cmd_with_data(spi, Command::PowerControl, &[0x00])?;

        self.power_off(delay);
        Ok(())
    }

    /// Drops power and all signals, then bleeds residual charge off the
    /// panel with ten discharge pulses.
    fn power_off(&mut self, delay: &mut DELAY) {
        self.interface.set_reset(false);
        self.interface.set_panel_on(false);
        self.interface.set_border(false);

        for _ in 0..10 {
            delay.delay_ms(10);
            self.interface.set_discharge(true);
            delay.delay_ms(10);
            self.interface.set_discharge(false);
        }
    }

    fn stage_params(&self, stage: Stage) -> (u16, i32, i32) {
        let compensation = self.compensation;
        match stage {
            Stage::Inverse => (
                compensation.stage1_repeat,
                compensation.stage1_step as i32,
                compensation.stage1_block as i32,
            ),
            Stage::Normal => (
                compensation.stage3_repeat,
                compensation.stage3_step as i32,
                compensation.stage3_block as i32,
            ),
        }
    }

    /// Stage 1/3 pass over a fixed fill value.
    fn frame_fixed(
        &mut self,
        spi: &mut SPI,
        delay: &mut DELAY,
        value: u8,
        stage: Stage,
    ) -> Result<(), SPI::Error> {
        self.run_stage(spi, delay, None, value, stage)
    }

    /// Stage 1/3 pass over image data.
    fn frame_data(
        &mut self,
        spi: &mut SPI,
        delay: &mut DELAY,
        image: &[u8],
        stage: Stage,
    ) -> Result<(), SPI::Error> {
        self.run_stage(spi, delay, Some(image), 0x00, stage)
    }

    /// The stage 1/3 line scheduler.
    ///
    /// Slides a `block`-line window down the display in `step`-line
    /// increments, so every row is driven `block / step` times per repeat,
    /// overlapped with its neighbours. Out-of-range window positions emit
    /// dummy lines to keep the frame cadence; on the final repeat the
    /// window's leading edge emits a blanking line instead of data.
    fn run_stage(
        &mut self,
        spi: &mut SPI,
        delay: &mut DELAY,
        image: Option<&[u8]>,
        fixed_value: u8,
        stage: Stage,
    ) -> Result<(), SPI::Error> {
        let (repeat, step, block) = self.stage_params(stage);
        let total_lines = self.geometry.lines as i32;
        let bytes_per_line = self.geometry.bytes_per_line;

        for n in 0..repeat {
            let final_repeat = n + 1 == repeat;

            let mut line = step - block;
            while line < total_lines + step {
                for offset in 0..block {
                    let pos = line + offset;
                    if pos < 0 || pos > total_lines {
                        self.one_line(spi, delay, DUMMY_LINE, None, 0x00, Stage::Normal, 0x00)?;
                    } else if offset == 0 && final_repeat {
                        self.one_line(spi, delay, pos as u16, None, 0x00, Stage::Normal, 0x00)?;
                    } else {
                        // the window bound admits pos == total_lines, which
                        // addresses no image row; that line ships zeroed
                        let start = pos as usize * bytes_per_line;
                        let row = image.and_then(|image| image.get(start..start + bytes_per_line));
                        let fixed = if image.is_some() { 0x00 } else { fixed_value };
                        self.one_line(spi, delay, pos as u16, row, fixed, stage, 0x00)?;
                    }
                }
                line += step;
            }
        }
        Ok(())
    }

    /// Stage 2: full-frame fills bounded by the countdown timer.
    ///
    /// Pushes whole frames of `fixed_value` until the deadline passes,
    /// checking only between frames; accuracy is one frame time. The loop
    /// exits as soon as either component of the remaining time reads zero.
    fn frame_fixed_timed(
        &mut self,
        spi: &mut SPI,
        delay: &mut DELAY,
        fixed_value: u8,
        stage_time: u16,
    ) -> Result<(), SPI::Error> {
        self.timer.start(Duration::from_millis(stage_time as u64));
        loop {
            for line in 0..self.geometry.lines {
                self.one_line(spi, delay, line, None, fixed_value, Stage::Normal, 0x00)?;
            }

            let left = self.timer.remaining();
            if left.as_secs() == 0 || left.subsec_nanos() == 0 {
                return Ok(());
            }
        }
    }

    fn frame_stage2(&mut self, spi: &mut SPI, delay: &mut DELAY) -> Result<(), SPI::Error> {
        for _ in 0..self.compensation.stage2_repeat {
            self.frame_fixed_timed(spi, delay, 0xff, self.compensation.stage2_t1)?;
            self.frame_fixed_timed(spi, delay, 0xaa, self.compensation.stage2_t2)?;
        }
        Ok(())
    }

    /// Assembles and ships the SPI frame for one scan line.
    ///
    /// Every line is a complete bus session: prepare command, a settling
    /// gap, the line frame, then the output-enable strobe that latches the
    /// shifted line onto the panel.
    #[allow(clippy::too_many_arguments)]
    fn one_line(
        &mut self,
        spi: &mut SPI,
        delay: &mut DELAY,
        line: u16,
        data: Option<&[u8]>,
        fixed_value: u8,
        stage: Stage,
        border_byte: u8,
    ) -> Result<(), SPI::Error> {
        let length = self.encode_line(line, data, fixed_value, stage, border_byte);

        self.interface.cmd(spi, Command::LineData)?;
        // the COG needs this gap between the prepare command and the payload
        delay.delay_us(10);
        self.interface
            .send_frame(spi, &self.line_buffer[..length])?;

        // output data to panel
        self.interface
            .cmd_with_data(spi, Command::OutputEnable, &[0x2f])
    }

    /// Packs border byte, odd pixels (reversed), scan selector, and even
    /// pixels (forward) into the line buffer; returns the filled length.
    fn encode_line(
        &mut self,
        line: u16,
        data: Option<&[u8]>,
        fixed_value: u8,
        stage: Stage,
        border_byte: u8,
    ) -> usize {
        let lines = self.geometry.lines;
        let bytes_per_line = self.geometry.bytes_per_line;
        let bytes_per_scan = self.geometry.bytes_per_scan;

        let buffer = &mut self.line_buffer;
        let mut p = 0;

        buffer[p] = DATA_HEADER;
        p += 1;

        // border byte
        buffer[p] = border_byte;
        p += 1;

        // odd pixels, shipped in reverse byte order
        for b in (0..bytes_per_line).rev() {
            buffer[p] = match data {
                Some(row) => odd_pixels(row[b], stage),
                None => fixed_value,
            };
            p += 1;
        }

        // scan selector: two bits per row, one quartet byte names the
        // driven row; the sentinel line number matches no byte
        let scan_pos = (lines as i32 - line as i32 - 1) / 4;
        let scan_shift = 2 * (line & 0x03) as u32;
        for b in 0..bytes_per_scan {
            buffer[p] = if b as i32 == scan_pos {
                0x03 << scan_shift
            } else {
                0x00
            };
            p += 1;
        }

        // even pixels, forward byte order
        for b in 0..bytes_per_line {
            buffer[p] = match data {
                Some(row) => even_pixels(row[b], stage),
                None => fixed_value,
            };
            p += 1;
        }

        p
    }
}

/// Recode the four odd pixels (low half) of a packed image byte.
fn odd_pixels(byte: u8, stage: Stage) -> u8 {
    let pixels = byte & 0x55;
    match stage {
        Stage::Inverse => 0xaa | (pixels ^ 0x55),
        Stage::Normal => 0xaa | pixels,
    }
}

/// Recode the four even pixels (high half) of a packed image byte, then
/// mirror the pixel pairs within the byte; the even sources scan the line
/// from the far end.
fn even_pixels(byte: u8, stage: Stage) -> u8 {
    let pixels = byte & 0xaa;
    let pixels = match stage {
        Stage::Inverse => 0xaa | ((pixels ^ 0xaa) >> 1),
        Stage::Normal => 0xaa | (pixels >> 1),
    };
    let p1 = (pixels >> 6) & 0x03;
    let p2 = (pixels >> 4) & 0x03;
    let p3 = (pixels >> 2) & 0x03;
    let p4 = pixels & 0x03;
    p1 | (p2 << 2) | (p3 << 4) | (p4 << 6)
}
