use core::marker::PhantomData;

use embedded_hal::{
    delay::DelayNs,
    digital::{InputPin, OutputPin},
    spi::{Operation, SpiDevice},
};

use crate::traits::Command;

/// Header byte opening a command frame
pub(crate) const COMMAND_HEADER: u8 = 0x70;
/// Header byte opening a data frame
pub(crate) const DATA_HEADER: u8 = 0x72;
/// Header byte clocking a register value back out
pub(crate) const READ_HEADER: u8 = 0x73;
/// Header byte of the COG identification read
pub(crate) const ID_HEADER: u8 = 0x71;

/// The physical connection between the G2 COG and the controlling device
///
/// The COG has no data/command pin; framing rides in-band behind the header
/// bytes above, one chip select per frame. What the driver does own are the
/// panel power rail, the border line, the discharge line, reset, and the
/// busy input.
pub(crate) struct ControlInterface<SPI, ON, BORDER, DISCHARGE, RST, BUSY, DELAY> {
    /// SPI
    _spi: PhantomData<SPI>,
    /// DELAY
    _delay: PhantomData<DELAY>,
    /// Panel power rail
    panel_on: ON,
    /// Drives the inactive frame around the active area
    border: BORDER,
    /// Bleeds residual panel charge after power down
    discharge: DISCHARGE,
    /// Pin for Resetting
    rst: RST,
    /// High while the COG is starting up
    busy: BUSY,
}

impl<SPI, ON, BORDER, DISCHARGE, RST, BUSY, DELAY>
    ControlInterface<SPI, ON, BORDER, DISCHARGE, RST, BUSY, DELAY>
where
    SPI: SpiDevice,
    ON: OutputPin,
    BORDER: OutputPin,
    DISCHARGE: OutputPin,
    RST: OutputPin,
    BUSY: InputPin,
    DELAY: DelayNs,
{
    pub fn new(panel_on: ON, border: BORDER, discharge: DISCHARGE, rst: RST, busy: BUSY) -> Self {
        ControlInterface {
            _spi: PhantomData,
            _delay: PhantomData,
            panel_on,
            border,
            discharge,
            rst,
            busy,
        }
    }

    /// Basic function for sending [Commands](Command).
    ///
    /// Selects the register for the data frame that follows.
    pub(crate) fn cmd<T: Command>(&mut self, spi: &mut SPI, command: T) -> Result<(), SPI::Error> {
        spi.write(&[COMMAND_HEADER, command.address()])
    }

    /// Basic function for sending an array of u8-values of data over spi
    ///
    /// The data header and the payload share one chip select.
    pub(crate) fn data(&mut self, spi: &mut SPI, data: &[u8]) -> Result<(), SPI::Error> {
        spi.transaction(&mut [Operation::Write(&[DATA_HEADER]), Operation::Write(data)])
    }

    /// Basic function for sending [Commands](Command) and the data belonging to it.
    pub(crate) fn cmd_with_data<T: Command>(
        &mut self,
        spi: &mut SPI,
        command: T,
        data: &[u8],
    ) -> Result<(), SPI::Error> {
        self.cmd(spi, command)?;
        self.data(spi, data)
    }

    /// Ship a pre-assembled frame; the line buffer carries its own header.
    pub(crate) fn send_frame(&mut self, spi: &mut SPI, frame: &[u8]) -> Result<(), SPI::Error> {
        spi.write(frame)
    }

    /// Select `command` and clock its value back out.
    pub(crate) fn read_register<T: Command>(
        &mut self,
        spi: &mut SPI,
        command: T,
    ) -> Result<u8, SPI::Error> {
        self.cmd(spi, command)?;
        let mut frame = [READ_HEADER, 0x00];
        spi.transfer_in_place(&mut frame)?;
        Ok(frame[1])
    }

    /// Read the COG identification byte.
    ///
    /// The reply register only settles on the second read after reset, so
    /// the probe always runs twice and keeps the second answer.
    pub(crate) fn read_cog_id(&mut self, spi: &mut SPI) -> Result<u8, SPI::Error> {
        let mut frame = [ID_HEADER, 0x00];
        spi.transfer_in_place(&mut frame)?;

        let mut frame = [ID_HEADER, 0x00];
        spi.transfer_in_place(&mut frame)?;
        Ok(frame[1])
    }

    /// Waits until device isn't busy anymore (busy == HIGH)
    ///
    /// Polls every 10 µs; the COG raises busy only during its start-up
    /// window, so there is no timeout.
    pub(crate) fn wait_until_idle(&mut self, delay: &mut DELAY) {
        while self.busy.is_high().unwrap_or(false) {
            delay.delay_us(10);
        }
    }

    pub(crate) fn set_panel_on(&mut self, high: bool) {
        set(&mut self.panel_on, high);
    }

    pub(crate) fn set_border(&mut self, high: bool) {
        set(&mut self.border, high);
    }

    pub(crate) fn set_discharge(&mut self, high: bool) {
        set(&mut self.discharge, high);
    }

    pub(crate) fn set_reset(&mut self, high: bool) {
        set(&mut self.rst, high);
    }
}

fn set<P: OutputPin>(pin: &mut P, high: bool) {
    if high {
        let _ = pin.set_high();
    } else {
        let _ = pin.set_low();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use crate::mock::{pin_log, BusyPin, RecordingPin, RecordingSpi, SleepLog};

    type TestInterface = ControlInterface<
        RecordingSpi,
        RecordingPin,
        RecordingPin,
        RecordingPin,
        RecordingPin,
        BusyPin,
        SleepLog,
    >;

    fn interface() -> TestInterface {
        let log = pin_log();
        ControlInterface::new(
            RecordingPin::new("panel_on", &log),
            RecordingPin::new("border", &log),
            RecordingPin::new("discharge", &log),
            RecordingPin::new("reset", &log),
            BusyPin::new(),
        )
    }

    #[test]
    fn register_write_framing() {
        let mut interface = interface();
        let mut spi = RecordingSpi::new();

        interface
            .cmd_with_data(&mut spi, Command::VcomLevel, &[0xc2])
            .unwrap();

        assert_eq!(spi.frames, [[0x70, 0x09].to_vec(), [0x72, 0xc2].to_vec()]);
    }

    #[test]
    fn register_read_framing() {
        let mut interface = interface();
        let mut spi = RecordingSpi::with_replies(&[0x80]);

        let value = interface
            .read_register(&mut spi, Command::ChipStatus)
            .unwrap();

        assert_eq!(value, 0x80);
        assert_eq!(spi.frames, [[0x70, 0x0f].to_vec(), [0x73, 0x00].to_vec()]);
    }

    #[test]
    fn cog_id_takes_second_reply() {
        let mut interface = interface();
        let mut spi = RecordingSpi::with_replies(&[0x11, 0x12]);

        assert_eq!(interface.read_cog_id(&mut spi).unwrap(), 0x12);
        assert_eq!(spi.frames.len(), 2);
    }

    #[test]
    fn busy_poll_sleeps_between_reads() {
        let log = pin_log();
        let mut interface = TestInterface::new(
            RecordingPin::new("panel_on", &log),
            RecordingPin::new("border", &log),
            RecordingPin::new("discharge", &log),
            RecordingPin::new("reset", &log),
            BusyPin::high_for(3),
        );
        let mut delay = SleepLog::new();

        interface.wait_until_idle(&mut delay);

        assert_eq!(delay.sleeps_us, [10, 10, 10]);
    }
}
