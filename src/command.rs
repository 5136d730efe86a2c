//! SPI register map of the G2 COG driver

use crate::traits;

/// G2 COG registers
///
/// Should rarely (never?) be needed directly.
///
/// Every register write on the wire is a 2-byte command frame selecting the
/// register, followed by a data frame carrying the value(s); reads clock the
/// reply back in behind a read header. The framing itself lives in
/// [`interface`](crate::interface).
#[allow(dead_code)]
#[derive(Copy, Clone)]
pub(crate) enum Command {
    /// Per-size source-driver channel enable bitmap
    ///     8 Databytes, distinct per panel size
    ChannelSelect = 0x01,
    /// Output enable
    ///     0x40 disabled, 0x2f drive the latched line, 0x05 off (shutdown)
    OutputEnable = 0x02,
    /// Driver latch
    ///     0x01 latch on, 0x00 latch off
    LatchControl = 0x03,
    /// Power setting and internal discharge
    ///     0x03 run, 0x83 internal discharge on, 0x00 discharge off
    PowerControl = 0x04,
    /// Charge pump staging
    ///     Bring-up: 0x01 positive (VGH/VDH), 0x03 negative (VGL/VDL),
    ///     0x0f Vcom driver on
    ///     Shutdown: 0x0e, 0x02, 0x00 peel the rails back off
    ChargePump = 0x05,
    /// Oscillator
    ///     0xd1 high-power run, 0x0d off
    Oscillator = 0x07,
    /// Power setting
    PowerSetting = 0x08,
    /// Vcom level
    VcomLevel = 0x09,
    /// Line data shift register; the payload is one full line frame
    LineData = 0x0a,
    /// Power saving mode
    PowerSaving = 0x0b,
    /// Status bits: bit 7 panel intact, bit 6 DC/DC in regulation
    ChipStatus = 0x0f,
}

impl traits::Command for Command {
    /// Returns the address of the command
    fn address(self) -> u8 {
        self as u8
    }
}
