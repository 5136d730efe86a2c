//! Temperature compensation for the three update stages.
//!
//! The particle motion in the display film slows as the panel cools, so the
//! stage repeats, the overlap window, and the flicker fill times all vary
//! with ambient temperature. Three bands cover the operating range: below
//! 10 °C, 10–40 °C, and above 40 °C.

use crate::panel::PanelSize;

/// Stage timing for one (size, temperature band) pair
pub(crate) struct Compensation {
    pub stage1_repeat: u16,
    pub stage1_step: u16,
    pub stage1_block: u16,
    pub stage2_repeat: u16,
    /// Flicker white fill time in milliseconds
    pub stage2_t1: u16,
    /// Flicker black fill time in milliseconds
    pub stage2_t2: u16,
    pub stage3_repeat: u16,
    pub stage3_step: u16,
    pub stage3_block: u16,
}

#[allow(clippy::too_many_arguments)]
const fn rec(
    stage1_repeat: u16,
    stage1_step: u16,
    stage1_block: u16,
    stage2_repeat: u16,
    stage2_t1: u16,
    stage2_t2: u16,
    stage3_repeat: u16,
    stage3_step: u16,
    stage3_block: u16,
) -> Compensation {
    Compensation {
        stage1_repeat,
        stage1_step,
        stage1_block,
        stage2_repeat,
        stage2_t1,
        stage2_t2,
        stage3_repeat,
        stage3_step,
        stage3_block,
    }
}

#[rustfmt::skip]
const COMPENSATION_1IN44: [Compensation; 3] = [
    rec(2, 6, 42,   4, 392, 392,   2, 6, 42), // below 10 Celsius
    rec(4, 2, 16,   4, 155, 155,   4, 2, 16), // 10 ... 40 Celsius
    rec(4, 2, 16,   4, 155, 155,   4, 2, 16), // above 40 Celsius
];

#[rustfmt::skip]
const COMPENSATION_2IN0: [Compensation; 3] = [
    rec(2, 6, 42,   4, 392, 392,   2, 6, 42), // below 10 Celsius
    rec(2, 2, 48,   4, 196, 196,   2, 2, 48), // 10 ... 40 Celsius
    rec(4, 2, 48,   4, 196, 196,   4, 2, 48), // above 40 Celsius
];

#[rustfmt::skip]
const COMPENSATION_2IN7: [Compensation; 3] = [
    rec(2, 8, 64,   4, 392, 392,   2, 8, 64), // below 10 Celsius
    rec(2, 8, 64,   4, 196, 196,   2, 8, 64), // 10 ... 40 Celsius
    rec(4, 8, 64,   4, 196, 196,   4, 8, 64), // above 40 Celsius
];

/// Band index for an ambient temperature in Celsius
pub(crate) const fn temperature_band(celsius: i16) -> usize {
    if celsius < 10 {
        0
    } else if celsius > 40 {
        2
    } else {
        1
    }
}

/// The compensation record for a panel size at an ambient temperature
pub(crate) const fn lookup(size: PanelSize, celsius: i16) -> &'static Compensation {
    let table = match size {
        PanelSize::Epd1in44 => &COMPENSATION_1IN44,
        PanelSize::Epd2in0 => &COMPENSATION_2IN0,
        PanelSize::Epd2in7 => &COMPENSATION_2IN7,
    };
    &table[temperature_band(celsius)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_boundaries() {
        assert_eq!(temperature_band(-40), 0);
        assert_eq!(temperature_band(9), 0);
        assert_eq!(temperature_band(10), 1);
        assert_eq!(temperature_band(40), 1);
        assert_eq!(temperature_band(41), 2);
    }

    #[test]
    fn room_temperature_records() {
        let c = lookup(PanelSize::Epd2in0, 25);
        assert_eq!(
            [
                c.stage1_repeat, c.stage1_step, c.stage1_block,
                c.stage2_repeat, c.stage2_t1, c.stage2_t2,
                c.stage3_repeat, c.stage3_step, c.stage3_block,
            ],
            [2, 2, 48, 4, 196, 196, 2, 2, 48]
        );

        let c = lookup(PanelSize::Epd1in44, 25);
        assert_eq!(c.stage2_t1, 155);
        assert_eq!(c.stage1_block, 16);

        let c = lookup(PanelSize::Epd2in7, 25);
        assert_eq!(c.stage1_step, 8);
        assert_eq!(c.stage1_block, 64);
    }

    #[test]
    fn cold_panels_run_longer_fills() {
        for size in [PanelSize::Epd1in44, PanelSize::Epd2in0, PanelSize::Epd2in7] {
            assert_eq!(lookup(size, 0).stage2_t1, 392);
            assert!(lookup(size, 25).stage2_t1 < lookup(size, 0).stage2_t1);
        }
    }
}
