use core::fmt::{Display, Formatter};

/// Panel fault state, latched by the power sequencer.
///
/// A fault sticks until the next [`begin`](crate::driver::Epd::begin):
/// [`clear`](crate::driver::Epd::clear) and
/// [`update`](crate::driver::Epd::update) become no-ops while one is
/// latched, and the power sequencer has already driven the panel back to a
/// safe, discharged state by the time the faulting call returns.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Status {
    /// Nominal
    #[default]
    Ok,

    /// The COG identification read returned something other than a gen-2
    /// part; wrong panel generation or bad wiring
    UnsupportedCog,

    /// The breakage probe reports a cracked panel
    PanelBroken,

    /// The charge pumps failed to come up after four attempts, or lost
    /// regulation by the end of an update
    DcFailed,
}

impl Display for Status {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::UnsupportedCog => write!(f, "unsupported COG generation"),
            Self::PanelBroken => write!(f, "panel broken"),
            Self::DcFailed => write!(f, "DC/DC bring-up failed"),
        }
    }
}
