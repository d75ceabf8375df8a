//! Master clock configuration.

use crate::Ticks;

/// Master clock configuration for a machine.
///
/// The CPU clock is the only clock the core paces against; interrupt
/// periods derive from it by integer division.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MasterClock {
    /// CPU frequency in Hz (e.g., `3_500_000` for the 48K Spectrum).
    pub frequency_hz: u64,
}

impl MasterClock {
    #[must_use]
    pub const fn new(frequency_hz: u64) -> Self {
        Self { frequency_hz }
    }

    /// Ticks per frame at the given frame rate (integer division).
    #[must_use]
    pub const fn ticks_per_frame(&self, frames_per_second: u64) -> Ticks {
        Ticks::new(self.frequency_hz / frames_per_second)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifty_hertz_frame_at_3_5_mhz() {
        let clock = MasterClock::new(3_500_000);
        assert_eq!(clock.ticks_per_frame(50), Ticks::new(70_000));
    }

    #[test]
    fn frame_division_truncates() {
        let clock = MasterClock::new(3_546_900);
        assert_eq!(clock.ticks_per_frame(50).get(), 70_938);
    }
}
