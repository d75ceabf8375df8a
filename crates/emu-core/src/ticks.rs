//! The fundamental unit of time in the emulator.

/// A count of CPU clock ticks (T-states).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Ticks(pub u64);

impl Ticks {
    pub const ZERO: Self = Self(0);

    #[must_use]
    pub const fn new(count: u64) -> Self {
        Self(count)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl From<u32> for Ticks {
    fn from(count: u32) -> Self {
        Self(u64::from(count))
    }
}

impl core::ops::Add for Ticks {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl core::ops::AddAssign for Ticks {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

/// Remainder of a tick count against a period; the clock uses this to
/// carry overrun cycles into the next frame.
impl core::ops::RemAssign for Ticks {
    fn rem_assign(&mut self, rhs: Self) {
        self.0 %= rhs.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remainder_keeps_overrun() {
        let mut t = Ticks::new(70_012);
        t %= Ticks::new(70_000);
        assert_eq!(t, Ticks::new(12));
    }

    #[test]
    fn accumulates_instruction_costs() {
        let mut t = Ticks::ZERO;
        t += Ticks::from(4u32);
        t += Ticks::from(11u32);
        assert_eq!(t.get(), 15);
    }
}
