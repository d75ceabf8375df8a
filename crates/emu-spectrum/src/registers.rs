//! Z80 register file as seen by snapshots.
//!
//! The interpreter keeps its own internal state (WZ, halt latch, Q); this is
//! the architectural subset every snapshot format agrees on.

#![allow(clippy::cast_possible_truncation)] // Intentional truncation for low byte extraction.

/// Complete architectural register set, including the interrupt state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Registers {
    pub a: u8,
    pub f: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,

    pub a_alt: u8,
    pub f_alt: u8,
    pub b_alt: u8,
    pub c_alt: u8,
    pub d_alt: u8,
    pub e_alt: u8,
    pub h_alt: u8,
    pub l_alt: u8,

    pub ix: u16,
    pub iy: u16,
    pub sp: u16,
    pub pc: u16,
    pub i: u8,
    pub r: u8,

    pub iff1: bool,
    pub iff2: bool,
    /// Interrupt mode, 0 to 2.
    pub im: u8,
}

const fn pair(hi: u8, lo: u8) -> u16 {
    (hi as u16) << 8 | lo as u16
}

const fn split(value: u16) -> (u8, u8) {
    ((value >> 8) as u8, value as u8)
}

impl Registers {
    #[must_use]
    pub const fn af(&self) -> u16 {
        pair(self.a, self.f)
    }

    #[must_use]
    pub const fn bc(&self) -> u16 {
        pair(self.b, self.c)
    }

    #[must_use]
    pub const fn de(&self) -> u16 {
        pair(self.d, self.e)
    }

    #[must_use]
    pub const fn hl(&self) -> u16 {
        pair(self.h, self.l)
    }

    #[must_use]
    pub const fn af_alt(&self) -> u16 {
        pair(self.a_alt, self.f_alt)
    }

    #[must_use]
    pub const fn bc_alt(&self) -> u16 {
        pair(self.b_alt, self.c_alt)
    }

    #[must_use]
    pub const fn de_alt(&self) -> u16 {
        pair(self.d_alt, self.e_alt)
    }

    #[must_use]
    pub const fn hl_alt(&self) -> u16 {
        pair(self.h_alt, self.l_alt)
    }

    pub fn set_af(&mut self, value: u16) {
        (self.a, self.f) = split(value);
    }

    pub fn set_bc(&mut self, value: u16) {
        (self.b, self.c) = split(value);
    }

    pub fn set_de(&mut self, value: u16) {
        (self.d, self.e) = split(value);
    }

    pub fn set_hl(&mut self, value: u16) {
        (self.h, self.l) = split(value);
    }

    pub fn set_af_alt(&mut self, value: u16) {
        (self.a_alt, self.f_alt) = split(value);
    }

    pub fn set_bc_alt(&mut self, value: u16) {
        (self.b_alt, self.c_alt) = split(value);
    }

    pub fn set_de_alt(&mut self, value: u16) {
        (self.d_alt, self.e_alt) = split(value);
    }

    pub fn set_hl_alt(&mut self, value: u16) {
        (self.h_alt, self.l_alt) = split(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_are_high_byte_first() {
        let mut regs = Registers::default();
        regs.set_bc(0x1234);
        assert_eq!((regs.b, regs.c), (0x12, 0x34));
        assert_eq!(regs.bc(), 0x1234);

        regs.set_hl_alt(0xBEEF);
        assert_eq!((regs.h_alt, regs.l_alt), (0xBE, 0xEF));
        assert_eq!(regs.hl_alt(), 0xBEEF);
    }

    #[test]
    fn alternate_set_is_independent() {
        let mut regs = Registers::default();
        regs.set_af(0x1122);
        regs.set_af_alt(0x3344);
        assert_eq!(regs.af(), 0x1122);
        assert_eq!(regs.af_alt(), 0x3344);
    }
}
