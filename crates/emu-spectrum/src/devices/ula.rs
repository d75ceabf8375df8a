//! The ULA's port `0xFE` latch.
//!
//! Writes (any port with A0 low) set the border colour in bits 0-2, MIC in
//! bit 3 and EAR in bit 4. Reads contribute the EAR input on bit 6, which
//! with no tape attached follows the EAR output (issue 3 behaviour).

use super::PortContext;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ula {
    last_write: u8,
}

impl Ula {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn claims(port: u16) -> bool {
        port & 0x0001 == 0
    }

    #[must_use]
    pub fn border(&self) -> u8 {
        self.last_write & 0x07
    }

    #[must_use]
    pub fn last_write(&self) -> u8 {
        self.last_write
    }

    /// Set the border without a port write, e.g. when restoring a snapshot.
    pub fn set_border(&mut self, colour: u8) {
        self.last_write = (self.last_write & !0x07) | (colour & 0x07);
    }

    #[must_use]
    pub fn read(&self) -> u8 {
        if self.last_write & 0x10 != 0 { 0xFF } else { 0xBF }
    }

    pub fn write(&mut self, value: u8, ctx: &mut PortContext<'_>) {
        self.last_write = value;
        ctx.display.set_border(self.border(), false);
    }
}
