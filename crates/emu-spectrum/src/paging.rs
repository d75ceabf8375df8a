//! Memory paging state and the `0x7FFD`/`0x1FFD` port decoder.
//!
//! # `0x7FFD` (128K, +2, +2A, +3)
//!
//! | Bits | Meaning                                  |
//! |------|------------------------------------------|
//! | 0-2  | RAM bank at `0xC000`                     |
//! | 3    | Shadow screen (display from bank 7)      |
//! | 4    | ROM select, low bit                      |
//! | 5    | Disable paging until reset               |
//!
//! # `0x1FFD` (+2A, +3)
//!
//! | Bits | Meaning                                                  |
//! |------|----------------------------------------------------------|
//! | 0    | Special (all-RAM) mode                                   |
//! | 1-2  | Special configuration                                    |
//! | 2    | ROM select, high bit (normal mode only)                  |
//!
//! Once bit 5 of `0x7FFD` is set both ports ignore writes. Neither port is
//! readable.

use tracing::{debug, trace};

use crate::config::SpectrumModel;
use crate::memory::AddressSpace;

/// Normal (ROM + RAM) or special (all-RAM, +2A/+3 only) mapping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PagingMode {
    #[default]
    Normal,
    /// All-RAM configuration 0 to 3.
    Special(u8),
}

/// The paging latch contents of a banked model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PagingState {
    /// Selected ROM bank. 0-1 on 128K/+2, 0-3 on +2A/+3.
    pub rom: u8,
    /// RAM bank mapped at `0xC000`.
    pub ram_bank: u8,
    pub shadow_screen: bool,
    /// Cleared by writing `0x7FFD` with bit 5 set.
    pub enabled: bool,
    pub mode: PagingMode,
}

impl Default for PagingState {
    fn default() -> Self {
        Self {
            rom: 0,
            ram_bank: 0,
            shadow_screen: false,
            enabled: true,
            mode: PagingMode::Normal,
        }
    }
}

impl PagingState {
    /// Apply a `0x7FFD` byte, ignoring the lock.
    pub fn apply_7ffd(&mut self, ports: PagingPorts, value: u8) {
        self.ram_bank = value & 0x07;
        self.shadow_screen = value & 0x08 != 0;
        let rom_low = (value >> 4) & 1;
        self.rom = match ports {
            PagingPorts::Spectrum128 => rom_low,
            PagingPorts::Plus2A => (self.rom & 0x02) | rom_low,
        };
        self.enabled = value & 0x20 == 0;
    }

    /// Apply a `0x1FFD` byte, ignoring the lock.
    pub fn apply_1ffd(&mut self, value: u8) {
        if value & 0x01 != 0 {
            self.mode = PagingMode::Special((value >> 1) & 0x03);
        } else {
            self.mode = PagingMode::Normal;
            self.rom = (self.rom & 0x01) | ((value >> 1) & 0x02);
        }
    }

    /// The `0x7FFD` byte that reproduces this state.
    #[must_use]
    pub fn last_7ffd(&self) -> u8 {
        let mut value = self.ram_bank & 0x07;
        if self.shadow_screen {
            value |= 0x08;
        }
        value |= (self.rom & 0x01) << 4;
        if !self.enabled {
            value |= 0x20;
        }
        value
    }

    /// The `0x1FFD` byte that reproduces this state. In special mode the ROM
    /// high bit has no slot of its own and is not represented.
    #[must_use]
    pub fn last_1ffd(&self) -> u8 {
        match self.mode {
            PagingMode::Special(config) => 0x01 | ((config & 0x03) << 1),
            PagingMode::Normal => (self.rom & 0x02) << 1,
        }
    }

    /// RAM bank holding the displayed screen.
    #[must_use]
    pub fn screen_bank(&self) -> u8 {
        if self.shadow_screen { 7 } else { 5 }
    }
}

/// Which paging port set a model decodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagingPorts {
    /// `0x7FFD` only, partial decode on A1 and A15.
    Spectrum128,
    /// `0x7FFD` and `0x1FFD`, decoded on A1, A12, A14 and A15.
    Plus2A,
}

impl PagingPorts {
    #[must_use]
    pub fn for_model(model: SpectrumModel) -> Option<Self> {
        if model.is_plus3_family() {
            Some(Self::Plus2A)
        } else if model.is_banked() {
            Some(Self::Spectrum128)
        } else {
            None
        }
    }

    #[must_use]
    pub fn decodes_7ffd(self, port: u16) -> bool {
        match self {
            Self::Spectrum128 => port & 0x8002 == 0,
            Self::Plus2A => port & 0xC002 == 0x4000,
        }
    }

    #[must_use]
    pub fn decodes_1ffd(self, port: u16) -> bool {
        match self {
            Self::Spectrum128 => false,
            Self::Plus2A => port & 0xF002 == 0x1000,
        }
    }
}

/// Bus device that turns paging port writes into `AddressSpace` remaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagingController {
    ports: PagingPorts,
}

impl PagingController {
    #[must_use]
    pub fn new(ports: PagingPorts) -> Self {
        Self { ports }
    }

    /// Controller for `model`, or `None` for the unbanked 16K/48K.
    #[must_use]
    pub fn for_model(model: SpectrumModel) -> Option<Self> {
        PagingPorts::for_model(model).map(Self::new)
    }

    #[must_use]
    pub fn ports(&self) -> PagingPorts {
        self.ports
    }

    #[must_use]
    pub fn claims(&self, port: u16) -> bool {
        self.ports.decodes_7ffd(port) || self.ports.decodes_1ffd(port)
    }

    /// The paging ports are write-only.
    #[must_use]
    pub fn read(&self, _port: u16) -> u8 {
        0xFF
    }

    pub fn write(&self, port: u16, value: u8, memory: &mut AddressSpace) {
        let Some(mut state) = memory.paging() else {
            return;
        };
        if !state.enabled {
            debug!(port, value, "paging locked, write dropped");
            return;
        }
        if self.ports.decodes_7ffd(port) {
            state.apply_7ffd(self.ports, value);
        } else if self.ports.decodes_1ffd(port) {
            state.apply_1ffd(value);
        } else {
            return;
        }
        trace!(
            port,
            value,
            rom = state.rom,
            ram_bank = state.ram_bank,
            mode = ?state.mode,
            locked = !state.enabled,
            "paging"
        );
        memory.set_paging(state);
    }
}
