//! Spectrum memory subsystem.
//!
//! Every model sees four 16K windows. What sits behind each window depends
//! on the model and, for banked models, on the paging latch. The
//! `SpectrumMemory` trait resolves a CPU address to a storage cell; the
//! `AddressSpace` enum picks the implementation once, at construction.

#![allow(clippy::cast_possible_truncation)] // Intentional: u16 addresses index into banks.

use std::fmt;

use crate::config::SpectrumModel;
use crate::paging::{PagingMode, PagingState};

/// Size of one ROM or RAM bank.
pub const BANK_SIZE: usize = 0x4000;

/// Bitmap plus attributes, as found at the start of the screen bank.
pub const DISPLAY_FILE_LEN: usize = 6912;

type Bank = Box<[u8; BANK_SIZE]>;

fn blank_banks(count: usize) -> Vec<Bank> {
    (0..count).map(|_| Box::new([0u8; BANK_SIZE])).collect()
}

/// Special mode RAM bank configurations, indexed by `0x1FFD` bits 1-2.
/// Each entry is the bank at `0x0000`/`0x4000`/`0x8000`/`0xC000`.
const SPECIAL_CONFIGS: [[u8; 4]; 4] = [
    [0, 1, 2, 3],
    [4, 5, 6, 7],
    [4, 5, 6, 3],
    [4, 7, 6, 3],
];

/// Where a CPU address lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell {
    Rom { bank: u8, offset: u16 },
    Ram { bank: u8, offset: u16 },
    /// No chip fitted (upper 32K of a 16K machine). Reads `0xFF`.
    Unpopulated,
}

/// ROM and RAM bank storage shared by every model.
#[derive(Clone, PartialEq, Eq)]
pub struct Banks {
    rom: Vec<Bank>,
    ram: Vec<Bank>,
}

impl Banks {
    fn new(model: SpectrumModel) -> Self {
        Self {
            rom: blank_banks(model.rom_banks()),
            ram: blank_banks(model.ram_banks()),
        }
    }
}

/// Model-specific address decoding.
///
/// Implementations only decide where an address goes; reads, writes and
/// bulk access are layered on top by `AddressSpace`.
pub trait SpectrumMemory {
    fn model(&self) -> SpectrumModel;

    /// Resolve a CPU address against the current mapping.
    fn resolve(&self, addr: u16) -> Cell;

    /// RAM bank index holding the displayed screen.
    fn screen_bank(&self) -> usize;

    /// Paging latch, or `None` on unbanked models.
    fn paging(&self) -> Option<PagingState> {
        None
    }

    /// Replace the paging latch. No-op on unbanked models.
    fn set_paging(&mut self, _state: PagingState) {}

    fn banks(&self) -> &Banks;

    fn banks_mut(&mut self) -> &mut Banks;
}

/// 16K and 48K machines: one ROM and fixed RAM.
///
/// ```text
/// 0x0000-0x3FFF: ROM
/// 0x4000-0x7FFF: RAM (index 0, holds the screen)
/// 0x8000-0xBFFF: RAM index 1, or unpopulated on the 16K
/// 0xC000-0xFFFF: RAM index 2, or unpopulated on the 16K
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Memory48K {
    model: SpectrumModel,
    banks: Banks,
}

impl Memory48K {
    fn new(model: SpectrumModel) -> Self {
        Self {
            model,
            banks: Banks::new(model),
        }
    }
}

impl SpectrumMemory for Memory48K {
    fn model(&self) -> SpectrumModel {
        self.model
    }

    fn resolve(&self, addr: u16) -> Cell {
        let offset = addr & 0x3FFF;
        let window = usize::from(addr >> 14);
        if window == 0 {
            Cell::Rom { bank: 0, offset }
        } else if window <= self.banks.ram.len() {
            Cell::Ram {
                bank: (window - 1) as u8,
                offset,
            }
        } else {
            Cell::Unpopulated
        }
    }

    fn screen_bank(&self) -> usize {
        0
    }

    fn banks(&self) -> &Banks {
        &self.banks
    }

    fn banks_mut(&mut self) -> &mut Banks {
        &mut self.banks
    }
}

/// 128K and +2: two ROMs and eight RAM banks.
///
/// ```text
/// 0x0000-0x3FFF: ROM 0 or 1
/// 0x4000-0x7FFF: RAM bank 5
/// 0x8000-0xBFFF: RAM bank 2
/// 0xC000-0xFFFF: RAM bank 0-7
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Memory128K {
    model: SpectrumModel,
    banks: Banks,
    paging: PagingState,
}

impl Memory128K {
    fn new(model: SpectrumModel) -> Self {
        Self {
            model,
            banks: Banks::new(model),
            paging: PagingState::default(),
        }
    }
}

fn normal_mapping(paging: &PagingState, addr: u16) -> Cell {
    let offset = addr & 0x3FFF;
    match addr >> 14 {
        0 => Cell::Rom {
            bank: paging.rom,
            offset,
        },
        1 => Cell::Ram { bank: 5, offset },
        2 => Cell::Ram { bank: 2, offset },
        _ => Cell::Ram {
            bank: paging.ram_bank,
            offset,
        },
    }
}

impl SpectrumMemory for Memory128K {
    fn model(&self) -> SpectrumModel {
        self.model
    }

    fn resolve(&self, addr: u16) -> Cell {
        normal_mapping(&self.paging, addr)
    }

    fn screen_bank(&self) -> usize {
        usize::from(self.paging.screen_bank())
    }

    fn paging(&self) -> Option<PagingState> {
        Some(self.paging)
    }

    fn set_paging(&mut self, state: PagingState) {
        assert!(
            state.rom < 2 && state.ram_bank < 8 && state.mode == PagingMode::Normal,
            "invalid 128K paging state {state:?}"
        );
        self.paging = state;
    }

    fn banks(&self) -> &Banks {
        &self.banks
    }

    fn banks_mut(&mut self) -> &mut Banks {
        &mut self.banks
    }
}

/// +2A and +3: four ROMs, eight RAM banks and the all-RAM modes.
///
/// Normal mode maps like the 128K with a two-bit ROM select. Special mode
/// replaces all four windows with one of `SPECIAL_CONFIGS`.
#[derive(Clone, PartialEq, Eq)]
pub struct MemoryPlus3 {
    model: SpectrumModel,
    banks: Banks,
    paging: PagingState,
}

impl MemoryPlus3 {
    fn new(model: SpectrumModel) -> Self {
        Self {
            model,
            banks: Banks::new(model),
            paging: PagingState::default(),
        }
    }
}

impl SpectrumMemory for MemoryPlus3 {
    fn model(&self) -> SpectrumModel {
        self.model
    }

    fn resolve(&self, addr: u16) -> Cell {
        match self.paging.mode {
            PagingMode::Normal => normal_mapping(&self.paging, addr),
            PagingMode::Special(config) => Cell::Ram {
                bank: SPECIAL_CONFIGS[usize::from(config)][usize::from(addr >> 14)],
                offset: addr & 0x3FFF,
            },
        }
    }

    fn screen_bank(&self) -> usize {
        usize::from(self.paging.screen_bank())
    }

    fn paging(&self) -> Option<PagingState> {
        Some(self.paging)
    }

    fn set_paging(&mut self, state: PagingState) {
        let config_ok = match state.mode {
            PagingMode::Normal => true,
            PagingMode::Special(config) => config < 4,
        };
        assert!(
            state.rom < 4 && state.ram_bank < 8 && config_ok,
            "invalid +3 paging state {state:?}"
        );
        self.paging = state;
    }

    fn banks(&self) -> &Banks {
        &self.banks
    }

    fn banks_mut(&mut self) -> &mut Banks {
        &mut self.banks
    }
}

/// The CPU-visible 64K address space of one machine.
///
/// Cloning copies every bank and the paging latch, so a clone is an
/// independent memory image.
#[derive(Clone, PartialEq, Eq)]
pub enum AddressSpace {
    Flat(Memory48K),
    Banked(Memory128K),
    Plus3(MemoryPlus3),
}

impl AddressSpace {
    /// Zero-filled memory with the reset paging state.
    #[must_use]
    pub fn new(model: SpectrumModel) -> Self {
        if model.is_plus3_family() {
            Self::Plus3(MemoryPlus3::new(model))
        } else if model.is_banked() {
            Self::Banked(Memory128K::new(model))
        } else {
            Self::Flat(Memory48K::new(model))
        }
    }

    fn inner(&self) -> &dyn SpectrumMemory {
        match self {
            Self::Flat(m) => m,
            Self::Banked(m) => m,
            Self::Plus3(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn SpectrumMemory {
        match self {
            Self::Flat(m) => m,
            Self::Banked(m) => m,
            Self::Plus3(m) => m,
        }
    }

    #[must_use]
    pub fn model(&self) -> SpectrumModel {
        self.inner().model()
    }

    #[must_use]
    pub fn resolve(&self, addr: u16) -> Cell {
        self.inner().resolve(addr)
    }

    /// Read a byte. Never fails; unpopulated space reads `0xFF`.
    #[must_use]
    pub fn read(&self, addr: u16) -> u8 {
        let banks = self.inner().banks();
        match self.resolve(addr) {
            Cell::Rom { bank, offset } => banks.rom[usize::from(bank)][usize::from(offset)],
            Cell::Ram { bank, offset } => banks.ram[usize::from(bank)][usize::from(offset)],
            Cell::Unpopulated => 0xFF,
        }
    }

    /// Same as `read`. Memory reads have no side effects on any model.
    #[must_use]
    pub fn peek(&self, addr: u16) -> u8 {
        self.read(addr)
    }

    /// Write a byte. Writes to ROM or unpopulated space are discarded.
    pub fn write(&mut self, addr: u16, value: u8) {
        if let Cell::Ram { bank, offset } = self.resolve(addr) {
            self.inner_mut().banks_mut().ram[usize::from(bank)][usize::from(offset)] = value;
        }
    }

    /// The rest of the bank behind `addr`, starting at `addr`.
    #[must_use]
    pub fn window(&self, addr: u16) -> Option<&[u8]> {
        let banks = self.inner().banks();
        match self.resolve(addr) {
            Cell::Rom { bank, offset } => Some(&banks.rom[usize::from(bank)][usize::from(offset)..]),
            Cell::Ram { bank, offset } => Some(&banks.ram[usize::from(bank)][usize::from(offset)..]),
            Cell::Unpopulated => None,
        }
    }

    /// Mutable form of `window`, for bulk loading. ROM is writable here.
    pub fn window_mut(&mut self, addr: u16) -> Option<&mut [u8]> {
        let cell = self.resolve(addr);
        let banks = self.inner_mut().banks_mut();
        match cell {
            Cell::Rom { bank, offset } => {
                Some(&mut banks.rom[usize::from(bank)][usize::from(offset)..])
            }
            Cell::Ram { bank, offset } => {
                Some(&mut banks.ram[usize::from(bank)][usize::from(offset)..])
            }
            Cell::Unpopulated => None,
        }
    }

    /// Copy `data` to consecutive addresses from `start`, through the
    /// current mapping. Bytes aimed at ROM or unpopulated space are dropped.
    pub fn load(&mut self, start: u16, data: &[u8]) {
        for (addr, &byte) in (start..=0xFFFF).zip(data) {
            self.write(addr, byte);
        }
    }

    /// Copy `len` bytes from `start` through the current mapping.
    #[must_use]
    pub fn dump(&self, start: u16, len: usize) -> Vec<u8> {
        (start..=0xFFFF).take(len).map(|addr| self.read(addr)).collect()
    }

    #[must_use]
    pub fn rom_bank_count(&self) -> usize {
        self.inner().banks().rom.len()
    }

    #[must_use]
    pub fn ram_bank_count(&self) -> usize {
        self.inner().banks().ram.len()
    }

    /// # Panics
    ///
    /// Panics if `bank` is out of range for the model.
    #[must_use]
    pub fn rom_bank(&self, bank: usize) -> &[u8; BANK_SIZE] {
        &self.inner().banks().rom[bank]
    }

    /// # Panics
    ///
    /// Panics if `bank` is out of range for the model.
    #[must_use]
    pub fn ram_bank(&self, bank: usize) -> &[u8; BANK_SIZE] {
        &self.inner().banks().ram[bank]
    }

    /// # Panics
    ///
    /// Panics if `bank` is out of range for the model.
    pub fn ram_bank_mut(&mut self, bank: usize) -> &mut [u8; BANK_SIZE] {
        &mut self.inner_mut().banks_mut().ram[bank]
    }

    /// # Panics
    ///
    /// Panics if `bank` is out of range for the model.
    pub fn rom_bank_mut(&mut self, bank: usize) -> &mut [u8; BANK_SIZE] {
        &mut self.inner_mut().banks_mut().rom[bank]
    }

    /// Load ROM contents verbatim. Short data leaves the tail untouched.
    ///
    /// # Panics
    ///
    /// Panics if `bank` is out of range or `data` exceeds one bank.
    pub fn load_rom(&mut self, bank: usize, data: &[u8]) {
        assert!(data.len() <= BANK_SIZE, "ROM image exceeds one bank");
        self.inner_mut().banks_mut().rom[bank][..data.len()].copy_from_slice(data);
    }

    #[must_use]
    pub fn paging(&self) -> Option<PagingState> {
        self.inner().paging()
    }

    /// Install a paging latch. Ignored on unbanked models.
    ///
    /// # Panics
    ///
    /// Panics if the state is out of range for the model.
    pub fn set_paging(&mut self, state: PagingState) {
        self.inner_mut().set_paging(state);
    }

    /// RAM bank index holding the displayed screen.
    #[must_use]
    pub fn screen_bank(&self) -> usize {
        self.inner().screen_bank()
    }

    /// Bitmap and attributes of the displayed screen.
    #[must_use]
    pub fn display_file(&self) -> &[u8] {
        &self.ram_bank(self.screen_bank())[..DISPLAY_FILE_LEN]
    }

    /// Return the paging latch to its power-on state.
    pub fn reset_paging(&mut self) {
        if self.paging().is_some() {
            self.set_paging(PagingState::default());
        }
    }

    /// Zero RAM and reset paging. ROM contents are kept.
    pub fn clear(&mut self) {
        for bank in &mut self.inner_mut().banks_mut().ram {
            bank.fill(0);
        }
        self.reset_paging();
    }
}

impl fmt::Debug for AddressSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AddressSpace")
            .field("model", &self.model())
            .field("paging", &self.paging())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paging::PagingPorts;

    fn with_roms(model: SpectrumModel) -> AddressSpace {
        let mut mem = AddressSpace::new(model);
        for bank in 0..mem.rom_bank_count() {
            mem.load_rom(bank, &[0xA0 + bank as u8]);
        }
        mem
    }

    fn page_7ffd(mem: &mut AddressSpace, value: u8) {
        let mut state = mem.paging().expect("banked");
        state.apply_7ffd(PagingPorts::Spectrum128, value);
        mem.set_paging(state);
    }

    #[test]
    fn rom_writes_ignored() {
        let mut mem = with_roms(SpectrumModel::Spectrum48K);
        mem.write(0x0000, 0x00);
        assert_eq!(mem.read(0x0000), 0xA0);
    }

    #[test]
    fn ram_read_write_48k() {
        let mut mem = with_roms(SpectrumModel::Spectrum48K);
        mem.write(0x4000, 0xAB);
        mem.write(0xFFFF, 0xCD);
        assert_eq!(mem.read(0x4000), 0xAB);
        assert_eq!(mem.read(0xFFFF), 0xCD);
        assert_eq!(mem.ram_bank(2)[0x3FFF], 0xCD);
    }

    #[test]
    fn upper_32k_of_16k_is_unpopulated() {
        let mut mem = with_roms(SpectrumModel::Spectrum16K);
        assert_eq!(mem.resolve(0x8000), Cell::Unpopulated);
        mem.write(0x8000, 0x12);
        assert_eq!(mem.read(0x8000), 0xFF);
        assert_eq!(mem.read(0xFFFF), 0xFF);
        assert!(mem.window(0xC000).is_none());

        mem.write(0x7FFF, 0x34);
        assert_eq!(mem.read(0x7FFF), 0x34);
    }

    #[test]
    fn rom_switching_128k() {
        let mut mem = with_roms(SpectrumModel::Spectrum128K);
        assert_eq!(mem.read(0x0000), 0xA0);
        page_7ffd(&mut mem, 0x10);
        assert_eq!(mem.read(0x0000), 0xA1);
        page_7ffd(&mut mem, 0x00);
        assert_eq!(mem.read(0x0000), 0xA0);
    }

    #[test]
    fn bank_switching_128k() {
        let mut mem = with_roms(SpectrumModel::Spectrum128K);
        mem.write(0xC000, 0x11);

        page_7ffd(&mut mem, 0x03);
        assert_eq!(mem.read(0xC000), 0x00);
        mem.write(0xC000, 0x33);

        page_7ffd(&mut mem, 0x00);
        assert_eq!(mem.read(0xC000), 0x11);
        assert_eq!(mem.ram_bank(3)[0], 0x33);
    }

    #[test]
    fn fixed_banks_128k() {
        let mut mem = with_roms(SpectrumModel::SpectrumPlus2);
        mem.write(0x4000, 0x55);
        mem.write(0x8000, 0x22);
        page_7ffd(&mut mem, 0x07);
        assert_eq!(mem.read(0x4000), 0x55);
        assert_eq!(mem.read(0x8000), 0x22);
        assert_eq!(mem.ram_bank(5)[0], 0x55);
        assert_eq!(mem.ram_bank(2)[0], 0x22);
    }

    #[test]
    fn same_bank_visible_through_two_windows() {
        let mut mem = with_roms(SpectrumModel::Spectrum128K);
        page_7ffd(&mut mem, 0x05);
        mem.write(0xC000, 0x99);
        assert_eq!(mem.read(0x4000), 0x99);
    }

    #[test]
    fn shadow_screen_selects_display_file() {
        let mut mem = with_roms(SpectrumModel::Spectrum128K);
        mem.ram_bank_mut(5)[0] = 0x55;
        mem.ram_bank_mut(7)[0] = 0x77;
        assert_eq!(mem.display_file()[0], 0x55);
        assert_eq!(mem.display_file().len(), DISPLAY_FILE_LEN);

        page_7ffd(&mut mem, 0x08);
        assert_eq!(mem.screen_bank(), 7);
        assert_eq!(mem.display_file()[0], 0x77);
    }

    #[test]
    fn plus3_special_configs() {
        let mut mem = with_roms(SpectrumModel::SpectrumPlus3);
        for (config, banks) in SPECIAL_CONFIGS.iter().enumerate() {
            let mut state = PagingState::default();
            state.apply_1ffd(0x01 | (config as u8) << 1);
            mem.set_paging(state);
            for (slot, &bank) in banks.iter().enumerate() {
                let addr = (slot as u16) << 14;
                assert_eq!(
                    mem.resolve(addr),
                    Cell::Ram { bank, offset: 0 },
                    "config {config} slot {slot}"
                );
            }
        }
        mem.write(0x0000, 0x42);
        assert_eq!(mem.ram_bank(4)[0], 0x42);
    }

    #[test]
    fn plus3_four_roms() {
        let mut mem = with_roms(SpectrumModel::SpectrumPlus2A);
        let mut state = PagingState::default();
        state.apply_1ffd(0x04);
        state.apply_7ffd(PagingPorts::Plus2A, 0x10);
        mem.set_paging(state);
        assert_eq!(mem.read(0x0000), 0xA3);
    }

    #[test]
    #[should_panic(expected = "invalid 128K paging state")]
    fn special_mode_rejected_on_128k() {
        let mut mem = AddressSpace::new(SpectrumModel::Spectrum128K);
        mem.set_paging(PagingState {
            mode: PagingMode::Special(1),
            ..PagingState::default()
        });
    }

    #[test]
    fn clone_is_independent() {
        let mut mem = with_roms(SpectrumModel::Spectrum128K);
        let copy = mem.clone();
        mem.write(0x4000, 0x01);
        page_7ffd(&mut mem, 0x04);
        assert_eq!(copy.read(0x4000), 0x00);
        assert_eq!(copy.paging(), Some(PagingState::default()));
        assert_ne!(copy, mem);
    }

    #[test]
    fn clear_keeps_rom() {
        let mut mem = with_roms(SpectrumModel::Spectrum128K);
        mem.write(0x8000, 0x11);
        page_7ffd(&mut mem, 0x31);
        mem.clear();
        assert_eq!(mem.read(0x8000), 0x00);
        assert_eq!(mem.read(0x0000), 0xA0);
        assert_eq!(mem.paging(), Some(PagingState::default()));
    }

    #[test]
    fn load_and_dump_follow_mapping() {
        let mut mem = with_roms(SpectrumModel::Spectrum48K);
        mem.load(0x3FFE, &[1, 2, 3, 4]);
        assert_eq!(mem.dump(0x3FFE, 4), vec![0x00, 0x00, 3, 4]);
        let window = mem.window_mut(0x4001).expect("ram");
        assert_eq!(window.len(), BANK_SIZE - 1);
        window[0] = 9;
        assert_eq!(mem.read(0x4001), 9);
    }
}
