//! ZX Spectrum machine core: banked memory, port I/O, the 50 Hz clock and
//! snapshot files.
//!
//! Covers the 16K, 48K, 128K, +2, +2A and +3. The Z80 interpreter is not
//! part of this crate; anything implementing `emu_core::Cpu` with
//! [`Registers`] as its register file can drive a [`Machine`].
//!
//! Snapshots decode into a standalone [`Snapshot`] before a machine sees
//! them, so a bad file never leaves a machine half-loaded.

mod bus;
mod clock;
mod config;
pub mod devices;
mod display;
mod io;
mod machine;
mod memory;
mod paging;
pub mod pok;
mod registers;
mod rom;
mod runner;
pub mod snapshot;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use bus::SpectrumBus;
pub use clock::{
    FRAME_INTERVAL, FrameBus, INTERRUPT_RATE, MachineClock, Pacer, SpeedLimit, ThreadPacer,
};
pub use config::{ConfigError, MIN_CLOCK_HZ, SpectrumConfig, SpectrumModel};
pub use devices::{Device, Key, Keyboard};
pub use display::{DisplaySink, NullDisplay};
pub use io::{DeviceHandle, IoBus};
pub use machine::Machine;
pub use memory::{AddressSpace, BANK_SIZE, Cell, DISPLAY_FILE_LEN};
pub use paging::{PagingController, PagingMode, PagingPorts, PagingState};
pub use registers::Registers;
pub use rom::{RomError, RomSet, load_rom_files};
pub use runner::{Runner, RunnerError};
pub use snapshot::{Snapshot, SnapshotError, SnapshotFormat};
