//! Core traits and types shared by the machine crates.
//!
//! A CPU interpreter is an opaque unit: it sees memory and ports only
//! through [`Bus`], reports the T-states each instruction cost, and accepts
//! maskable interrupts. Everything that paces execution counts [`Ticks`]
//! against a [`MasterClock`].

mod bus;
mod clock;
mod cpu;
mod ticks;

pub use bus::Bus;
pub use clock::MasterClock;
pub use cpu::Cpu;
pub use ticks::Ticks;
