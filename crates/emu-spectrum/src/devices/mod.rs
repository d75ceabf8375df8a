//! Peripherals that sit on the I/O bus.
//!
//! The device set is closed, so devices are an enum rather than trait
//! objects; hosts reach a connected device's state by matching on it.

mod joystick;
mod keyboard;
mod mouse;
mod ula;

pub use joystick::{Cursor, Fuller, Interface2, JoystickState, Kempston};
pub use keyboard::{Key, Keyboard};
pub use mouse::{KempstonMouse, MouseButtons};
pub use ula::Ula;

use crate::display::DisplaySink;
use crate::memory::AddressSpace;
use crate::paging::PagingController;

/// What a device may touch while handling a port write.
pub struct PortContext<'a> {
    pub memory: &'a mut AddressSpace,
    pub display: &'a mut dyn DisplaySink,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Device {
    Keyboard(Keyboard),
    Ula(Ula),
    Kempston(Kempston),
    Interface2(Interface2),
    Cursor(Cursor),
    Fuller(Fuller),
    Mouse(KempstonMouse),
    Paging(PagingController),
}

impl Device {
    #[must_use]
    pub fn claims_read(&self, port: u16) -> bool {
        match self {
            Self::Keyboard(_) => Keyboard::claims_read(port),
            Self::Ula(_) => Ula::claims(port),
            Self::Kempston(_) => Kempston::claims_read(port),
            Self::Interface2(_) => Interface2::claims_read(port),
            Self::Cursor(_) => Cursor::claims_read(port),
            Self::Fuller(_) => Fuller::claims_read(port),
            Self::Mouse(_) => KempstonMouse::claims_read(port),
            Self::Paging(p) => p.claims(port),
        }
    }

    #[must_use]
    pub fn claims_write(&self, port: u16) -> bool {
        match self {
            Self::Ula(_) => Ula::claims(port),
            Self::Paging(p) => p.claims(port),
            _ => false,
        }
    }

    /// Byte this device drives onto the data bus for `port`.
    #[must_use]
    pub fn read(&self, port: u16) -> u8 {
        match self {
            Self::Keyboard(k) => k.read(port),
            Self::Ula(u) => u.read(),
            Self::Kempston(j) => j.read(),
            Self::Interface2(j) => j.read(port),
            Self::Cursor(j) => j.read(port),
            Self::Fuller(j) => j.read(),
            Self::Mouse(m) => m.read(port),
            Self::Paging(p) => p.read(port),
        }
    }

    pub fn write(&mut self, port: u16, value: u8, ctx: &mut PortContext<'_>) {
        match self {
            Self::Ula(u) => u.write(value, ctx),
            Self::Paging(p) => p.write(port, value, ctx.memory),
            _ => {}
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Keyboard(_) => "keyboard",
            Self::Ula(_) => "ula",
            Self::Kempston(_) => "kempston",
            Self::Interface2(_) => "interface2",
            Self::Cursor(_) => "cursor",
            Self::Fuller(_) => "fuller",
            Self::Mouse(_) => "kempston-mouse",
            Self::Paging(_) => "paging",
        }
    }
}
