//! Spectrum bus: memory and I/O routing.
//!
//! The CPU sees the machine only through `emu_core::Bus`. Memory accesses go
//! straight to the `AddressSpace`; port accesses go to the `IoBus`, whose
//! devices get mutable access to memory (for paging) and the display (for
//! the border) while handling a write.

use emu_core::Bus;

use crate::clock::FrameBus;
use crate::devices::PortContext;
use crate::display::DisplaySink;
use crate::io::IoBus;
use crate::memory::AddressSpace;

pub struct SpectrumBus {
    pub memory: AddressSpace,
    pub io: IoBus,
    display: Box<dyn DisplaySink>,
}

impl SpectrumBus {
    #[must_use]
    pub fn new(memory: AddressSpace, display: Box<dyn DisplaySink>) -> Self {
        Self {
            memory,
            io: IoBus::new(),
            display,
        }
    }

    pub fn display_mut(&mut self) -> &mut dyn DisplaySink {
        self.display.as_mut()
    }

    /// Swap in a new display sink and return the old one.
    pub fn replace_display(&mut self, display: Box<dyn DisplaySink>) -> Box<dyn DisplaySink> {
        std::mem::replace(&mut self.display, display)
    }

    /// Push the current display file to the sink.
    pub fn refresh_display(&mut self) {
        self.display.redraw(self.memory.display_file());
    }
}

impl Bus for SpectrumBus {
    fn read(&mut self, address: u16) -> u8 {
        self.memory.read(address)
    }

    fn write(&mut self, address: u16, value: u8) {
        self.memory.write(address, value);
    }

    fn io_read(&mut self, port: u16) -> u8 {
        self.io.read_port(port)
    }

    fn io_write(&mut self, port: u16, value: u8) {
        let mut ctx = PortContext {
            memory: &mut self.memory,
            display: self.display.as_mut(),
        };
        self.io.write_port(port, value, &mut ctx);
    }
}

impl FrameBus for SpectrumBus {
    fn end_frame(&mut self) {
        self.refresh_display();
    }
}
