//! A complete Spectrum: CPU, memory, I/O devices and the clock that drives
//! them.
//!
//! The CPU interpreter is supplied by the caller. The machine owns
//! everything else, wires the keyboard, ULA and (on banked models) paging
//! controller onto the I/O bus, and moves state in and out as `Snapshot`s.

use emu_core::{Cpu, MasterClock};
use tracing::{debug, info};

use crate::bus::SpectrumBus;
use crate::clock::MachineClock;
use crate::config::{SpectrumConfig, SpectrumModel};
use crate::devices::{Device, Key, Keyboard, Ula};
use crate::display::DisplaySink;
use crate::io::DeviceHandle;
use crate::memory::AddressSpace;
use crate::paging::PagingController;
use crate::registers::Registers;
use crate::rom::{RomError, RomSet};
use crate::snapshot::{Snapshot, SnapshotError};

pub struct Machine<C> {
    cpu: C,
    bus: SpectrumBus,
    clock: MachineClock,
    roms: RomSet,
    keyboard: DeviceHandle,
    ula: DeviceHandle,
    paging: Option<DeviceHandle>,
}

impl<C: Cpu<Registers = Registers>> Machine<C> {
    /// Build a machine from `config`, loading its ROM files.
    ///
    /// ROM problems don't stop construction: the affected banks stay zero
    /// and the errors are returned alongside the machine.
    pub fn new(
        config: &SpectrumConfig,
        cpu: C,
        display: Box<dyn DisplaySink>,
    ) -> (Self, Vec<RomError>) {
        let (roms, errors) = RomSet::load(config);
        (Self::with_roms(config, roms, cpu, display), errors)
    }

    /// Build a machine around ROM contents already in memory.
    pub fn with_roms(
        config: &SpectrumConfig,
        roms: RomSet,
        mut cpu: C,
        display: Box<dyn DisplaySink>,
    ) -> Self {
        let model = config.model;
        let mut memory = AddressSpace::new(model);
        roms.install(&mut memory);

        let mut bus = SpectrumBus::new(memory, display);
        let keyboard = bus.io.connect(Device::Keyboard(Keyboard::new()));
        let ula = bus.io.connect(Device::Ula(Ula::new()));
        let paging = PagingController::for_model(model).map(|p| bus.io.connect(Device::Paging(p)));

        let mut clock = MachineClock::new(MasterClock::new(config.clock_hz()));
        clock.set_speed(config.speed);
        cpu.reset();

        info!(model = %model, clock_hz = config.clock_hz(), "machine ready");
        Self {
            cpu,
            bus,
            clock,
            roms,
            keyboard,
            ula,
            paging,
        }
    }

    #[must_use]
    pub fn model(&self) -> SpectrumModel {
        self.bus.memory.model()
    }

    /// Power-cycle: RAM cleared, ROM reinstalled, paging unlocked, CPU and
    /// clock reset.
    pub fn reset(&mut self) {
        self.cpu.reset();
        self.bus.memory.clear();
        self.roms.install(&mut self.bus.memory);
        if let Some(ula) = self.ula_mut() {
            *ula = Ula::new();
        }
        if let Some(keyboard) = self.keyboard_mut() {
            keyboard.release_all();
        }
        self.bus.display_mut().set_border(0, false);
        self.clock.reset();
        debug!(model = %self.model(), "reset");
    }

    /// Execute `instructions` instructions. Returns the number of
    /// interrupts delivered.
    pub fn run(&mut self, instructions: u64) -> u64 {
        self.clock.run(&mut self.cpu, &mut self.bus, instructions)
    }

    /// Execute a single instruction.
    pub fn step(&mut self) -> u64 {
        self.run(1)
    }

    /// Copy out the full machine state.
    #[must_use]
    pub fn capture(&self) -> Snapshot {
        Snapshot {
            registers: self.cpu.registers(),
            border: self.border(),
            memory: self.bus.memory.clone(),
        }
    }

    /// Load `snapshot` into the machine. RAM, paging, registers and border
    /// are replaced; ROM is left alone.
    ///
    /// # Errors
    ///
    /// `ModelMismatch` if the snapshot is for another model. Nothing is
    /// changed in that case.
    pub fn apply(&mut self, snapshot: &Snapshot) -> Result<(), SnapshotError> {
        let machine = self.model();
        if snapshot.model() != machine {
            return Err(SnapshotError::ModelMismatch {
                snapshot: snapshot.model(),
                machine,
            });
        }

        let memory = &mut self.bus.memory;
        for bank in 0..memory.ram_bank_count() {
            memory
                .ram_bank_mut(bank)
                .copy_from_slice(snapshot.memory.ram_bank(bank));
        }
        if let Some(paging) = snapshot.paging() {
            memory.set_paging(paging);
        }
        self.cpu.set_registers(&snapshot.registers);
        if let Some(ula) = self.ula_mut() {
            ula.set_border(snapshot.border);
        }
        self.bus.display_mut().set_border(snapshot.border & 0x07, false);
        self.bus.refresh_display();
        debug!(model = %machine, pc = snapshot.registers.pc, "snapshot applied");
        Ok(())
    }

    /// Redraw the display outside the interrupt cadence.
    pub fn refresh(&mut self) {
        self.bus.refresh_display();
    }

    /// Current border colour.
    #[must_use]
    pub fn border(&self) -> u8 {
        match self.bus.io.device(self.ula) {
            Some(Device::Ula(ula)) => ula.border(),
            _ => 0,
        }
    }

    #[must_use]
    pub fn keyboard(&self) -> Option<&Keyboard> {
        match self.bus.io.device(self.keyboard) {
            Some(Device::Keyboard(k)) => Some(k),
            _ => None,
        }
    }

    pub fn keyboard_mut(&mut self) -> Option<&mut Keyboard> {
        match self.bus.io.device_mut(self.keyboard) {
            Some(Device::Keyboard(k)) => Some(k),
            _ => None,
        }
    }

    fn ula_mut(&mut self) -> Option<&mut Ula> {
        match self.bus.io.device_mut(self.ula) {
            Some(Device::Ula(u)) => Some(u),
            _ => None,
        }
    }

    pub fn press_key(&mut self, key: Key) {
        if let Some(k) = self.keyboard_mut() {
            k.press(key);
        }
    }

    pub fn release_key(&mut self, key: Key) {
        if let Some(k) = self.keyboard_mut() {
            k.release(key);
        }
    }

    /// Attach an extra peripheral (joystick, mouse).
    pub fn connect(&mut self, device: Device) -> DeviceHandle {
        self.bus.io.connect(device)
    }

    pub fn disconnect(&mut self, handle: DeviceHandle) -> Option<Device> {
        self.bus.io.disconnect(handle)
    }

    /// Handle of the paging controller, `None` on 16K/48K.
    #[must_use]
    pub fn paging_device(&self) -> Option<DeviceHandle> {
        self.paging
    }

    #[must_use]
    pub fn cpu(&self) -> &C {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut C {
        &mut self.cpu
    }

    #[must_use]
    pub fn bus(&self) -> &SpectrumBus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut SpectrumBus {
        &mut self.bus
    }

    #[must_use]
    pub fn memory(&self) -> &AddressSpace {
        &self.bus.memory
    }

    pub fn memory_mut(&mut self) -> &mut AddressSpace {
        &mut self.bus.memory
    }

    #[must_use]
    pub fn clock(&self) -> &MachineClock {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut MachineClock {
        &mut self.clock
    }

    #[must_use]
    pub fn roms(&self) -> &RomSet {
        &self.roms
    }
}
