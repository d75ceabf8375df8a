//! Deterministic stand-ins for the CPU interpreter and display, for tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use emu_core::{Bus, Cpu};

use crate::clock::FrameBus;
use crate::display::DisplaySink;
use crate::registers::Registers;

/// One bus access a `ScriptedCpu` performs in place of an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusOp {
    Write(u16, u8),
    Out(u16, u8),
}

/// A CPU that fetches one byte per instruction at a fixed cost.
///
/// Queued `script` operations run one per instruction, in order, after the
/// fetch. Accepted interrupts are recorded, not serviced.
#[derive(Debug, Clone, Default)]
pub struct ScriptedCpu {
    pub registers: Registers,
    /// T-states per instruction.
    pub cost: u32,
    pub executed: u64,
    /// Data bus values seen at interrupt acknowledge.
    pub interrupts: Vec<u8>,
    pub script: VecDeque<BusOp>,
    pub resets: u32,
}

impl ScriptedCpu {
    #[must_use]
    pub fn new(cost: u32) -> Self {
        Self {
            cost,
            ..Self::default()
        }
    }
}

impl Cpu for ScriptedCpu {
    type Registers = Registers;

    fn execute<B: Bus>(&mut self, bus: &mut B) -> u32 {
        let _opcode = bus.read(self.registers.pc);
        self.registers.pc = self.registers.pc.wrapping_add(1);
        self.registers.r = (self.registers.r & 0x80) | (self.registers.r.wrapping_add(1) & 0x7F);
        match self.script.pop_front() {
            Some(BusOp::Write(addr, value)) => bus.write(addr, value),
            Some(BusOp::Out(port, value)) => bus.io_write(port, value),
            None => {}
        }
        self.executed += 1;
        self.cost
    }

    fn registers(&self) -> Registers {
        self.registers
    }

    fn set_registers(&mut self, registers: &Registers) {
        self.registers = *registers;
    }

    fn interrupt<B: Bus>(&mut self, _bus: &mut B, data: u8) -> bool {
        self.interrupts.push(data);
        self.registers.iff1
    }

    fn reset(&mut self) {
        self.registers = Registers::default();
        self.resets += 1;
    }
}

/// 64K of flat RAM with no ports, counting finished frames.
#[derive(Debug, Clone)]
pub struct TestBus {
    pub memory: Vec<u8>,
    pub frames: u64,
}

impl Default for TestBus {
    fn default() -> Self {
        Self {
            memory: vec![0; 0x10000],
            frames: 0,
        }
    }
}

impl Bus for TestBus {
    fn read(&mut self, address: u16) -> u8 {
        self.memory[usize::from(address)]
    }

    fn write(&mut self, address: u16, value: u8) {
        self.memory[usize::from(address)] = value;
    }

    fn io_read(&mut self, _port: u16) -> u8 {
        0xFF
    }

    fn io_write(&mut self, _port: u16, _value: u8) {}
}

impl FrameBus for TestBus {
    fn end_frame(&mut self) {
        self.frames += 1;
    }
}

/// What a `RecordingDisplay` has been sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayLog {
    pub redraws: usize,
    pub last_frame: Vec<u8>,
    pub borders: Vec<(u8, bool)>,
}

/// A display sink whose log stays readable after it is boxed into a bus.
#[derive(Debug, Clone, Default)]
pub struct RecordingDisplay {
    log: Arc<Mutex<DisplayLog>>,
}

impl RecordingDisplay {
    #[must_use]
    pub fn log(&self) -> DisplayLog {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl DisplaySink for RecordingDisplay {
    fn redraw(&mut self, display_file: &[u8]) {
        let mut log = self.log.lock().unwrap_or_else(PoisonError::into_inner);
        log.redraws += 1;
        log.last_frame = display_file.to_vec();
    }

    fn set_border(&mut self, colour: u8, bright: bool) {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .borders
            .push((colour, bright));
    }
}
