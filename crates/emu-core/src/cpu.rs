//! CPU interpreter contract.

use crate::Bus;

/// A CPU interpreter.
///
/// The machine drives the CPU one instruction at a time and never looks
/// inside it beyond the register file. The bus is passed in, not owned, so
/// the machine can keep using it between instructions (paging, snapshots).
pub trait Cpu {
    /// The register file exchanged with snapshots.
    type Registers;

    /// Run one fetch-execute cycle and return the T-states it cost.
    fn execute<B: Bus>(&mut self, bus: &mut B) -> u32;

    /// Current register file, including interrupt flip-flops and mode.
    fn registers(&self) -> Self::Registers;

    /// Replace the whole register file.
    fn set_registers(&mut self, registers: &Self::Registers);

    /// Signal a maskable interrupt with `data` on the data bus.
    ///
    /// Returns true if the CPU accepted it (interrupts enabled).
    fn interrupt<B: Bus>(&mut self, bus: &mut B, data: u8) -> bool;

    /// Reset the CPU to its power-on state.
    fn reset(&mut self);
}
