//! Memory and I/O bus interface.

/// Memory and port bus as seen by a CPU interpreter.
///
/// The bus handles address decoding and routes port traffic to whichever
/// devices claim it. Memory addresses and port numbers are both 16 bits
/// wide; the CPU never produces anything wider.
pub trait Bus {
    /// Read a byte from the given address.
    fn read(&mut self, address: u16) -> u8;

    /// Write a byte to the given address.
    fn write(&mut self, address: u16, value: u8);

    /// Read a byte from the given I/O port (`IN`).
    fn io_read(&mut self, port: u16) -> u8;

    /// Write a byte to the given I/O port (`OUT`).
    fn io_write(&mut self, port: u16, value: u8);
}
