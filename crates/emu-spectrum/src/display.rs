//! Display output interface.
//!
//! The core never renders pixels. It hands the 6912-byte display file to a
//! sink once per frame and reports border changes as they happen; the host
//! decides what to draw.

/// Receives screen updates from the machine.
pub trait DisplaySink: Send {
    /// Called once per 50 Hz interrupt and on explicit refresh.
    fn redraw(&mut self, display_file: &[u8]);

    /// Called on every accepted border write. Colour is 0-7.
    fn set_border(&mut self, colour: u8, bright: bool);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDisplay;

impl DisplaySink for NullDisplay {
    fn redraw(&mut self, _display_file: &[u8]) {}

    fn set_border(&mut self, _colour: u8, _bright: bool) {}
}
