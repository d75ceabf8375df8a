//! Joystick interfaces.
//!
//! All four share one direction/fire state and differ only in where and how
//! they present it:
//!
//! | Interface   | Port           | Polarity | Layout                          |
//! |-------------|----------------|----------|---------------------------------|
//! | Kempston    | low byte `1F`  | high     | `000FUDLR`                      |
//! | Fuller      | low byte `7F`  | low      | `F000RLDU`                      |
//! | Interface 2 | `FE`, rows 3/4 | low      | keys 1-5 (left), 6-0 (right)    |
//! | Cursor      | `FE`, rows 3/4 | low      | 5 left, 6 down, 7 up, 8 right, 0 fire |

bitflags::bitflags! {
    /// Stick position and fire button. Bit values are the Kempston layout.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct JoystickState: u8 {
        const RIGHT = 0x01;
        const LEFT = 0x02;
        const DOWN = 0x04;
        const UP = 0x08;
        const FIRE = 0x10;
    }
}

/// Keyboard half-row 3 (1-5) selected by the port address.
fn row3_selected(port: u16) -> bool {
    port & 0x0800 == 0
}

/// Keyboard half-row 4 (0-6) selected by the port address.
fn row4_selected(port: u16) -> bool {
    port & 0x1000 == 0
}

/// Map `state` onto five active-low key bits.
///
/// `bits` lists the column for right, left, down, up and fire.
fn key_bits(state: JoystickState, bits: [u8; 5]) -> u8 {
    let flags = [
        JoystickState::RIGHT,
        JoystickState::LEFT,
        JoystickState::DOWN,
        JoystickState::UP,
        JoystickState::FIRE,
    ];
    flags
        .iter()
        .zip(bits)
        .filter(|(flag, _)| state.contains(**flag))
        .fold(0xFF, |acc, (_, bit)| acc & !(1 << bit))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Kempston {
    pub state: JoystickState,
}

impl Kempston {
    #[must_use]
    pub fn claims_read(port: u16) -> bool {
        port & 0x00FF == 0x001F
    }

    #[must_use]
    pub fn read(&self) -> u8 {
        self.state.bits()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Fuller {
    pub state: JoystickState,
}

impl Fuller {
    #[must_use]
    pub fn claims_read(port: u16) -> bool {
        port & 0x00FF == 0x007F
    }

    #[must_use]
    pub fn read(&self) -> u8 {
        key_bits(self.state, [3, 2, 1, 0, 7])
    }
}

/// Sinclair Interface 2: two sticks wired across the number keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Interface2 {
    /// Keys 1 left, 2 right, 3 down, 4 up, 5 fire.
    pub left: JoystickState,
    /// Keys 6 left, 7 right, 8 down, 9 up, 0 fire.
    pub right: JoystickState,
}

impl Interface2 {
    #[must_use]
    pub fn claims_read(port: u16) -> bool {
        port & 0x00FF == 0x00FE
    }

    #[must_use]
    pub fn read(&self, port: u16) -> u8 {
        let mut value = 0xFF;
        if row3_selected(port) {
            value &= key_bits(self.left, [1, 0, 2, 3, 4]);
        }
        if row4_selected(port) {
            value &= key_bits(self.right, [3, 4, 2, 1, 0]);
        }
        value
    }
}

/// Cursor (Protek/AGF) joystick on the arrow keys 5-8 and 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor {
    pub state: JoystickState,
}

impl Cursor {
    #[must_use]
    pub fn claims_read(port: u16) -> bool {
        port & 0x00FF == 0x00FE
    }

    #[must_use]
    pub fn read(&self, port: u16) -> u8 {
        let mut value = 0xFF;
        if row3_selected(port) && self.state.contains(JoystickState::LEFT) {
            value &= !0x10;
        }
        if row4_selected(port) {
            // Row 4 columns: 0 fire, 2 right (8), 3 up (7), 4 down (6).
            let row4 = self.state.difference(JoystickState::LEFT);
            value &= key_bits(row4, [2, 0, 4, 3, 0]);
        }
        value
    }
}
