//! Kempston mouse.
//!
//! Three ports, all partially decoded on A0, A5, A7, A8 and A10: buttons
//! (`0xFADF`), X (`0xFBDF`) and Y (`0xFFDF`). A7 keeps the buttons port off
//! the Kempston joystick at `0x1F`. Positions are free running 8-bit
//! counters that wrap.

bitflags::bitflags! {
    /// Held buttons. Read back active low.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct MouseButtons: u8 {
        const RIGHT = 0x01;
        const LEFT = 0x02;
        const MIDDLE = 0x04;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KempstonMouse {
    pub x: u8,
    pub y: u8,
    pub buttons: MouseButtons,
}

impl KempstonMouse {
    fn is_buttons(port: u16) -> bool {
        port & 0x01A1 == 0x0081
    }

    fn is_x(port: u16) -> bool {
        port & 0x05A1 == 0x0181
    }

    fn is_y(port: u16) -> bool {
        port & 0x05A1 == 0x0581
    }

    #[must_use]
    pub fn claims_read(port: u16) -> bool {
        Self::is_buttons(port) || Self::is_x(port) || Self::is_y(port)
    }

    /// Move by a host delta. Y grows upwards, as the hardware counts.
    pub fn move_by(&mut self, dx: i8, dy: i8) {
        self.x = self.x.wrapping_add_signed(dx);
        self.y = self.y.wrapping_add_signed(dy);
    }

    #[must_use]
    pub fn read(&self, port: u16) -> u8 {
        if Self::is_buttons(port) {
            !self.buttons.bits()
        } else if Self::is_x(port) {
            self.x
        } else if Self::is_y(port) {
            self.y
        } else {
            0xFF
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_ports() {
        let mouse = KempstonMouse {
            x: 0x12,
            y: 0x34,
            buttons: MouseButtons::LEFT,
        };
        assert_eq!(mouse.read(0xFADF), 0xFD);
        assert_eq!(mouse.read(0xFBDF), 0x12);
        assert_eq!(mouse.read(0xFFDF), 0x34);
        assert!(!KempstonMouse::claims_read(0x00FE));
    }

    #[test]
    fn joystick_port_is_not_claimed() {
        for port in [0x001F, 0x011F, 0x051F, 0xFF1F] {
            assert!(!KempstonMouse::claims_read(port), "{port:#06X}");
        }
    }

    #[test]
    fn position_wraps() {
        let mut mouse = KempstonMouse::default();
        mouse.move_by(-1, 5);
        assert_eq!((mouse.x, mouse.y), (0xFF, 5));
        mouse.move_by(2, -10);
        assert_eq!((mouse.x, mouse.y), (0x01, 0xFB));
    }
}
