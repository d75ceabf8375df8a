//! ZX Spectrum keyboard.
//!
//! The keyboard is an 8×5 matrix of half-rows, read through any port with
//! A0 low. The high byte of the port address selects which half-rows to
//! scan: each cleared bit (A8-A15) enables one half-row.
//!
//! | Addr bit | Row | Keys (bit 0-4)        |
//! |----------|-----|-----------------------|
//! | A8       | 0   | Shift, Z, X, C, V     |
//! | A9       | 1   | A, S, D, F, G         |
//! | A10      | 2   | Q, W, E, R, T         |
//! | A11      | 3   | 1, 2, 3, 4, 5         |
//! | A12      | 4   | 0, 9, 8, 7, 6         |
//! | A13      | 5   | P, O, I, U, Y         |
//! | A14      | 6   | Enter, L, K, J, H     |
//! | A15      | 7   | Space, Sym, M, N, B   |
//!
//! A pressed key reads as 0. Bits 5-7 read as 1.

#![allow(clippy::cast_possible_truncation)] // Port high byte and bit indices.

/// A key on the 40-key matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    CapsShift,
    Z,
    X,
    C,
    V,
    A,
    S,
    D,
    F,
    G,
    Q,
    W,
    E,
    R,
    T,
    N1,
    N2,
    N3,
    N4,
    N5,
    N0,
    N9,
    N8,
    N7,
    N6,
    P,
    O,
    I,
    U,
    Y,
    Enter,
    L,
    K,
    J,
    H,
    Space,
    SymShift,
    M,
    N,
    B,
}

impl Key {
    /// Keys in matrix order: row-major, bit 0 first.
    const MATRIX: [Self; 40] = [
        Self::CapsShift,
        Self::Z,
        Self::X,
        Self::C,
        Self::V,
        Self::A,
        Self::S,
        Self::D,
        Self::F,
        Self::G,
        Self::Q,
        Self::W,
        Self::E,
        Self::R,
        Self::T,
        Self::N1,
        Self::N2,
        Self::N3,
        Self::N4,
        Self::N5,
        Self::N0,
        Self::N9,
        Self::N8,
        Self::N7,
        Self::N6,
        Self::P,
        Self::O,
        Self::I,
        Self::U,
        Self::Y,
        Self::Enter,
        Self::L,
        Self::K,
        Self::J,
        Self::H,
        Self::Space,
        Self::SymShift,
        Self::M,
        Self::N,
        Self::B,
    ];

    /// (half-row, bit) position in the matrix.
    #[must_use]
    pub fn matrix(self) -> (usize, u8) {
        let index = Self::MATRIX
            .iter()
            .position(|&k| k == self)
            .unwrap_or_default();
        (index / 5, (index % 5) as u8)
    }

    /// Look a key up by its matrix position.
    #[must_use]
    pub fn at(row: usize, bit: u8) -> Option<Self> {
        if bit < 5 {
            Self::MATRIX.get(row * 5 + usize::from(bit)).copied()
        } else {
            None
        }
    }
}

/// Keyboard state: 8 half-rows of 5 keys each, 1 = held.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keyboard {
    rows: [u8; 8],
}

impl Keyboard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&mut self, key: Key) {
        let (row, bit) = key.matrix();
        self.rows[row] |= 1 << bit;
    }

    pub fn release(&mut self, key: Key) {
        let (row, bit) = key.matrix();
        self.rows[row] &= !(1 << bit);
    }

    pub fn release_all(&mut self) {
        self.rows = [0; 8];
    }

    #[must_use]
    pub fn is_pressed(&self, key: Key) -> bool {
        let (row, bit) = key.matrix();
        self.rows[row] & (1 << bit) != 0
    }

    #[must_use]
    pub fn claims_read(port: u16) -> bool {
        port & 0x0001 == 0
    }

    /// Scan the half-rows selected by `port`'s high byte.
    ///
    /// The matrix is passive, so with several keys held current can leak
    /// through shared columns and pull extra columns low. Any row reachable
    /// from a selected row through shared columns contributes its columns.
    #[must_use]
    pub fn read(&self, port: u16) -> u8 {
        let mut active_rows: u8 = !((port >> 8) as u8);

        loop {
            let cols = self.columns(active_rows);
            let mut reached = active_rows;
            for (i, &row) in self.rows.iter().enumerate() {
                if row & cols != 0 {
                    reached |= 1 << i;
                }
            }
            if reached == active_rows {
                break;
            }
            active_rows = reached;
        }

        (!self.columns(active_rows) & 0x1F) | 0xE0
    }

    fn columns(&self, rows: u8) -> u8 {
        self.rows
            .iter()
            .enumerate()
            .filter(|(i, _)| rows & (1 << i) != 0)
            .fold(0, |cols, (_, &row)| cols | row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_reads_all_ones() {
        let kbd = Keyboard::new();
        assert_eq!(kbd.read(0x00FE), 0xFF);
    }

    #[test]
    fn matrix_positions() {
        assert_eq!(Key::CapsShift.matrix(), (0, 0));
        assert_eq!(Key::G.matrix(), (1, 4));
        assert_eq!(Key::N6.matrix(), (4, 4));
        assert_eq!(Key::B.matrix(), (7, 4));
        assert_eq!(Key::at(6, 0), Some(Key::Enter));
        assert_eq!(Key::at(8, 0), None);
    }

    #[test]
    fn single_key_visible_only_in_its_row() {
        let mut kbd = Keyboard::new();
        kbd.press(Key::A);
        assert_eq!(kbd.read(0xFDFE) & 0x1F, 0x1E);
        assert_eq!(kbd.read(0xFEFE), 0xFF);

        kbd.release(Key::A);
        assert_eq!(kbd.read(0xFDFE), 0xFF);
    }

    #[test]
    fn several_rows_at_once() {
        let mut kbd = Keyboard::new();
        kbd.press(Key::CapsShift);
        kbd.press(Key::N0);
        assert_eq!(kbd.read(0xEEFE) & 0x1F, 0x1E);
    }

    #[test]
    fn ghost_three_corners_produces_fourth() {
        let mut kbd = Keyboard::new();
        kbd.press(Key::CapsShift);
        kbd.press(Key::Z);
        kbd.press(Key::A);
        // Row 1 alone: A plus the ghosted S through row 0.
        assert_eq!(kbd.read(0xFDFE) & 0x1F, 0x1C);
    }

    #[test]
    fn diagonal_keys_do_not_ghost() {
        let mut kbd = Keyboard::new();
        kbd.press(Key::CapsShift);
        kbd.press(Key::S);
        assert_eq!(kbd.read(0xFEFE) & 0x1F, 0x1E);
        assert_eq!(kbd.read(0xFDFE) & 0x1F, 0x1D);
    }

    #[test]
    fn port_claim_is_a0_low() {
        assert!(Keyboard::claims_read(0xFEFE));
        assert!(Keyboard::claims_read(0x7FFC));
        assert!(!Keyboard::claims_read(0x001F));
    }
}
