//! ZX snapshots (48K), the format of an old Amiga emulator.
//!
//! The file is the last 132 bytes of ROM, the 48K of RAM, 132 bytes of
//! padding and finally a 68-byte big-endian header. Offsets below are
//! relative to the header.
//!
//! | Offset | Size | Field                                       |
//! |--------|------|---------------------------------------------|
//! | 0      | 8    | Emulator settings (fixed values)            |
//! | 8      | 1    | Interrupts enabled                          |
//! | 9      | 2    | Emulator settings                           |
//! | 11     | 1    | Colour mode                                 |
//! | 12     | 4    | Reserved                                    |
//! | 16     | 16   | BC, BC', DE, DE', HL, HL', IX, IY           |
//! | 32     | 2    | I, R                                        |
//! | 34     | 3    | Reserved                                    |
//! | 37     | 7    | A', 0, A, 0, F', 0, F                       |
//! | 44     | 2    | Reserved                                    |
//! | 46     | 2    | PC                                          |
//! | 48     | 2    | Reserved                                    |
//! | 50     | 2    | SP                                          |
//! | 52     | 2    | Sound mode                                  |
//! | 54     | 2    | Halt mode                                   |
//! | 56     | 2    | Interrupt mode: -1, 0, 1 for IM 0, 1, 2     |
//! | 58     | 10   | Reserved                                    |
//!
//! There is no border field; decoded snapshots get a white border.

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use tracing::debug;

use super::error::require;
use super::{RAM_48K_LEN, Snapshot, SnapshotError, require_48k};
use crate::config::SpectrumModel;

const FORMAT: &str = "ZX";
const PADDING: usize = 132;
const HEADER_LEN: usize = 68;
/// Start of the ROM bytes copied into the leading padding.
const ROM_TAIL: u16 = 0x3F7C;

/// Size of every ZX file.
pub const FILE_LEN: usize = PADDING + RAM_48K_LEN + PADDING + HEADER_LEN;

/// Border colour given to decoded snapshots.
pub const DEFAULT_BORDER: u8 = 7;

/// # Errors
///
/// `Truncated` for short files and `InvalidField` for an interrupt mode
/// outside -1..=1.
pub fn decode(data: &[u8]) -> Result<Snapshot, SnapshotError> {
    require(FORMAT, data, FILE_LEN)?;
    let header = &data[FILE_LEN - HEADER_LEN..FILE_LEN];

    let mut snapshot = Snapshot::new(SpectrumModel::Spectrum48K);
    let regs = &mut snapshot.registers;
    regs.iff1 = header[8] != 0;
    regs.iff2 = regs.iff1;
    regs.set_bc(BigEndian::read_u16(&header[16..]));
    regs.set_bc_alt(BigEndian::read_u16(&header[18..]));
    regs.set_de(BigEndian::read_u16(&header[20..]));
    regs.set_de_alt(BigEndian::read_u16(&header[22..]));
    regs.set_hl(BigEndian::read_u16(&header[24..]));
    regs.set_hl_alt(BigEndian::read_u16(&header[26..]));
    regs.ix = BigEndian::read_u16(&header[28..]);
    regs.iy = BigEndian::read_u16(&header[30..]);
    regs.i = header[32];
    regs.r = header[33];
    regs.a_alt = header[37];
    regs.a = header[39];
    regs.f_alt = header[41];
    regs.f = header[43];
    regs.pc = BigEndian::read_u16(&header[46..]);
    regs.sp = BigEndian::read_u16(&header[50..]);
    let mode = BigEndian::read_i16(&header[56..]);
    regs.im = match mode {
        -1 => 0,
        0 => 1,
        1 => 2,
        _ => {
            return Err(SnapshotError::InvalidField {
                format: FORMAT,
                field: "interrupt mode",
                value: i64::from(mode),
            });
        }
    };
    snapshot.border = DEFAULT_BORDER;

    snapshot
        .memory
        .load(0x4000, &data[PADDING..PADDING + RAM_48K_LEN]);
    debug!(pc = snapshot.registers.pc, "decoded ZX");
    Ok(snapshot)
}

/// The border colour is not stored.
///
/// # Errors
///
/// `UnsupportedModel` for anything but the 48K.
pub fn encode(snapshot: &Snapshot) -> Result<Vec<u8>, SnapshotError> {
    require_48k(FORMAT, snapshot)?;
    let regs = &snapshot.registers;

    let mut out = Vec::with_capacity(FILE_LEN);
    out.extend(snapshot.memory.dump(ROM_TAIL, PADDING));
    out.extend(snapshot.memory.dump(0x4000, RAM_48K_LEN));
    out.resize(out.len() + PADDING, 0);

    out.write_u16::<BigEndian>(10)?;
    out.write_u16::<BigEndian>(10)?;
    out.extend_from_slice(&[4, 20, 0, 0]);
    out.write_u8(u8::from(regs.iff1))?;
    out.extend_from_slice(&[0, 3]);
    // Colour mode.
    out.write_u8(0)?;
    out.write_u32::<BigEndian>(0)?;
    for pair in [
        regs.bc(),
        regs.bc_alt(),
        regs.de(),
        regs.de_alt(),
        regs.hl(),
        regs.hl_alt(),
        regs.ix,
        regs.iy,
    ] {
        out.write_u16::<BigEndian>(pair)?;
    }
    out.write_u8(regs.i)?;
    out.write_u8(regs.r)?;
    out.extend_from_slice(&[0, 0, 0]);
    out.extend_from_slice(&[regs.a_alt, 0, regs.a, 0, regs.f_alt, 0, regs.f]);
    out.write_u16::<BigEndian>(0)?;
    out.write_u16::<BigEndian>(regs.pc)?;
    out.write_u16::<BigEndian>(0)?;
    out.write_u16::<BigEndian>(regs.sp)?;
    // Sound and halt modes.
    out.write_u16::<BigEndian>(0)?;
    out.write_u16::<BigEndian>(0)?;
    out.write_i16::<BigEndian>(i16::from(regs.im.min(2)) - 1)?;
    out.resize(FILE_LEN, 0);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Snapshot {
        let mut snapshot = Snapshot::new(SpectrumModel::Spectrum48K);
        let regs = &mut snapshot.registers;
        regs.set_af(0xA1F1);
        regs.set_bc(0xB1C1);
        regs.set_de(0xD1E1);
        regs.set_hl(0x4151);
        regs.set_af_alt(0xA2F2);
        regs.set_bc_alt(0xB2C2);
        regs.set_de_alt(0xD2E2);
        regs.set_hl_alt(0x4252);
        regs.ix = 0x1234;
        regs.iy = 0x5678;
        regs.i = 0xFE;
        regs.r = 0x33;
        regs.sp = 0xFFF0;
        regs.pc = 0x9000;
        regs.iff1 = true;
        regs.iff2 = true;
        regs.im = 0;
        snapshot.border = 3;
        snapshot.memory.write(0x4000, 0x11);
        snapshot.memory.write(0xFFFF, 0x22);
        snapshot
    }

    #[test]
    fn file_layout() {
        let bytes = encode(&sample()).expect("encode");
        assert_eq!(bytes.len(), 49_484);
        assert_eq!(bytes[PADDING], 0x11);
        assert_eq!(bytes[PADDING + RAM_48K_LEN - 1], 0x22);
        let header = &bytes[FILE_LEN - HEADER_LEN..];
        assert_eq!(&header[0..4], &[0, 10, 0, 10]);
        assert_eq!(&header[16..18], &[0xB1, 0xC1]);
        assert_eq!(&header[37..44], &[0xA2, 0, 0xA1, 0, 0xF2, 0, 0xF1]);
        assert_eq!(&header[46..48], &[0x90, 0x00]);
        assert_eq!(&header[56..58], &[0xFF, 0xFF]);
    }

    #[test]
    fn round_trip_loses_only_the_border() {
        let original = sample();
        let decoded = decode(&encode(&original).expect("encode")).expect("decode");
        assert_eq!(decoded.registers, original.registers);
        assert_eq!(decoded.border, DEFAULT_BORDER);
        assert!(decoded.same_ram(&original));
    }

    #[test]
    fn interrupt_modes() {
        for im in 0..=2 {
            let mut snapshot = sample();
            snapshot.registers.im = im;
            let decoded = decode(&encode(&snapshot).expect("encode")).expect("decode");
            assert_eq!(decoded.registers.im, im);
        }
        let mut bytes = encode(&sample()).expect("encode");
        bytes[FILE_LEN - HEADER_LEN + 57] = 5;
        assert!(matches!(
            decode(&bytes),
            Err(SnapshotError::InvalidField { value: 5, .. })
        ));
    }

    #[test]
    fn short_file() {
        assert!(matches!(
            decode(&[0; 1000]),
            Err(SnapshotError::Truncated { needed: FILE_LEN, .. })
        ));
    }
}
