//! SNA snapshots (48K).
//!
//! 27-byte header followed by the 48K of RAM from `0x4000`. The program
//! counter has no header field: the saving emulator pushes it on the stack
//! first, and the loader pops it back off.
//!
//! | Offset | Size | Field                               |
//! |--------|------|-------------------------------------|
//! | 0      | 1    | I                                   |
//! | 1      | 8    | HL', DE', BC', AF'                  |
//! | 9      | 6    | HL, DE, BC                          |
//! | 15     | 4    | IY, IX                              |
//! | 19     | 1    | Bit 2 = IFF2 (IFF1 takes the same)  |
//! | 20     | 1    | R                                   |
//! | 21     | 2    | AF (F first)                        |
//! | 23     | 2    | SP, pointing at the pushed PC       |
//! | 25     | 1    | Interrupt mode                      |
//! | 26     | 1    | Border colour                       |
//!
//! Because PC travels in RAM, the two stack bytes below the saved SP are
//! overwritten with it; an encode/decode round trip changes nothing else.

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use tracing::debug;

use super::error::require;
use super::{RAM_48K_LEN, Snapshot, SnapshotError, require_48k};
use crate::config::SpectrumModel;

const FORMAT: &str = "SNA";
const HEADER_LEN: usize = 27;

/// Size of a 48K SNA file.
pub const FILE_LEN: usize = HEADER_LEN + RAM_48K_LEN;

/// Sizes of the 128K variant, recognised only to reject it clearly.
const FILE_LEN_128K: [usize; 2] = [131_103, 147_487];

/// Decode a 48K SNA file.
///
/// # Errors
///
/// `Truncated` for short files, `UnsupportedModel` for 128K SNA files,
/// `ImageTooLarge` for other oversized files, `StackInRom` if the saved
/// SP doesn't leave room to pop PC from RAM, and `InvalidField` for an
/// interrupt mode above 2.
pub fn decode(data: &[u8]) -> Result<Snapshot, SnapshotError> {
    require(FORMAT, data, FILE_LEN)?;
    if FILE_LEN_128K.contains(&data.len()) {
        return Err(SnapshotError::UnsupportedModel {
            format: FORMAT,
            model: SpectrumModel::Spectrum128K,
        });
    }
    if data.len() > FILE_LEN {
        return Err(SnapshotError::ImageTooLarge {
            format: FORMAT,
            len: data.len() - HEADER_LEN,
            capacity: RAM_48K_LEN,
        });
    }

    let mut snapshot = Snapshot::new(SpectrumModel::Spectrum48K);
    let regs = &mut snapshot.registers;
    regs.i = data[0];
    regs.set_hl_alt(LittleEndian::read_u16(&data[1..]));
    regs.set_de_alt(LittleEndian::read_u16(&data[3..]));
    regs.set_bc_alt(LittleEndian::read_u16(&data[5..]));
    regs.set_af_alt(LittleEndian::read_u16(&data[7..]));
    regs.set_hl(LittleEndian::read_u16(&data[9..]));
    regs.set_de(LittleEndian::read_u16(&data[11..]));
    regs.set_bc(LittleEndian::read_u16(&data[13..]));
    regs.iy = LittleEndian::read_u16(&data[15..]);
    regs.ix = LittleEndian::read_u16(&data[17..]);
    regs.iff2 = data[19] & 0x04 != 0;
    regs.iff1 = regs.iff2;
    regs.r = data[20];
    regs.set_af(LittleEndian::read_u16(&data[21..]));
    let sp = LittleEndian::read_u16(&data[23..]);
    regs.im = data[25];
    if regs.im > 2 {
        return Err(SnapshotError::InvalidField {
            format: FORMAT,
            field: "interrupt mode",
            value: i64::from(data[25]),
        });
    }
    snapshot.border = data[26] & 0x07;

    if !stack_in_ram(sp) {
        return Err(SnapshotError::StackInRom { sp });
    }
    snapshot.memory.load(0x4000, &data[HEADER_LEN..FILE_LEN]);

    // RETN
    let lo = snapshot.memory.read(sp);
    let hi = snapshot.memory.read(sp.wrapping_add(1));
    snapshot.registers.pc = u16::from_le_bytes([lo, hi]);
    snapshot.registers.sp = sp.wrapping_add(2);

    debug!(pc = snapshot.registers.pc, sp = snapshot.registers.sp, "decoded SNA");
    Ok(snapshot)
}

/// Encode a 48K snapshot, pushing PC onto the stack in the stored image.
///
/// # Errors
///
/// `UnsupportedModel` for anything but the 48K, and `StackInRom` if the
/// push would land outside RAM.
pub fn encode(snapshot: &Snapshot) -> Result<Vec<u8>, SnapshotError> {
    require_48k(FORMAT, snapshot)?;
    let regs = &snapshot.registers;

    // CALL 0x0000: push PC below SP.
    let sp = regs.sp.wrapping_sub(2);
    if !stack_in_ram(sp) {
        return Err(SnapshotError::StackInRom { sp: regs.sp });
    }
    let mut image = snapshot.memory.dump(0x4000, RAM_48K_LEN);
    let at = usize::from(sp - 0x4000);
    image[at..at + 2].copy_from_slice(&regs.pc.to_le_bytes());

    let mut out = Vec::with_capacity(FILE_LEN);
    out.write_u8(regs.i)?;
    for pair in [
        regs.hl_alt(),
        regs.de_alt(),
        regs.bc_alt(),
        regs.af_alt(),
        regs.hl(),
        regs.de(),
        regs.bc(),
        regs.iy,
        regs.ix,
    ] {
        out.write_u16::<LittleEndian>(pair)?;
    }
    out.write_u8(if regs.iff2 { 0x04 } else { 0x00 })?;
    out.write_u8(regs.r)?;
    out.write_u16::<LittleEndian>(regs.af())?;
    out.write_u16::<LittleEndian>(sp)?;
    out.write_u8(regs.im)?;
    out.write_u8(snapshot.border & 0x07)?;
    out.extend_from_slice(&image);
    Ok(out)
}

/// Both stack bytes at `sp` and `sp + 1` must be RAM.
fn stack_in_ram(sp: u16) -> bool {
    (0x4000..0xFFFF).contains(&sp)
}
