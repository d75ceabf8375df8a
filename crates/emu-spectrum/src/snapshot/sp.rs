//! SP snapshots (48K).
//!
//! A 38-byte little-endian header followed by a memory image whose length
//! and load address are stored in the header.
//!
//! | Offset | Size | Field                                   |
//! |--------|------|-----------------------------------------|
//! | 0      | 2    | Signature `SP`                          |
//! | 2      | 2    | Image length                            |
//! | 4      | 2    | Load address                            |
//! | 6      | 8    | BC, DE, HL, AF                          |
//! | 14     | 4    | IX, IY                                  |
//! | 18     | 8    | BC', DE', HL', AF'                      |
//! | 26     | 2    | R, I                                    |
//! | 28     | 4    | SP, PC                                  |
//! | 32     | 2    | Reserved                                |
//! | 34     | 1    | Border colour                           |
//! | 35     | 1    | Reserved                                |
//! | 36     | 2    | Status word, see [`SpStatus`]           |

use bitflags::bitflags;
use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use tracing::debug;

use super::error::require;
use super::{RAM_48K_LEN, Snapshot, SnapshotError, require_48k};
use crate::config::SpectrumModel;

const FORMAT: &str = "SP";
const SIGNATURE: &[u8; 2] = b"SP";
const HEADER_LEN: usize = 38;
const IMAGE_LEN: u16 = 0xC000;

bitflags! {
    /// Status word bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SpStatus: u16 {
        const IFF1 = 0x0001;
        const IM2 = 0x0002;
        const IFF2 = 0x0004;
        /// Takes priority over `IM2` when both are set.
        const IM0 = 0x0008;
        const FLASH = 0x0010;
        /// Read but not acted on.
        const INT_PENDING = 0x0020;
    }
}

/// # Errors
///
/// `Truncated`, `BadSignature`, or `ImageTooLarge` if the image would
/// extend outside RAM.
pub fn decode(data: &[u8]) -> Result<Snapshot, SnapshotError> {
    require(FORMAT, data, HEADER_LEN)?;
    if &data[0..2] != SIGNATURE {
        return Err(SnapshotError::BadSignature { format: FORMAT });
    }
    let len = usize::from(LittleEndian::read_u16(&data[2..]));
    let base = LittleEndian::read_u16(&data[4..]);
    if base < 0x4000 || usize::from(base) + len > 0x1_0000 {
        return Err(SnapshotError::ImageTooLarge {
            format: FORMAT,
            len,
            capacity: 0x1_0000 - usize::from(base.max(0x4000)),
        });
    }
    require(FORMAT, data, HEADER_LEN + len)?;

    let mut snapshot = Snapshot::new(SpectrumModel::Spectrum48K);
    let regs = &mut snapshot.registers;
    regs.set_bc(LittleEndian::read_u16(&data[6..]));
    regs.set_de(LittleEndian::read_u16(&data[8..]));
    regs.set_hl(LittleEndian::read_u16(&data[10..]));
    regs.set_af(LittleEndian::read_u16(&data[12..]));
    regs.ix = LittleEndian::read_u16(&data[14..]);
    regs.iy = LittleEndian::read_u16(&data[16..]);
    regs.set_bc_alt(LittleEndian::read_u16(&data[18..]));
    regs.set_de_alt(LittleEndian::read_u16(&data[20..]));
    regs.set_hl_alt(LittleEndian::read_u16(&data[22..]));
    regs.set_af_alt(LittleEndian::read_u16(&data[24..]));
    regs.r = data[26];
    regs.i = data[27];
    regs.sp = LittleEndian::read_u16(&data[28..]);
    regs.pc = LittleEndian::read_u16(&data[30..]);

    let status = SpStatus::from_bits_truncate(LittleEndian::read_u16(&data[36..]));
    regs.iff1 = status.contains(SpStatus::IFF1);
    regs.iff2 = status.contains(SpStatus::IFF2);
    regs.im = if status.contains(SpStatus::IM0) {
        0
    } else if status.contains(SpStatus::IM2) {
        2
    } else {
        1
    };
    snapshot.border = data[34] & 0x07;

    snapshot
        .memory
        .load(base, &data[HEADER_LEN..HEADER_LEN + len]);
    debug!(base, len, ?status, pc = snapshot.registers.pc, "decoded SP");
    Ok(snapshot)
}

/// Encode the full 48K of RAM at `0x4000`.
///
/// # Errors
///
/// `UnsupportedModel` for anything but the 48K.
pub fn encode(snapshot: &Snapshot) -> Result<Vec<u8>, SnapshotError> {
    require_48k(FORMAT, snapshot)?;
    let regs = &snapshot.registers;

    let mut status = SpStatus::empty();
    status.set(SpStatus::IFF1, regs.iff1);
    status.set(SpStatus::IFF2, regs.iff2);
    match regs.im {
        0 => status |= SpStatus::IM0,
        2 => status |= SpStatus::IM2,
        _ => {}
    }

    let mut out = Vec::with_capacity(HEADER_LEN + RAM_48K_LEN);
    out.extend_from_slice(SIGNATURE);
    out.write_u16::<LittleEndian>(IMAGE_LEN)?;
    out.write_u16::<LittleEndian>(0x4000)?;
    for pair in [
        regs.bc(),
        regs.de(),
        regs.hl(),
        regs.af(),
        regs.ix,
        regs.iy,
        regs.bc_alt(),
        regs.de_alt(),
        regs.hl_alt(),
        regs.af_alt(),
    ] {
        out.write_u16::<LittleEndian>(pair)?;
    }
    out.write_u8(regs.r)?;
    out.write_u8(regs.i)?;
    out.write_u16::<LittleEndian>(regs.sp)?;
    out.write_u16::<LittleEndian>(regs.pc)?;
    out.write_u16::<LittleEndian>(0)?;
    out.write_u8(snapshot.border & 0x07)?;
    out.write_u8(0)?;
    out.write_u16::<LittleEndian>(status.bits())?;
    out.extend(snapshot.memory.dump(0x4000, RAM_48K_LEN));
    Ok(out)
}
