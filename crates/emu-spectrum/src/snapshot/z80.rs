//! `.z80` snapshots, versions 1, 2, 3 and 3.1.
//!
//! **Version 1**: 30-byte header with a non-zero PC at offset 6, then one
//! 48K image (raw, or compressed and ended by `00 ED ED 00`). 48K only.
//!
//! **Versions 2 and 3**: the v1 header with PC zeroed, a little-endian
//! length (23, 54 or 55) and that many bytes of extended header, then a
//! sequence of `(length, page, data)` blocks. A block length of `0xFFFF`
//! means 16K of raw data.
//!
//! | Offset | Field                                              |
//! |--------|----------------------------------------------------|
//! | 0-11   | A, F, BC, HL, PC, SP, I, R (low 7 bits)            |
//! | 12     | Bit 0 R bit 7, 1-3 border, 5 compressed (v1)       |
//! | 13-26  | DE, BC', DE', HL', A', F', IY, IX                  |
//! | 27-29  | IFF1, IFF2, interrupt mode in bits 0-1             |
//! | 30-31  | Extended header length                             |
//! | 32-33  | PC                                                 |
//! | 34     | Hardware mode                                      |
//! | 35     | Last `0x7FFD` write                                |
//! | 37     | Bit 7: modify hardware (16K, +2, +2A)              |
//! | 38-54  | Sound chip registers (stored as zero)              |
//! | 86     | Last `0x1FFD` write (3.1 only)                     |
//!
//! Run-length encoding replaces runs with `ED ED count byte`. Runs of two
//! or more `ED`s are always encoded, other bytes only from five up, and the
//! byte after a lone literal `ED` is never the start of a run.

#![allow(clippy::cast_possible_truncation)] // Run counts are capped at 255.

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use tracing::{debug, warn};

use super::error::require;
use super::{RAM_48K_LEN, Snapshot, SnapshotError};
use crate::config::SpectrumModel;
use crate::memory::BANK_SIZE;
use crate::paging::{PagingPorts, PagingState};
use crate::registers::Registers;

const FORMAT: &str = "Z80";
const V1_HEADER_LEN: usize = 30;
const END_MARKER: [u8; 4] = [0x00, 0xED, 0xED, 0x00];
const RAW_BLOCK: u16 = 0xFFFF;
const MAX_RUN: usize = 255;

/// Header revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Z80Version {
    V1,
    V2,
    V3,
    /// Version 3 plus the last `0x1FFD` write.
    V3_1,
}

impl Z80Version {
    /// Extended header length, or `None` for version 1.
    #[must_use]
    pub fn extended_len(self) -> Option<u16> {
        match self {
            Self::V1 => None,
            Self::V2 => Some(23),
            Self::V3 => Some(54),
            Self::V3_1 => Some(55),
        }
    }

    fn from_extended_len(len: u16) -> Option<Self> {
        match len {
            23 => Some(Self::V2),
            54 => Some(Self::V3),
            55 => Some(Self::V3_1),
            _ => None,
        }
    }
}

/// Writer settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Z80Options {
    /// `None` picks 3.1 for the +2A/+3 and 3 for everything else.
    pub version: Option<Z80Version>,
    /// Run-length encode memory. Version 2 always compresses.
    pub compress: bool,
}

impl Default for Z80Options {
    fn default() -> Self {
        Self {
            version: None,
            compress: true,
        }
    }
}

impl Z80Options {
    #[must_use]
    pub fn version_for(&self, model: SpectrumModel) -> Z80Version {
        self.version.unwrap_or(if model.is_plus3_family() {
            Z80Version::V3_1
        } else {
            Z80Version::V3
        })
    }
}

/// Decode any version.
///
/// # Errors
///
/// `Truncated` for short headers or blocks, `UnsupportedVersion` for an
/// unknown extended header length, `UnknownMachineType` for unrecognised
/// hardware modes, and `MalformedRun`/`MissingEndMarker`/`ImageTooLarge`
/// for bad compressed data.
pub fn decode(data: &[u8]) -> Result<Snapshot, SnapshotError> {
    require(FORMAT, data, V1_HEADER_LEN)?;
    let flags1 = if data[12] == 0xFF { 0x01 } else { data[12] };
    let pc = LittleEndian::read_u16(&data[6..]);
    let (snapshot, version) = if pc == 0 {
        decode_paged(data, flags1)?
    } else {
        (decode_v1(data, flags1, pc)?, Z80Version::V1)
    };
    debug!(
        ?version,
        model = %snapshot.model(),
        pc = snapshot.registers.pc,
        "decoded Z80"
    );
    Ok(snapshot)
}

fn read_base_registers(data: &[u8], flags1: u8, regs: &mut Registers) {
    regs.a = data[0];
    regs.f = data[1];
    regs.set_bc(LittleEndian::read_u16(&data[2..]));
    regs.set_hl(LittleEndian::read_u16(&data[4..]));
    regs.sp = LittleEndian::read_u16(&data[8..]);
    regs.i = data[10];
    regs.r = (data[11] & 0x7F) | ((flags1 & 0x01) << 7);
    regs.set_de(LittleEndian::read_u16(&data[13..]));
    regs.set_bc_alt(LittleEndian::read_u16(&data[15..]));
    regs.set_de_alt(LittleEndian::read_u16(&data[17..]));
    regs.set_hl_alt(LittleEndian::read_u16(&data[19..]));
    regs.a_alt = data[21];
    regs.f_alt = data[22];
    regs.iy = LittleEndian::read_u16(&data[23..]);
    regs.ix = LittleEndian::read_u16(&data[25..]);
    regs.iff1 = data[27] != 0;
    regs.iff2 = data[28] != 0;
    regs.im = data[29] & 0x03;
}

fn decode_v1(data: &[u8], flags1: u8, pc: u16) -> Result<Snapshot, SnapshotError> {
    let mut snapshot = Snapshot::new(SpectrumModel::Spectrum48K);
    read_base_registers(data, flags1, &mut snapshot.registers);
    snapshot.registers.pc = pc;
    snapshot.border = (flags1 >> 1) & 0x07;

    let body = &data[V1_HEADER_LEN..];
    if flags1 & 0x20 != 0 {
        let image = decompress_v1(body)?;
        snapshot.memory.load(0x4000, &image);
    } else {
        require(FORMAT, data, V1_HEADER_LEN + RAM_48K_LEN)?;
        snapshot.memory.load(0x4000, &body[..RAM_48K_LEN]);
    }
    Ok(snapshot)
}

fn decode_paged(data: &[u8], flags1: u8) -> Result<(Snapshot, Z80Version), SnapshotError> {
    require(FORMAT, data, V1_HEADER_LEN + 2)?;
    let ext_len = LittleEndian::read_u16(&data[30..]);
    let version =
        Z80Version::from_extended_len(ext_len).ok_or_else(|| SnapshotError::UnsupportedVersion {
            format: FORMAT,
            detail: format!("extended header length {ext_len}"),
        })?;
    let body_start = V1_HEADER_LEN + 2 + usize::from(ext_len);
    require(FORMAT, data, body_start)?;

    let model = model_for(version, data[34], data[37] & 0x80 != 0)?;
    let mut snapshot = Snapshot::new(model);
    read_base_registers(data, flags1, &mut snapshot.registers);
    snapshot.registers.pc = LittleEndian::read_u16(&data[32..]);
    snapshot.border = (flags1 >> 1) & 0x07;

    if let Some(ports) = PagingPorts::for_model(model) {
        let mut state = PagingState::default();
        if version == Z80Version::V3_1 && ports == PagingPorts::Plus2A {
            state.apply_1ffd(data[86]);
        }
        state.apply_7ffd(ports, data[35]);
        snapshot.memory.set_paging(state);
    }

    let mut pos = body_start;
    while pos < data.len() {
        require(FORMAT, data, pos + 3)?;
        let len = LittleEndian::read_u16(&data[pos..]);
        let page = data[pos + 2];
        pos += 3;

        let contents = if len == RAW_BLOCK {
            require(FORMAT, data, pos + BANK_SIZE)?;
            pos += BANK_SIZE;
            data[pos - BANK_SIZE..pos].to_vec()
        } else {
            let len = usize::from(len);
            require(FORMAT, data, pos + len)?;
            pos += len;
            decompress(&data[pos - len..pos], BANK_SIZE)?
        };

        match bank_for_page(model, page) {
            Some(bank) => snapshot.memory.ram_bank_mut(bank).copy_from_slice(&contents),
            None => warn!(page, model = %model, "skipping Z80 page with no RAM bank"),
        }
    }
    Ok((snapshot, version))
}

/// Resolve the hardware mode byte. Each version numbers machines
/// differently.
fn model_for(version: Z80Version, mode: u8, modify: bool) -> Result<SpectrumModel, SnapshotError> {
    use SpectrumModel as M;
    let model = match (version, mode) {
        (Z80Version::V2, 0 | 1) | (Z80Version::V3 | Z80Version::V3_1, 0 | 1 | 3) => {
            if modify { M::Spectrum16K } else { M::Spectrum48K }
        }
        (Z80Version::V2, 3 | 4) | (Z80Version::V3 | Z80Version::V3_1, 4..=6) => {
            if modify { M::SpectrumPlus2 } else { M::Spectrum128K }
        }
        (Z80Version::V3 | Z80Version::V3_1, 7 | 8) => {
            if modify { M::SpectrumPlus2A } else { M::SpectrumPlus3 }
        }
        (Z80Version::V3 | Z80Version::V3_1, 12) => M::SpectrumPlus2,
        (Z80Version::V3 | Z80Version::V3_1, 13) => M::SpectrumPlus2A,
        _ => {
            return Err(SnapshotError::UnknownMachineType {
                format: FORMAT,
                id: mode,
            });
        }
    };
    Ok(model)
}

/// The hardware mode byte and "modify hardware" flag that identify `model`.
fn hardware_mode(version: Z80Version, model: SpectrumModel) -> Result<(u8, bool), SnapshotError> {
    use SpectrumModel as M;
    match (version, model) {
        (_, M::Spectrum16K) => Ok((0, true)),
        (_, M::Spectrum48K) => Ok((0, false)),
        (Z80Version::V2, M::Spectrum128K) => Ok((3, false)),
        (Z80Version::V2, M::SpectrumPlus2) => Ok((3, true)),
        (Z80Version::V3 | Z80Version::V3_1, M::Spectrum128K) => Ok((4, false)),
        (Z80Version::V3 | Z80Version::V3_1, M::SpectrumPlus2) => Ok((12, false)),
        (Z80Version::V3 | Z80Version::V3_1, M::SpectrumPlus2A) => Ok((13, false)),
        (Z80Version::V3 | Z80Version::V3_1, M::SpectrumPlus3) => Ok((7, false)),
        _ => Err(SnapshotError::UnsupportedModel {
            format: FORMAT,
            model,
        }),
    }
}

/// Page numbers written for `model`, with the RAM bank each holds.
fn pages(model: SpectrumModel) -> Vec<(u8, usize)> {
    match model {
        SpectrumModel::Spectrum16K => vec![(8, 0)],
        SpectrumModel::Spectrum48K => vec![(4, 1), (5, 2), (8, 0)],
        _ => (0..8).map(|bank| (bank as u8 + 3, bank)).collect(),
    }
}

fn bank_for_page(model: SpectrumModel, page: u8) -> Option<usize> {
    pages(model)
        .into_iter()
        .find(|&(p, _)| p == page)
        .map(|(_, bank)| bank)
}

/// Encode with default options.
///
/// # Errors
///
/// See [`encode_with`].
pub fn encode(snapshot: &Snapshot) -> Result<Vec<u8>, SnapshotError> {
    encode_with(snapshot, &Z80Options::default())
}

/// Encode with explicit version and compression.
///
/// # Errors
///
/// `UnsupportedModel` if the version can't describe the model (v1 is 48K
/// only, v2 has no +2A/+3), `UnsupportedVersion` for a v1 snapshot whose
/// PC is zero (that PC value marks a later version).
pub fn encode_with(snapshot: &Snapshot, options: &Z80Options) -> Result<Vec<u8>, SnapshotError> {
    let model = snapshot.model();
    let version = options.version_for(model);
    let regs = &snapshot.registers;
    let mut out = Vec::with_capacity(V1_HEADER_LEN + RAM_48K_LEN);

    let Some(ext_len) = version.extended_len() else {
        if model != SpectrumModel::Spectrum48K {
            return Err(SnapshotError::UnsupportedModel {
                format: FORMAT,
                model,
            });
        }
        if regs.pc == 0 {
            return Err(SnapshotError::UnsupportedVersion {
                format: FORMAT,
                detail: "version 1 cannot store PC 0".into(),
            });
        }
        write_base(&mut out, snapshot, regs.pc, options.compress)?;
        let image = snapshot.memory.dump(0x4000, RAM_48K_LEN);
        if options.compress {
            out.extend(compress(&image));
            out.extend_from_slice(&END_MARKER);
        } else {
            out.extend(image);
        }
        return Ok(out);
    };

    let (mode, modify) = hardware_mode(version, model)?;
    write_base(&mut out, snapshot, 0, false)?;

    let mut ext = vec![0u8; usize::from(ext_len)];
    ext[0..2].copy_from_slice(&regs.pc.to_le_bytes());
    ext[2] = mode;
    let paging = snapshot.paging();
    ext[3] = paging.map_or(0, |p| p.last_7ffd());
    ext[5] = if modify { 0x80 } else { 0x00 };
    if ext_len >= 54 {
        // Offsets 61 and 62: 0x0000-0x3FFF is ROM.
        ext[29] = 0xFF;
        ext[30] = 0xFF;
    }
    if version == Z80Version::V3_1 && model.is_plus3_family() {
        ext[54] = paging.map_or(0, |p| p.last_1ffd());
    }
    out.write_u16::<LittleEndian>(ext_len)?;
    out.extend_from_slice(&ext);

    for (page, bank) in pages(model) {
        let contents = snapshot.memory.ram_bank(bank);
        let packed = (options.compress || version == Z80Version::V2).then(|| compress(contents));
        match packed {
            Some(packed) if packed.len() < BANK_SIZE || version == Z80Version::V2 => {
                out.write_u16::<LittleEndian>(packed.len() as u16)?;
                out.write_u8(page)?;
                out.extend(packed);
            }
            _ => {
                out.write_u16::<LittleEndian>(RAW_BLOCK)?;
                out.write_u8(page)?;
                out.extend_from_slice(contents.as_slice());
            }
        }
    }
    Ok(out)
}

fn write_base(
    out: &mut Vec<u8>,
    snapshot: &Snapshot,
    pc: u16,
    compressed: bool,
) -> Result<(), SnapshotError> {
    let regs = &snapshot.registers;
    let mut flags1 = (regs.r >> 7) | ((snapshot.border & 0x07) << 1);
    if compressed {
        flags1 |= 0x20;
    }
    out.write_u8(regs.a)?;
    out.write_u8(regs.f)?;
    out.write_u16::<LittleEndian>(regs.bc())?;
    out.write_u16::<LittleEndian>(regs.hl())?;
    out.write_u16::<LittleEndian>(pc)?;
    out.write_u16::<LittleEndian>(regs.sp)?;
    out.write_u8(regs.i)?;
    out.write_u8(regs.r & 0x7F)?;
    out.write_u8(flags1)?;
    out.write_u16::<LittleEndian>(regs.de())?;
    out.write_u16::<LittleEndian>(regs.bc_alt())?;
    out.write_u16::<LittleEndian>(regs.de_alt())?;
    out.write_u16::<LittleEndian>(regs.hl_alt())?;
    out.write_u8(regs.a_alt)?;
    out.write_u8(regs.f_alt)?;
    out.write_u16::<LittleEndian>(regs.iy)?;
    out.write_u16::<LittleEndian>(regs.ix)?;
    out.write_u8(u8::from(regs.iff1))?;
    out.write_u8(u8::from(regs.iff2))?;
    out.write_u8(regs.im & 0x03)?;
    Ok(())
}

/// Run-length encode a block.
#[must_use]
pub fn compress(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        let byte = data[i];
        let run = data[i..]
            .iter()
            .take(MAX_RUN)
            .take_while(|&&b| b == byte)
            .count();
        if run >= 5 || (byte == 0xED && run >= 2) {
            out.extend_from_slice(&[0xED, 0xED, run as u8, byte]);
            i += run;
        } else if byte == 0xED {
            out.push(0xED);
            i += 1;
            if let Some(&next) = data.get(i) {
                out.push(next);
                i += 1;
            }
        } else {
            out.push(byte);
            i += 1;
        }
    }
    out
}

/// Decode one block that must expand to exactly `len` bytes.
///
/// # Errors
///
/// `MalformedRun` for a cut-off `ED ED` sequence or a short result,
/// `ImageTooLarge` if the data expands past `len`.
pub fn decompress(src: &[u8], len: usize) -> Result<Vec<u8>, SnapshotError> {
    let mut out = Vec::with_capacity(len);
    let mut i = 0;
    while i < src.len() {
        i = expand_token(src, i, &mut out)?;
        if out.len() > len {
            return Err(SnapshotError::ImageTooLarge {
                format: FORMAT,
                len: out.len(),
                capacity: len,
            });
        }
    }
    if out.len() != len {
        return Err(SnapshotError::MalformedRun {
            format: FORMAT,
            reason: "block expands to fewer bytes than a page",
        });
    }
    Ok(out)
}

/// Decode a version 1 image, stopping at `00 ED ED 00`.
fn decompress_v1(src: &[u8]) -> Result<Vec<u8>, SnapshotError> {
    let mut out = Vec::with_capacity(RAM_48K_LEN);
    let mut i = 0;
    loop {
        if src[i..].starts_with(&END_MARKER) {
            if out.len() != RAM_48K_LEN {
                return Err(SnapshotError::MalformedRun {
                    format: FORMAT,
                    reason: "end marker before the image is complete",
                });
            }
            return Ok(out);
        }
        if i >= src.len() {
            return if out.len() == RAM_48K_LEN {
                Ok(out)
            } else {
                Err(SnapshotError::MissingEndMarker { format: FORMAT })
            };
        }
        i = expand_token(src, i, &mut out)?;
        if out.len() > RAM_48K_LEN {
            return Err(SnapshotError::ImageTooLarge {
                format: FORMAT,
                len: out.len(),
                capacity: RAM_48K_LEN,
            });
        }
    }
}

/// Expand the literal or run at `src[i]`, returning the next position.
fn expand_token(src: &[u8], i: usize, out: &mut Vec<u8>) -> Result<usize, SnapshotError> {
    if src[i] == 0xED && src.get(i + 1) == Some(&0xED) {
        let (Some(&count), Some(&byte)) = (src.get(i + 2), src.get(i + 3)) else {
            return Err(SnapshotError::MalformedRun {
                format: FORMAT,
                reason: "truncated ED ED run",
            });
        };
        out.resize(out.len() + usize::from(count), byte);
        Ok(i + 4)
    } else {
        out.push(src[i]);
        Ok(i + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paging::PagingMode;

    fn sample(model: SpectrumModel) -> Snapshot {
        let mut snapshot = Snapshot::new(model);
        let regs = &mut snapshot.registers;
        regs.set_af(0xAAFF);
        regs.set_bc(0x1234);
        regs.set_hl(0x5678);
        regs.set_de(0x9ABC);
        regs.set_af_alt(0x0102);
        regs.set_bc_alt(0x0304);
        regs.set_de_alt(0x0506);
        regs.set_hl_alt(0x0708);
        regs.ix = 0xCAFE;
        regs.iy = 0xBEEF;
        regs.sp = 0x8000;
        regs.pc = 0x6000;
        regs.i = 0x3F;
        regs.r = 0xC2;
        regs.iff1 = true;
        regs.im = 2;
        snapshot.border = 5;
        for bank in 0..snapshot.memory.ram_bank_count() {
            let contents = snapshot.memory.ram_bank_mut(bank);
            contents[0] = 0x10 + bank as u8;
            contents[100..200].fill(0xED);
            contents[BANK_SIZE - 1] = 0xE0 + bank as u8;
        }
        snapshot
    }

    #[test]
    fn compress_examples() {
        assert_eq!(compress(&[]), Vec::<u8>::new());
        assert_eq!(compress(&[1, 1, 1, 1]), vec![1, 1, 1, 1]);
        assert_eq!(compress(&[7; 5]), vec![0xED, 0xED, 5, 7]);
        assert_eq!(compress(&[0xED, 0xED]), vec![0xED, 0xED, 2, 0xED]);
        // The byte after a lone ED stays literal even when a run follows.
        assert_eq!(
            compress(&[0xED, 0, 0, 0, 0, 0, 0]),
            vec![0xED, 0, 0xED, 0xED, 5, 0]
        );
    }

    #[test]
    fn long_runs_split_at_255() {
        let packed = compress(&[9; 300]);
        assert_eq!(packed, vec![0xED, 0xED, 255, 9, 0xED, 0xED, 45, 9]);
    }

    #[test]
    fn decompress_boundary_lengths() {
        for len in [0, 1, 2, 127, 128, 129, RAM_48K_LEN] {
            let data: Vec<u8> = (0..len)
                .map(|i| match i % 97 {
                    0..=9 => 0xED,
                    10..=40 => 0x00,
                    n => n as u8,
                })
                .collect();
            assert_eq!(decompress(&compress(&data), len).expect("decompress"), data, "len {len}");
        }
    }

    #[test]
    fn truncated_run_is_malformed() {
        assert!(matches!(
            decompress(&[0xED, 0xED, 5], 5),
            Err(SnapshotError::MalformedRun { .. })
        ));
        assert!(matches!(
            decompress(&[0xED, 0xED, 6, 1], 5),
            Err(SnapshotError::ImageTooLarge { .. })
        ));
    }

    #[test]
    fn v1_end_marker_handling() {
        let image = vec![0u8; RAM_48K_LEN];
        let mut packed = compress(&image);
        packed.extend_from_slice(&END_MARKER);
        assert_eq!(decompress_v1(&packed).expect("marker").len(), RAM_48K_LEN);

        let unmarked = compress(&image);
        assert_eq!(decompress_v1(&unmarked).expect("no marker").len(), RAM_48K_LEN);

        let short = compress(&image[..100]);
        assert!(matches!(
            decompress_v1(&short),
            Err(SnapshotError::MissingEndMarker { .. })
        ));

        let mut early = compress(&image[..100]);
        early.extend_from_slice(&END_MARKER);
        assert!(matches!(
            decompress_v1(&early),
            Err(SnapshotError::MalformedRun { .. })
        ));
    }

    #[test]
    fn v1_round_trip_both_ways() {
        let snapshot = sample(SpectrumModel::Spectrum48K);
        for compress in [true, false] {
            let options = Z80Options {
                version: Some(Z80Version::V1),
                compress,
            };
            let bytes = encode_with(&snapshot, &options).expect("encode");
            assert_eq!(bytes[12] & 0x20 != 0, compress);
            let decoded = decode(&bytes).expect("decode");
            assert_eq!(decoded.registers, snapshot.registers);
            assert_eq!(decoded.border, 5);
            assert!(decoded.same_ram(&snapshot));
        }
    }

    #[test]
    fn v1_refuses_pc_zero_and_banked_models() {
        let options = Z80Options {
            version: Some(Z80Version::V1),
            compress: true,
        };
        let mut snapshot = sample(SpectrumModel::Spectrum48K);
        snapshot.registers.pc = 0;
        assert!(matches!(
            encode_with(&snapshot, &options),
            Err(SnapshotError::UnsupportedVersion { .. })
        ));
        assert!(matches!(
            encode_with(&sample(SpectrumModel::Spectrum128K), &options),
            Err(SnapshotError::UnsupportedModel { .. })
        ));
    }

    #[test]
    fn r_bit_7_lives_in_flags() {
        let bytes = encode(&sample(SpectrumModel::Spectrum48K)).expect("encode");
        assert_eq!(bytes[11], 0x42);
        assert_eq!(bytes[12] & 0x01, 0x01);
        assert_eq!((bytes[12] >> 1) & 0x07, 5);
    }

    #[test]
    fn flags_byte_255_reads_as_1() {
        let mut bytes = encode_with(
            &sample(SpectrumModel::Spectrum48K),
            &Z80Options {
                version: Some(Z80Version::V1),
                compress: false,
            },
        )
        .expect("encode");
        bytes[12] = 0xFF;
        let decoded = decode(&bytes).expect("decode");
        assert_eq!(decoded.border, 0);
        assert_eq!(decoded.registers.r & 0x80, 0x80);
    }

    #[test]
    fn hardware_modes_per_version() {
        let cases = [
            (Z80Version::V2, 0, false, SpectrumModel::Spectrum48K),
            (Z80Version::V2, 1, true, SpectrumModel::Spectrum16K),
            (Z80Version::V2, 3, false, SpectrumModel::Spectrum128K),
            (Z80Version::V2, 4, true, SpectrumModel::SpectrumPlus2),
            (Z80Version::V3, 3, false, SpectrumModel::Spectrum48K),
            (Z80Version::V3, 5, false, SpectrumModel::Spectrum128K),
            (Z80Version::V3, 7, false, SpectrumModel::SpectrumPlus3),
            (Z80Version::V3, 8, true, SpectrumModel::SpectrumPlus2A),
            (Z80Version::V3, 12, false, SpectrumModel::SpectrumPlus2),
            (Z80Version::V3_1, 13, false, SpectrumModel::SpectrumPlus2A),
        ];
        for (version, mode, modify, model) in cases {
            assert_eq!(model_for(version, mode, modify).expect("known"), model);
        }
        assert!(matches!(
            model_for(Z80Version::V2, 7, false),
            Err(SnapshotError::UnknownMachineType { id: 7, .. })
        ));
        assert!(matches!(
            model_for(Z80Version::V3, 9, false),
            Err(SnapshotError::UnknownMachineType { id: 9, .. })
        ));
    }

    #[test]
    fn unknown_extended_length() {
        let mut bytes = encode(&sample(SpectrumModel::Spectrum48K)).expect("encode");
        bytes[30] = 40;
        assert!(matches!(
            decode(&bytes),
            Err(SnapshotError::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn v2_has_no_plus3() {
        let options = Z80Options {
            version: Some(Z80Version::V2),
            compress: true,
        };
        assert!(matches!(
            encode_with(&sample(SpectrumModel::SpectrumPlus3), &options),
            Err(SnapshotError::UnsupportedModel { .. })
        ));
    }

    #[test]
    fn uncompressed_pages_use_raw_blocks() {
        let options = Z80Options {
            version: Some(Z80Version::V3),
            compress: false,
        };
        let bytes = encode_with(&sample(SpectrumModel::Spectrum48K), &options).expect("encode");
        let first_block = V1_HEADER_LEN + 2 + 54;
        assert_eq!(&bytes[first_block..first_block + 3], &[0xFF, 0xFF, 4]);
        assert_eq!(bytes.len(), first_block + 3 * (3 + BANK_SIZE));
    }

    #[test]
    fn plus3_paging_round_trips_through_v3_1() {
        let mut snapshot = sample(SpectrumModel::SpectrumPlus3);
        let mut state = PagingState::default();
        state.apply_1ffd(0x04);
        state.apply_7ffd(PagingPorts::Plus2A, 0x1B);
        snapshot.memory.set_paging(state);

        let bytes = encode(&snapshot).expect("encode");
        assert_eq!(bytes[30], 55);
        assert_eq!(bytes[35], 0x1B);
        assert_eq!(bytes[86], 0x04);

        let decoded = decode(&bytes).expect("decode");
        assert_eq!(decoded.paging(), Some(state));
        assert!(decoded.same_ram(&snapshot));
    }

    #[test]
    fn special_mode_round_trips() {
        let mut snapshot = sample(SpectrumModel::SpectrumPlus2A);
        let mut state = PagingState::default();
        state.apply_1ffd(0x07);
        snapshot.memory.set_paging(state);
        let decoded = decode(&encode(&snapshot).expect("encode")).expect("decode");
        assert_eq!(decoded.paging().map(|p| p.mode), Some(PagingMode::Special(3)));
    }

    #[test]
    fn unknown_pages_are_skipped() {
        let mut bytes = encode(&sample(SpectrumModel::Spectrum48K)).expect("encode");
        // Page 0 is ROM on a 48K machine.
        bytes.extend_from_slice(&[0xFF, 0xFF, 0]);
        bytes.extend(vec![0x77; BANK_SIZE]);
        let decoded = decode(&bytes).expect("decode");
        assert!(decoded.same_ram(&sample(SpectrumModel::Spectrum48K)));
    }

    #[test]
    fn short_block_is_malformed() {
        let mut bytes = encode(&sample(SpectrumModel::Spectrum48K)).expect("encode");
        bytes.extend_from_slice(&[4, 0, 5, 0xED, 0xED, 3, 0]);
        assert!(matches!(decode(&bytes), Err(SnapshotError::MalformedRun { .. })));
    }
}
