//! ZX82 snapshots (48K): a tagged container holding registers and a RAM
//! image, optionally ByteRun1-packed. Every multi-byte field is big-endian.
//!
//! | Offset | Size | Field                                               |
//! |--------|------|-----------------------------------------------------|
//! | 0      | 4    | Signature `ZX82`                                    |
//! | 4      | 1    | Content type, 4 for a snapshot                      |
//! | 5      | 1    | Compression: 0 none, `0xFF` ByteRun1                |
//! | 6      | 2    | Stored image length                                 |
//! | 8      | 2    | Load address                                        |
//! | 10     | 2    | Unpacked image length                               |
//! | 12     | 24   | AF, BC, DE, HL, AF', BC', DE', HL', IX, IY, SP, PC  |
//! | 36     | 6    | I, R, IM, flip-flops (bit 0 IFF1, bit 1 IFF2), border, reserved |
//! | 42     |      | Image                                               |
//!
//! ByteRun1 splits data into runs of at most 128 bytes, each led by a
//! signal byte. `0x00..=0x7F` is followed by `signal + 1` literal bytes;
//! `0x81..=0xFF` is followed by one byte repeated `!signal + 2` times.
//! The packer never emits a one-byte run unless the input is one byte.

#![allow(clippy::cast_possible_truncation)] // Run lengths are capped at 128.

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use tracing::debug;

use super::error::require;
use super::{RAM_48K_LEN, Snapshot, SnapshotError, require_48k};
use crate::config::SpectrumModel;

const FORMAT: &str = "ZX82";
const SIGNATURE: &[u8; 4] = b"ZX82";
const CONTAINER_LEN: usize = 12;
const HEADER_LEN: usize = CONTAINER_LEN + 24 + 6;

/// Content type of a machine snapshot.
pub const CONTENT_SNAPSHOT: u8 = 4;
pub const COMPRESSION_NONE: u8 = 0x00;
pub const COMPRESSION_BYTERUN1: u8 = 0xFF;

const MAX_RUN: usize = 128;

/// Decode a ZX82 snapshot.
///
/// # Errors
///
/// `Truncated`, `BadSignature`, `InvalidField` for an unknown content or
/// compression type, `ImageTooLarge` if the image doesn't fit in RAM and
/// `MalformedRun` for bad packed data.
pub fn decode(data: &[u8]) -> Result<Snapshot, SnapshotError> {
    require(FORMAT, data, HEADER_LEN)?;
    if &data[0..4] != SIGNATURE {
        return Err(SnapshotError::BadSignature { format: FORMAT });
    }
    if data[4] != CONTENT_SNAPSHOT {
        return Err(SnapshotError::InvalidField {
            format: FORMAT,
            field: "content type",
            value: i64::from(data[4]),
        });
    }
    let stored_raw = BigEndian::read_u16(&data[6..]);
    let stored_len = usize::from(stored_raw);
    let base = BigEndian::read_u16(&data[8..]);
    let len = usize::from(BigEndian::read_u16(&data[10..]));
    if base < 0x4000 || usize::from(base) + len > 0x1_0000 {
        return Err(SnapshotError::ImageTooLarge {
            format: FORMAT,
            len,
            capacity: 0x1_0000 - usize::from(base.max(0x4000)),
        });
    }
    require(FORMAT, data, HEADER_LEN + stored_len)?;
    let stored = &data[HEADER_LEN..HEADER_LEN + stored_len];
    let image = match data[5] {
        COMPRESSION_NONE if stored_len == len => stored.to_vec(),
        COMPRESSION_NONE => {
            return Err(SnapshotError::InvalidField {
                format: FORMAT,
                field: "stored length",
                value: i64::from(stored_raw),
            });
        }
        COMPRESSION_BYTERUN1 => unpack(stored, len)?,
        other => {
            return Err(SnapshotError::InvalidField {
                format: FORMAT,
                field: "compression type",
                value: i64::from(other),
            });
        }
    };

    let mut snapshot = Snapshot::new(SpectrumModel::Spectrum48K);
    let regs = &mut snapshot.registers;
    let word = |n: usize| BigEndian::read_u16(&data[CONTAINER_LEN + 2 * n..]);
    regs.set_af(word(0));
    regs.set_bc(word(1));
    regs.set_de(word(2));
    regs.set_hl(word(3));
    regs.set_af_alt(word(4));
    regs.set_bc_alt(word(5));
    regs.set_de_alt(word(6));
    regs.set_hl_alt(word(7));
    regs.ix = word(8);
    regs.iy = word(9);
    regs.sp = word(10);
    regs.pc = word(11);

    let state = &data[CONTAINER_LEN + 24..HEADER_LEN];
    regs.i = state[0];
    regs.r = state[1];
    if state[2] > 2 {
        return Err(SnapshotError::InvalidField {
            format: FORMAT,
            field: "interrupt mode",
            value: i64::from(state[2]),
        });
    }
    regs.im = state[2];
    regs.iff1 = state[3] & 0x01 != 0;
    regs.iff2 = state[3] & 0x02 != 0;
    snapshot.border = state[4] & 0x07;

    snapshot.memory.load(base, &image);
    debug!(
        compression = data[5],
        stored_len,
        pc = snapshot.registers.pc,
        "decoded ZX82"
    );
    Ok(snapshot)
}

/// Encode with ByteRun1 compression.
///
/// # Errors
///
/// See [`encode_with`].
pub fn encode(snapshot: &Snapshot) -> Result<Vec<u8>, SnapshotError> {
    encode_with(snapshot, true)
}

/// # Errors
///
/// `UnsupportedModel` for anything but the 48K.
pub fn encode_with(snapshot: &Snapshot, compress: bool) -> Result<Vec<u8>, SnapshotError> {
    require_48k(FORMAT, snapshot)?;
    let regs = &snapshot.registers;
    let image = snapshot.memory.dump(0x4000, RAM_48K_LEN);
    let (compression, stored) = if compress {
        (COMPRESSION_BYTERUN1, pack(&image))
    } else {
        (COMPRESSION_NONE, image)
    };

    let mut out = Vec::with_capacity(HEADER_LEN + stored.len());
    out.extend_from_slice(SIGNATURE);
    out.write_u8(CONTENT_SNAPSHOT)?;
    out.write_u8(compression)?;
    out.write_u16::<BigEndian>(stored.len() as u16)?;
    out.write_u16::<BigEndian>(0x4000)?;
    out.write_u16::<BigEndian>(RAM_48K_LEN as u16)?;
    for pair in [
        regs.af(),
        regs.bc(),
        regs.de(),
        regs.hl(),
        regs.af_alt(),
        regs.bc_alt(),
        regs.de_alt(),
        regs.hl_alt(),
        regs.ix,
        regs.iy,
        regs.sp,
        regs.pc,
    ] {
        out.write_u16::<BigEndian>(pair)?;
    }
    let iff = u8::from(regs.iff1) | (u8::from(regs.iff2) << 1);
    out.extend_from_slice(&[regs.i, regs.r, regs.im, iff, snapshot.border & 0x07, 0]);
    out.extend(stored);
    Ok(out)
}

#[derive(Debug, PartialEq, Eq)]
enum Run {
    Literal(Vec<u8>),
    Repeat { byte: u8, count: usize },
}

/// ByteRun1-pack `data`.
#[must_use]
pub fn pack(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + data.len() / MAX_RUN + 1);
    for run in plan_runs(data) {
        match run {
            Run::Literal(bytes) => {
                let mut rest = bytes.as_slice();
                while !rest.is_empty() {
                    let take = chunk_len(rest.len());
                    out.push((take - 1) as u8);
                    out.extend_from_slice(&rest[..take]);
                    rest = &rest[take..];
                }
            }
            Run::Repeat { byte, mut count } => {
                while count > 0 {
                    let take = chunk_len(count);
                    out.push(!((take - 2) as u8));
                    out.push(byte);
                    count -= take;
                }
            }
        }
    }
    out
}

/// Longest chunk of `remaining` that doesn't leave a one-byte tail.
fn chunk_len(remaining: usize) -> usize {
    match remaining {
        n if n <= MAX_RUN => n,
        n if n == MAX_RUN + 1 => MAX_RUN - 1,
        _ => MAX_RUN,
    }
}

/// Split `data` into literal and repeat runs. Repeats are at least three
/// bytes, and a lone literal byte borrows from or merges into a neighbouring
/// repeat so no run is a single byte.
fn plan_runs(data: &[u8]) -> Vec<Run> {
    let mut runs: Vec<Run> = Vec::new();
    let mut i = 0;
    while i < data.len() {
        let byte = data[i];
        let count = data[i..].iter().take_while(|&&b| b == byte).count();
        if count >= 3 {
            runs.push(Run::Repeat { byte, count });
        } else if let Some(Run::Literal(bytes)) = runs.last_mut() {
            bytes.extend_from_slice(&data[i..i + count]);
        } else {
            runs.push(Run::Literal(data[i..i + count].to_vec()));
        }
        i += count;
    }

    let mut idx = 0;
    while idx < runs.len() {
        if !matches!(&runs[idx], Run::Literal(bytes) if bytes.len() == 1) {
            idx += 1;
            continue;
        }
        if let Some(&Run::Repeat { byte, count }) = runs.get(idx + 1) {
            // Borrow the head of the next repeat, or swallow it whole.
            if count > 3 {
                runs[idx + 1] = Run::Repeat { byte, count: count - 1 };
                push_literal(&mut runs[idx], &[byte]);
            } else {
                runs.remove(idx + 1);
                push_literal(&mut runs[idx], &[byte; 3]);
                if matches!(runs.get(idx + 1), Some(Run::Literal(_))) {
                    let next = runs.remove(idx + 1);
                    absorb(&mut runs[idx], next);
                }
            }
        } else if idx > 0 {
            // Trailing byte: borrow the tail of the previous repeat.
            let Run::Repeat { byte, count } = runs[idx - 1] else {
                unreachable!("adjacent literals are merged");
            };
            let Run::Literal(last) = runs.remove(idx) else {
                unreachable!("checked above");
            };
            if count > 3 {
                runs[idx - 1] = Run::Repeat { byte, count: count - 1 };
                let mut tail = vec![byte];
                tail.extend(last);
                runs.push(Run::Literal(tail));
            } else {
                let mut tail = vec![byte; count];
                tail.extend(last);
                runs.remove(idx - 1);
                match runs.last_mut() {
                    Some(Run::Literal(bytes)) => bytes.extend(tail),
                    _ => runs.push(Run::Literal(tail)),
                }
            }
            break;
        }
        idx += 1;
    }
    runs
}

fn push_literal(run: &mut Run, more: &[u8]) {
    if let Run::Literal(bytes) = run {
        bytes.extend_from_slice(more);
    }
}

fn absorb(run: &mut Run, other: Run) {
    match other {
        Run::Literal(more) => push_literal(run, &more),
        Run::Repeat { byte, count } => push_literal(run, &vec![byte; count]),
    }
}

/// Unpack ByteRun1 data that must expand to exactly `len` bytes.
///
/// # Errors
///
/// `MalformedRun` for a run cut short, the reserved signal `0x80` or a
/// short result, and `ImageTooLarge` if the data expands past `len`.
pub fn unpack(src: &[u8], len: usize) -> Result<Vec<u8>, SnapshotError> {
    let malformed = |reason| SnapshotError::MalformedRun {
        format: FORMAT,
        reason,
    };
    let mut out = Vec::with_capacity(len);
    let mut i = 0;
    while i < src.len() {
        let signal = src[i];
        i += 1;
        match signal {
            0x00..=0x7F => {
                let count = usize::from(signal) + 1;
                let bytes = src
                    .get(i..i + count)
                    .ok_or_else(|| malformed("literal run cut short"))?;
                out.extend_from_slice(bytes);
                i += count;
            }
            0x80 => return Err(malformed("run longer than 128 bytes")),
            _ => {
                let byte = *src.get(i).ok_or_else(|| malformed("repeat run cut short"))?;
                out.resize(out.len() + usize::from(!signal) + 2, byte);
                i += 1;
            }
        }
        if out.len() > len {
            return Err(SnapshotError::ImageTooLarge {
                format: FORMAT,
                len: out.len(),
                capacity: len,
            });
        }
    }
    if out.len() != len {
        return Err(malformed("image shorter than declared"));
    }
    Ok(out)
}
