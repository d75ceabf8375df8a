//! Snapshot codec errors.

use crate::config::SpectrumModel;

/// Why a snapshot could not be decoded, encoded or applied.
///
/// Decoders build a fresh `Snapshot` before touching any machine, so every
/// one of these leaves live state unchanged.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("{format}: truncated, need {needed} bytes but only {actual} present")]
    Truncated {
        format: &'static str,
        needed: usize,
        actual: usize,
    },

    #[error("{format}: bad signature")]
    BadSignature { format: &'static str },

    #[error("{format} cannot hold a {model} snapshot")]
    UnsupportedModel {
        format: &'static str,
        model: SpectrumModel,
    },

    #[error("{format}: unknown machine type {id}")]
    UnknownMachineType { format: &'static str, id: u8 },

    #[error("{format}: memory image of {len} bytes exceeds the {capacity} bytes available")]
    ImageTooLarge {
        format: &'static str,
        len: usize,
        capacity: usize,
    },

    #[error("{format}: compressed image has no end marker")]
    MissingEndMarker { format: &'static str },

    #[error("{format}: malformed compressed data: {reason}")]
    MalformedRun {
        format: &'static str,
        reason: &'static str,
    },

    #[error("stack pointer {sp:#06x} puts the program counter outside RAM")]
    StackInRom { sp: u16 },

    #[error("snapshot is for a {snapshot} but the machine is a {machine}")]
    ModelMismatch {
        snapshot: SpectrumModel,
        machine: SpectrumModel,
    },

    #[error("{format}: unsupported version ({detail})")]
    UnsupportedVersion {
        format: &'static str,
        detail: String,
    },

    #[error("{format}: invalid {field} {value}")]
    InvalidField {
        format: &'static str,
        field: &'static str,
        value: i64,
    },

    #[error("unrecognised snapshot file type {0:?}")]
    UnknownFormat(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Fail with `Truncated` unless `data` holds at least `needed` bytes.
pub(crate) fn require(format: &'static str, data: &[u8], needed: usize) -> Result<(), SnapshotError> {
    if data.len() < needed {
        Err(SnapshotError::Truncated {
            format,
            needed,
            actual: data.len(),
        })
    } else {
        Ok(())
    }
}
