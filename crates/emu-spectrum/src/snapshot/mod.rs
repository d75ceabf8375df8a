//! Format-independent machine state and the file codecs built on it.
//!
//! A `Snapshot` is decoded completely, into its own `AddressSpace`, before
//! anything touches a live machine. Codecs never see a machine at all.

mod error;
pub mod sna;
pub mod sp;
pub mod z80;
pub mod zx;
pub mod zx82;

use std::fmt;
use std::path::Path;

pub use error::SnapshotError;

use crate::config::SpectrumModel;
use crate::memory::AddressSpace;
use crate::paging::PagingState;
use crate::registers::Registers;

/// RAM from `0x4000` to the top of memory on a 48K machine.
pub(crate) const RAM_48K_LEN: usize = 0xC000;

/// Complete machine state at one instant.
///
/// The model tag is the memory's model; paging state (if any) travels inside
/// `memory`. ROM banks are carried along but never applied to a machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub registers: Registers,
    /// Border colour, 0-7.
    pub border: u8,
    pub memory: AddressSpace,
}

impl Snapshot {
    /// Reset-state registers, black border and zeroed memory.
    #[must_use]
    pub fn new(model: SpectrumModel) -> Self {
        Self {
            registers: Registers::default(),
            border: 0,
            memory: AddressSpace::new(model),
        }
    }

    #[must_use]
    pub fn model(&self) -> SpectrumModel {
        self.memory.model()
    }

    #[must_use]
    pub fn paging(&self) -> Option<PagingState> {
        self.memory.paging()
    }

    /// Whether RAM contents and paging match `other`, ignoring ROM.
    #[must_use]
    pub fn same_ram(&self, other: &Self) -> bool {
        self.model() == other.model()
            && self.paging() == other.paging()
            && (0..self.memory.ram_bank_count())
                .all(|bank| self.memory.ram_bank(bank) == other.memory.ram_bank(bank))
    }

    /// Read and decode a file, picking the format from its extension.
    ///
    /// # Errors
    ///
    /// `UnknownFormat` for an unrecognised extension, `Io` if the file can't
    /// be read, or the codec's own error.
    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        let format = SnapshotFormat::from_path(path)?;
        let data = std::fs::read(path)?;
        format.decode(&data)
    }

    /// Encode and write to `path`.
    ///
    /// # Errors
    ///
    /// The codec's error, or `Io` if the file can't be written.
    pub fn save(&self, path: &Path, format: SnapshotFormat) -> Result<(), SnapshotError> {
        let data = format.encode(self)?;
        std::fs::write(path, data)?;
        Ok(())
    }
}

/// Fail unless the snapshot is of a 48K machine.
pub(crate) fn require_48k(format: &'static str, snapshot: &Snapshot) -> Result<(), SnapshotError> {
    match snapshot.model() {
        SpectrumModel::Spectrum48K => Ok(()),
        model => Err(SnapshotError::UnsupportedModel { format, model }),
    }
}

/// The supported file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SnapshotFormat {
    Sna,
    Z80,
    Sp,
    Zx,
    Zx82,
}

impl SnapshotFormat {
    pub const ALL: [Self; 5] = [Self::Sna, Self::Z80, Self::Sp, Self::Zx, Self::Zx82];

    /// Match a file extension, case-insensitively.
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.extension().eq_ignore_ascii_case(ext))
    }

    /// # Errors
    ///
    /// `UnknownFormat` if the path has no recognised extension.
    pub fn from_path(path: &Path) -> Result<Self, SnapshotError> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
            .ok_or_else(|| SnapshotError::UnknownFormat(path.display().to_string()))
    }

    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Sna => "sna",
            Self::Z80 => "z80",
            Self::Sp => "sp",
            Self::Zx => "zx",
            Self::Zx82 => "zx82",
        }
    }

    /// Whether this format can store `model`.
    #[must_use]
    pub fn supports(self, model: SpectrumModel) -> bool {
        match self {
            Self::Z80 => true,
            _ => model == SpectrumModel::Spectrum48K,
        }
    }

    /// # Errors
    ///
    /// Whatever the format's decoder reports.
    pub fn decode(self, data: &[u8]) -> Result<Snapshot, SnapshotError> {
        match self {
            Self::Sna => sna::decode(data),
            Self::Z80 => z80::decode(data),
            Self::Sp => sp::decode(data),
            Self::Zx => zx::decode(data),
            Self::Zx82 => zx82::decode(data),
        }
    }

    /// Encode with each format's default options.
    ///
    /// # Errors
    ///
    /// Whatever the format's encoder reports.
    pub fn encode(self, snapshot: &Snapshot) -> Result<Vec<u8>, SnapshotError> {
        match self {
            Self::Sna => sna::encode(snapshot),
            Self::Z80 => z80::encode(snapshot),
            Self::Sp => sp::encode(snapshot),
            Self::Zx => zx::encode(snapshot),
            Self::Zx82 => zx82::encode(snapshot),
        }
    }
}

impl fmt::Display for SnapshotFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Sna => "SNA",
            Self::Z80 => "Z80",
            Self::Sp => "SP",
            Self::Zx => "ZX",
            Self::Zx82 => "ZX82",
        })
    }
}
