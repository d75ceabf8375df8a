//! ROM image loading.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::{SpectrumConfig, SpectrumModel};
use crate::memory::{AddressSpace, BANK_SIZE};

/// A ROM file that could not be used in full. Never fatal: the affected
/// banks stay zero-filled and the machine still runs.
#[derive(Debug, thiserror::Error)]
pub enum RomError {
    #[error("cannot read ROM {path}: {source}")]
    Unreadable {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("ROM {path} is {len} bytes but only {room} bytes of ROM remain; truncated")]
    Oversized {
        path: PathBuf,
        len: usize,
        room: usize,
    },
}

/// ROM contents for every bank of one model, kept so that a reset can
/// reinstall them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RomSet {
    image: Vec<u8>,
}

impl RomSet {
    /// An all-zero ROM set.
    #[must_use]
    pub fn blank(model: SpectrumModel) -> Self {
        Self {
            image: vec![0; model.rom_banks() * BANK_SIZE],
        }
    }

    /// Build from in-memory images. Each image starts at the next free bank.
    #[must_use]
    pub fn from_images(model: SpectrumModel, images: &[Vec<u8>]) -> Self {
        let mut set = Self::blank(model);
        let mut bank = 0;
        for image in images {
            bank = set.place(bank, image).0;
        }
        set
    }

    /// Read the ROM files named by `config`, or take its in-memory images.
    ///
    /// Problems are logged and returned; they never stop loading.
    #[must_use]
    pub fn load(config: &SpectrumConfig) -> (Self, Vec<RomError>) {
        if !config.rom_images.is_empty() {
            return (Self::from_images(config.model, &config.rom_images), Vec::new());
        }

        let mut set = Self::blank(config.model);
        let mut errors = Vec::new();
        let mut bank = 0;
        for path in &config.roms {
            match std::fs::read(path) {
                Ok(data) => {
                    let (next, dropped) = set.place(bank, &data);
                    debug!(path = %path.display(), bank, len = data.len(), "loaded ROM");
                    if dropped > 0 {
                        let err = RomError::Oversized {
                            path: path.clone(),
                            len: data.len(),
                            room: data.len() - dropped,
                        };
                        warn!("{err}");
                        errors.push(err);
                    }
                    bank = next;
                }
                Err(source) => {
                    let err = RomError::Unreadable {
                        path: path.clone(),
                        source,
                    };
                    warn!("{err}");
                    errors.push(err);
                    bank += 1;
                }
            }
        }
        (set, errors)
    }

    /// Copy `data` in at `bank`. Returns the next free bank and how many
    /// bytes did not fit.
    fn place(&mut self, bank: usize, data: &[u8]) -> (usize, usize) {
        let start = (bank * BANK_SIZE).min(self.image.len());
        let room = self.image.len() - start;
        let used = data.len().min(room);
        self.image[start..start + used].copy_from_slice(&data[..used]);
        (bank + used.div_ceil(BANK_SIZE).max(1), data.len() - used)
    }

    #[must_use]
    pub fn bank(&self, bank: usize) -> &[u8] {
        &self.image[bank * BANK_SIZE..(bank + 1) * BANK_SIZE]
    }

    /// Copy every bank into `memory`.
    pub fn install(&self, memory: &mut AddressSpace) {
        for (bank, data) in self.image.chunks(BANK_SIZE).enumerate() {
            memory.load_rom(bank, data);
        }
    }
}

/// Convenience for one-off loads outside a `SpectrumConfig`.
///
/// # Errors
///
/// Returns the first `RomError` encountered.
pub fn load_rom_files(model: SpectrumModel, paths: &[&Path]) -> Result<RomSet, RomError> {
    let mut config = SpectrumConfig::new(model);
    config.roms = paths.iter().map(|p| p.to_path_buf()).collect();
    let (set, errors) = RomSet::load(&config);
    match errors.into_iter().next() {
        Some(err) => Err(err),
        None => Ok(set),
    }
}
