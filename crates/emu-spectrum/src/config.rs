//! Spectrum model and machine configuration.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::clock::SpeedLimit;

/// Supported Spectrum models.
///
/// The model fixes the memory layout (`AddressSpace` variant), the ROM bank
/// count and which paging ports exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpectrumModel {
    #[serde(rename = "16k")]
    Spectrum16K,
    #[serde(rename = "48k")]
    Spectrum48K,
    #[serde(rename = "128k")]
    Spectrum128K,
    #[serde(rename = "plus2")]
    SpectrumPlus2,
    #[serde(rename = "plus2a")]
    SpectrumPlus2A,
    #[serde(rename = "plus3")]
    SpectrumPlus3,
}

impl SpectrumModel {
    pub const ALL: [Self; 6] = [
        Self::Spectrum16K,
        Self::Spectrum48K,
        Self::Spectrum128K,
        Self::SpectrumPlus2,
        Self::SpectrumPlus2A,
        Self::SpectrumPlus3,
    ];

    /// Number of 16K ROM banks.
    #[must_use]
    pub const fn rom_banks(self) -> usize {
        match self {
            Self::Spectrum16K | Self::Spectrum48K => 1,
            Self::Spectrum128K | Self::SpectrumPlus2 => 2,
            Self::SpectrumPlus2A | Self::SpectrumPlus3 => 4,
        }
    }

    /// Number of 16K RAM banks.
    #[must_use]
    pub const fn ram_banks(self) -> usize {
        match self {
            Self::Spectrum16K => 1,
            Self::Spectrum48K => 3,
            _ => 8,
        }
    }

    /// Whether the model has the `0x7FFD` paging port.
    #[must_use]
    pub const fn is_banked(self) -> bool {
        !matches!(self, Self::Spectrum16K | Self::Spectrum48K)
    }

    /// Whether the model also has the `0x1FFD` paging port.
    #[must_use]
    pub const fn is_plus3_family(self) -> bool {
        matches!(self, Self::SpectrumPlus2A | Self::SpectrumPlus3)
    }

    /// CPU clock in Hz.
    #[must_use]
    pub const fn default_clock_hz(self) -> u64 {
        if self.is_banked() { 3_546_900 } else { 3_500_000 }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Spectrum16K => "ZX Spectrum 16K",
            Self::Spectrum48K => "ZX Spectrum 48K",
            Self::Spectrum128K => "ZX Spectrum 128K",
            Self::SpectrumPlus2 => "ZX Spectrum +2",
            Self::SpectrumPlus2A => "ZX Spectrum +2A",
            Self::SpectrumPlus3 => "ZX Spectrum +3",
        }
    }
}

impl fmt::Display for SpectrumModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors from reading a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("clock of {0} Hz is below the 50 Hz interrupt rate")]
    ClockTooSlow(u64),
}

/// Slowest clock that still gives each 50 Hz frame at least one T-state.
pub const MIN_CLOCK_HZ: u64 = crate::clock::INTERRUPT_RATE;

/// Configuration for creating a `Machine`.
///
/// ```toml
/// model = "128k"
/// roms = ["roms/128-0.rom", "roms/128-1.rom"]
/// speed = { ratio = 2.0 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectrumConfig {
    pub model: SpectrumModel,
    /// ROM image files. Each file starts at the next free ROM bank, so a
    /// single concatenated image and one file per bank both work.
    #[serde(default)]
    pub roms: Vec<PathBuf>,
    /// Overrides the model's CPU clock.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clock_hz: Option<u64>,
    #[serde(default)]
    pub speed: SpeedLimit,
    /// In-memory ROM data. Takes precedence over `roms` when non-empty.
    #[serde(skip)]
    pub rom_images: Vec<Vec<u8>>,
}

impl SpectrumConfig {
    #[must_use]
    pub fn new(model: SpectrumModel) -> Self {
        Self {
            model,
            roms: Vec::new(),
            clock_hz: None,
            speed: SpeedLimit::default(),
            rom_images: Vec::new(),
        }
    }

    /// Configuration with ROM contents supplied directly instead of by path.
    #[must_use]
    pub fn with_rom_images(model: SpectrumModel, images: Vec<Vec<u8>>) -> Self {
        Self {
            rom_images: images,
            ..Self::new(model)
        }
    }

    /// Parse a TOML document.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` for malformed TOML or unknown models,
    /// and `ConfigError::ClockTooSlow` for a `clock_hz` under 50.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that parse but can't drive a machine.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.clock_hz {
            Some(hz) if hz < MIN_CLOCK_HZ => Err(ConfigError::ClockTooSlow(hz)),
            _ => Ok(()),
        }
    }

    /// Read and parse a TOML file. Relative ROM paths are resolved against
    /// the file's directory.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Io` if the file can't be read, or
    /// `ConfigError::Parse` if its contents are invalid.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&text)?;
        if let Some(dir) = path.parent() {
            for rom in &mut config.roms {
                if rom.is_relative() {
                    *rom = dir.join(&*rom);
                }
            }
        }
        Ok(config)
    }

    /// Effective CPU clock.
    #[must_use]
    pub fn clock_hz(&self) -> u64 {
        self.clock_hz.unwrap_or_else(|| self.model.default_clock_hz())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_toml() {
        let config = SpectrumConfig::from_toml_str("model = \"48k\"").expect("parse");
        assert_eq!(config.model, SpectrumModel::Spectrum48K);
        assert!(config.roms.is_empty());
        assert_eq!(config.clock_hz(), 3_500_000);
        assert_eq!(config.speed, SpeedLimit::Ratio(1.0));
    }

    #[test]
    fn banked_models_default_to_faster_clock() {
        let config = SpectrumConfig::new(SpectrumModel::SpectrumPlus3);
        assert_eq!(config.clock_hz(), 3_546_900);

        let config = SpectrumConfig::from_toml_str("model = \"128k\"\nclock_hz = 7000000")
            .expect("parse");
        assert_eq!(config.clock_hz(), 7_000_000);
    }

    #[test]
    fn parses_speed_and_roms() {
        let text = r#"
            model = "plus2a"
            roms = ["a.rom", "b.rom"]
            speed = "unconstrained"
        "#;
        let config = SpectrumConfig::from_toml_str(text).expect("parse");
        assert_eq!(config.model, SpectrumModel::SpectrumPlus2A);
        assert_eq!(config.roms, vec![PathBuf::from("a.rom"), PathBuf::from("b.rom")]);
        assert_eq!(config.speed, SpeedLimit::Unconstrained);

        let config =
            SpectrumConfig::from_toml_str("model = \"16k\"\nspeed = { ratio = 2.5 }").expect("parse");
        assert_eq!(config.speed, SpeedLimit::Ratio(2.5));
    }

    #[test]
    fn clock_below_interrupt_rate_is_rejected() {
        for hz in [0, 10, 49] {
            let err = SpectrumConfig::from_toml_str(&format!("model = \"48k\"\nclock_hz = {hz}"))
                .unwrap_err();
            assert!(matches!(err, ConfigError::ClockTooSlow(h) if h == hz));
        }
        let config = SpectrumConfig::from_toml_str("model = \"48k\"\nclock_hz = 50").expect("parse");
        assert_eq!(config.clock_hz(), 50);
    }

    #[test]
    fn unknown_model_is_rejected() {
        let err = SpectrumConfig::from_toml_str("model = \"pentagon\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn json_round_trip_skips_rom_images() {
        let config = SpectrumConfig::with_rom_images(SpectrumModel::Spectrum48K, vec![vec![1, 2]]);
        let json = serde_json::to_string(&config).expect("serialize");
        let back: SpectrumConfig = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.model, config.model);
        assert!(back.rom_images.is_empty());
    }

    #[test]
    fn rom_and_ram_bank_counts() {
        let counts: Vec<_> = SpectrumModel::ALL
            .iter()
            .map(|m| (m.rom_banks(), m.ram_banks()))
            .collect();
        assert_eq!(counts, vec![(1, 1), (1, 3), (2, 8), (2, 8), (4, 8), (4, 8)]);
        assert!(!SpectrumModel::Spectrum48K.is_banked());
        assert!(SpectrumModel::SpectrumPlus2.is_banked());
        assert!(!SpectrumModel::SpectrumPlus2.is_plus3_family());
        assert!(SpectrumModel::SpectrumPlus3.is_plus3_family());
    }
}
