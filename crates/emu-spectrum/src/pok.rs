//! `.pok` trainer files.
//!
//! A line-oriented text format. Each trainer starts with `N<name>` and
//! lists its pokes on `M` lines, the last one on a `Z` line. `Y` ends the
//! file.
//!
//! ```text
//! NInfinite lives
//! M  8 35136   0   53
//! Z  8 35137 256    0
//! Y
//! ```
//!
//! Poke fields are bank, address, value and the original byte. A bank with
//! bit 3 set means "whatever is paged in"; a value of 256 asks the user.

use std::str::SplitWhitespace;

use tracing::debug;

use crate::memory::{AddressSpace, BANK_SIZE};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PokeError {
    #[error("line {line}: {reason}")]
    Malformed { line: usize, reason: &'static str },
    #[error("line {line}: {field} {value} out of range")]
    OutOfRange {
        line: usize,
        field: &'static str,
        value: u32,
    },
    #[error("file ends inside trainer {0:?}")]
    UnexpectedEnd(String),
    #[error("trainer {0:?} needs a value")]
    NeedsValue(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PokeValue {
    Fixed(u8),
    /// Supplied when the trainer is applied.
    Ask,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Poke {
    /// RAM bank, or `None` for the current mapping.
    pub bank: Option<u8>,
    pub address: u16,
    pub value: PokeValue,
    /// The byte the file says was there before.
    pub original: u8,
}

impl Poke {
    fn locate<'a>(&self, memory: &'a mut AddressSpace) -> Option<&'a mut u8> {
        match self.bank {
            Some(bank)
                if memory.model().is_banked() && usize::from(bank) < memory.ram_bank_count() =>
            {
                let offset = usize::from(self.address) % BANK_SIZE;
                Some(&mut memory.ram_bank_mut(usize::from(bank))[offset])
            }
            _ => None,
        }
    }

    fn read(&self, memory: &mut AddressSpace) -> u8 {
        match self.locate(memory) {
            Some(byte) => *byte,
            None => memory.read(self.address),
        }
    }

    fn write(&self, memory: &mut AddressSpace, value: u8) {
        match self.locate(memory) {
            Some(byte) => *byte = value,
            None => memory.write(self.address, value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trainer {
    pub name: String,
    pub pokes: Vec<Poke>,
    /// Bytes overwritten by the last `apply`.
    saved: Vec<u8>,
}

impl Trainer {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pokes: Vec::new(),
            saved: Vec::new(),
        }
    }

    /// Whether any poke takes its value from the user.
    #[must_use]
    pub fn needs_value(&self) -> bool {
        self.pokes.iter().any(|p| p.value == PokeValue::Ask)
    }

    #[must_use]
    pub fn is_applied(&self) -> bool {
        !self.saved.is_empty()
    }

    /// Write every poke, remembering what was there. Applying again keeps
    /// the bytes from before the first application.
    ///
    /// # Errors
    ///
    /// `NeedsValue` if a poke asks for a value and `user_value` is `None`.
    /// Memory is untouched in that case.
    pub fn apply(
        &mut self,
        memory: &mut AddressSpace,
        user_value: Option<u8>,
    ) -> Result<(), PokeError> {
        if self.needs_value() && user_value.is_none() {
            return Err(PokeError::NeedsValue(self.name.clone()));
        }
        if !self.is_applied() {
            self.saved = self.pokes.iter().map(|p| p.read(memory)).collect();
        }
        for poke in &self.pokes {
            let value = match poke.value {
                PokeValue::Fixed(v) => v,
                PokeValue::Ask => user_value.unwrap_or_default(),
            };
            poke.write(memory, value);
        }
        debug!(trainer = %self.name, pokes = self.pokes.len(), "trainer applied");
        Ok(())
    }

    /// Put back the bytes saved by `apply`, last poke first.
    pub fn revert(&mut self, memory: &mut AddressSpace) {
        for (poke, &byte) in self.pokes.iter().zip(&self.saved).rev() {
            poke.write(memory, byte);
        }
        self.saved.clear();
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PokeFile {
    pub trainers: Vec<Trainer>,
}

impl PokeFile {
    /// # Errors
    ///
    /// `Malformed` or `OutOfRange` with the 1-based line number, or
    /// `UnexpectedEnd` if the last trainer has no `Z` line.
    pub fn parse(text: &str) -> Result<Self, PokeError> {
        let mut trainers = Vec::new();
        let mut open: Option<Trainer> = None;

        for (index, raw) in text.lines().enumerate() {
            let line = index + 1;
            let raw = raw.trim_end();
            let Some(tag) = raw.chars().next() else {
                continue;
            };
            match tag {
                'N' => {
                    if open.is_some() {
                        return Err(PokeError::Malformed {
                            line,
                            reason: "previous trainer has no Z line",
                        });
                    }
                    open = Some(Trainer::new(raw[1..].trim()));
                }
                'M' | 'Z' => {
                    let trainer = open.as_mut().ok_or(PokeError::Malformed {
                        line,
                        reason: "poke outside a trainer",
                    })?;
                    trainer.pokes.push(parse_poke(line, &raw[1..])?);
                    if tag == 'Z' {
                        trainers.extend(open.take());
                    }
                }
                'Y' => break,
                _ => {
                    return Err(PokeError::Malformed {
                        line,
                        reason: "unknown line type",
                    });
                }
            }
        }
        if let Some(trainer) = open {
            return Err(PokeError::UnexpectedEnd(trainer.name));
        }
        Ok(Self { trainers })
    }

    #[must_use]
    pub fn trainer(&self, name: &str) -> Option<&Trainer> {
        self.trainers.iter().find(|t| t.name == name)
    }

    pub fn trainer_mut(&mut self, name: &str) -> Option<&mut Trainer> {
        self.trainers.iter_mut().find(|t| t.name == name)
    }
}

#[allow(clippy::cast_possible_truncation)] // Ranges checked by `field`.
fn parse_poke(line: usize, fields: &str) -> Result<Poke, PokeError> {
    let mut fields = fields.split_whitespace();
    let bank = field(line, &mut fields, "bank", 0xFF)?;
    let address = field(line, &mut fields, "address", 0xFFFF)?;
    let value = field(line, &mut fields, "value", 0x100)?;
    let original = field(line, &mut fields, "original", 0xFF)?;
    if fields.next().is_some() {
        return Err(PokeError::Malformed {
            line,
            reason: "trailing fields",
        });
    }
    Ok(Poke {
        bank: (bank & 0x08 == 0).then_some(bank as u8),
        address: address as u16,
        value: if value == 0x100 {
            PokeValue::Ask
        } else {
            PokeValue::Fixed(value as u8)
        },
        original: original as u8,
    })
}

fn field(
    line: usize,
    fields: &mut SplitWhitespace<'_>,
    name: &'static str,
    max: u32,
) -> Result<u32, PokeError> {
    let text = fields.next().ok_or(PokeError::Malformed {
        line,
        reason: "missing field",
    })?;
    let value: u32 = text.parse().map_err(|_| PokeError::Malformed {
        line,
        reason: "field is not a number",
    })?;
    if value > max {
        return Err(PokeError::OutOfRange {
            line,
            field: name,
            value,
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SpectrumModel;
    use crate::paging::PagingState;

    const SAMPLE: &str = "NInfinite lives\n\
                          M  8 35136   0   53\n\
                          Z  8 35137 256    0\n\
                          NBank poke\n\
                          Z  3 49152  99    0\n\
                          Y\n\
                          NIgnored\n";

    #[test]
    fn parses_trainers() {
        let file = PokeFile::parse(SAMPLE).expect("parse");
        assert_eq!(file.trainers.len(), 2);
        let lives = file.trainer("Infinite lives").expect("trainer");
        assert_eq!(lives.pokes.len(), 2);
        assert_eq!(
            lives.pokes[0],
            Poke {
                bank: None,
                address: 35136,
                value: PokeValue::Fixed(0),
                original: 53
            }
        );
        assert_eq!(lives.pokes[1].value, PokeValue::Ask);
        assert!(lives.needs_value());
        assert_eq!(file.trainer("Bank poke").map(|t| t.pokes[0].bank), Some(Some(3)));
    }

    #[test]
    fn apply_and_revert() {
        let mut memory = AddressSpace::new(SpectrumModel::Spectrum48K);
        memory.write(35136, 53);
        memory.write(35137, 7);
        let mut file = PokeFile::parse(SAMPLE).expect("parse");
        let lives = file.trainer_mut("Infinite lives").expect("trainer");

        assert_eq!(
            lives.apply(&mut memory, None),
            Err(PokeError::NeedsValue("Infinite lives".into()))
        );
        assert_eq!(memory.read(35136), 53);

        lives.apply(&mut memory, Some(9)).expect("apply");
        assert!(lives.is_applied());
        assert_eq!(memory.read(35136), 0);
        assert_eq!(memory.read(35137), 9);

        lives.revert(&mut memory);
        assert!(!lives.is_applied());
        assert_eq!(memory.read(35136), 53);
        assert_eq!(memory.read(35137), 7);
    }

    #[test]
    fn second_apply_still_reverts_to_first_originals() {
        let mut memory = AddressSpace::new(SpectrumModel::Spectrum48K);
        memory.write(35136, 53);
        memory.write(35137, 7);
        let mut file = PokeFile::parse(SAMPLE).expect("parse");
        let lives = file.trainer_mut("Infinite lives").expect("trainer");

        lives.apply(&mut memory, Some(9)).expect("apply");
        lives.apply(&mut memory, Some(4)).expect("apply again");
        assert_eq!(memory.read(35137), 4);

        lives.revert(&mut memory);
        assert_eq!(memory.read(35136), 53);
        assert_eq!(memory.read(35137), 7);
    }

    #[test]
    fn banked_poke_ignores_current_mapping() {
        let mut memory = AddressSpace::new(SpectrumModel::Spectrum128K);
        let mut file = PokeFile::parse(SAMPLE).expect("parse");
        let trainer = file.trainer_mut("Bank poke").expect("trainer");
        trainer.apply(&mut memory, None).expect("apply");
        assert_eq!(memory.ram_bank(3)[0], 99);
        assert_eq!(memory.read(0xC000), 0);

        let state = PagingState {
            ram_bank: 3,
            ..PagingState::default()
        };
        memory.set_paging(state);
        assert_eq!(memory.read(0xC000), 99);
    }

    #[test]
    fn errors_carry_line_numbers() {
        assert_eq!(
            PokeFile::parse("M 8 1 2 3\n"),
            Err(PokeError::Malformed {
                line: 1,
                reason: "poke outside a trainer"
            })
        );
        assert_eq!(
            PokeFile::parse("NX\nZ 8 70000 1 0\n"),
            Err(PokeError::OutOfRange {
                line: 2,
                field: "address",
                value: 70000
            })
        );
        assert_eq!(
            PokeFile::parse("NX\nM 8 1 x 0\n"),
            Err(PokeError::Malformed {
                line: 2,
                reason: "field is not a number"
            })
        );
        assert_eq!(
            PokeFile::parse("NX\nM 8 1 2 0\n"),
            Err(PokeError::UnexpectedEnd("X".into()))
        );
        assert!(matches!(
            PokeFile::parse("Q\n"),
            Err(PokeError::Malformed { line: 1, .. })
        ));
    }
}
