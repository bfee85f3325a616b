//! Instruction alphabet for organism genomes.
//!
//! An instruction is a symbol index into an [`InstructionSet`]. The text form
//! maps indices 0..26 to `a..z` and 26..52 to `A..Z`, so alphabets larger than
//! 52 symbols are not representable.

use digevo_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const MAX_INSTRUCTIONS: usize = 52;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Instruction(pub u8);

impl Instruction {
    pub fn index(&self) -> usize {
        self.0 as usize
    }

    pub fn to_char(&self) -> char {
        match self.0 {
            n @ 0..=25 => (b'a' + n) as char,
            n @ 26..=51 => (b'A' + n - 26) as char,
            _ => '?',
        }
    }

    pub fn from_char(c: char) -> Result<Self> {
        match c {
            'a'..='z' => Ok(Instruction(c as u8 - b'a')),
            'A'..='Z' => Ok(Instruction(c as u8 - b'A' + 26)),
            other => Err(Error::Validation(format!("invalid instruction symbol '{}'", other))),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_char())
    }
}

/// Named instruction alphabet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstructionSet {
    names: Vec<String>,
}

/// The stock heads-based alphabet.
const HEADS_DEFAULT: [&str; 26] = [
    "nop-A", "nop-B", "nop-C", "if-n-equ", "if-less", "if-label", "mov-head", "jmp-head",
    "get-head", "set-flow", "shift-r", "shift-l", "inc", "dec", "push", "pop", "swap-stk",
    "swap", "add", "sub", "nand", "h-copy", "h-alloc", "h-divide", "IO", "h-search",
];

impl InstructionSet {
    pub fn new(names: Vec<String>) -> Result<Self> {
        if names.is_empty() || names.len() > MAX_INSTRUCTIONS {
            return Err(Error::Config(format!(
                "instruction set must have 1..={} entries, got {}",
                MAX_INSTRUCTIONS,
                names.len()
            )));
        }
        Ok(Self { names })
    }

    pub fn heads_default() -> Self {
        Self {
            names: HEADS_DEFAULT.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn size(&self) -> usize {
        self.names.len()
    }

    pub fn name(&self, inst: Instruction) -> Option<&str> {
        self.names.get(inst.index()).map(String::as_str)
    }

    pub fn find(&self, name: &str) -> Option<Instruction> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| Instruction(i as u8))
    }

    pub fn contains(&self, inst: Instruction) -> bool {
        inst.index() < self.names.len()
    }

    /// Filler used by nop-X slip duplication; the first symbol if the set has none.
    pub fn nop_x(&self) -> Instruction {
        self.find("nop-X").unwrap_or(Instruction(0))
    }

    pub fn nop_c(&self) -> Instruction {
        self.find("nop-C").unwrap_or(Instruction(0))
    }
}

impl Default for InstructionSet {
    fn default() -> Self {
        Self::heads_default()
    }
}
