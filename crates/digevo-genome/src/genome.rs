//! Genome: an ordered, owned sequence of instructions.

use crate::instruction::Instruction;
use digevo_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Genome {
    sites: Vec<Instruction>,
}

impl Genome {
    pub fn new(sites: Vec<Instruction>) -> Self {
        Self { sites }
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Instruction> {
        self.sites.get(index).copied()
    }

    pub fn set(&mut self, index: usize, inst: Instruction) {
        if let Some(site) = self.sites.get_mut(index) {
            *site = inst;
        }
    }

    pub fn insert(&mut self, index: usize, inst: Instruction) {
        let index = index.min(self.sites.len());
        self.sites.insert(index, inst);
    }

    pub fn remove(&mut self, index: usize) -> Option<Instruction> {
        if index < self.sites.len() {
            Some(self.sites.remove(index))
        } else {
            None
        }
    }

    pub fn as_slice(&self) -> &[Instruction] {
        &self.sites
    }

    pub fn iter(&self) -> impl Iterator<Item = &Instruction> {
        self.sites.iter()
    }

    pub fn contains(&self, inst: Instruction) -> bool {
        self.sites.contains(&inst)
    }

    /// Insert `region` before `index`.
    pub fn splice_in(&mut self, index: usize, region: &[Instruction]) {
        let index = index.min(self.sites.len());
        self.sites.splice(index..index, region.iter().copied());
    }

    /// Remove the sites in `start..end`.
    pub fn cut(&mut self, start: usize, end: usize) {
        let end = end.min(self.sites.len());
        if start < end {
            self.sites.drain(start..end);
        }
    }

    /// Sites differing between two genomes of the same length.
    pub fn hamming_distance(&self, other: &Genome) -> Option<usize> {
        if self.len() != other.len() {
            return None;
        }
        Some(self.sites.iter().zip(&other.sites).filter(|(a, b)| a != b).count())
    }
}

impl fmt::Display for Genome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for inst in &self.sites {
            write!(f, "{}", inst.to_char())?;
        }
        Ok(())
    }
}

impl FromStr for Genome {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let sites = s
            .trim()
            .chars()
            .map(Instruction::from_char)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { sites })
    }
}

impl From<Vec<Instruction>> for Genome {
    fn from(sites: Vec<Instruction>) -> Self {
        Self { sites }
    }
}
