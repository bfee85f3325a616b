//! Validation for genomes entering the world.

use crate::instruction::InstructionSet;
use crate::genome::Genome;
use digevo_core::{DivideConfig, Error, Result};

/// Absolute genome length bounds. A zero maximum means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenomeLimits {
    pub min_size: usize,
    pub max_size: usize,
}

impl GenomeLimits {
    pub fn from_divide_config(config: &DivideConfig) -> Self {
        Self {
            min_size: config.min_genome_size,
            max_size: config.max_genome_size,
        }
    }

    pub fn unbounded() -> Self {
        Self { min_size: 0, max_size: 0 }
    }

    /// Smallest length edits may shrink a genome to.
    pub fn floor(&self) -> usize {
        self.min_size.max(1)
    }

    pub fn allows(&self, len: usize) -> bool {
        len >= self.floor() && (self.max_size == 0 || len <= self.max_size)
    }

    pub fn can_grow(&self, len: usize) -> bool {
        self.max_size == 0 || len < self.max_size
    }

    pub fn can_shrink(&self, len: usize) -> bool {
        len > self.floor()
    }
}

/// Validate that a genome is well-formed for the given alphabet and bounds
pub fn validate_genome(genome: &Genome, inst_set: &InstructionSet, limits: &GenomeLimits) -> Result<()> {
    if genome.is_empty() {
        return Err(Error::Validation("genome is empty".to_string()));
    }

    if !limits.allows(genome.len()) {
        return Err(Error::Validation(format!(
            "genome length {} outside allowed range {}..={}",
            genome.len(),
            limits.floor(),
            if limits.max_size == 0 { "any".to_string() } else { limits.max_size.to_string() }
        )));
    }

    if let Some((pos, inst)) = genome
        .iter()
        .enumerate()
        .find(|(_, inst)| !inst_set.contains(**inst))
    {
        return Err(Error::Validation(format!(
            "site {} holds symbol '{}' outside the {}-instruction set",
            pos,
            inst,
            inst_set.size()
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_empty_genome() {
        let genome = Genome::default();
        let result = validate_genome(&genome, &InstructionSet::default(), &GenomeLimits::unbounded());
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_length_limits() {
        let genome: Genome = "abcdefgh".parse().unwrap();
        let set = InstructionSet::default();
        let tight = GenomeLimits { min_size: 10, max_size: 0 };
        assert!(validate_genome(&genome, &set, &tight).is_err());
        let short = GenomeLimits { min_size: 0, max_size: 5 };
        assert!(validate_genome(&genome, &set, &short).is_err());
        let ok = GenomeLimits { min_size: 8, max_size: 8 };
        assert!(validate_genome(&genome, &set, &ok).is_ok());
    }

    #[test]
    fn test_validate_alphabet() {
        let genome: Genome = "abcZ".parse().unwrap();
        let result = validate_genome(&genome, &InstructionSet::default(), &GenomeLimits::unbounded());
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_grow_and_shrink() {
        let limits = GenomeLimits { min_size: 3, max_size: 5 };
        assert!(limits.can_grow(4));
        assert!(!limits.can_grow(5));
        assert!(limits.can_shrink(4));
        assert!(!limits.can_shrink(3));
        assert!(GenomeLimits::unbounded().can_shrink(2));
        assert!(!GenomeLimits::unbounded().can_shrink(1));
    }
}
