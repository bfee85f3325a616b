//! Organism state held by an occupied cell.

use digevo_core::{GenotypeId, OrganismId, Phenotype};
use digevo_exec::Hardware;
use digevo_genome::Genome;
use std::fmt;

/// An organism in the population
pub struct Organism {
    pub id: OrganismId,
    pub genotype: GenotypeId,
    /// Genome the organism was born with; never edited
    genome: Genome,
    pub hardware: Box<dyn Hardware>,
    pub phenotype: Phenotype,
    pub birth_update: u64,
}

impl Organism {
    pub fn new(
        id: OrganismId,
        genotype: GenotypeId,
        genome: Genome,
        hardware: Box<dyn Hardware>,
        phenotype: Phenotype,
        birth_update: u64,
    ) -> Self {
        Self {
            id,
            genotype,
            genome,
            hardware,
            phenotype,
            birth_update,
        }
    }

    pub fn genome(&self) -> &Genome {
        &self.genome
    }

    pub fn merit(&self) -> f64 {
        self.phenotype.merit
    }

    pub fn age(&self) -> u64 {
        self.phenotype.age
    }

    pub fn cycles_used(&self) -> u64 {
        self.phenotype.cycles_used
    }
}

impl fmt::Debug for Organism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Organism")
            .field("id", &self.id)
            .field("genotype", &self.genotype)
            .field("genome", &self.genome.to_string())
            .field("merit", &self.phenotype.merit)
            .field("age", &self.phenotype.age)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use digevo_core::MeritConfig;
    use digevo_exec::{HardwareFactory, ReplicatorFactory};

    #[test]
    fn test_birth_genome_survives_hardware_edits() {
        let genome: Genome = "abcx".parse().unwrap();
        let hardware = ReplicatorFactory::default().create(&genome);
        let phenotype = Phenotype::injected(genome.len(), &MeritConfig::default());
        let mut organism = Organism::new(OrganismId(1), GenotypeId(0), genome, hardware, phenotype, 0);

        organism.hardware.genome_mut().set(0, digevo_genome::Instruction(9));
        assert_eq!(organism.genome().to_string(), "abcx");
        assert_eq!(organism.hardware.genome().to_string(), "jbcx");
        assert_eq!(organism.merit(), 4.0);
    }
}
