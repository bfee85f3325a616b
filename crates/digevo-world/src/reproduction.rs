//! Divide pipeline: validate, mutate, revert, then hand off for placement.
//!
//! A failed divide is an outcome, not an error. The parent keeps running
//! with its phenotype untouched.

use digevo_core::{CellId, DivideConfig, GenotypeId, OrganismId, Phenotype, RandomSource, ReversionConfig};
use digevo_exec::Runtime;
use digevo_genome::{Genome, GenomeLimits, MutationCounts, Mutator};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DivideStage {
    Requested,
    Validating,
    Mutating,
    Placing,
    Committed,
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DivideFailure {
    Infertile,
    MissingTask,
    MissingReaction,
    InsufficientBonus,
    ChildSizeRange,
    GenomeSize,
    CopiedTooFew,
    ExecutedTooFew,
    Sterilized,
    NoTargetCell,
}

impl fmt::Display for DivideFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            DivideFailure::Infertile => "parent is sterile",
            DivideFailure::MissingTask => "required task not performed",
            DivideFailure::MissingReaction => "required reaction not performed",
            DivideFailure::InsufficientBonus => "bonus below requirement",
            DivideFailure::ChildSizeRange => "child size out of range of parent",
            DivideFailure::GenomeSize => "child size outside genome limits",
            DivideFailure::CopiedTooFew => "too few lines copied",
            DivideFailure::ExecutedTooFew => "too few lines executed",
            DivideFailure::Sterilized => "offspring sterilized",
            DivideFailure::NoTargetCell => "no cell available for offspring",
        };
        f.write_str(reason)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DivideOutcome {
    Committed {
        target: CellId,
        child: OrganismId,
        genotype: GenotypeId,
        mutations: MutationCounts,
    },
    /// Offspring left for a peer world.
    Migrated { mutations: MutationCounts },
    Aborted { stage: DivideStage, reason: DivideFailure },
}

impl DivideOutcome {
    pub fn aborted(stage: DivideStage, reason: DivideFailure) -> Self {
        DivideOutcome::Aborted { stage, reason }
    }

    /// Final pipeline state.
    pub fn stage(&self) -> DivideStage {
        match self {
            DivideOutcome::Committed { .. } | DivideOutcome::Migrated { .. } => DivideStage::Committed,
            DivideOutcome::Aborted { .. } => DivideStage::Aborted,
        }
    }

    pub fn is_committed(&self) -> bool {
        self.stage() == DivideStage::Committed
    }
}

/// Offspring handed over by an executor.
#[derive(Debug, Clone, PartialEq)]
pub struct DivideRequest {
    pub offspring: Genome,
    pub executed_fraction: f64,
    pub copied_fraction: f64,
}

impl DivideRequest {
    /// Copied and executed line counts used for merit.
    pub fn sizes(&self, parent_len: usize) -> (usize, usize) {
        let copied = scaled_count(self.copied_fraction, self.offspring.len());
        let executed = scaled_count(self.executed_fraction, parent_len);
        (copied, executed)
    }
}

fn scaled_count(fraction: f64, len: usize) -> usize {
    let fraction = if fraction.is_finite() { fraction.clamp(0.0, 1.0) } else { 0.0 };
    (fraction * len as f64).round() as usize
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitnessClass {
    Fatal,
    Detrimental,
    Neutral,
    Beneficial,
}

impl FitnessClass {
    pub fn classify(child: f64, parent: f64, config: &ReversionConfig) -> Self {
        if child <= 0.0 {
            FitnessClass::Fatal
        } else if child < parent * (1.0 - config.neutral_min) {
            FitnessClass::Detrimental
        } else if child > parent * (1.0 + config.neutral_max) {
            FitnessClass::Beneficial
        } else {
            FitnessClass::Neutral
        }
    }
}

pub struct ReproductionPipeline {
    divide: DivideConfig,
    reversion: ReversionConfig,
    limits: GenomeLimits,
    mutator: Mutator,
}

impl ReproductionPipeline {
    pub fn new(divide: DivideConfig, reversion: ReversionConfig, mutator: Mutator) -> Self {
        Self {
            limits: GenomeLimits::from_divide_config(&divide),
            divide,
            reversion,
            mutator,
        }
    }

    pub fn limits(&self) -> &GenomeLimits {
        &self.limits
    }

    pub fn mutator(&self) -> &Mutator {
        &self.mutator
    }

    pub fn divide_config(&self) -> &DivideConfig {
        &self.divide
    }

    /// Gate checks in fixed order; the first failing check is reported.
    pub fn validate(
        &self,
        parent: &Phenotype,
        parent_len: usize,
        request: &DivideRequest,
    ) -> std::result::Result<(), DivideFailure> {
        let config = &self.divide;
        if !parent.fertile {
            return Err(DivideFailure::Infertile);
        }
        if let Some(task) = config.required_task {
            let immune = config.immunity_task.map_or(false, |t| parent.has_task(t));
            if !parent.has_task(task) && !immune {
                return Err(DivideFailure::MissingTask);
            }
        }
        if let Some(reaction) = config.required_reaction {
            if !parent.has_reaction(reaction) {
                return Err(DivideFailure::MissingReaction);
            }
        }
        if parent.cur_bonus < config.required_bonus {
            return Err(DivideFailure::InsufficientBonus);
        }

        let child_len = request.offspring.len() as f64;
        let parent_len_f = parent_len as f64;
        let range = config.child_size_range;
        if child_len > parent_len_f * range || child_len < parent_len_f / range {
            return Err(DivideFailure::ChildSizeRange);
        }
        if !self.limits.allows(request.offspring.len()) {
            return Err(DivideFailure::GenomeSize);
        }
        if !(request.copied_fraction >= config.min_copied_lines) {
            return Err(DivideFailure::CopiedTooFew);
        }
        if !(request.executed_fraction >= config.min_exe_lines) {
            return Err(DivideFailure::ExecutedTooFew);
        }
        Ok(())
    }

    pub fn mutate(&self, child: &mut Genome, rng: &mut RandomSource) -> MutationCounts {
        self.mutator.mutate_offspring(child, &self.limits, rng)
    }

    /// Reversion and sterilization for a mutated child.
    ///
    /// A reverted child is restored to `unmutated` and is never sterilized.
    pub fn revert(
        &self,
        runtime: &Runtime,
        parent_genome: &Genome,
        unmutated: &Genome,
        child: &mut Genome,
        mutations: &MutationCounts,
        rng: &mut RandomSource,
    ) -> std::result::Result<(), DivideFailure> {
        if !self.reversion.is_active() || mutations.total() == 0 {
            return Ok(());
        }
        let config = &self.reversion;
        let class = FitnessClass::classify(
            runtime.test_fitness(child),
            runtime.test_fitness(parent_genome),
            config,
        );
        let (revert, sterilize) = match class {
            FitnessClass::Fatal => (config.revert_fatal, config.sterilize_fatal),
            FitnessClass::Detrimental => (config.revert_detrimental, config.sterilize_detrimental),
            FitnessClass::Neutral => (config.revert_neutral, config.sterilize_neutral),
            FitnessClass::Beneficial => (config.revert_beneficial, config.sterilize_beneficial),
        };
        if rng.p(revert) {
            *child = unmutated.clone();
        } else if rng.p(sterilize) {
            return Err(DivideFailure::Sterilized);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use digevo_core::{MeritConfig, MutationRates};
    use digevo_exec::ReplicatorFactory;
    use digevo_genome::InstructionSet;
    use std::sync::Arc;

    fn pipeline(divide: DivideConfig, reversion: ReversionConfig) -> ReproductionPipeline {
        let mutator = Mutator::new(MutationRates::none(), InstructionSet::heads_default());
        ReproductionPipeline::new(divide, reversion, mutator)
    }

    fn request(genome: &str, executed: f64, copied: f64) -> DivideRequest {
        DivideRequest {
            offspring: genome.parse().unwrap(),
            executed_fraction: executed,
            copied_fraction: copied,
        }
    }

    fn parent(len: usize) -> Phenotype {
        Phenotype::injected(len, &MeritConfig::default())
    }

    #[test]
    fn test_executed_too_few_aborts() {
        let p = pipeline(DivideConfig::default(), ReversionConfig::default());
        let result = p.validate(&parent(10), 10, &request("abcdefghix", 0.4, 1.0));
        assert_eq!(result, Err(DivideFailure::ExecutedTooFew));
        assert_eq!(p.validate(&parent(10), 10, &request("abcdefghix", 0.5, 1.0)), Ok(()));
    }

    #[test]
    fn test_validation_order() {
        let p = pipeline(
            DivideConfig {
                required_task: Some(0),
                ..DivideConfig::default()
            },
            ReversionConfig::default(),
        );
        let mut phen = parent(10);
        phen.fertile = false;
        assert_eq!(
            p.validate(&phen, 10, &request("ab", 0.0, 0.0)),
            Err(DivideFailure::Infertile)
        );
        phen.fertile = true;
        assert_eq!(
            p.validate(&phen, 10, &request("ab", 0.0, 0.0)),
            Err(DivideFailure::MissingTask)
        );
        phen.complete_task(0, 2.0);
        assert_eq!(
            p.validate(&phen, 10, &request("ab", 0.0, 0.0)),
            Err(DivideFailure::ChildSizeRange)
        );
        assert_eq!(
            p.validate(&phen, 10, &request("abcdefghix", 0.9, 0.1)),
            Err(DivideFailure::CopiedTooFew)
        );
    }

    #[test]
    fn test_immunity_task_waives_requirement() {
        let p = pipeline(
            DivideConfig {
                required_task: Some(0),
                immunity_task: Some(3),
                ..DivideConfig::default()
            },
            ReversionConfig::default(),
        );
        let mut phen = parent(4);
        phen.complete_task(3, 1.0);
        assert_eq!(p.validate(&phen, 4, &request("abcx", 1.0, 1.0)), Ok(()));
    }

    #[test]
    fn test_absolute_genome_limits() {
        let p = pipeline(
            DivideConfig {
                max_genome_size: 5,
                ..DivideConfig::default()
            },
            ReversionConfig::default(),
        );
        assert_eq!(
            p.validate(&parent(5), 5, &request("abcdefx", 1.0, 1.0)),
            Err(DivideFailure::GenomeSize)
        );
    }

    #[test]
    fn test_fitness_classes() {
        let config = ReversionConfig {
            neutral_min: 0.1,
            neutral_max: 0.1,
            ..ReversionConfig::default()
        };
        assert_eq!(FitnessClass::classify(0.0, 1.0, &config), FitnessClass::Fatal);
        assert_eq!(FitnessClass::classify(0.8, 1.0, &config), FitnessClass::Detrimental);
        assert_eq!(FitnessClass::classify(1.05, 1.0, &config), FitnessClass::Neutral);
        assert_eq!(FitnessClass::classify(1.2, 1.0, &config), FitnessClass::Beneficial);
    }

    #[test]
    fn test_fatal_mutation_reverted() {
        let p = pipeline(
            DivideConfig::default(),
            ReversionConfig {
                revert_fatal: 1.0,
                ..ReversionConfig::default()
            },
        );
        let runtime = Runtime::new(Arc::new(ReplicatorFactory::default()));
        let parent_genome: Genome = "abcx".parse().unwrap();
        // No divide symbol left, so the child cannot replicate.
        let mut child: Genome = "abca".parse().unwrap();
        let counts = MutationCounts {
            point: 1,
            ..MutationCounts::default()
        };
        let mut rng = RandomSource::new(1);
        p.revert(&runtime, &parent_genome, &parent_genome, &mut child, &counts, &mut rng)
            .unwrap();
        assert_eq!(child, parent_genome);
    }

    #[test]
    fn test_fatal_mutation_sterilized() {
        let p = pipeline(
            DivideConfig::default(),
            ReversionConfig {
                sterilize_fatal: 1.0,
                ..ReversionConfig::default()
            },
        );
        let runtime = Runtime::new(Arc::new(ReplicatorFactory::default()));
        let parent_genome: Genome = "abcx".parse().unwrap();
        let mut child: Genome = "abca".parse().unwrap();
        let counts = MutationCounts {
            point: 1,
            ..MutationCounts::default()
        };
        let mut rng = RandomSource::new(1);
        let result = p.revert(&runtime, &parent_genome, &parent_genome, &mut child, &counts, &mut rng);
        assert_eq!(result, Err(DivideFailure::Sterilized));
    }

    #[test]
    fn test_request_sizes() {
        let r = request("abcdefghij", 0.45, 0.5);
        assert_eq!(r.sizes(20), (5, 9));
        let r = request("abcd", f64::NAN, 2.0);
        assert_eq!(r.sizes(4), (4, 0));
    }
}
