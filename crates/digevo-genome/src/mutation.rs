//! Mutation operators for offspring genomes.
//!
//! Offspring mutation is an ordered list of stages, each with its own rate.
//! Stages whose rate is zero are dropped when the [`Mutator`] is built, so a
//! disabled operator never consumes a random draw.

use crate::genome::Genome;
use crate::instruction::{Instruction, InstructionSet};
use crate::validation::GenomeLimits;
use digevo_core::{MutationRates, RandomSource, SlipFillMode};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MutationKind {
    Point,
    Insert,
    Delete,
    /// One of point, insert or delete, chosen at random
    Uniform,
    /// Duplicate or remove a contiguous region
    Slip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MutationScope {
    /// Independent trial at every site
    PerSite,
    /// At most one event per divide
    OncePerDivide,
    /// Poisson-distributed number of events per divide
    Poisson,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MutationStage {
    pub scope: MutationScope,
    pub kind: MutationKind,
    /// Probability, or the Poisson mean
    pub rate: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationCounts {
    pub point: u32,
    pub insert: u32,
    pub delete: u32,
    pub slip: u32,
}

impl MutationCounts {
    pub fn total(&self) -> u32 {
        self.point + self.insert + self.delete + self.slip
    }
}

pub struct Mutator {
    rates: MutationRates,
    inst_set: InstructionSet,
    stages: Vec<MutationStage>,
}

impl Mutator {
    pub fn new(rates: MutationRates, inst_set: InstructionSet) -> Self {
        let stages = offspring_stages(&rates);
        Self {
            rates,
            inst_set,
            stages,
        }
    }

    pub fn rates(&self) -> &MutationRates {
        &self.rates
    }

    pub fn inst_set(&self) -> &InstructionSet {
        &self.inst_set
    }

    /// Active offspring stages, in application order.
    pub fn stages(&self) -> &[MutationStage] {
        &self.stages
    }

    /// Apply every offspring stage in order.
    pub fn mutate_offspring(
        &self,
        genome: &mut Genome,
        limits: &GenomeLimits,
        rng: &mut RandomSource,
    ) -> MutationCounts {
        let mut counts = MutationCounts::default();
        for stage in &self.stages {
            self.apply_stage(stage, genome, limits, rng, &mut counts);
        }
        counts
    }

    pub fn mutate_injected(
        &self,
        genome: &mut Genome,
        limits: &GenomeLimits,
        rng: &mut RandomSource,
    ) -> MutationCounts {
        self.mutate_sites(
            genome,
            self.rates.inject_mut,
            self.rates.inject_ins,
            self.rates.inject_del,
            limits,
            rng,
        )
    }

    /// Point mutations on a parent's running genome after it divides.
    pub fn mutate_parent(&self, genome: &mut Genome, rng: &mut RandomSource) -> MutationCounts {
        self.mutate_sites(genome, self.rates.parent_mut, 0.0, 0.0, &GenomeLimits::unbounded(), rng)
    }

    /// Per-site point, insertion and deletion with explicit rates.
    pub fn mutate_sites(
        &self,
        genome: &mut Genome,
        point: f64,
        insert: f64,
        delete: f64,
        limits: &GenomeLimits,
        rng: &mut RandomSource,
    ) -> MutationCounts {
        let mut counts = MutationCounts::default();
        for (kind, rate) in [
            (MutationKind::Point, point),
            (MutationKind::Insert, insert),
            (MutationKind::Delete, delete),
        ] {
            if rate > 0.0 {
                let stage = MutationStage {
                    scope: MutationScope::PerSite,
                    kind,
                    rate,
                };
                self.apply_stage(&stage, genome, limits, rng, &mut counts);
            }
        }
        counts
    }

    fn apply_stage(
        &self,
        stage: &MutationStage,
        genome: &mut Genome,
        limits: &GenomeLimits,
        rng: &mut RandomSource,
        counts: &mut MutationCounts,
    ) {
        match stage.scope {
            MutationScope::PerSite if stage.kind == MutationKind::Point => {
                for site in 0..genome.len() {
                    if rng.p(stage.rate) {
                        genome.set(site, self.random_instruction(rng));
                        counts.point += 1;
                    }
                }
            }
            MutationScope::PerSite => {
                let trials = genome.len();
                let hits = (0..trials).filter(|_| rng.p(stage.rate)).count();
                for _ in 0..hits {
                    self.apply_once(stage.kind, genome, limits, rng, counts);
                }
            }
            MutationScope::OncePerDivide => {
                if rng.p(stage.rate) {
                    self.apply_once(stage.kind, genome, limits, rng, counts);
                }
            }
            MutationScope::Poisson => {
                let hits = rng.next_poisson(stage.rate);
                for _ in 0..hits {
                    self.apply_once(stage.kind, genome, limits, rng, counts);
                }
            }
        }
    }

    fn apply_once(
        &self,
        kind: MutationKind,
        genome: &mut Genome,
        limits: &GenomeLimits,
        rng: &mut RandomSource,
        counts: &mut MutationCounts,
    ) {
        match kind {
            MutationKind::Point => {
                if genome.is_empty() {
                    return;
                }
                let site = rng.next_int(genome.len());
                genome.set(site, self.random_instruction(rng));
                counts.point += 1;
            }
            MutationKind::Insert => {
                if !limits.can_grow(genome.len()) {
                    return;
                }
                let site = rng.next_int(genome.len() + 1);
                let inst = self.random_instruction(rng);
                genome.insert(site, inst);
                counts.insert += 1;
            }
            MutationKind::Delete => {
                if !limits.can_shrink(genome.len()) {
                    return;
                }
                let site = rng.next_int(genome.len());
                genome.remove(site);
                counts.delete += 1;
            }
            MutationKind::Uniform => {
                let chosen = match rng.next_int(3) {
                    0 => MutationKind::Point,
                    1 => MutationKind::Insert,
                    _ => MutationKind::Delete,
                };
                self.apply_once(chosen, genome, limits, rng, counts);
            }
            MutationKind::Slip => {
                if self.slip(genome, limits, rng) {
                    counts.slip += 1;
                }
            }
        }
    }

    /// Duplicate `from..to` after itself, or remove `to..from`.
    fn slip(&self, genome: &mut Genome, limits: &GenomeLimits, rng: &mut RandomSource) -> bool {
        let len = genome.len();
        let from = rng.next_int(len + 1);
        let to = rng.next_int(len + 1);

        if from < to {
            let added = to - from;
            if limits.max_size != 0 && len + added > limits.max_size {
                return false;
            }
            let region = self.slip_fill(&genome.as_slice()[from..to], rng);
            genome.splice_in(to, &region);
            true
        } else if from > to {
            let removed = from - to;
            if len - removed < limits.floor() {
                return false;
            }
            genome.cut(to, from);
            true
        } else {
            false
        }
    }

    fn slip_fill(&self, region: &[Instruction], rng: &mut RandomSource) -> Vec<Instruction> {
        match self.rates.slip_fill_mode {
            SlipFillMode::Duplication => region.to_vec(),
            SlipFillMode::NopX => vec![self.inst_set.nop_x(); region.len()],
            SlipFillMode::NopC => vec![self.inst_set.nop_c(); region.len()],
            SlipFillMode::Random => region.iter().map(|_| self.random_instruction(rng)).collect(),
            SlipFillMode::Scrambled => {
                let mut scrambled = region.to_vec();
                rng.shuffle(&mut scrambled);
                scrambled
            }
        }
    }

    fn random_instruction(&self, rng: &mut RandomSource) -> Instruction {
        Instruction(rng.next_int(self.inst_set.size()) as u8)
    }
}

fn offspring_stages(rates: &MutationRates) -> Vec<MutationStage> {
    use MutationKind::*;
    use MutationScope::*;

    let ordered = [
        (PerSite, Point, rates.copy_mut),
        (PerSite, Insert, rates.copy_ins),
        (PerSite, Delete, rates.copy_del),
        (PerSite, Uniform, rates.copy_uniform),
        (PerSite, Slip, rates.copy_slip),
        (PerSite, Point, rates.div_mut),
        (PerSite, Insert, rates.div_ins),
        (PerSite, Delete, rates.div_del),
        (PerSite, Uniform, rates.div_uniform),
        (PerSite, Slip, rates.div_slip),
        (OncePerDivide, Point, rates.divide_mut),
        (OncePerDivide, Insert, rates.divide_ins),
        (OncePerDivide, Delete, rates.divide_del),
        (OncePerDivide, Uniform, rates.divide_uniform),
        (OncePerDivide, Slip, rates.divide_slip),
        (Poisson, Point, rates.divide_poisson_mut_mean),
        (Poisson, Insert, rates.divide_poisson_ins_mean),
        (Poisson, Delete, rates.divide_poisson_del_mean),
        (Poisson, Slip, rates.divide_poisson_slip_mean),
    ];

    ordered
        .into_iter()
        .filter(|&(_, _, rate)| rate > 0.0)
        .map(|(scope, kind, rate)| MutationStage { scope, kind, rate })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn genome(s: &str) -> Genome {
        s.parse().unwrap()
    }

    fn mutator(rates: MutationRates) -> Mutator {
        Mutator::new(rates, InstructionSet::default())
    }

    #[test]
    fn test_no_rates_no_stages() {
        let m = mutator(MutationRates::none());
        assert!(m.stages().is_empty());

        let mut g = genome("abcdefghij");
        let mut rng = RandomSource::new(11);
        let mut reference = RandomSource::new(11);
        let counts = m.mutate_offspring(&mut g, &GenomeLimits::unbounded(), &mut rng);
        assert_eq!(counts.total(), 0);
        assert_eq!(g.to_string(), "abcdefghij");
        assert_eq!(rng.next_uniform(), reference.next_uniform());
    }

    #[test]
    fn test_stage_order() {
        let rates = MutationRates {
            copy_mut: 0.1,
            divide_ins: 0.2,
            divide_del: 0.0,
            div_slip: 0.3,
            divide_poisson_mut_mean: 1.0,
            ..MutationRates::none()
        };
        let m = mutator(rates);
        let kinds: Vec<(MutationScope, MutationKind)> =
            m.stages().iter().map(|s| (s.scope, s.kind)).collect();
        assert_eq!(
            kinds,
            vec![
                (MutationScope::PerSite, MutationKind::Point),
                (MutationScope::PerSite, MutationKind::Slip),
                (MutationScope::OncePerDivide, MutationKind::Insert),
                (MutationScope::Poisson, MutationKind::Point),
            ]
        );
    }

    #[test]
    fn test_certain_divide_insertion() {
        let m = mutator(MutationRates {
            divide_ins: 1.0,
            ..MutationRates::none()
        });
        let mut g = genome("aaaaaaaaaa");
        let mut rng = RandomSource::new(5);
        let counts = m.mutate_offspring(&mut g, &GenomeLimits::unbounded(), &mut rng);
        assert_eq!(counts.insert, 1);
        assert_eq!(g.len(), 11);
    }

    #[test]
    fn test_insertion_respects_max_size() {
        let m = mutator(MutationRates {
            copy_ins: 1.0,
            ..MutationRates::none()
        });
        let mut g = genome("aaaaa");
        let mut rng = RandomSource::new(5);
        let limits = GenomeLimits { min_size: 0, max_size: 7 };
        let counts = m.mutate_offspring(&mut g, &limits, &mut rng);
        assert_eq!(g.len(), 7);
        assert_eq!(counts.insert, 2);
    }

    #[test]
    fn test_deletion_keeps_one_site() {
        let m = mutator(MutationRates {
            copy_del: 1.0,
            ..MutationRates::none()
        });
        let mut g = genome("abcd");
        let mut rng = RandomSource::new(8);
        m.mutate_offspring(&mut g, &GenomeLimits::unbounded(), &mut rng);
        assert_eq!(g.len(), 1);
    }

    #[test]
    fn test_slip_fill_nop_c() {
        let m = mutator(MutationRates {
            divide_slip: 1.0,
            slip_fill_mode: SlipFillMode::NopC,
            ..MutationRates::none()
        });
        let original = genome("ddddddddddddddddddddd");
        for seed in 1..50 {
            let mut g = original.clone();
            let mut rng = RandomSource::new(seed);
            m.mutate_offspring(&mut g, &GenomeLimits::unbounded(), &mut rng);
            // Every added site is nop-C; deletions only remove 'd'.
            assert!(g.iter().all(|i| *i == Instruction(3) || *i == Instruction(2)));
            if g.len() > original.len() {
                let added = g.iter().filter(|i| **i == Instruction(2)).count();
                assert_eq!(added, g.len() - original.len());
            }
        }
    }

    #[test]
    fn test_parent_mutation_keeps_length() {
        let m = mutator(MutationRates {
            parent_mut: 1.0,
            ..MutationRates::none()
        });
        let mut g = genome("abcabcabc");
        let mut rng = RandomSource::new(2);
        let counts = m.mutate_parent(&mut g, &mut rng);
        assert_eq!(counts.point, 9);
        assert_eq!(g.len(), 9);
    }

    #[test]
    fn test_deterministic_for_seed() {
        let m = mutator(MutationRates {
            copy_mut: 0.2,
            copy_ins: 0.05,
            copy_del: 0.05,
            divide_slip: 0.5,
            ..MutationRates::none()
        });
        let run = |seed| {
            let mut g = genome("abcdefghijklmnopqrstuvwxyz");
            let mut rng = RandomSource::new(seed);
            m.mutate_offspring(&mut g, &GenomeLimits::unbounded(), &mut rng);
            g
        };
        assert_eq!(run(99), run(99));
    }

    proptest! {
        #[test]
        fn prop_length_within_limits(
            seed in 1u64..10_000,
            len in 3usize..40,
            ins in 0.0f64..0.5,
            del in 0.0f64..0.5,
            slip in 0.0f64..1.0,
        ) {
            let m = mutator(MutationRates {
                copy_ins: ins,
                copy_del: del,
                divide_slip: slip,
                divide_poisson_ins_mean: 1.0,
                ..MutationRates::none()
            });
            let limits = GenomeLimits { min_size: 2, max_size: 50 };
            let mut g = Genome::new(vec![Instruction(1); len]);
            let mut rng = RandomSource::new(seed);
            m.mutate_offspring(&mut g, &limits, &mut rng);
            prop_assert!(g.len() >= 2);
            prop_assert!(g.len() <= 50);
            prop_assert!(g.iter().all(|i| i.index() < 26));
        }
    }
}
