//! Per-organism phenotype: merit, bonus, task record and gestation counters.

use crate::{BaseMeritMethod, MeritConfig};
use serde::{Deserialize, Serialize};

/// Base merit for a genome of the given sizes.
pub fn base_merit(config: &MeritConfig, full_size: usize, copied_size: usize, executed_size: usize) -> f64 {
    let least = copied_size.min(executed_size) as f64;
    let merit = match config.base_merit_method {
        BaseMeritMethod::Constant => config.base_const_merit,
        BaseMeritMethod::CopiedSize => copied_size as f64,
        BaseMeritMethod::ExecutedSize => executed_size as f64,
        BaseMeritMethod::FullSize => full_size as f64,
        BaseMeritMethod::LeastSize => least,
        BaseMeritMethod::SqrtLeastSize => least.sqrt(),
    };
    sanitize_merit(merit)
}

/// Merit is never negative and never NaN.
pub fn sanitize_merit(merit: f64) -> f64 {
    if merit.is_finite() && merit > 0.0 {
        merit
    } else if merit == f64::INFINITY {
        f64::MAX
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Phenotype {
    pub merit: f64,
    /// Multiplier accumulated from tasks during the current gestation
    pub cur_bonus: f64,
    pub cur_task_counts: Vec<u32>,
    pub last_task_counts: Vec<u32>,
    pub cur_reaction_counts: Vec<u32>,
    pub last_reaction_counts: Vec<u32>,
    /// Updates lived
    pub age: u64,
    /// Cycles executed over the whole lifetime
    pub cycles_used: u64,
    /// Value of `cycles_used` at the last divide
    pub gestation_start: u64,
    /// Cycles taken by the last complete gestation
    pub gestation_time: u64,
    pub generation: u64,
    pub genome_length: usize,
    pub copied_size: usize,
    pub executed_size: usize,
    /// merit / gestation_time of the last gestation
    pub fitness: f64,
    pub fertile: bool,
    pub num_divides: u64,
    /// Cycle budget before death by old age, if limited
    pub max_cycles: Option<u64>,
}

impl Phenotype {
    /// Phenotype of an organism that enters the world without a parent.
    pub fn injected(genome_length: usize, config: &MeritConfig) -> Self {
        Self {
            merit: base_merit(config, genome_length, genome_length, genome_length),
            cur_bonus: config.default_bonus,
            cur_task_counts: Vec::new(),
            last_task_counts: Vec::new(),
            cur_reaction_counts: Vec::new(),
            last_reaction_counts: Vec::new(),
            age: 0,
            cycles_used: 0,
            gestation_start: 0,
            gestation_time: 0,
            generation: 0,
            genome_length,
            copied_size: genome_length,
            executed_size: genome_length,
            fitness: 0.0,
            fertile: true,
            num_divides: 0,
            max_cycles: None,
        }
    }

    /// Phenotype of an offspring, taken after the parent's `divide_reset`.
    pub fn offspring(parent: &Phenotype, genome_length: usize, config: &MeritConfig) -> Self {
        let mut child = Self::injected(genome_length, config);
        child.merit = parent.merit;
        child.generation = parent.generation;
        child.gestation_time = parent.gestation_time;
        child.fitness = parent.fitness;
        child.copied_size = parent.copied_size;
        child.executed_size = parent.executed_size;
        child.last_task_counts = parent.last_task_counts.clone();
        child.last_reaction_counts = parent.last_reaction_counts.clone();
        child
    }

    /// Close out a gestation: new merit from size and bonus, counters rolled over.
    pub fn divide_reset(&mut self, copied_size: usize, executed_size: usize, config: &MeritConfig) {
        let bonus = config.child_bonus_override.unwrap_or(self.cur_bonus);
        self.copied_size = copied_size;
        self.executed_size = executed_size;
        self.merit = sanitize_merit(base_merit(config, self.genome_length, copied_size, executed_size) * bonus);
        self.gestation_time = self.cycles_used.saturating_sub(self.gestation_start);
        self.gestation_start = self.cycles_used;
        self.fitness = self.calc_fitness();
        self.cur_bonus = config.default_bonus;
        self.last_task_counts = std::mem::take(&mut self.cur_task_counts);
        self.last_reaction_counts = std::mem::take(&mut self.cur_reaction_counts);
        self.generation += 1;
        self.num_divides += 1;
    }

    pub fn calc_fitness(&self) -> f64 {
        if self.gestation_time == 0 {
            return 0.0;
        }
        self.merit / self.gestation_time as f64
    }

    pub fn set_merit(&mut self, merit: f64) {
        self.merit = sanitize_merit(merit);
    }

    pub fn complete_task(&mut self, task: usize, bonus: f64) {
        bump(&mut self.cur_task_counts, task);
        let bonus = if bonus.is_finite() && bonus >= 0.0 { bonus } else { 1.0 };
        self.cur_bonus = sanitize_merit(self.cur_bonus * bonus);
    }

    pub fn complete_reaction(&mut self, reaction: usize) {
        bump(&mut self.cur_reaction_counts, reaction);
    }

    /// Task performed in the current or the previous gestation.
    pub fn has_task(&self, task: usize) -> bool {
        count_at(&self.cur_task_counts, task) > 0 || count_at(&self.last_task_counts, task) > 0
    }

    pub fn has_reaction(&self, reaction: usize) -> bool {
        count_at(&self.cur_reaction_counts, reaction) > 0
            || count_at(&self.last_reaction_counts, reaction) > 0
    }

    /// Age per unit merit; organisms with no merit rank by age alone.
    pub fn merit_ratio(&self) -> f64 {
        if self.merit > 0.0 {
            self.age as f64 / self.merit
        } else {
            self.age as f64
        }
    }

    pub fn is_past_age_limit(&self) -> bool {
        matches!(self.max_cycles, Some(limit) if self.cycles_used >= limit)
    }
}

fn bump(counts: &mut Vec<u32>, index: usize) {
    if counts.len() <= index {
        counts.resize(index + 1, 0);
    }
    counts[index] = counts[index].saturating_add(1);
}

fn count_at(counts: &[u32], index: usize) -> u32 {
    counts.get(index).copied().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> MeritConfig {
        MeritConfig::default()
    }

    #[test]
    fn test_base_merit_methods() {
        let mut cfg = config();
        assert_eq!(base_merit(&cfg, 100, 80, 60), 60.0);
        cfg.base_merit_method = BaseMeritMethod::Constant;
        assert_eq!(base_merit(&cfg, 100, 80, 60), 100.0);
        cfg.base_merit_method = BaseMeritMethod::FullSize;
        assert_eq!(base_merit(&cfg, 100, 80, 60), 100.0);
        cfg.base_merit_method = BaseMeritMethod::SqrtLeastSize;
        assert_eq!(base_merit(&cfg, 100, 64, 81), 8.0);
    }

    #[test]
    fn test_sanitize_merit() {
        assert_eq!(sanitize_merit(-5.0), 0.0);
        assert_eq!(sanitize_merit(f64::NAN), 0.0);
        assert_eq!(sanitize_merit(f64::NEG_INFINITY), 0.0);
        assert_eq!(sanitize_merit(f64::INFINITY), f64::MAX);
        assert_eq!(sanitize_merit(3.5), 3.5);
    }

    #[test]
    fn test_divide_reset_applies_bonus() {
        let cfg = config();
        let mut phenotype = Phenotype::injected(50, &cfg);
        phenotype.cycles_used = 400;
        phenotype.complete_task(2, 2.0);
        phenotype.complete_task(3, 2.0);
        phenotype.divide_reset(50, 40, &cfg);

        assert_eq!(phenotype.merit, 160.0);
        assert_eq!(phenotype.gestation_time, 400);
        assert_eq!(phenotype.fitness, 0.4);
        assert_eq!(phenotype.cur_bonus, 1.0);
        assert_eq!(phenotype.generation, 1);
        assert!(phenotype.has_task(2));
        assert!(phenotype.cur_task_counts.is_empty());
    }

    #[test]
    fn test_child_bonus_override() {
        let mut cfg = config();
        cfg.child_bonus_override = Some(1.0);
        let mut phenotype = Phenotype::injected(50, &cfg);
        phenotype.complete_task(0, 8.0);
        phenotype.divide_reset(50, 50, &cfg);
        assert_eq!(phenotype.merit, 50.0);
    }

    #[test]
    fn test_offspring_inherits_merit() {
        let cfg = config();
        let mut parent = Phenotype::injected(30, &cfg);
        parent.cycles_used = 90;
        parent.divide_reset(30, 30, &cfg);
        let child = Phenotype::offspring(&parent, 31, &cfg);
        assert_eq!(child.merit, parent.merit);
        assert_eq!(child.generation, 1);
        assert_eq!(child.cycles_used, 0);
        assert_eq!(child.genome_length, 31);
    }

    #[test]
    fn test_merit_ratio_without_merit() {
        let cfg = config();
        let mut phenotype = Phenotype::injected(10, &cfg);
        phenotype.age = 7;
        phenotype.set_merit(-3.0);
        assert_eq!(phenotype.merit, 0.0);
        assert_eq!(phenotype.merit_ratio(), 7.0);
    }

    #[test]
    fn test_negative_bonus_ignored() {
        let cfg = config();
        let mut phenotype = Phenotype::injected(10, &cfg);
        phenotype.complete_task(0, -4.0);
        assert_eq!(phenotype.cur_bonus, 1.0);
    }
}
