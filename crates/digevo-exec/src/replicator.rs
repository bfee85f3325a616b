//! Reference hardware: an idealized self-copier.
//!
//! Each gestation costs `cycles_per_site` cycles per genome site plus a fixed
//! overhead. When the copy completes the replicator reports the motifs it
//! carries as completed tasks, optionally takes up a resource, and requests a
//! divide with an exact copy of itself. Genomes without the divide symbol keep
//! copying forever and never reproduce.

use crate::context::{ExecutionContext, ExecutionReport, OrganismRequest};
use crate::instance::{Hardware, HardwareFactory};
use digevo_core::RandomSource;
use digevo_genome::{Genome, Instruction};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Task reward for carrying a symbol motif.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRule {
    pub task: usize,
    pub motif: String,
    pub bonus: f64,
}

/// Resource taken at every divide.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceUptake {
    pub resource: String,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplicatorConfig {
    pub cycles_per_site: u64,
    pub divide_overhead: u64,
    /// Symbol a genome must contain to divide
    pub divide_symbol: char,
    pub tasks: Vec<TaskRule>,
    pub uptake: Option<ResourceUptake>,
}

impl Default for ReplicatorConfig {
    fn default() -> Self {
        Self {
            cycles_per_site: 5,
            divide_overhead: 10,
            divide_symbol: 'x',
            tasks: Vec::new(),
            uptake: None,
        }
    }
}

impl ReplicatorConfig {
    pub fn gestation_cycles(&self, genome: &Genome) -> u64 {
        (genome.len() as u64 * self.cycles_per_site + self.divide_overhead).max(1)
    }

    fn is_viable(&self, genome: &Genome) -> bool {
        match Instruction::from_char(self.divide_symbol) {
            Ok(symbol) => genome.contains(symbol),
            Err(_) => false,
        }
    }

    fn matched_tasks<'a>(&'a self, genome: &Genome) -> impl Iterator<Item = &'a TaskRule> {
        let text = genome.to_string();
        self.tasks
            .iter()
            .filter(move |rule| !rule.motif.is_empty() && text.contains(&rule.motif))
    }
}

pub struct Replicator {
    config: ReplicatorConfig,
    genome: Genome,
    progress: u64,
}

impl Replicator {
    pub fn new(config: ReplicatorConfig, genome: Genome) -> Self {
        Self {
            config,
            genome,
            progress: 0,
        }
    }

    pub fn progress(&self) -> u64 {
        self.progress
    }
}

impl Hardware for Replicator {
    fn execute(
        &mut self,
        ctx: &ExecutionContext,
        budget: u64,
        _rng: &mut RandomSource,
    ) -> ExecutionReport {
        let needed = self.config.gestation_cycles(&self.genome);
        let remaining = needed.saturating_sub(self.progress);

        if budget < remaining || !self.config.is_viable(&self.genome) {
            self.progress = (self.progress + budget).min(needed);
            return ExecutionReport::idle(budget);
        }

        self.progress = 0;
        let mut requests = Vec::new();
        for rule in self.config.matched_tasks(&self.genome) {
            requests.push(OrganismRequest::TaskCompleted {
                task: rule.task,
                bonus: rule.bonus,
            });
        }
        if let Some(uptake) = &self.config.uptake {
            requests.push(OrganismRequest::ConsumeResource {
                name: uptake.resource.clone(),
                amount: uptake.amount,
            });
        }
        requests.push(OrganismRequest::Divide {
            offspring: self.genome.clone(),
            executed_fraction: 1.0,
            copied_fraction: 1.0,
        });

        trace!(
            organism_id = %ctx.organism_id,
            cycles = remaining,
            "Replicator finished gestation"
        );

        ExecutionReport {
            cycles_consumed: remaining,
            requests,
        }
    }

    fn reset(&mut self, genome: &Genome) {
        self.genome = genome.clone();
        self.progress = 0;
    }

    fn genome(&self) -> &Genome {
        &self.genome
    }

    fn genome_mut(&mut self) -> &mut Genome {
        &mut self.genome
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReplicatorFactory {
    config: ReplicatorConfig,
}

impl ReplicatorFactory {
    pub fn new(config: ReplicatorConfig) -> Self {
        Self { config }
    }
}

impl HardwareFactory for ReplicatorFactory {
    fn create(&self, genome: &Genome) -> Box<dyn Hardware> {
        Box::new(Replicator::new(self.config.clone(), genome.clone()))
    }

    fn test_fitness(&self, genome: &Genome) -> f64 {
        if !self.config.is_viable(genome) {
            return 0.0;
        }
        let bonus: f64 = self
            .config
            .matched_tasks(genome)
            .map(|rule| rule.bonus)
            .product();
        genome.len() as f64 * bonus / self.config.gestation_cycles(genome) as f64
    }
}
