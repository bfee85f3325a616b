//! Organism execution interface.
//!
//! The world never interprets instructions itself. It hands each organism's
//! hardware a cycle budget and reacts to the requests that come back. This
//! crate provides:
//! - the `Hardware` / `HardwareFactory` traits
//! - the per-slice context and the request vocabulary
//! - a reference self-copying hardware used by tests and the driver

pub mod context;
pub mod instance;
pub mod replicator;

pub use context::{ExecutionContext, ExecutionReport, OrganismRequest};
pub use instance::{Hardware, HardwareFactory};
pub use replicator::{Replicator, ReplicatorConfig, ReplicatorFactory, ResourceUptake, TaskRule};

use digevo_core::RandomSource;
use digevo_genome::Genome;
use digevo_core::phenotype::sanitize_merit;
use std::sync::Arc;
use tracing::warn;

/// Front door to the executor: builds hardware and enforces cycle grants.
#[derive(Clone)]
pub struct Runtime {
    factory: Arc<dyn HardwareFactory>,
}

impl Runtime {
    pub fn new(factory: Arc<dyn HardwareFactory>) -> Self {
        Self { factory }
    }

    pub fn instantiate(&self, genome: &Genome) -> Box<dyn Hardware> {
        self.factory.create(genome)
    }

    /// Isolated fitness, never negative or NaN.
    pub fn test_fitness(&self, genome: &Genome) -> f64 {
        sanitize_merit(self.factory.test_fitness(genome))
    }

    /// Run one slice. Consumption is clamped to the grant.
    pub fn execute(
        &self,
        hardware: &mut dyn Hardware,
        ctx: &ExecutionContext,
        budget: u64,
        rng: &mut RandomSource,
    ) -> ExecutionReport {
        let mut report = hardware.execute(ctx, budget, rng);
        if report.cycles_consumed > budget {
            warn!(
                organism_id = %ctx.organism_id,
                budget,
                consumed = report.cycles_consumed,
                "Hardware overran its cycle grant"
            );
            report.cycles_consumed = budget;
        }
        report
    }
}
