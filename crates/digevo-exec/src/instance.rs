//! Executor interface implemented by organism hardware.

use crate::context::{ExecutionContext, ExecutionReport};
use digevo_core::RandomSource;
use digevo_genome::Genome;

/// Virtual hardware running one organism.
///
/// `execute` runs at most `budget` cycles and reports what it consumed along
/// with any requests, in the order they were raised. Instruction semantics
/// are entirely up to the implementation.
pub trait Hardware: Send {
    fn execute(
        &mut self,
        ctx: &ExecutionContext,
        budget: u64,
        rng: &mut RandomSource,
    ) -> ExecutionReport;

    /// Restart from the beginning of `genome`.
    ///
    /// Called on a parent after each divide it completes.
    fn reset(&mut self, genome: &Genome);

    /// Genome the hardware is currently running.
    fn genome(&self) -> &Genome;

    fn genome_mut(&mut self) -> &mut Genome;
}

/// Builds hardware for new organisms and scores genomes in isolation.
pub trait HardwareFactory: Send + Sync {
    fn create(&self, genome: &Genome) -> Box<dyn Hardware>;

    /// Fitness of `genome` run alone; 0 means it can never reproduce.
    fn test_fitness(&self, genome: &Genome) -> f64;
}
