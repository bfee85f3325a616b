//! Execution context and organism requests.

use digevo_core::{CellId, OrganismId};
use digevo_genome::Genome;

/// Read-only view of the organism and its cell, refreshed before each slice.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub organism_id: OrganismId,
    pub cell: CellId,
    pub update: u64,
    pub merit: f64,
    pub cur_bonus: f64,
    /// Updates lived
    pub age: u64,
    pub cycles_used: u64,
    /// Resource levels visible from the cell, indexed by resource id
    pub resources: Vec<f64>,
}

impl ExecutionContext {
    pub fn get_merit(&self) -> f64 {
        self.merit
    }

    pub fn resource_level(&self, resource: usize) -> f64 {
        self.resources.get(resource).copied().unwrap_or(0.0)
    }
}

/// Requests an organism makes of the world during execution
#[derive(Debug, Clone, PartialEq)]
pub enum OrganismRequest {
    /// Offspring genome is complete
    Divide {
        offspring: Genome,
        /// Fraction of the parent genome executed this gestation
        executed_fraction: f64,
        /// Fraction of the offspring copied by the parent
        copied_fraction: f64,
    },
    Death,
    /// Task performed; `bonus` multiplies the current bonus
    TaskCompleted { task: usize, bonus: f64 },
    ReactionCompleted { reaction: usize },
    SetMerit(f64),
    ConsumeResource { name: String, amount: f64 },
    ReleaseResource { name: String, amount: f64 },
}

impl OrganismRequest {
    pub fn is_divide(&self) -> bool {
        matches!(self, OrganismRequest::Divide { .. })
    }
}

/// Outcome of one time slice
#[derive(Debug, Clone, Default)]
pub struct ExecutionReport {
    pub cycles_consumed: u64,
    pub requests: Vec<OrganismRequest>,
}

impl ExecutionReport {
    pub fn idle(cycles_consumed: u64) -> Self {
        Self {
            cycles_consumed,
            requests: Vec::new(),
        }
    }
}
