//! Population engine.
//!
//! A [`World`] owns the grid of cells, the time-slice scheduler, resources,
//! genotypes and demes, and advances them one update at a time. Organisms run
//! on pluggable hardware from `digevo-exec`; everything they ask for comes back
//! as requests that the world applies in order.

pub mod birth;
pub mod deme;
pub mod genotype;
pub mod grid;
pub mod migration;
pub mod organism;
pub mod reproduction;
pub mod resources;
pub mod scheduler;
pub mod world;

pub use birth::{BirthPlacementPolicy, ReaperQueue};
pub use deme::{Deme, DemeManager, DemeReplicationPolicy, DemeTrigger, SourceAction};
pub use genotype::{Genotype, GenotypeArena};
pub use grid::{Cell, Grid};
pub use migration::{HubEndpoint, InProcessHub, MigrationMessage, MigrationTransport, Migrator};
pub use organism::Organism;
pub use reproduction::{DivideFailure, DivideOutcome, DivideRequest, DivideStage, FitnessClass, ReproductionPipeline};
pub use resources::ResourceCount;
pub use scheduler::{Scheduler, SchedulerPolicy, TimeSlice, WeightTree};
pub use world::World;
