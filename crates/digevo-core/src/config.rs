//! Configuration types for the population engine.
//!
//! Every group has a `Default` that matches the stock experiment setup, and
//! the whole tree loads from JSON. Policy families that used to be integer
//! settings keep a `from_code` constructor so old configuration values can be
//! translated without guesswork.

use crate::{Error, Geometry, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// World dimensions and topology
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Width of the world grid
    pub width: i32,
    /// Height of the world grid
    pub height: i32,
    /// Number of stacked layers (lattice geometry only)
    pub depth: i32,
    pub geometry: Geometry,
    /// Number of demes; the grid is cut into this many horizontal bands
    pub num_demes: usize,
    /// Random seed; 0 picks one from the clock
    pub seed: u64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            width: 60,
            height: 60,
            depth: 1,
            geometry: Geometry::Torus,
            num_demes: 1,
            seed: 0,
        }
    }
}

impl WorldConfig {
    pub fn num_cells(&self) -> usize {
        (self.width.max(0) as usize) * (self.height.max(0) as usize) * (self.depth.max(1) as usize)
    }
}

/// How CPU cycles are shared out each update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlicingMethod {
    Constant,
    Probabilistic,
    Integrated,
    DemeProbabilistic,
    ProportionalDemeProbabilistic,
    ConstantBurst,
}

impl SlicingMethod {
    pub fn from_code(code: i32) -> Result<Self> {
        match code {
            0 => Ok(SlicingMethod::Constant),
            1 => Ok(SlicingMethod::Probabilistic),
            2 => Ok(SlicingMethod::Integrated),
            3 => Ok(SlicingMethod::DemeProbabilistic),
            4 => Ok(SlicingMethod::ProportionalDemeProbabilistic),
            5 => Ok(SlicingMethod::ConstantBurst),
            other => Err(Error::Config(format!("unknown slicing method {}", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub slicing_method: SlicingMethod,
    /// Average cycles granted to each organism per update
    pub ave_time_slice: u32,
    /// Cycles per grant for the burst and probabilistic methods
    pub burst_size: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            slicing_method: SlicingMethod::Probabilistic,
            ave_time_slice: 30,
            burst_size: 1,
        }
    }
}

/// Where an offspring is placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BirthMethod {
    RandomInNeighborhood,
    OldestInNeighborhood,
    LargestAgeMeritInNeighborhood,
    EmptyOnly,
    RandomInPopulation,
    OldestInPopulation,
    RandomInDeme,
    ParentFacing,
    NextCell,
    LargestCyclesInPopulation,
    LargestCyclesInNeighborhood,
}

impl BirthMethod {
    pub fn from_code(code: i32) -> Result<Self> {
        match code {
            0 => Ok(BirthMethod::RandomInNeighborhood),
            1 => Ok(BirthMethod::OldestInNeighborhood),
            2 => Ok(BirthMethod::LargestAgeMeritInNeighborhood),
            3 => Ok(BirthMethod::EmptyOnly),
            4 => Ok(BirthMethod::RandomInPopulation),
            5 => Ok(BirthMethod::OldestInPopulation),
            6 => Ok(BirthMethod::RandomInDeme),
            7 => Ok(BirthMethod::ParentFacing),
            8 => Ok(BirthMethod::NextCell),
            9 => Ok(BirthMethod::LargestCyclesInPopulation),
            10 => Ok(BirthMethod::LargestCyclesInNeighborhood),
            other => Err(Error::Config(format!("unknown birth method {}", other))),
        }
    }

    /// Methods that look only at the parent's neighbors.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            BirthMethod::RandomInNeighborhood
                | BirthMethod::OldestInNeighborhood
                | BirthMethod::LargestAgeMeritInNeighborhood
                | BirthMethod::EmptyOnly
                | BirthMethod::LargestCyclesInNeighborhood
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BirthConfig {
    pub birth_method: BirthMethod,
    /// Fill empty neighbors before replacing anyone
    pub prefer_empty: bool,
    /// The parent's own cell may receive the offspring
    pub allow_parent: bool,
}

impl Default for BirthConfig {
    fn default() -> Self {
        Self {
            birth_method: BirthMethod::RandomInNeighborhood,
            prefer_empty: true,
            allow_parent: true,
        }
    }
}

/// Gates applied before an offspring is accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DivideConfig {
    /// Maximum ratio between parent and offspring lengths, both ways
    pub child_size_range: f64,
    /// Minimum fraction of the offspring copied by the parent
    pub min_copied_lines: f64,
    /// Minimum fraction of the parent executed before dividing
    pub min_exe_lines: f64,
    /// 0 disables the limit
    pub min_genome_size: usize,
    /// 0 disables the limit
    pub max_genome_size: usize,
    pub required_task: Option<usize>,
    /// Completing this task waives `required_task`
    pub immunity_task: Option<usize>,
    pub required_reaction: Option<usize>,
    /// Minimum accumulated bonus
    pub required_bonus: f64,
    /// Chance the parent dies on each successful divide
    pub death_prob: f64,
}

impl Default for DivideConfig {
    fn default() -> Self {
        Self {
            child_size_range: 2.0,
            min_copied_lines: 0.5,
            min_exe_lines: 0.5,
            min_genome_size: 0,
            max_genome_size: 0,
            required_task: None,
            immunity_task: None,
            required_reaction: None,
            required_bonus: 0.0,
            death_prob: 0.0,
        }
    }
}

/// Fill content for slip duplications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlipFillMode {
    Duplication,
    NopX,
    Random,
    Scrambled,
    NopC,
}

impl SlipFillMode {
    pub fn from_code(code: i32) -> Result<Self> {
        match code {
            0 => Ok(SlipFillMode::Duplication),
            1 => Ok(SlipFillMode::NopX),
            2 => Ok(SlipFillMode::Random),
            3 => Ok(SlipFillMode::Scrambled),
            4 => Ok(SlipFillMode::NopC),
            other => Err(Error::Config(format!("unknown slip fill mode {}", other))),
        }
    }
}

/// Mutation rates, grouped by when they apply
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MutationRates {
    // Per site, while copying
    pub copy_mut: f64,
    pub copy_ins: f64,
    pub copy_del: f64,
    pub copy_uniform: f64,
    pub copy_slip: f64,
    // Per site, on divide
    pub div_mut: f64,
    pub div_ins: f64,
    pub div_del: f64,
    pub div_uniform: f64,
    pub div_slip: f64,
    // At most one per divide
    pub divide_mut: f64,
    pub divide_ins: f64,
    pub divide_del: f64,
    pub divide_uniform: f64,
    pub divide_slip: f64,
    // Poisson means per divide
    pub divide_poisson_mut_mean: f64,
    pub divide_poisson_ins_mean: f64,
    pub divide_poisson_del_mean: f64,
    pub divide_poisson_slip_mean: f64,
    // Per site, on injection
    pub inject_mut: f64,
    pub inject_ins: f64,
    pub inject_del: f64,
    /// Per site on the parent's running genome after a divide
    pub parent_mut: f64,
    pub slip_fill_mode: SlipFillMode,
}

impl Default for MutationRates {
    fn default() -> Self {
        Self {
            copy_mut: 0.0075,
            copy_ins: 0.0,
            copy_del: 0.0,
            copy_uniform: 0.0,
            copy_slip: 0.0,
            div_mut: 0.0,
            div_ins: 0.0,
            div_del: 0.0,
            div_uniform: 0.0,
            div_slip: 0.0,
            divide_mut: 0.0,
            divide_ins: 0.05,
            divide_del: 0.05,
            divide_uniform: 0.0,
            divide_slip: 0.0,
            divide_poisson_mut_mean: 0.0,
            divide_poisson_ins_mean: 0.0,
            divide_poisson_del_mean: 0.0,
            divide_poisson_slip_mean: 0.0,
            inject_mut: 0.0,
            inject_ins: 0.0,
            inject_del: 0.0,
            parent_mut: 0.0,
            slip_fill_mode: SlipFillMode::Duplication,
        }
    }
}

impl MutationRates {
    /// All rates zero; offspring are exact copies.
    pub fn none() -> Self {
        Self {
            copy_mut: 0.0,
            divide_ins: 0.0,
            divide_del: 0.0,
            ..Self::default()
        }
    }
}

/// Reversion and sterilization of mutated offspring by fitness class
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReversionConfig {
    pub revert_fatal: f64,
    pub revert_detrimental: f64,
    pub revert_neutral: f64,
    pub revert_beneficial: f64,
    pub sterilize_fatal: f64,
    pub sterilize_detrimental: f64,
    pub sterilize_neutral: f64,
    pub sterilize_beneficial: f64,
    /// Fractional drop still counted as neutral
    pub neutral_min: f64,
    /// Fractional gain still counted as neutral
    pub neutral_max: f64,
}

impl ReversionConfig {
    pub fn is_active(&self) -> bool {
        [
            self.revert_fatal,
            self.revert_detrimental,
            self.revert_neutral,
            self.revert_beneficial,
            self.sterilize_fatal,
            self.sterilize_detrimental,
            self.sterilize_neutral,
            self.sterilize_beneficial,
        ]
        .iter()
        .any(|&p| p > 0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaseMeritMethod {
    Constant,
    CopiedSize,
    ExecutedSize,
    FullSize,
    LeastSize,
    SqrtLeastSize,
}

impl BaseMeritMethod {
    pub fn from_code(code: i32) -> Result<Self> {
        match code {
            0 => Ok(BaseMeritMethod::Constant),
            1 => Ok(BaseMeritMethod::CopiedSize),
            2 => Ok(BaseMeritMethod::ExecutedSize),
            3 => Ok(BaseMeritMethod::FullSize),
            4 => Ok(BaseMeritMethod::LeastSize),
            5 => Ok(BaseMeritMethod::SqrtLeastSize),
            other => Err(Error::Config(format!("unknown base merit method {}", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeritConfig {
    pub base_merit_method: BaseMeritMethod,
    pub base_const_merit: f64,
    /// Bonus every phenotype starts from
    pub default_bonus: f64,
    /// When set, offspring ignore the parent's bonus and use this instead
    pub child_bonus_override: Option<f64>,
}

impl Default for MeritConfig {
    fn default() -> Self {
        Self {
            base_merit_method: BaseMeritMethod::LeastSize,
            base_const_merit: 100.0,
            default_bonus: 1.0,
            child_bonus_override: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeathMethod {
    Never,
    /// Die after `age_limit` cycles
    AgeLimit,
    /// Die after genome length times `age_limit` cycles
    ProportionalAgeLimit,
}

impl DeathMethod {
    pub fn from_code(code: i32) -> Result<Self> {
        match code {
            0 => Ok(DeathMethod::Never),
            1 => Ok(DeathMethod::AgeLimit),
            2 => Ok(DeathMethod::ProportionalAgeLimit),
            other => Err(Error::Config(format!("unknown death method {}", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeathConfig {
    pub death_method: DeathMethod,
    pub age_limit: u64,
    /// Standard deviation of the per-organism limit, drawn at birth
    pub age_deviation: f64,
}

impl Default for DeathConfig {
    fn default() -> Self {
        Self {
            death_method: DeathMethod::ProportionalAgeLimit,
            age_limit: 20,
            age_deviation: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DemeDivideMethod {
    /// Re-found both source and target
    ReplaceBoth,
    /// Re-found the target and reset the source to its founders
    ReplaceTargetResetSource,
    /// Re-found the target only
    ReplaceTarget,
}

impl DemeDivideMethod {
    pub fn from_code(code: i32) -> Result<Self> {
        match code {
            0 => Ok(DemeDivideMethod::ReplaceBoth),
            1 => Ok(DemeDivideMethod::ReplaceTargetResetSource),
            2 => Ok(DemeDivideMethod::ReplaceTarget),
            other => Err(Error::Config(format!("unknown deme divide method {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceReset {
    Both,
    TargetOnly,
    Unchanged,
}

impl ResourceReset {
    pub fn from_code(code: i32) -> Result<Self> {
        match code {
            0 => Ok(ResourceReset::Both),
            1 => Ok(ResourceReset::TargetOnly),
            2 => Ok(ResourceReset::Unchanged),
            other => Err(Error::Config(format!("unknown deme resource reset {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrganismSelection {
    RandomWithReplacement,
    Sequential,
}

impl OrganismSelection {
    pub fn from_code(code: i32) -> Result<Self> {
        match code {
            0 => Ok(OrganismSelection::RandomWithReplacement),
            1 => Ok(OrganismSelection::Sequential),
            other => Err(Error::Config(format!("unknown organism selection {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrganismPlacement {
    DemeMiddle,
    DemeCenter,
    Random,
    Sequential,
}

impl OrganismPlacement {
    pub fn from_code(code: i32) -> Result<Self> {
        match code {
            0 => Ok(OrganismPlacement::DemeMiddle),
            1 => Ok(OrganismPlacement::DemeCenter),
            2 => Ok(OrganismPlacement::Random),
            3 => Ok(OrganismPlacement::Sequential),
            other => Err(Error::Config(format!("unknown organism placement {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrganismFacing {
    Unchanged,
    NorthWest,
    Random,
}

impl OrganismFacing {
    pub fn from_code(code: i32) -> Result<Self> {
        match code {
            0 => Ok(OrganismFacing::Unchanged),
            1 => Ok(OrganismFacing::NorthWest),
            2 => Ok(OrganismFacing::Random),
            other => Err(Error::Config(format!("unknown organism facing {}", other))),
        }
    }
}

/// Deme replication settings. Triggers left at `None` are disabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemeConfig {
    pub max_age: Option<u64>,
    pub max_births: Option<u64>,
    /// Cycles used per organism in the deme
    pub replicate_cpu_cycles: Option<f64>,
    pub replicate_orgs: Option<usize>,
    /// Never replicate a deme that has produced no births
    pub prevent_sterile: bool,
    pub divide_method: DemeDivideMethod,
    pub reset_resources: ResourceReset,
    /// Organisms transferred when a deme replicates
    pub replicate_size: usize,
    pub organism_selection: OrganismSelection,
    pub organism_placement: OrganismPlacement,
    pub organism_facing: OrganismFacing,
    /// Choose empty target demes first
    pub prefer_empty: bool,
    pub use_germline: bool,
    pub germline_copy_mut: f64,
    pub germline_ins_mut: f64,
    pub germline_del_mut: f64,
}

impl Default for DemeConfig {
    fn default() -> Self {
        Self {
            max_age: None,
            max_births: None,
            replicate_cpu_cycles: None,
            replicate_orgs: None,
            prevent_sterile: false,
            divide_method: DemeDivideMethod::ReplaceBoth,
            reset_resources: ResourceReset::Both,
            replicate_size: 1,
            organism_selection: OrganismSelection::RandomWithReplacement,
            organism_placement: OrganismPlacement::DemeMiddle,
            organism_facing: OrganismFacing::Unchanged,
            prefer_empty: false,
            use_germline: false,
            germline_copy_mut: 0.0075,
            germline_ins_mut: 0.05,
            germline_del_mut: 0.05,
        }
    }
}

impl DemeConfig {
    pub fn any_trigger(&self) -> bool {
        self.max_age.is_some()
            || self.max_births.is_some()
            || self.replicate_cpu_cycles.is_some()
            || self.replicate_orgs.is_some()
    }
}

/// Where a resource's quantity lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceScope {
    /// One quantity for the whole world
    Global,
    /// One quantity per cell
    Spatial,
    /// One quantity per deme
    Deme,
}

/// Declaration of a single resource. Spatial quantities are per cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceSpec {
    pub name: String,
    #[serde(default)]
    pub initial: f64,
    #[serde(default)]
    pub inflow: f64,
    #[serde(default)]
    pub outflow: f64,
    /// Fraction lost per update
    #[serde(default)]
    pub decay: f64,
    /// Spatial only: fraction exchanged with neighbors per update
    #[serde(default)]
    pub diffusion: f64,
    #[serde(default = "default_scope")]
    pub scope: ResourceScope,
}

fn default_scope() -> ResourceScope {
    ResourceScope::Global
}

impl ResourceSpec {
    pub fn global(name: &str, initial: f64, inflow: f64, decay: f64) -> Self {
        Self {
            name: name.to_string(),
            initial,
            inflow,
            outflow: 0.0,
            decay,
            diffusion: 0.0,
            scope: ResourceScope::Global,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationStyle {
    /// Random destination world, random arrival cell
    MassAction,
    /// Neighboring world across the edge the offspring was born on
    Spatial,
}

impl MigrationStyle {
    pub fn from_code(code: i32) -> Result<Self> {
        match code {
            0 => Ok(MigrationStyle::MassAction),
            1 => Ok(MigrationStyle::Spatial),
            other => Err(Error::Config(format!("unrecognized migration style {}", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    pub enabled: bool,
    pub style: MigrationStyle,
    /// Chance an eligible offspring leaves for another world
    pub migration_prob: f64,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            style: MigrationStyle::MassAction,
            migration_prob: 0.0,
        }
    }
}

/// Driver exit conditions and reporting cadence
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub max_updates: Option<u64>,
    pub max_generations: Option<f64>,
    /// Stop once the population is empty
    pub exit_on_extinction: bool,
    /// Emit population metrics every N updates
    pub log_interval: u64,
    /// Keep genotypes of dead ancestors of living organisms
    pub track_lineages: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_updates: Some(10_000),
            max_generations: None,
            exit_on_extinction: true,
            log_interval: 100,
            track_lineages: false,
        }
    }
}

/// Complete configuration for one world
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub world: WorldConfig,
    pub scheduler: SchedulerConfig,
    pub birth: BirthConfig,
    pub divide: DivideConfig,
    pub merit: MeritConfig,
    pub death: DeathConfig,
    pub mutation: MutationRates,
    pub reversion: ReversionConfig,
    pub demes: DemeConfig,
    pub resources: Vec<ResourceSpec>,
    pub migration: MigrationConfig,
    pub run: RunConfig,
}

impl SimulationConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: SimulationConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        let world = &self.world;
        if world.width <= 0 || world.height <= 0 || world.depth <= 0 {
            return Err(Error::Config(format!(
                "world dimensions must be positive, got {}x{}x{}",
                world.width, world.height, world.depth
            )));
        }
        if world.depth > 1 && world.geometry != Geometry::Lattice {
            return Err(Error::Config(
                "world depth above 1 requires lattice geometry".to_string(),
            ));
        }
        if world.num_demes == 0 {
            return Err(Error::Config("num_demes must be at least 1".to_string()));
        }
        if world.height as usize % world.num_demes != 0 {
            return Err(Error::Config(format!(
                "world height {} is not divisible into {} demes",
                world.height, world.num_demes
            )));
        }
        if self.scheduler.ave_time_slice == 0 {
            return Err(Error::Config("ave_time_slice must be positive".to_string()));
        }
        if self.scheduler.burst_size == 0 {
            return Err(Error::Config("burst_size must be positive".to_string()));
        }
        if self.divide.child_size_range < 1.0 {
            return Err(Error::Config(format!(
                "child_size_range must be at least 1.0, got {}",
                self.divide.child_size_range
            )));
        }
        if self.divide.max_genome_size != 0 && self.divide.max_genome_size < self.divide.min_genome_size {
            return Err(Error::Config(
                "max_genome_size is below min_genome_size".to_string(),
            ));
        }
        let mut names = std::collections::HashSet::new();
        for spec in &self.resources {
            if !names.insert(spec.name.as_str()) {
                return Err(Error::Config(format!("duplicate resource '{}'", spec.name)));
            }
            if spec.initial < 0.0 || spec.inflow < 0.0 {
                return Err(Error::Config(format!(
                    "resource '{}' has negative initial level or inflow",
                    spec.name
                )));
            }
            for (label, rate) in [("decay", spec.decay), ("outflow", spec.outflow), ("diffusion", spec.diffusion)] {
                if !(0.0..=1.0).contains(&rate) {
                    return Err(Error::Config(format!(
                        "resource '{}' {} rate {} outside [0, 1]",
                        spec.name, label, rate
                    )));
                }
            }
        }
        if self.demes.replicate_size == 0 && self.demes.any_trigger() {
            return Err(Error::Config("replicate_size must be positive".to_string()));
        }
        Ok(())
    }
}
