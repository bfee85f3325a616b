//! Deme counters, replication triggers and founder selection.
//!
//! The manager only decides; the world carries out the kills and
//! injections a replication needs.

use crate::grid::Grid;
use digevo_core::{
    CellId, DemeConfig, DemeDivideMethod, DemeId, OrganismPlacement, OrganismSelection, RandomSource,
};
use digevo_genome::Genome;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DemeTrigger {
    Age,
    Births,
    CpuCycles,
    Organisms,
}

/// What happens to the source deme when it replicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceAction {
    /// Clear and re-found from the same founders as the target
    Refound,
    /// Clear and re-found from the source's recorded founders
    RestoreFounders,
    Keep,
}

pub trait DemeReplicationPolicy {
    fn source_action(&self) -> SourceAction;
}

impl DemeReplicationPolicy for DemeDivideMethod {
    fn source_action(&self) -> SourceAction {
        match self {
            DemeDivideMethod::ReplaceBoth => SourceAction::Refound,
            DemeDivideMethod::ReplaceTargetResetSource => SourceAction::RestoreFounders,
            DemeDivideMethod::ReplaceTarget => SourceAction::Keep,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Deme {
    id: DemeId,
    cells: Vec<CellId>,
    age: u64,
    births: u64,
    org_count: usize,
    cycles_used: u64,
    time_used: f64,
    generation: u64,
    founders: Vec<Genome>,
    germline: Vec<Genome>,
}

impl Deme {
    fn new(id: DemeId, cells: Vec<CellId>) -> Self {
        Self {
            id,
            cells,
            age: 0,
            births: 0,
            org_count: 0,
            cycles_used: 0,
            time_used: 0.0,
            generation: 0,
            founders: Vec::new(),
            germline: Vec::new(),
        }
    }

    pub fn id(&self) -> DemeId {
        self.id
    }

    pub fn cells(&self) -> &[CellId] {
        &self.cells
    }

    pub fn age(&self) -> u64 {
        self.age
    }

    pub fn births(&self) -> u64 {
        self.births
    }

    pub fn org_count(&self) -> usize {
        self.org_count
    }

    pub fn cycles_used(&self) -> u64 {
        self.cycles_used
    }

    /// Cycles weighted by `1 / merit / organisms` at the time they ran.
    pub fn time_used(&self) -> f64 {
        self.time_used
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn founders(&self) -> &[Genome] {
        &self.founders
    }

    pub fn germline(&self) -> &[Genome] {
        &self.germline
    }

    pub fn is_empty(&self) -> bool {
        self.org_count == 0
    }

    fn cycles_per_organism(&self) -> f64 {
        if self.org_count == 0 {
            0.0
        } else {
            self.cycles_used as f64 / self.org_count as f64
        }
    }

    fn reset_counters(&mut self) {
        self.age = 0;
        self.births = 0;
        self.cycles_used = 0;
        self.time_used = 0.0;
    }
}

pub struct DemeManager {
    demes: Vec<Deme>,
    config: DemeConfig,
    replications: u64,
}

impl DemeManager {
    pub fn new(grid: &Grid, config: DemeConfig) -> Self {
        let demes = (0..grid.num_demes())
            .map(|d| Deme::new(d, grid.deme_cells(d).to_vec()))
            .collect();
        Self {
            demes,
            config,
            replications: 0,
        }
    }

    pub fn config(&self) -> &DemeConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.demes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.demes.is_empty()
    }

    pub fn deme(&self, id: DemeId) -> Option<&Deme> {
        self.demes.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Deme> + '_ {
        self.demes.iter()
    }

    pub fn replications(&self) -> u64 {
        self.replications
    }

    pub fn record_birth(&mut self, deme: DemeId) {
        if let Some(d) = self.demes.get_mut(deme) {
            d.births += 1;
        }
    }

    pub fn organism_added(&mut self, deme: DemeId) {
        if let Some(d) = self.demes.get_mut(deme) {
            d.org_count += 1;
        }
    }

    pub fn organism_removed(&mut self, deme: DemeId) {
        if let Some(d) = self.demes.get_mut(deme) {
            d.org_count = d.org_count.saturating_sub(1);
        }
    }

    pub fn record_cycles(&mut self, deme: DemeId, cycles: u64, merit: f64) {
        if let Some(d) = self.demes.get_mut(deme) {
            d.cycles_used += cycles;
            if merit > 0.0 && d.org_count > 0 {
                d.time_used += cycles as f64 / merit / d.org_count as f64;
            }
        }
    }

    /// Record an injected genome. Injections before the deme's first birth
    /// count as founders, and the first one starts the germline.
    pub fn note_injection(&mut self, deme: DemeId, genome: &Genome) {
        if let Some(d) = self.demes.get_mut(deme) {
            if d.germline.is_empty() {
                d.germline.push(genome.clone());
            }
            if d.births == 0 {
                d.founders.push(genome.clone());
            }
        }
    }

    pub fn end_update(&mut self) {
        for d in &mut self.demes {
            d.age += 1;
        }
    }

    /// First trigger the deme meets, if any.
    pub fn trigger(&self, deme: DemeId) -> Option<DemeTrigger> {
        let d = self.demes.get(deme)?;
        let config = &self.config;
        if config.prevent_sterile && d.births == 0 {
            return None;
        }
        if config.max_age.map_or(false, |max| d.age >= max) {
            return Some(DemeTrigger::Age);
        }
        if config.max_births.map_or(false, |max| d.births >= max) {
            return Some(DemeTrigger::Births);
        }
        if config
            .replicate_cpu_cycles
            .map_or(false, |max| d.org_count > 0 && d.cycles_per_organism() >= max)
        {
            return Some(DemeTrigger::CpuCycles);
        }
        if config.replicate_orgs.map_or(false, |max| d.org_count >= max) {
            return Some(DemeTrigger::Organisms);
        }
        None
    }

    /// A random deme other than `source`, empty demes first when preferred.
    pub fn choose_target(&self, source: DemeId, rng: &mut RandomSource) -> Option<DemeId> {
        let others: Vec<DemeId> = (0..self.demes.len()).filter(|&d| d != source).collect();
        if others.is_empty() {
            return None;
        }
        if self.config.prefer_empty {
            let empty: Vec<DemeId> = others.iter().copied().filter(|&d| self.demes[d].is_empty()).collect();
            if !empty.is_empty() {
                return Some(empty[rng.next_int(empty.len())]);
            }
        }
        Some(others[rng.next_int(others.len())])
    }

    /// Genomes that will found the target deme.
    pub fn select_founders(&self, grid: &Grid, source: DemeId, rng: &mut RandomSource) -> Vec<Genome> {
        let Some(d) = self.demes.get(source) else {
            return Vec::new();
        };
        let occupied: Vec<&Genome> = d
            .cells
            .iter()
            .filter_map(|&c| grid.organism(c))
            .map(|o| o.genome())
            .collect();
        if occupied.is_empty() {
            return Vec::new();
        }
        let count = self.config.replicate_size.max(1);
        match self.config.organism_selection {
            OrganismSelection::RandomWithReplacement => (0..count)
                .map(|_| occupied[rng.next_int(occupied.len())].clone())
                .collect(),
            OrganismSelection::Sequential => occupied.into_iter().take(count).cloned().collect(),
        }
    }

    /// Latest germline genome of `source`, if a germline is kept.
    pub fn germline_founder(&self, source: DemeId) -> Option<&Genome> {
        self.demes.get(source).and_then(|d| d.germline.last())
    }

    /// Cells that receive `count` founders in `deme`.
    pub fn placement_cells(&self, grid: &Grid, deme: DemeId, count: usize, rng: &mut RandomSource) -> Vec<CellId> {
        let Some(d) = self.demes.get(deme) else {
            return Vec::new();
        };
        let cells = &d.cells;
        if cells.is_empty() {
            return Vec::new();
        }
        let count = count.min(cells.len());
        match self.config.organism_placement {
            OrganismPlacement::Random => {
                let mut shuffled = cells.clone();
                rng.shuffle(&mut shuffled);
                shuffled.truncate(count);
                shuffled
            }
            placement => {
                let start = match placement {
                    OrganismPlacement::DemeMiddle => cells.len() / 2,
                    OrganismPlacement::DemeCenter => {
                        let center = grid.deme_center(deme);
                        cells.iter().position(|&c| c == center).unwrap_or(0)
                    }
                    _ => 0,
                };
                (0..count).map(|i| cells[(start + i) % cells.len()]).collect()
            }
        }
    }

    /// Record a completed replication from `source` into `target`.
    pub fn finish_replication(
        &mut self,
        source: DemeId,
        target: DemeId,
        founders: &[Genome],
        source_refounded: bool,
    ) {
        let generation = self.demes.get(source).map(|d| d.generation).unwrap_or(0) + 1;
        if let Some(t) = self.demes.get_mut(target) {
            t.reset_counters();
            t.generation = generation;
            t.founders = founders.to_vec();
        }
        if let Some(s) = self.demes.get_mut(source) {
            s.reset_counters();
            if source_refounded {
                s.generation = generation;
                s.founders = founders.to_vec();
            }
        }
        self.replications += 1;
        debug!(source, target, generation, founders = founders.len(), "Deme replicated");
    }

    /// Append a germline genome to both demes; the target line is copied from the source.
    pub fn extend_germline(&mut self, source: DemeId, target: DemeId, genome: &Genome) {
        let line = match self.demes.get_mut(source) {
            Some(s) => {
                s.germline.push(genome.clone());
                s.germline.clone()
            }
            None => return,
        };
        if let Some(t) = self.demes.get_mut(target) {
            t.germline = line;
        }
    }
}
