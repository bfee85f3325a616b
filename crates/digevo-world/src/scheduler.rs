//! CPU-cycle scheduling.
//!
//! An update is `begin_update`, then `next_slice` until it returns `None`.
//! Every policy learns about births, deaths and merit changes through
//! `adjust`, which may be called in the middle of an update. A cell that
//! empties mid-update is never handed another slice.

use crate::grid::Grid;
use digevo_core::{CellId, DemeId, RandomSource, SchedulerConfig, SlicingMethod};
use std::collections::VecDeque;

/// Cycles granted to one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSlice {
    pub cell: CellId,
    pub cycles: u64,
}

pub trait SchedulerPolicy {
    fn begin_update(&mut self, rng: &mut RandomSource);

    fn next_slice(&mut self, rng: &mut RandomSource) -> Option<TimeSlice>;

    /// `None` marks the cell empty.
    fn adjust(&mut self, cell: CellId, merit: Option<f64>);
}

/// Merit per cell; `None` for empty cells.
#[derive(Debug, Clone)]
struct CellMerits {
    merits: Vec<Option<f64>>,
}

impl CellMerits {
    fn new(size: usize) -> Self {
        Self {
            merits: vec![None; size],
        }
    }

    fn occupied(&self) -> impl Iterator<Item = CellId> + '_ {
        self.merits
            .iter()
            .enumerate()
            .filter(|(_, m)| m.is_some())
            .map(|(cell, _)| cell)
    }

    fn occupied_count(&self) -> usize {
        self.merits.iter().filter(|m| m.is_some()).count()
    }

    fn is_occupied(&self, cell: CellId) -> bool {
        matches!(self.merits.get(cell), Some(Some(_)))
    }

    fn weight(&self, cell: CellId) -> f64 {
        self.merits.get(cell).copied().flatten().map(weight_of).unwrap_or(0.0)
    }
}

/// Sampling weight for a merit; non-positive or NaN merits weigh nothing.
fn weight_of(merit: f64) -> f64 {
    if merit.is_finite() && merit > 0.0 {
        merit
    } else {
        0.0
    }
}

/// Sum tree over leaf weights for O(log n) proportional sampling.
#[derive(Debug, Clone)]
pub struct WeightTree {
    capacity: usize,
    nodes: Vec<f64>,
}

impl WeightTree {
    pub fn new(size: usize) -> Self {
        let capacity = size.max(1).next_power_of_two();
        Self {
            capacity,
            nodes: vec![0.0; 2 * capacity],
        }
    }

    pub fn set(&mut self, index: usize, weight: f64) {
        if index >= self.capacity {
            return;
        }
        let mut node = index + self.capacity;
        self.nodes[node] = weight_of(weight);
        while node > 1 {
            node /= 2;
            self.nodes[node] = self.nodes[2 * node] + self.nodes[2 * node + 1];
        }
    }

    pub fn get(&self, index: usize) -> f64 {
        self.nodes.get(index + self.capacity).copied().unwrap_or(0.0)
    }

    pub fn total(&self) -> f64 {
        self.nodes[1]
    }

    /// Leaf whose cumulative range contains `u`, for `u` in `[0, total)`.
    /// Never lands on a zero-weight leaf while the total is positive.
    pub fn find(&self, mut u: f64) -> Option<usize> {
        if self.total() <= 0.0 {
            return None;
        }
        let mut node = 1;
        while node < self.capacity {
            let left = 2 * node;
            if self.nodes[left + 1] <= 0.0 || (u < self.nodes[left] && self.nodes[left] > 0.0) {
                node = left;
            } else {
                u -= self.nodes[left];
                node = left + 1;
            }
        }
        Some(node - self.capacity)
    }

    /// One weighted draw; consumes exactly one uniform.
    pub fn sample(&self, rng: &mut RandomSource) -> Option<usize> {
        if self.total() <= 0.0 {
            return None;
        }
        let u = rng.next_uniform() * self.total();
        self.find(u)
    }
}

/// Fixed quota per occupied cell, in cell order or in round-robin bursts.
pub struct ConstantScheduler {
    merits: CellMerits,
    quota: u64,
    burst: Option<u64>,
    queue: VecDeque<(CellId, u64)>,
}

impl ConstantScheduler {
    pub fn new(size: usize, quota: u64, burst: Option<u64>) -> Self {
        Self {
            merits: CellMerits::new(size),
            quota,
            burst,
            queue: VecDeque::new(),
        }
    }
}

impl SchedulerPolicy for ConstantScheduler {
    fn begin_update(&mut self, _rng: &mut RandomSource) {
        let quota = self.quota;
        self.queue = self.merits.occupied().map(|cell| (cell, quota)).collect();
    }

    fn next_slice(&mut self, _rng: &mut RandomSource) -> Option<TimeSlice> {
        while let Some((cell, remaining)) = self.queue.pop_front() {
            if !self.merits.is_occupied(cell) || remaining == 0 {
                continue;
            }
            let cycles = match self.burst {
                Some(burst) => burst.min(remaining),
                None => remaining,
            };
            if remaining > cycles {
                self.queue.push_back((cell, remaining - cycles));
            }
            return Some(TimeSlice { cell, cycles });
        }
        None
    }

    fn adjust(&mut self, cell: CellId, merit: Option<f64>) {
        if let Some(slot) = self.merits.merits.get_mut(cell) {
            *slot = merit;
        }
    }
}

/// Deterministic merit-proportional shares with fractional carry-over.
pub struct IntegratedScheduler {
    merits: CellMerits,
    ave_time_slice: u64,
    carry: Vec<f64>,
    plan: VecDeque<TimeSlice>,
}

impl IntegratedScheduler {
    pub fn new(size: usize, ave_time_slice: u64) -> Self {
        Self {
            merits: CellMerits::new(size),
            ave_time_slice,
            carry: vec![0.0; size],
            plan: VecDeque::new(),
        }
    }
}

impl SchedulerPolicy for IntegratedScheduler {
    fn begin_update(&mut self, _rng: &mut RandomSource) {
        self.plan.clear();
        let occupied: Vec<CellId> = self.merits.occupied().collect();
        let total: f64 = occupied.iter().map(|&c| self.merits.weight(c)).sum();
        if occupied.is_empty() || total <= 0.0 {
            return;
        }
        let budget = (self.ave_time_slice * occupied.len() as u64) as f64;
        for cell in occupied {
            let share = budget * self.merits.weight(cell) / total + self.carry[cell];
            let cycles = share.floor();
            self.carry[cell] = share - cycles;
            if cycles >= 1.0 {
                self.plan.push_back(TimeSlice {
                    cell,
                    cycles: cycles as u64,
                });
            }
        }
    }

    fn next_slice(&mut self, _rng: &mut RandomSource) -> Option<TimeSlice> {
        while let Some(slice) = self.plan.pop_front() {
            if self.merits.is_occupied(slice.cell) {
                return Some(slice);
            }
        }
        None
    }

    fn adjust(&mut self, cell: CellId, merit: Option<f64>) {
        if let Some(slot) = self.merits.merits.get_mut(cell) {
            if merit.is_none() || slot.is_none() {
                self.carry[cell] = 0.0;
            }
            *slot = merit;
        }
    }
}

/// Merit-weighted sampling with replacement until the update budget is spent.
pub struct ProbabilisticScheduler {
    tree: WeightTree,
    merits: CellMerits,
    ave_time_slice: u64,
    burst: u64,
    remaining: u64,
}

impl ProbabilisticScheduler {
    pub fn new(size: usize, ave_time_slice: u64, burst: u64) -> Self {
        Self {
            tree: WeightTree::new(size),
            merits: CellMerits::new(size),
            ave_time_slice,
            burst: burst.max(1),
            remaining: 0,
        }
    }
}

impl SchedulerPolicy for ProbabilisticScheduler {
    fn begin_update(&mut self, _rng: &mut RandomSource) {
        self.remaining = self.ave_time_slice * self.merits.occupied_count() as u64;
    }

    fn next_slice(&mut self, rng: &mut RandomSource) -> Option<TimeSlice> {
        if self.remaining == 0 {
            return None;
        }
        let cell = self.tree.sample(rng)?;
        let cycles = self.burst.min(self.remaining);
        self.remaining -= cycles;
        Some(TimeSlice { cell, cycles })
    }

    fn adjust(&mut self, cell: CellId, merit: Option<f64>) {
        if let Some(slot) = self.merits.merits.get_mut(cell) {
            *slot = merit;
            self.tree.set(cell, merit.unwrap_or(0.0));
        }
    }
}

/// Probabilistic scheduling inside each deme, demes served round-robin.
pub struct DemeScheduler {
    trees: Vec<WeightTree>,
    deme_cells: Vec<Vec<CellId>>,
    cell_slot: Vec<(DemeId, usize)>,
    merits: CellMerits,
    ave_time_slice: u64,
    burst: u64,
    proportional: bool,
    budgets: Vec<u64>,
    cursor: usize,
}

impl DemeScheduler {
    pub fn new(grid: &Grid, ave_time_slice: u64, burst: u64, proportional: bool) -> Self {
        let demes = grid.num_demes();
        let deme_cells: Vec<Vec<CellId>> = (0..demes).map(|d| grid.deme_cells(d).to_vec()).collect();
        let mut cell_slot = vec![(0, 0); grid.size()];
        for (deme, cells) in deme_cells.iter().enumerate() {
            for (local, &cell) in cells.iter().enumerate() {
                cell_slot[cell] = (deme, local);
            }
        }
        Self {
            trees: deme_cells.iter().map(|cells| WeightTree::new(cells.len())).collect(),
            deme_cells,
            cell_slot,
            merits: CellMerits::new(grid.size()),
            ave_time_slice,
            burst: burst.max(1),
            proportional,
            budgets: vec![0; demes],
            cursor: 0,
        }
    }
}

impl DemeScheduler {
    /// Next deme after `deme` in rotation order that has weight to sample.
    fn next_live_deme(&self, deme: DemeId) -> Option<DemeId> {
        let demes = self.trees.len();
        (1..=demes)
            .map(|step| (deme + step) % demes)
            .find(|&d| self.trees[d].total() > 0.0)
    }
}

impl SchedulerPolicy for DemeScheduler {
    /// The update grants `ave_time_slice` per occupied cell in total, split
    /// among demes that have something to run.
    fn begin_update(&mut self, _rng: &mut RandomSource) {
        self.cursor = 0;
        self.budgets.iter_mut().for_each(|b| *b = 0);
        let live: Vec<DemeId> = (0..self.trees.len())
            .filter(|&d| self.trees[d].total() > 0.0)
            .collect();
        if live.is_empty() {
            return;
        }

        if self.proportional {
            for (deme, cells) in self.deme_cells.iter().enumerate() {
                let occupied = cells.iter().filter(|&&c| self.merits.is_occupied(c)).count();
                self.budgets[deme] = self.ave_time_slice * occupied as u64;
            }
            // Occupied demes whose merits are all zero pass their share on.
            for deme in 0..self.budgets.len() {
                if self.trees[deme].total() > 0.0 || self.budgets[deme] == 0 {
                    continue;
                }
                if let Some(heir) = self.next_live_deme(deme) {
                    let share = std::mem::take(&mut self.budgets[deme]);
                    self.budgets[heir] += share;
                }
            }
        } else {
            let total = self.ave_time_slice * self.merits.occupied_count() as u64;
            let per_deme = total / live.len() as u64;
            let extra = (total % live.len() as u64) as usize;
            for (rank, &deme) in live.iter().enumerate() {
                self.budgets[deme] = per_deme + u64::from(rank < extra);
            }
        }
    }

    fn next_slice(&mut self, rng: &mut RandomSource) -> Option<TimeSlice> {
        let demes = self.trees.len();
        // Two passes let a share carried off an emptied deme reach its heir.
        for _ in 0..2 * demes {
            let deme = self.cursor;
            self.cursor = (self.cursor + 1) % demes;
            if self.budgets[deme] == 0 {
                continue;
            }
            let Some(local) = self.trees[deme].sample(rng) else {
                let leftover = std::mem::take(&mut self.budgets[deme]);
                if let Some(heir) = self.next_live_deme(deme) {
                    self.budgets[heir] += leftover;
                }
                continue;
            };
            let cycles = self.burst.min(self.budgets[deme]);
            self.budgets[deme] -= cycles;
            return Some(TimeSlice {
                cell: self.deme_cells[deme][local],
                cycles,
            });
        }
        None
    }

    fn adjust(&mut self, cell: CellId, merit: Option<f64>) {
        if let Some(slot) = self.merits.merits.get_mut(cell) {
            *slot = merit;
            let (deme, local) = self.cell_slot[cell];
            self.trees[deme].set(local, merit.unwrap_or(0.0));
        }
    }
}

/// The configured scheduling policy.
pub enum Scheduler {
    Constant(ConstantScheduler),
    Integrated(IntegratedScheduler),
    Probabilistic(ProbabilisticScheduler),
    Deme(DemeScheduler),
}

impl Scheduler {
    pub fn from_config(config: &SchedulerConfig, grid: &Grid) -> Self {
        let size = grid.size();
        let slice = config.ave_time_slice as u64;
        let burst = config.burst_size as u64;
        match config.slicing_method {
            SlicingMethod::Constant => Scheduler::Constant(ConstantScheduler::new(size, slice, None)),
            SlicingMethod::ConstantBurst => {
                Scheduler::Constant(ConstantScheduler::new(size, slice, Some(burst.max(1))))
            }
            SlicingMethod::Integrated => Scheduler::Integrated(IntegratedScheduler::new(size, slice)),
            SlicingMethod::Probabilistic => {
                Scheduler::Probabilistic(ProbabilisticScheduler::new(size, slice, burst))
            }
            SlicingMethod::DemeProbabilistic => {
                Scheduler::Deme(DemeScheduler::new(grid, slice, burst, false))
            }
            SlicingMethod::ProportionalDemeProbabilistic => {
                Scheduler::Deme(DemeScheduler::new(grid, slice, burst, true))
            }
        }
    }

    fn policy(&mut self) -> &mut dyn SchedulerPolicy {
        match self {
            Scheduler::Constant(s) => s,
            Scheduler::Integrated(s) => s,
            Scheduler::Probabilistic(s) => s,
            Scheduler::Deme(s) => s,
        }
    }
}

impl SchedulerPolicy for Scheduler {
    fn begin_update(&mut self, rng: &mut RandomSource) {
        self.policy().begin_update(rng)
    }

    fn next_slice(&mut self, rng: &mut RandomSource) -> Option<TimeSlice> {
        self.policy().next_slice(rng)
    }

    fn adjust(&mut self, cell: CellId, merit: Option<f64>) {
        self.policy().adjust(cell, merit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use digevo_core::{Geometry, WorldConfig};

    fn grid(width: i32, height: i32, num_demes: usize) -> Grid {
        Grid::from_config(&WorldConfig {
            width,
            height,
            geometry: Geometry::Torus,
            num_demes,
            ..WorldConfig::default()
        })
        .unwrap()
    }

    fn drain(s: &mut dyn SchedulerPolicy, rng: &mut RandomSource) -> Vec<TimeSlice> {
        let mut slices = Vec::new();
        s.begin_update(rng);
        while let Some(slice) = s.next_slice(rng) {
            slices.push(slice);
            assert!(slices.len() < 1_000_000);
        }
        slices
    }

    #[test]
    fn test_weight_tree_sampling() {
        let mut tree = WeightTree::new(5);
        tree.set(1, 1.0);
        tree.set(3, 3.0);
        assert_eq!(tree.total(), 4.0);
        assert_eq!(tree.find(0.5), Some(1));
        assert_eq!(tree.find(1.5), Some(3));
        // Rounding past the total still lands on a weighted leaf.
        assert_eq!(tree.find(4.0), Some(3));
        tree.set(3, -2.0);
        assert_eq!(tree.find(3.9), Some(1));
        tree.set(1, f64::NAN);
        assert_eq!(tree.find(0.0), None);
    }

    #[test]
    fn test_constant_gives_every_cell_its_quota() {
        let mut s = ConstantScheduler::new(4, 30, None);
        s.adjust(0, Some(5.0));
        s.adjust(2, Some(0.0));
        let mut rng = RandomSource::new(1);
        let slices = drain(&mut s, &mut rng);
        assert_eq!(
            slices,
            vec![TimeSlice { cell: 0, cycles: 30 }, TimeSlice { cell: 2, cycles: 30 }]
        );
    }

    #[test]
    fn test_constant_burst_round_robin() {
        let mut s = ConstantScheduler::new(2, 5, Some(2));
        s.adjust(0, Some(1.0));
        s.adjust(1, Some(1.0));
        let mut rng = RandomSource::new(1);
        let cells: Vec<(CellId, u64)> = drain(&mut s, &mut rng).iter().map(|t| (t.cell, t.cycles)).collect();
        assert_eq!(cells, vec![(0, 2), (1, 2), (0, 2), (1, 2), (0, 1), (1, 1)]);
    }

    #[test]
    fn test_emptied_cell_gets_no_more_slices() {
        let mut s = ConstantScheduler::new(3, 10, Some(5));
        for cell in 0..3 {
            s.adjust(cell, Some(1.0));
        }
        let mut rng = RandomSource::new(1);
        s.begin_update(&mut rng);
        let first = s.next_slice(&mut rng).unwrap();
        s.adjust(first.cell, None);
        while let Some(slice) = s.next_slice(&mut rng) {
            assert_ne!(slice.cell, first.cell);
        }
    }

    #[test]
    fn test_empty_population_ends_update() {
        let mut rng = RandomSource::new(1);
        let mut p = ProbabilisticScheduler::new(10, 30, 1);
        assert!(drain(&mut p, &mut rng).is_empty());
        let mut i = IntegratedScheduler::new(10, 30);
        assert!(drain(&mut i, &mut rng).is_empty());
    }

    #[test]
    fn test_zero_merit_population_ends_update() {
        let mut rng = RandomSource::new(1);
        let mut p = ProbabilisticScheduler::new(4, 30, 1);
        p.adjust(0, Some(0.0));
        p.adjust(1, Some(-3.0));
        assert!(drain(&mut p, &mut rng).is_empty());
    }

    #[test]
    fn test_probabilistic_budget_and_weights() {
        let mut s = ProbabilisticScheduler::new(3, 30, 1);
        s.adjust(0, Some(1.0));
        s.adjust(1, Some(0.0));
        s.adjust(2, Some(3.0));
        let mut rng = RandomSource::new(42);
        let mut granted = [0u64; 3];
        for _ in 0..200 {
            for slice in drain(&mut s, &mut rng) {
                granted[slice.cell] += slice.cycles;
            }
        }
        assert_eq!(granted.iter().sum::<u64>(), 200 * 90);
        assert_eq!(granted[1], 0);
        let share = granted[2] as f64 / (granted[0] + granted[2]) as f64;
        assert!((share - 0.75).abs() < 0.02, "share {}", share);
    }

    #[test]
    fn test_integrated_fairness() {
        let merits = [1.0, 2.0, 4.0, 0.5];
        let mut s = IntegratedScheduler::new(4, 30);
        for (cell, m) in merits.iter().enumerate() {
            s.adjust(cell, Some(*m));
        }
        let total_merit: f64 = merits.iter().sum();
        let mut rng = RandomSource::new(1);
        let updates = 500u64;
        let mut granted = [0u64; 4];
        for _ in 0..updates {
            for slice in drain(&mut s, &mut rng) {
                granted[slice.cell] += slice.cycles;
            }
        }
        let budget = (updates * 30 * 4) as f64;
        for (cell, m) in merits.iter().enumerate() {
            let exact = budget * m / total_merit;
            assert!((granted[cell] as f64 - exact).abs() <= 1.0 + 1e-9);
        }
    }

    #[test]
    fn test_integrated_is_deterministic() {
        let mut a = IntegratedScheduler::new(3, 7);
        let mut b = IntegratedScheduler::new(3, 7);
        for cell in 0..3 {
            a.adjust(cell, Some(cell as f64 + 1.0));
            b.adjust(cell, Some(cell as f64 + 1.0));
        }
        let mut r1 = RandomSource::new(1);
        let mut r2 = RandomSource::new(2);
        assert_eq!(drain(&mut a, &mut r1), drain(&mut b, &mut r2));
    }

    #[test]
    fn test_deme_scheduler_equal_budgets() {
        let g = grid(2, 4, 2);
        let mut s = DemeScheduler::new(&g, 10, 1, false);
        // Deme 0 holds one organism, deme 1 holds three.
        s.adjust(0, Some(1.0));
        for cell in [4, 5, 6] {
            s.adjust(cell, Some(1.0));
        }
        let mut rng = RandomSource::new(3);
        let slices = drain(&mut s, &mut rng);
        let deme0: u64 = slices.iter().filter(|t| t.cell < 4).map(|t| t.cycles).sum();
        let deme1: u64 = slices.iter().filter(|t| t.cell >= 4).map(|t| t.cycles).sum();
        assert_eq!(deme0, 20);
        assert_eq!(deme1, 20);
    }

    #[test]
    fn test_deme_scheduler_proportional_budgets() {
        let g = grid(2, 4, 2);
        let mut s = DemeScheduler::new(&g, 10, 1, true);
        s.adjust(0, Some(1.0));
        for cell in [4, 5, 6] {
            s.adjust(cell, Some(1.0));
        }
        let mut rng = RandomSource::new(3);
        let slices = drain(&mut s, &mut rng);
        let deme0: u64 = slices.iter().filter(|t| t.cell < 4).map(|t| t.cycles).sum();
        let deme1: u64 = slices.iter().filter(|t| t.cell >= 4).map(|t| t.cycles).sum();
        assert_eq!(deme0, 10);
        assert_eq!(deme1, 30);
    }

    fn deme_totals(slices: &[TimeSlice], cells_per_deme: usize, demes: usize) -> Vec<u64> {
        let mut totals = vec![0; demes];
        for slice in slices {
            totals[slice.cell / cells_per_deme] += slice.cycles;
        }
        totals
    }

    #[test]
    fn test_deme_budget_skips_empty_demes() {
        // Three demes of four cells; the middle one is empty.
        let g = grid(2, 6, 3);
        for (slice, expected) in [(10, vec![15, 0, 15]), (7, vec![11, 0, 10])] {
            let mut s = DemeScheduler::new(&g, slice, 1, false);
            for cell in [0, 9, 10] {
                s.adjust(cell, Some(1.0));
            }
            let mut rng = RandomSource::new(11);
            let totals = deme_totals(&drain(&mut s, &mut rng), 4, 3);
            assert_eq!(totals.iter().sum::<u64>(), slice * 3);
            assert_eq!(totals, expected);
        }

        let mut s = DemeScheduler::new(&g, 10, 1, true);
        for cell in [0, 9, 10] {
            s.adjust(cell, Some(1.0));
        }
        let mut rng = RandomSource::new(11);
        assert_eq!(deme_totals(&drain(&mut s, &mut rng), 4, 3), vec![10, 0, 20]);
    }

    #[test]
    fn test_deme_budget_with_zero_merit_deme() {
        let g = grid(2, 6, 3);
        for (proportional, expected) in [(false, vec![20, 0, 20]), (true, vec![10, 0, 30])] {
            let mut s = DemeScheduler::new(&g, 10, 2, proportional);
            s.adjust(0, Some(1.0));
            s.adjust(4, Some(0.0));
            for cell in [9, 10] {
                s.adjust(cell, Some(1.0));
            }
            let mut rng = RandomSource::new(5);
            let totals = deme_totals(&drain(&mut s, &mut rng), 4, 3);
            assert_eq!(totals.iter().sum::<u64>(), 40);
            assert_eq!(totals, expected);
        }
    }

    #[test]
    fn test_deme_emptied_mid_update_hands_budget_on() {
        let g = grid(2, 4, 2);
        let mut s = DemeScheduler::new(&g, 10, 1, false);
        s.adjust(0, Some(1.0));
        s.adjust(4, Some(1.0));
        let mut rng = RandomSource::new(2);
        s.begin_update(&mut rng);
        let first = s.next_slice(&mut rng).unwrap();
        assert_eq!(first.cell, 0);
        s.adjust(0, None);
        let mut rest = 0;
        while let Some(slice) = s.next_slice(&mut rng) {
            assert_eq!(slice.cell, 4);
            rest += slice.cycles;
        }
        assert_eq!(first.cycles + rest, 20);
    }

    #[test]
    fn test_from_config_dispatch() {
        let g = grid(4, 4, 2);
        let mut config = SchedulerConfig::default();
        for method in [
            SlicingMethod::Constant,
            SlicingMethod::Probabilistic,
            SlicingMethod::Integrated,
            SlicingMethod::DemeProbabilistic,
            SlicingMethod::ProportionalDemeProbabilistic,
            SlicingMethod::ConstantBurst,
        ] {
            config.slicing_method = method;
            let mut s = Scheduler::from_config(&config, &g);
            s.adjust(5, Some(2.0));
            let mut rng = RandomSource::new(9);
            let total: u64 = drain(&mut s, &mut rng).iter().map(|t| t.cycles).sum();
            assert_eq!(total, 30, "{:?}", method);
        }
    }
}
