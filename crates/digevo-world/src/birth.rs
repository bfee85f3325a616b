//! Offspring placement.
//!
//! Population-wide methods are resolved first. Neighborhood methods build a
//! candidate list in neighbor order and draw one winner from it with a
//! single `next_int(len)`, so ties cost exactly one draw.

use crate::grid::Grid;
use digevo_core::{BirthConfig, BirthMethod, CellId, RandomSource};

/// Cells ordered from longest to shortest time since their last birth.
///
/// Kept as a doubly linked list threaded through per-cell slots so a birth
/// moves its cell to the back in constant time.
#[derive(Debug, Clone, Default)]
pub struct ReaperQueue {
    prev: Vec<Option<CellId>>,
    next: Vec<Option<CellId>>,
    queued: Vec<bool>,
    head: Option<CellId>,
    tail: Option<CellId>,
    len: usize,
}

impl ReaperQueue {
    /// Every cell starts in the queue, lowest id oldest.
    pub fn new(size: usize) -> Self {
        let mut queue = Self {
            prev: vec![None; size],
            next: vec![None; size],
            queued: vec![false; size],
            ..Self::default()
        };
        for cell in 0..size {
            queue.link_back(cell);
        }
        queue
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn contains(&self, cell: CellId) -> bool {
        self.queued.get(cell).copied().unwrap_or(false)
    }

    /// Oldest cell without removing it.
    pub fn peek_oldest(&self) -> Option<CellId> {
        self.head
    }

    /// Record a birth into `cell`; it becomes the youngest entry.
    pub fn push(&mut self, cell: CellId) {
        if cell >= self.queued.len() {
            self.prev.resize(cell + 1, None);
            self.next.resize(cell + 1, None);
            self.queued.resize(cell + 1, false);
        }
        self.unlink(cell);
        self.link_back(cell);
    }

    /// Take the oldest cell, passing over `parent` when it is not allowed.
    ///
    /// A skipped parent keeps its place at the front.
    pub fn pop_oldest(&mut self, parent: CellId, allow_parent: bool) -> Option<CellId> {
        let oldest = self.head?;
        let target = if allow_parent || oldest != parent {
            oldest
        } else {
            self.next[oldest]?
        };
        self.unlink(target);
        Some(target)
    }

    fn link_back(&mut self, cell: CellId) {
        self.prev[cell] = self.tail;
        self.next[cell] = None;
        match self.tail {
            Some(tail) => self.next[tail] = Some(cell),
            None => self.head = Some(cell),
        }
        self.tail = Some(cell);
        self.queued[cell] = true;
        self.len += 1;
    }

    fn unlink(&mut self, cell: CellId) {
        if !self.contains(cell) {
            return;
        }
        let (prev, next) = (self.prev[cell], self.next[cell]);
        match prev {
            Some(p) => self.next[p] = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.prev[n] = prev,
            None => self.tail = prev,
        }
        self.prev[cell] = None;
        self.next[cell] = None;
        self.queued[cell] = false;
        self.len -= 1;
    }
}

pub trait BirthPlacementPolicy {
    /// Cell that will receive the offspring of the organism in `parent`.
    ///
    /// `None` when no legal cell exists.
    fn select_target(
        &self,
        grid: &Grid,
        parent: CellId,
        config: &BirthConfig,
        reaper: &mut ReaperQueue,
        rng: &mut RandomSource,
    ) -> Option<CellId>;
}

impl BirthPlacementPolicy for BirthMethod {
    fn select_target(
        &self,
        grid: &Grid,
        parent: CellId,
        config: &BirthConfig,
        reaper: &mut ReaperQueue,
        rng: &mut RandomSource,
    ) -> Option<CellId> {
        let allow_parent = config.allow_parent;
        match self {
            BirthMethod::RandomInPopulation => {
                let cells: Vec<CellId> = (0..grid.size()).collect();
                pick_random_cell(&cells, parent, allow_parent, rng)
            }
            BirthMethod::OldestInPopulation => reaper.pop_oldest(parent, allow_parent),
            BirthMethod::RandomInDeme => {
                pick_random_cell(grid.deme_cells(grid.deme_of(parent)), parent, allow_parent, rng)
            }
            BirthMethod::ParentFacing => grid.cell(parent).faced(),
            BirthMethod::NextCell => {
                let next = (parent + 1) % grid.size();
                (allow_parent || next != parent).then_some(next)
            }
            BirthMethod::LargestCyclesInPopulation => {
                let mut found = Ranked::new();
                for cell in 0..grid.size() {
                    if cell == parent && !allow_parent {
                        continue;
                    }
                    let used = grid.organism(cell).map(|o| o.cycles_used()).unwrap_or(u64::MAX);
                    found.offer(cell, used as f64);
                }
                choose(&found.cells, rng)
            }
            _ => select_local(*self, grid, parent, config, rng),
        }
    }
}

fn select_local(
    method: BirthMethod,
    grid: &Grid,
    parent: CellId,
    config: &BirthConfig,
    rng: &mut RandomSource,
) -> Option<CellId> {
    let neighbors = grid.neighbors(parent);
    let with_parent = |mut list: Vec<CellId>| {
        if config.allow_parent {
            list.push(parent);
        }
        list
    };

    let mut found = if !config.prefer_empty && method == BirthMethod::RandomInNeighborhood {
        with_parent(neighbors.to_vec())
    } else {
        neighbors.iter().copied().filter(|&n| !grid.is_occupied(n)).collect()
    };

    if found.is_empty() {
        found = match method {
            BirthMethod::RandomInNeighborhood => with_parent(neighbors.to_vec()),
            BirthMethod::OldestInNeighborhood => {
                rank_neighborhood(grid, parent, config.allow_parent, |o| o.age() as f64)
            }
            BirthMethod::LargestAgeMeritInNeighborhood => {
                rank_neighborhood(grid, parent, config.allow_parent, |o| o.phenotype.merit_ratio())
            }
            BirthMethod::LargestCyclesInNeighborhood => {
                rank_neighborhood(grid, parent, config.allow_parent, |o| o.cycles_used() as f64)
            }
            _ => Vec::new(),
        };
    }

    if found.is_empty() {
        return config.allow_parent.then_some(parent);
    }
    choose(&found, rng)
}

/// Neighbors holding the largest score, the parent seeding the comparison
/// when it may be replaced.
fn rank_neighborhood<F>(grid: &Grid, parent: CellId, allow_parent: bool, score: F) -> Vec<CellId>
where
    F: Fn(&crate::organism::Organism) -> f64,
{
    let mut found = Ranked::new();
    if allow_parent {
        if let Some(org) = grid.organism(parent) {
            found.offer(parent, score(org));
        }
    }
    for &n in grid.neighbors(parent) {
        if let Some(org) = grid.organism(n) {
            found.offer(n, score(org));
        }
    }
    found.cells
}

/// Running arg-max that keeps every tied cell in insertion order.
struct Ranked {
    best: Option<f64>,
    cells: Vec<CellId>,
}

impl Ranked {
    fn new() -> Self {
        Self {
            best: None,
            cells: Vec::new(),
        }
    }

    fn offer(&mut self, cell: CellId, value: f64) {
        match self.best {
            Some(best) if value < best => {}
            Some(best) if value == best => self.cells.push(cell),
            _ => {
                self.best = Some(value);
                self.cells.clear();
                self.cells.push(cell);
            }
        }
    }
}

fn choose(found: &[CellId], rng: &mut RandomSource) -> Option<CellId> {
    if found.is_empty() {
        return None;
    }
    found.get(rng.next_int(found.len())).copied()
}

/// Uniform draw over `cells`, redrawn while it lands on a disallowed parent.
fn pick_random_cell(
    cells: &[CellId],
    parent: CellId,
    allow_parent: bool,
    rng: &mut RandomSource,
) -> Option<CellId> {
    if cells.is_empty() || (!allow_parent && cells.len() == 1 && cells[0] == parent) {
        return None;
    }
    loop {
        let cell = cells[rng.next_int(cells.len())];
        if allow_parent || cell != parent {
            return Some(cell);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::organism::Organism;
    use digevo_core::{Geometry, GenotypeId, MeritConfig, OrganismId, Phenotype, WorldConfig};
    use digevo_exec::{HardwareFactory, ReplicatorFactory};
    use digevo_genome::Genome;
    use proptest::prelude::*;
    use std::collections::VecDeque;

    fn grid(width: i32, height: i32, geometry: Geometry) -> Grid {
        Grid::from_config(&WorldConfig {
            width,
            height,
            geometry,
            ..WorldConfig::default()
        })
        .unwrap()
    }

    fn place(grid: &mut Grid, cell: CellId, age: u64, cycles: u64) {
        let genome: Genome = "abcx".parse().unwrap();
        let hardware = ReplicatorFactory::default().create(&genome);
        let mut phenotype = Phenotype::injected(genome.len(), &MeritConfig::default());
        phenotype.age = age;
        phenotype.cycles_used = cycles;
        grid.cell_mut(cell).organism =
            Some(Organism::new(OrganismId(cell as u64), GenotypeId(0), genome, hardware, phenotype, 0));
    }

    fn config(method: BirthMethod) -> BirthConfig {
        BirthConfig {
            birth_method: method,
            ..BirthConfig::default()
        }
    }

    #[test]
    fn test_empty_neighbor_preferred() {
        let mut g = grid(3, 3, Geometry::Grid);
        for cell in 0..9 {
            if cell != 2 {
                place(&mut g, cell, 10, 0);
            }
        }
        let mut reaper = ReaperQueue::new(9);
        let mut rng = RandomSource::new(5);
        for method in [
            BirthMethod::RandomInNeighborhood,
            BirthMethod::OldestInNeighborhood,
            BirthMethod::EmptyOnly,
            BirthMethod::LargestCyclesInNeighborhood,
        ] {
            let target = method.select_target(&g, 4, &config(method), &mut reaper, &mut rng);
            assert_eq!(target, Some(2));
        }
    }

    #[test]
    fn test_oldest_in_full_neighborhood() {
        let mut g = grid(3, 3, Geometry::Grid);
        for cell in 0..9 {
            place(&mut g, cell, 3, 0);
        }
        place(&mut g, 6, 7, 0);
        let method = BirthMethod::OldestInNeighborhood;
        let mut rng = RandomSource::new(5);
        let target = method.select_target(&g, 4, &config(method), &mut ReaperQueue::new(9), &mut rng);
        assert_eq!(target, Some(6));
    }

    #[test]
    fn test_oldest_ties_use_one_draw() {
        let mut g = grid(3, 3, Geometry::Grid);
        for cell in 0..9 {
            place(&mut g, cell, 3, 0);
        }
        place(&mut g, 1, 9, 0);
        place(&mut g, 7, 9, 0);
        let method = BirthMethod::OldestInNeighborhood;

        let mut rng = RandomSource::new(77);
        let target = method.select_target(&g, 4, &config(method), &mut ReaperQueue::new(9), &mut rng);

        let mut replay = RandomSource::new(77);
        let expected = [1, 7][replay.next_int(2)];
        assert_eq!(target, Some(expected));
        assert_eq!(rng.next_uniform(), replay.next_uniform());
    }

    #[test]
    fn test_empty_only_with_full_neighborhood() {
        let mut g = grid(3, 3, Geometry::Grid);
        for cell in 0..9 {
            place(&mut g, cell, 1, 0);
        }
        let method = BirthMethod::EmptyOnly;
        let mut rng = RandomSource::new(1);
        let mut cfg = config(method);
        assert_eq!(method.select_target(&g, 4, &cfg, &mut ReaperQueue::new(9), &mut rng), Some(4));
        cfg.allow_parent = false;
        assert_eq!(method.select_target(&g, 4, &cfg, &mut ReaperQueue::new(9), &mut rng), None);
    }

    #[test]
    fn test_parent_excluded_from_ranking() {
        let mut g = grid(3, 3, Geometry::Grid);
        for cell in 0..9 {
            place(&mut g, cell, 1, 0);
        }
        place(&mut g, 4, 50, 0);
        let method = BirthMethod::OldestInNeighborhood;
        let mut cfg = config(method);
        let mut rng = RandomSource::new(1);
        assert_eq!(method.select_target(&g, 4, &cfg, &mut ReaperQueue::new(9), &mut rng), Some(4));
        cfg.allow_parent = false;
        let target = method.select_target(&g, 4, &cfg, &mut ReaperQueue::new(9), &mut rng);
        assert!(matches!(target, Some(c) if c != 4));
    }

    #[test]
    fn test_random_in_population_skips_parent() {
        let g = grid(2, 1, Geometry::Torus);
        let method = BirthMethod::RandomInPopulation;
        let mut cfg = config(method);
        cfg.allow_parent = false;
        let mut rng = RandomSource::new(3);
        for _ in 0..20 {
            assert_eq!(method.select_target(&g, 0, &cfg, &mut ReaperQueue::new(2), &mut rng), Some(1));
        }
        let tiny = grid(1, 1, Geometry::Torus);
        assert_eq!(method.select_target(&tiny, 0, &cfg, &mut ReaperQueue::new(1), &mut rng), None);
    }

    #[test]
    fn test_reaper_queue_order() {
        let mut reaper = ReaperQueue::new(4);
        reaper.push(0);
        assert_eq!(reaper.pop_oldest(9, true), Some(1));
        assert_eq!(reaper.pop_oldest(2, false), Some(3));
        assert_eq!(reaper.pop_oldest(2, true), Some(2));
        assert_eq!(reaper.pop_oldest(2, true), Some(0));
        assert!(reaper.is_empty());
    }

    #[test]
    fn test_reaper_queue_relinks_middle_and_ends() {
        let mut reaper = ReaperQueue::new(5);
        reaper.push(2);
        reaper.push(0);
        reaper.push(4);
        // 1 3 2 0 4
        assert_eq!(reaper.len(), 5);
        assert_eq!(reaper.peek_oldest(), Some(1));
        assert_eq!(reaper.pop_oldest(1, false), Some(3));
        assert!(!reaper.contains(3));
        assert_eq!(reaper.peek_oldest(), Some(1));
        reaper.push(3);
        assert_eq!(reaper.len(), 5);
        let order: Vec<CellId> = std::iter::from_fn(|| reaper.pop_oldest(usize::MAX, true)).collect();
        assert_eq!(order, vec![1, 2, 0, 4, 3]);
        assert_eq!(reaper.peek_oldest(), None);
        reaper.push(7);
        assert_eq!(reaper.pop_oldest(0, false), Some(7));
    }

    proptest! {
        #[test]
        fn prop_reaper_queue_matches_model(
            ops in proptest::collection::vec((0usize..3, 0usize..8, any::<bool>()), 1..80),
        ) {
            let mut reaper = ReaperQueue::new(8);
            let mut model: VecDeque<CellId> = (0..8).collect();
            for (op, cell, allow_parent) in ops {
                if op == 0 {
                    let expected = match model.front().copied() {
                        Some(front) if allow_parent || front != cell => model.pop_front(),
                        Some(_) => match model.get(1).copied() {
                            Some(_) => model.remove(1),
                            None => None,
                        },
                        None => None,
                    };
                    prop_assert_eq!(reaper.pop_oldest(cell, allow_parent), expected);
                } else {
                    model.retain(|&c| c != cell);
                    model.push_back(cell);
                    reaper.push(cell);
                }
                prop_assert_eq!(reaper.len(), model.len());
                prop_assert_eq!(reaper.peek_oldest(), model.front().copied());
            }
        }
    }

    #[test]
    fn test_largest_cycles_in_population_prefers_empty() {
        let mut g = grid(3, 1, Geometry::Torus);
        place(&mut g, 0, 0, 500);
        place(&mut g, 1, 0, 10);
        let method = BirthMethod::LargestCyclesInPopulation;
        let mut rng = RandomSource::new(3);
        assert_eq!(method.select_target(&g, 1, &config(method), &mut ReaperQueue::new(3), &mut rng), Some(2));
        place(&mut g, 2, 0, 20);
        assert_eq!(method.select_target(&g, 1, &config(method), &mut ReaperQueue::new(3), &mut rng), Some(0));
    }

    #[test]
    fn test_next_cell_and_facing() {
        let mut g = grid(3, 3, Geometry::Torus);
        let mut rng = RandomSource::new(3);
        let mut reaper = ReaperQueue::new(9);
        let next = BirthMethod::NextCell;
        assert_eq!(next.select_target(&g, 8, &config(next), &mut reaper, &mut rng), Some(0));
        let facing = BirthMethod::ParentFacing;
        assert!(g.face_towards(4, 5));
        assert_eq!(facing.select_target(&g, 4, &config(facing), &mut reaper, &mut rng), Some(5));
    }

    #[test]
    fn test_random_in_deme_stays_in_deme() {
        let g = Grid::from_config(&WorldConfig {
            width: 3,
            height: 6,
            num_demes: 2,
            ..WorldConfig::default()
        })
        .unwrap();
        let method = BirthMethod::RandomInDeme;
        let mut rng = RandomSource::new(3);
        for _ in 0..50 {
            let target = method
                .select_target(&g, 10, &config(method), &mut ReaperQueue::new(18), &mut rng)
                .unwrap();
            assert_eq!(g.deme_of(target), 1);
        }
    }
}
