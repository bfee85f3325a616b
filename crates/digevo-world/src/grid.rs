//! Cell grid, deme bands and per-geometry neighbor lists.
//!
//! Cells are indexed `layer * width * height + y * width + x`. Demes are
//! horizontal bands of `height / num_demes` rows spanning every layer, and
//! the neighbor topology is built inside each band, so demes never touch.

use crate::organism::Organism;
use digevo_core::{CellId, DemeId, Direction, Error, Geometry, Position, RandomSource, Result, WorldConfig};

/// A fixed grid position holding at most one organism
pub struct Cell {
    pub id: CellId,
    pub position: Position,
    pub layer: i32,
    pub deme: DemeId,
    neighbors: Vec<CellId>,
    facing: usize,
    pub organism: Option<Organism>,
}

impl Cell {
    pub fn is_occupied(&self) -> bool {
        self.organism.is_some()
    }

    pub fn neighbors(&self) -> &[CellId] {
        &self.neighbors
    }

    /// Neighbor currently faced, if the cell has any neighbors.
    pub fn faced(&self) -> Option<CellId> {
        self.neighbors.get(self.facing).copied()
    }

    pub fn facing(&self) -> usize {
        self.facing
    }

    pub fn rotate(&mut self, steps: isize) {
        let n = self.neighbors.len() as isize;
        if n > 0 {
            self.facing = (self.facing as isize + steps).rem_euclid(n) as usize;
        }
    }
}

pub struct Grid {
    width: i32,
    height: i32,
    depth: i32,
    geometry: Geometry,
    cells: Vec<Cell>,
    demes: Vec<Vec<CellId>>,
}

impl Grid {
    /// Build the grid from world configuration
    pub fn from_config(config: &WorldConfig) -> Result<Self> {
        if config.width <= 0 || config.height <= 0 || config.depth <= 0 {
            return Err(Error::Config("world dimensions must be positive".to_string()));
        }
        if config.num_demes == 0 || config.height as usize % config.num_demes != 0 {
            return Err(Error::Config(format!(
                "world height {} is not divisible into {} demes",
                config.height, config.num_demes
            )));
        }

        let band = config.height / config.num_demes as i32;
        let mut grid = Self {
            width: config.width,
            height: config.height,
            depth: config.depth,
            geometry: config.geometry,
            cells: Vec::with_capacity(config.num_cells()),
            demes: vec![Vec::new(); config.num_demes],
        };

        for layer in 0..config.depth {
            for y in 0..config.height {
                for x in 0..config.width {
                    let id = grid.cells.len();
                    let deme = (y / band) as DemeId;
                    grid.cells.push(Cell {
                        id,
                        position: Position::new(x, y),
                        layer,
                        deme,
                        neighbors: Vec::new(),
                        facing: 0,
                        organism: None,
                    });
                    grid.demes[deme].push(id);
                }
            }
        }

        for id in 0..grid.cells.len() {
            let neighbors = grid.build_neighbors(id, band);
            grid.cells[id].neighbors = neighbors;
        }

        Ok(grid)
    }

    fn build_neighbors(&self, id: CellId, band: i32) -> Vec<CellId> {
        let cell = &self.cells[id];
        let (x, y, layer) = (cell.position.x, cell.position.y, cell.layer);
        let top = (y / band) * band;

        let offsets: Vec<(i32, i32)> = match self.geometry {
            Geometry::Grid | Geometry::Torus | Geometry::Lattice => {
                Direction::all().iter().map(|d| d.to_delta()).collect()
            }
            Geometry::Hex if (y - top) % 2 == 0 => {
                vec![(-1, -1), (0, -1), (1, 0), (0, 1), (-1, 1), (-1, 0)]
            }
            Geometry::Hex => vec![(0, -1), (1, -1), (1, 0), (1, 1), (0, 1), (-1, 0)],
            Geometry::Clique => {
                return self.demes[cell.deme].iter().copied().filter(|&other| other != id).collect();
            }
            Geometry::None => return Vec::new(),
        };

        let wraps = !matches!(self.geometry, Geometry::Grid);
        let mut neighbors = Vec::with_capacity(offsets.len() + 2);
        for (dx, dy) in offsets {
            let mut nx = x + dx;
            let mut ny = y + dy - top;
            if wraps {
                nx = nx.rem_euclid(self.width);
                ny = ny.rem_euclid(band);
            } else if nx < 0 || nx >= self.width || ny < 0 || ny >= band {
                continue;
            }
            let other = self.raw_index(nx, ny + top, layer);
            if other != id && !neighbors.contains(&other) {
                neighbors.push(other);
            }
        }

        if self.geometry == Geometry::Lattice {
            for dz in [-1, 1] {
                let nz = layer + dz;
                if nz >= 0 && nz < self.depth {
                    neighbors.push(self.raw_index(x, y, nz));
                }
            }
        }

        neighbors
    }

    fn raw_index(&self, x: i32, y: i32, layer: i32) -> CellId {
        ((layer * self.height + y) * self.width + x) as CellId
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn size(&self) -> usize {
        self.cells.len()
    }

    pub fn num_demes(&self) -> usize {
        self.demes.len()
    }

    pub fn cell(&self, id: CellId) -> &Cell {
        &self.cells[id]
    }

    pub fn cell_mut(&mut self, id: CellId) -> &mut Cell {
        &mut self.cells[id]
    }

    pub fn cells(&self) -> impl Iterator<Item = &Cell> + '_ {
        self.cells.iter()
    }

    pub fn cells_mut(&mut self) -> impl Iterator<Item = &mut Cell> + '_ {
        self.cells.iter_mut()
    }

    pub fn neighbors(&self, id: CellId) -> &[CellId] {
        &self.cells[id].neighbors
    }

    pub fn is_occupied(&self, id: CellId) -> bool {
        self.cells[id].is_occupied()
    }

    pub fn organism(&self, id: CellId) -> Option<&Organism> {
        self.cells.get(id).and_then(|c| c.organism.as_ref())
    }

    pub fn organism_mut(&mut self, id: CellId) -> Option<&mut Organism> {
        self.cells.get_mut(id).and_then(|c| c.organism.as_mut())
    }

    pub fn occupied_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_occupied()).count()
    }

    pub fn deme_of(&self, id: CellId) -> DemeId {
        self.cells[id].deme
    }

    pub fn deme_cells(&self, deme: DemeId) -> &[CellId] {
        &self.demes[deme]
    }

    pub fn position(&self, id: CellId) -> Position {
        self.cells[id].position
    }

    /// Cell at `pos` on the first layer.
    pub fn index_of(&self, pos: Position) -> Option<CellId> {
        if pos.in_bounds(self.width, self.height) {
            Some(self.raw_index(pos.x, pos.y, 0))
        } else {
            None
        }
    }

    pub fn is_world_edge(&self, id: CellId) -> bool {
        let pos = self.cells[id].position;
        pos.x == 0 || pos.y == 0 || pos.x == self.width - 1 || pos.y == self.height - 1
    }

    /// Cell nearest the geometric center of a deme, on the first layer.
    pub fn deme_center(&self, deme: DemeId) -> CellId {
        let band = self.height / self.num_demes() as i32;
        let y = deme as i32 * band + band / 2;
        self.raw_index(self.width / 2, y, 0)
    }

    /// Point `id` at `target` if it is a neighbor.
    pub fn face_towards(&mut self, id: CellId, target: CellId) -> bool {
        let cell = &mut self.cells[id];
        match cell.neighbors.iter().position(|&n| n == target) {
            Some(index) => {
                cell.facing = index;
                true
            }
            None => false,
        }
    }

    /// Face the north-west neighbor, or the first neighbor when there is none.
    pub fn face_northwest(&mut self, id: CellId) {
        let pos = self.cells[id].position;
        let layer = self.cells[id].layer;
        let target = Position::new(pos.x - 1, pos.y - 1).wrap(self.width, self.height);
        let target_id = self.raw_index(target.x, target.y, layer);
        if !self.face_towards(id, target_id) {
            self.cells[id].facing = 0;
        }
    }

    pub fn face_random(&mut self, id: CellId, rng: &mut RandomSource) {
        let n = self.cells[id].neighbors.len();
        self.cells[id].facing = rng.next_int(n);
    }
}
