//! Resource counts: global pools, per-deme pools and per-cell fields.
//!
//! Each update a level `v` becomes `v * (1 - decay) * (1 - outflow) + inflow`.
//! Spatial fields apply that law per cell and then diffuse once across the
//! grid neighbor lists. Levels never go below zero.

use crate::grid::Grid;
use digevo_core::{
    scaled_average_merit, CellId, DemeId, Error, ResourceId, ResourceScope, ResourceSpec, Result,
};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
enum Level {
    Global(f64),
    Deme(Vec<f64>),
    Spatial(Vec<f64>),
}

pub struct ResourceCount {
    specs: Vec<ResourceSpec>,
    levels: Vec<Level>,
    neighbors: Vec<Vec<CellId>>,
    cell_deme: Vec<DemeId>,
    deme_cells: Vec<Vec<CellId>>,
}

impl ResourceCount {
    pub fn new(specs: Vec<ResourceSpec>, grid: &Grid) -> Self {
        let cells = grid.size();
        let demes = grid.num_demes();
        let levels = specs.iter().map(|spec| initial_level(spec, cells, demes)).collect();
        Self {
            specs,
            levels,
            neighbors: (0..cells).map(|c| grid.neighbors(c).to_vec()).collect(),
            cell_deme: (0..cells).map(|c| grid.deme_of(c)).collect(),
            deme_cells: (0..demes).map(|d| grid.deme_cells(d).to_vec()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn spec(&self, id: ResourceId) -> Option<&ResourceSpec> {
        self.specs.get(id)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.specs.iter().map(|s| s.name.as_str())
    }

    pub fn resolve(&self, name: &str) -> Result<ResourceId> {
        self.specs
            .iter()
            .position(|s| s.name == name)
            .ok_or_else(|| Error::NotFound(format!("resource '{}'", name)))
    }

    /// Total quantity of a resource; 0 for unknown ids.
    pub fn get_resource(&self, id: ResourceId) -> f64 {
        match self.levels.get(id) {
            Some(Level::Global(v)) => *v,
            Some(Level::Deme(values)) | Some(Level::Spatial(values)) => values.iter().sum(),
            None => 0.0,
        }
    }

    /// Set the total quantity, spreading it evenly over cells or demes.
    pub fn set_resource(&mut self, id: ResourceId, value: f64) {
        let value = non_negative(value);
        match self.levels.get_mut(id) {
            Some(Level::Global(v)) => *v = value,
            Some(Level::Deme(values)) | Some(Level::Spatial(values)) => {
                let share = value / values.len().max(1) as f64;
                values.iter_mut().for_each(|v| *v = share);
            }
            None => warn!(resource = id, "set on unknown resource"),
        }
    }

    /// Add `delta` to the total, spread evenly, clamping at zero.
    pub fn update_resource(&mut self, id: ResourceId, delta: f64) {
        match self.levels.get_mut(id) {
            Some(Level::Global(v)) => *v = non_negative(*v + delta),
            Some(Level::Deme(values)) | Some(Level::Spatial(values)) => {
                let share = delta / values.len().max(1) as f64;
                values.iter_mut().for_each(|v| *v = non_negative(*v + share));
            }
            None => warn!(resource = id, "update on unknown resource"),
        }
    }

    pub fn set_inflow(&mut self, id: ResourceId, rate: f64) {
        if let Some(spec) = self.specs.get_mut(id) {
            spec.inflow = non_negative(rate);
        }
    }

    pub fn set_decay(&mut self, id: ResourceId, rate: f64) {
        if let Some(spec) = self.specs.get_mut(id) {
            spec.decay = rate.clamp(0.0, 1.0);
        }
    }

    pub fn set_outflow(&mut self, id: ResourceId, rate: f64) {
        if let Some(spec) = self.specs.get_mut(id) {
            spec.outflow = rate.clamp(0.0, 1.0);
        }
    }

    /// Levels visible from one cell, one entry per resource.
    pub fn get_cell_resources(&self, cell: CellId) -> Vec<f64> {
        (0..self.levels.len()).map(|id| self.cell_level(cell, id)).collect()
    }

    pub fn cell_level(&self, cell: CellId, id: ResourceId) -> f64 {
        match self.levels.get(id) {
            Some(Level::Global(v)) => *v,
            Some(Level::Deme(values)) => self
                .cell_deme
                .get(cell)
                .and_then(|&d| values.get(d))
                .copied()
                .unwrap_or(0.0),
            Some(Level::Spatial(values)) => values.get(cell).copied().unwrap_or(0.0),
            None => 0.0,
        }
    }

    pub fn set_cell_resources(&mut self, cell: CellId, values: &[f64]) -> Result<()> {
        if values.len() != self.levels.len() {
            return Err(Error::Validation(format!(
                "expected {} resource values, got {}",
                self.levels.len(),
                values.len()
            )));
        }
        if cell >= self.cell_deme.len() {
            return Err(Error::NotFound(format!("cell {}", cell)));
        }
        for (id, &value) in values.iter().enumerate() {
            *self.cell_slot(cell, id) = non_negative(value);
        }
        Ok(())
    }

    /// Change the level seen by `cell`; returns the amount actually applied.
    ///
    /// Withdrawals are capped at what is available.
    pub fn modify_cell(&mut self, cell: CellId, id: ResourceId, delta: f64) -> f64 {
        if id >= self.levels.len() || cell >= self.cell_deme.len() || !delta.is_finite() {
            return 0.0;
        }
        let slot = self.cell_slot(cell, id);
        let applied = if delta < 0.0 { delta.max(-*slot) } else { delta };
        *slot = non_negative(*slot + applied);
        applied
    }

    fn cell_slot(&mut self, cell: CellId, id: ResourceId) -> &mut f64 {
        let deme = self.cell_deme[cell];
        match &mut self.levels[id] {
            Level::Global(v) => v,
            Level::Deme(values) => &mut values[deme],
            Level::Spatial(values) => &mut values[cell],
        }
    }

    /// Apply one update of inflow, decay, outflow and diffusion.
    pub fn advance(&mut self) {
        for (spec, level) in self.specs.iter().zip(self.levels.iter_mut()) {
            let keep = (1.0 - spec.decay) * (1.0 - spec.outflow);
            match level {
                Level::Global(v) => *v = non_negative(*v * keep + spec.inflow),
                Level::Deme(values) => {
                    for v in values.iter_mut() {
                        *v = non_negative(*v * keep + spec.inflow);
                    }
                }
                Level::Spatial(values) => {
                    for v in values.iter_mut() {
                        *v = non_negative(*v * keep + spec.inflow);
                    }
                    if spec.diffusion > 0.0 {
                        diffuse(values, &self.neighbors, spec.diffusion);
                    }
                }
            }
        }
    }

    /// Restore every level to its initial value.
    pub fn reset(&mut self) {
        let cells = self.cell_deme.len();
        let demes = self.deme_cells.len();
        self.levels = self
            .specs
            .iter()
            .map(|spec| initial_level(spec, cells, demes))
            .collect();
    }

    /// Restore deme pools and the deme's cells to their initial values.
    pub fn reset_deme(&mut self, deme: DemeId) {
        let Some(cells) = self.deme_cells.get(deme) else {
            return;
        };
        for (spec, level) in self.specs.iter().zip(self.levels.iter_mut()) {
            match level {
                Level::Global(_) => {}
                Level::Deme(values) => values[deme] = spec.initial,
                Level::Spatial(values) => {
                    for &cell in cells {
                        values[cell] = spec.initial;
                    }
                }
            }
        }
        debug!(deme, "Deme resources reset");
    }

    /// Inject `amount` scaled by average merit per time slice.
    pub fn inject_scaled(&mut self, id: ResourceId, amount: f64, ave_merit: f64, ave_time_slice: u32) {
        let scale = scaled_average_merit(ave_merit, ave_time_slice);
        self.update_resource(id, amount / scale);
    }

    /// Remove a merit-scaled fraction of the resource.
    ///
    /// A nominal fraction `p` per update becomes `1 / (1 + m * (1 - p) / p)`
    /// where `m` is the scaled average merit; the level drops by that share.
    pub fn outflow_scaled(&mut self, id: ResourceId, fraction: f64, ave_merit: f64, ave_time_slice: u32) {
        if !(fraction > 0.0) {
            return;
        }
        let scaled = if fraction >= 1.0 {
            1.0
        } else {
            let m = scaled_average_merit(ave_merit, ave_time_slice);
            1.0 / (1.0 + m * (1.0 - fraction) / fraction)
        };
        let remaining = self.get_resource(id) * (1.0 - scaled);
        self.set_resource(id, remaining);
    }
}

fn initial_level(spec: &ResourceSpec, cells: usize, demes: usize) -> Level {
    match spec.scope {
        ResourceScope::Global => Level::Global(spec.initial),
        ResourceScope::Deme => Level::Deme(vec![spec.initial; demes]),
        ResourceScope::Spatial => Level::Spatial(vec![spec.initial; cells]),
    }
}

fn non_negative(v: f64) -> f64 {
    if v.is_finite() && v > 0.0 {
        v
    } else {
        0.0
    }
}

/// One explicit diffusion pass. Each ordered neighbor pair moves
/// `rate * (v[c] - v[n]) / (2 * max(deg, 8))` from `c` to `n`.
fn diffuse(values: &mut [f64], neighbors: &[Vec<CellId>], rate: f64) {
    let mut delta = vec![0.0; values.len()];
    for (cell, list) in neighbors.iter().enumerate() {
        let weight = rate / (2.0 * list.len().max(8) as f64);
        for &n in list {
            let flow = weight * (values[cell] - values[n]);
            delta[cell] -= flow;
            delta[n] += flow;
        }
    }
    for (v, d) in values.iter_mut().zip(delta) {
        *v = non_negative(*v + d);
    }
}
