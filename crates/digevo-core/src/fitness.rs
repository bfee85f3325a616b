//! Running averages and population snapshots.

use serde::{Deserialize, Serialize};

/// Incremental mean that also supports removing samples.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RunningAverage {
    count: u64,
    sum: f64,
}

impl RunningAverage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, value: f64) {
        if value.is_finite() {
            self.count += 1;
            self.sum += value;
        }
    }

    pub fn remove(&mut self, value: f64) {
        if value.is_finite() && self.count > 0 {
            self.count -= 1;
            self.sum -= value;
            if self.count == 0 {
                self.sum = 0.0;
            }
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    pub fn average(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Population summary for one update, as reported to the driver.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PopulationStats {
    pub update: u64,
    pub num_organisms: usize,
    pub num_genotypes: usize,
    pub num_demes: usize,
    pub ave_merit: f64,
    pub ave_fitness: f64,
    pub ave_gestation: f64,
    pub ave_generation: f64,
    pub max_fitness: f64,
    pub births_this_update: u64,
    pub deaths_this_update: u64,
    pub divide_failures_this_update: u64,
    pub total_births: u64,
    pub deme_replications: u64,
    pub migrants_out: u64,
    pub migrants_in: u64,
}

/// Average merit used to scale resource actions; never below 1 slice-unit.
pub fn scaled_average_merit(ave_merit: f64, ave_time_slice: u32) -> f64 {
    let ave = if ave_merit.is_finite() && ave_merit > 0.0 {
        ave_merit
    } else {
        1.0
    };
    ave / ave_time_slice.max(1) as f64
}
