//! Runs the update loop and shares its progress with the control API.

use chrono::{DateTime, Utc};
use digevo_core::PopulationStats;
use digevo_world::World;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::time::Instant;
use tracing::{info, instrument, warn};

/// Requests queued by the API and applied between updates.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Exit,
    Comment(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct RunStatus {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub stats: PopulationStats,
}

/// State shared between the update loop and the API handlers.
pub struct RunControl {
    commands: Mutex<Vec<Command>>,
    status: RwLock<RunStatus>,
}

impl RunControl {
    pub fn new() -> Self {
        Self {
            commands: Mutex::new(Vec::new()),
            status: RwLock::new(RunStatus {
                started_at: Utc::now(),
                finished_at: None,
                stats: PopulationStats::default(),
            }),
        }
    }

    pub fn submit(&self, command: Command) {
        self.commands.lock().push(command);
    }

    pub fn status(&self) -> RunStatus {
        self.status.read().clone()
    }

    pub fn is_finished(&self) -> bool {
        self.status.read().finished_at.is_some()
    }

    fn take_commands(&self) -> Vec<Command> {
        std::mem::take(&mut *self.commands.lock())
    }

    fn publish(&self, stats: PopulationStats) {
        self.status.write().stats = stats;
    }

    fn finish(&self, stats: PopulationStats) {
        let mut status = self.status.write();
        status.stats = stats;
        status.finished_at = Some(Utc::now());
    }
}

impl Default for RunControl {
    fn default() -> Self {
        Self::new()
    }
}

/// Drive `world` until it reports an exit condition.
///
/// Commands are applied at update boundaries only.
#[instrument(skip(world, control))]
pub fn run_world(mut world: World, control: &RunControl) -> digevo_core::Result<PopulationStats> {
    let started = Instant::now();
    let log_interval = world.config().run.log_interval.max(1);

    loop {
        for command in control.take_commands() {
            match command {
                Command::Exit => world.request_exit(),
                Command::Comment(text) => world.notify_comment(&text),
            }
        }
        if world.should_exit() {
            break;
        }
        if let Err(e) = world.run_update() {
            warn!(update = world.update(), error = %e, "Update failed");
            control.finish(world.stats());
            return Err(e);
        }
        let stats = world.stats();
        if stats.update % log_interval == 0 {
            let elapsed = started.elapsed().as_secs_f64();
            if elapsed > 0.0 {
                crate::record_gauge!("updates_per_second", stats.update as f64 / elapsed);
            }
        }
        control.publish(stats);
    }

    let stats = world.stats();
    info!(
        updates = stats.update,
        organisms = stats.num_organisms,
        elapsed_secs = started.elapsed().as_secs_f64(),
        "Run finished"
    );
    control.finish(stats.clone());
    Ok(stats)
}
