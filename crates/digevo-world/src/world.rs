//! The population update loop.

use crate::birth::{BirthPlacementPolicy, ReaperQueue};
use crate::deme::{DemeManager, DemeReplicationPolicy, DemeTrigger, SourceAction};
use crate::genotype::GenotypeArena;
use crate::grid::Grid;
use crate::migration::Migrator;
use crate::organism::Organism;
use crate::reproduction::{DivideFailure, DivideOutcome, DivideRequest, DivideStage, ReproductionPipeline};
use crate::resources::ResourceCount;
use crate::scheduler::{Scheduler, SchedulerPolicy, TimeSlice};
use digevo_core::{
    CellId, DeathMethod, Error, GenotypeId, OrganismFacing, OrganismId, Phenotype, PopulationStats,
    RandomSource, ResourceReset, Result, SimulationConfig,
};
use digevo_exec::{ExecutionContext, HardwareFactory, OrganismRequest, Runtime};
use digevo_genome::{validate_genome, Genome, InstructionSet, Mutator};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, event, info, instrument, trace, warn, Level};

const MAX_COMMENTS: usize = 100;

pub struct World {
    config: SimulationConfig,
    grid: Grid,
    resources: ResourceCount,
    scheduler: Scheduler,
    genotypes: GenotypeArena,
    demes: DemeManager,
    reaper: ReaperQueue,
    pipeline: ReproductionPipeline,
    runtime: Runtime,
    inst_set: InstructionSet,
    migrator: Option<Migrator>,
    rng: RandomSource,
    update: u64,
    next_organism_id: u64,
    counters: PopulationStats,
    exit_requested: bool,
    comments: VecDeque<(u64, String)>,
}

impl World {
    pub fn new(
        config: SimulationConfig,
        factory: Arc<dyn HardwareFactory>,
        migrator: Option<Migrator>,
    ) -> Result<Self> {
        config.validate()?;
        let rng = RandomSource::new(config.world.seed);
        let grid = Grid::from_config(&config.world)?;
        let resources = ResourceCount::new(config.resources.clone(), &grid);
        let scheduler = Scheduler::from_config(&config.scheduler, &grid);
        let demes = DemeManager::new(&grid, config.demes.clone());
        let inst_set = InstructionSet::heads_default();
        let mutator = Mutator::new(config.mutation.clone(), inst_set.clone());
        let pipeline = ReproductionPipeline::new(config.divide.clone(), config.reversion.clone(), mutator);

        let migrator = match (config.migration.enabled, migrator) {
            (true, Some(m)) => Some(m),
            (true, None) => {
                warn!("Migration enabled without a transport; offspring stay local");
                None
            }
            (false, _) => None,
        };

        info!(
            width = config.world.width,
            height = config.world.height,
            geometry = ?config.world.geometry,
            demes = config.world.num_demes,
            seed = rng.seed(),
            slicing = ?config.scheduler.slicing_method,
            birth_method = ?config.birth.birth_method,
            "World created"
        );

        Ok(Self {
            reaper: ReaperQueue::new(grid.size()),
            genotypes: GenotypeArena::new(config.run.track_lineages),
            runtime: Runtime::new(factory),
            config,
            grid,
            resources,
            scheduler,
            demes,
            pipeline,
            inst_set,
            migrator,
            rng,
            update: 0,
            next_organism_id: 0,
            counters: PopulationStats::default(),
            exit_requested: false,
            comments: VecDeque::new(),
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn update(&self) -> u64 {
        self.update
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn resources(&self) -> &ResourceCount {
        &self.resources
    }

    pub fn resources_mut(&mut self) -> &mut ResourceCount {
        &mut self.resources
    }

    pub fn genotypes(&self) -> &GenotypeArena {
        &self.genotypes
    }

    pub fn demes(&self) -> &DemeManager {
        &self.demes
    }

    pub fn organism(&self, cell: CellId) -> Option<&Organism> {
        self.grid.organism(cell)
    }

    pub fn num_organisms(&self) -> usize {
        self.grid.occupied_count()
    }

    pub fn seed(&self) -> u64 {
        self.rng.seed()
    }

    pub fn comments(&self) -> impl Iterator<Item = &(u64, String)> + '_ {
        self.comments.iter()
    }

    /// Place a parentless organism in `cell`, replacing any occupant.
    pub fn inject(&mut self, genome: Genome, cell: CellId) -> Result<OrganismId> {
        self.check_cell(cell)?;
        let mut genome = genome;
        let rates = self.pipeline.mutator().rates();
        if rates.inject_mut > 0.0 || rates.inject_ins > 0.0 || rates.inject_del > 0.0 {
            let limits = *self.pipeline.limits();
            self.pipeline.mutator().mutate_injected(&mut genome, &limits, &mut self.rng);
        }
        validate_genome(&genome, &self.inst_set, self.pipeline.limits())?;

        self.kill_cell(cell)?;
        let deme = self.grid.deme_of(cell);
        self.demes.note_injection(deme, &genome);
        let phenotype = Phenotype::injected(genome.len(), &self.config.merit);
        let id = self.place_organism(cell, genome, None, phenotype)?;
        debug!(event = "inject", organism_id = %id, cell, update = self.update, "Organism injected");
        Ok(id)
    }

    /// Remove the organism in `cell`; `false` when the cell was already empty.
    pub fn kill(&mut self, cell: CellId) -> Result<bool> {
        self.check_cell(cell)?;
        self.kill_cell(cell)
    }

    pub fn request_exit(&mut self) {
        info!(update = self.update, "Exit requested");
        self.exit_requested = true;
    }

    pub fn notify_comment(&mut self, text: &str) {
        info!(event = "comment", update = self.update, text, "Comment");
        if self.comments.len() == MAX_COMMENTS {
            self.comments.pop_front();
        }
        self.comments.push_back((self.update, text.to_string()));
    }

    /// Exit conditions, checked at update boundaries.
    pub fn should_exit(&self) -> bool {
        if self.exit_requested {
            return true;
        }
        let run = &self.config.run;
        if run.max_updates.map_or(false, |max| self.update >= max) {
            return true;
        }
        if run.exit_on_extinction && self.grid.occupied_count() == 0 {
            return true;
        }
        match run.max_generations {
            Some(max) if self.grid.occupied_count() > 0 => self.stats().ave_generation >= max,
            _ => false,
        }
    }

    /// Inject a merit-scaled amount of a global resource.
    pub fn inject_resource_scaled(&mut self, name: &str, amount: f64) -> Result<()> {
        let id = self.resources.resolve(name)?;
        let ave_merit = self.stats().ave_merit;
        self.resources
            .inject_scaled(id, amount, ave_merit, self.config.scheduler.ave_time_slice);
        Ok(())
    }

    /// Remove a merit-scaled fraction of a global resource.
    pub fn outflow_resource_scaled(&mut self, name: &str, fraction: f64) -> Result<()> {
        let id = self.resources.resolve(name)?;
        let ave_merit = self.stats().ave_merit;
        self.resources
            .outflow_scaled(id, fraction, ave_merit, self.config.scheduler.ave_time_slice);
        Ok(())
    }

    /// Run updates until an exit condition holds.
    #[instrument(skip(self), fields(max_updates = ?self.config.run.max_updates))]
    pub fn run(&mut self) -> Result<PopulationStats> {
        info!("Starting run at update {}", self.update);
        while !self.should_exit() {
            self.run_update()?;
        }
        self.emit_run_summary();
        Ok(self.stats())
    }

    /// Process one update.
    #[instrument(skip(self), fields(update = self.update))]
    pub fn run_update(&mut self) -> Result<()> {
        self.counters.births_this_update = 0;
        self.counters.deaths_this_update = 0;
        self.counters.divide_failures_this_update = 0;

        self.scheduler.begin_update(&mut self.rng);
        while let Some(slice) = self.scheduler.next_slice(&mut self.rng) {
            self.process_slice(slice)?;
        }

        for cell in self.grid.cells_mut() {
            if let Some(org) = cell.organism.as_mut() {
                org.phenotype.age += 1;
            }
        }
        self.demes.end_update();
        self.process_demes()?;
        self.resources.advance();
        let pruned = self.genotypes.prune();
        if pruned > 0 {
            trace!(pruned, "Genotypes pruned");
        }
        self.exchange_migrants()?;

        self.update += 1;
        let interval = self.config.run.log_interval;
        if interval > 0 && self.update % interval == 0 {
            self.emit_population_metrics();
        }
        Ok(())
    }

    fn process_slice(&mut self, slice: TimeSlice) -> Result<()> {
        let cell = slice.cell;
        let resources = self.resources.get_cell_resources(cell);
        let update = self.update;
        let Some(org) = self.grid.organism_mut(cell) else {
            return Ok(());
        };
        let ctx = ExecutionContext {
            organism_id: org.id,
            cell,
            update,
            merit: org.phenotype.merit,
            cur_bonus: org.phenotype.cur_bonus,
            age: org.phenotype.age,
            cycles_used: org.phenotype.cycles_used,
            resources,
        };
        let report = self
            .runtime
            .execute(org.hardware.as_mut(), &ctx, slice.cycles, &mut self.rng);
        org.phenotype.cycles_used += report.cycles_consumed;
        let organism_id = org.id;
        let merit = org.phenotype.merit;
        self.demes
            .record_cycles(self.grid.deme_of(cell), report.cycles_consumed, merit);

        for request in report.requests {
            if !self.is_alive(cell, organism_id) {
                break;
            }
            self.apply_request(cell, request)?;
        }

        if self.config.death.death_method != DeathMethod::Never {
            let expired = self
                .grid
                .organism(cell)
                .map_or(false, |o| o.id == organism_id && o.phenotype.is_past_age_limit());
            if expired {
                trace!(event = "old_age", organism_id = %organism_id, cell, "Organism died of old age");
                self.kill_cell(cell)?;
            }
        }
        Ok(())
    }

    fn is_alive(&self, cell: CellId, id: OrganismId) -> bool {
        self.grid.organism(cell).map_or(false, |o| o.id == id)
    }

    fn apply_request(&mut self, cell: CellId, request: OrganismRequest) -> Result<()> {
        match request {
            OrganismRequest::TaskCompleted { task, bonus } => {
                if let Some(org) = self.grid.organism_mut(cell) {
                    org.phenotype.complete_task(task, bonus);
                }
            }
            OrganismRequest::ReactionCompleted { reaction } => {
                if let Some(org) = self.grid.organism_mut(cell) {
                    org.phenotype.complete_reaction(reaction);
                }
            }
            OrganismRequest::SetMerit(merit) => {
                if let Some(org) = self.grid.organism_mut(cell) {
                    org.phenotype.set_merit(merit);
                    let merit = org.phenotype.merit;
                    self.scheduler.adjust(cell, Some(merit));
                }
            }
            OrganismRequest::ConsumeResource { name, amount } => self.change_resource(cell, &name, -amount),
            OrganismRequest::ReleaseResource { name, amount } => self.change_resource(cell, &name, amount),
            OrganismRequest::Divide {
                offspring,
                executed_fraction,
                copied_fraction,
            } => {
                let request = DivideRequest {
                    offspring,
                    executed_fraction,
                    copied_fraction,
                };
                self.divide(cell, request)?;
            }
            OrganismRequest::Death => {
                trace!(event = "requested_death", cell, "Organism requested death");
                self.kill_cell(cell)?;
            }
        }
        Ok(())
    }

    fn change_resource(&mut self, cell: CellId, name: &str, delta: f64) {
        match self.resources.resolve(name) {
            Ok(id) => {
                self.resources.modify_cell(cell, id, delta);
            }
            Err(e) => debug!(cell, error = %e, "Ignoring resource request"),
        }
    }

    /// Run the divide pipeline for the organism in `parent_cell`.
    pub fn divide(&mut self, parent_cell: CellId, request: DivideRequest) -> Result<DivideOutcome> {
        let Some(parent) = self.grid.organism(parent_cell) else {
            return Err(Error::InvalidState(format!("divide requested from empty cell {}", parent_cell)));
        };
        let parent_genome = parent.genome().clone();
        let parent_genotype = parent.genotype;
        let parent_id = parent.id;

        if let Err(reason) = self.pipeline.validate(&parent.phenotype, parent_genome.len(), &request) {
            return Ok(self.abort_divide(parent_id, DivideStage::Validating, reason));
        }

        let (copied, executed) = request.sizes(parent_genome.len());
        let unmutated = request.offspring;
        let mut child = unmutated.clone();
        let mutations = self.pipeline.mutate(&mut child, &mut self.rng);
        if let Err(reason) = self.pipeline.revert(
            &self.runtime,
            &parent_genome,
            &unmutated,
            &mut child,
            &mutations,
            &mut self.rng,
        ) {
            return Ok(self.abort_divide(parent_id, DivideStage::Mutating, reason));
        }

        if let Some(migrator) = self.migrator.as_mut() {
            let pos = self.grid.position(parent_cell);
            if migrator.wants_migration(pos, &mut self.rng)? && migrator.send(&child, pos, &mut self.rng)?.is_some() {
                self.finish_parent(parent_cell, parent_genotype, copied, executed)?;
                self.counters.migrants_out += 1;
                return Ok(DivideOutcome::Migrated { mutations });
            }
        }

        let method = self.config.birth.birth_method;
        let Some(target) = method.select_target(
            &self.grid,
            parent_cell,
            &self.config.birth,
            &mut self.reaper,
            &mut self.rng,
        ) else {
            return Ok(self.abort_divide(parent_id, DivideStage::Placing, DivideFailure::NoTargetCell));
        };

        let child_phenotype = {
            self.finish_parent(parent_cell, parent_genotype, copied, executed)?;
            let parent = self
                .grid
                .organism(parent_cell)
                .ok_or_else(|| Error::InvalidState("parent vanished during divide".to_string()))?;
            Phenotype::offspring(&parent.phenotype, child.len(), &self.config.merit)
        };

        self.kill_cell(target)?;
        let child_id = self.place_organism(target, child, Some(parent_genotype), child_phenotype)?;
        let genotype = self
            .grid
            .organism(target)
            .map(|o| o.genotype)
            .ok_or_else(|| Error::InvalidState(format!("offspring missing from cell {}", target)))?;
        if method.is_local() && target != parent_cell {
            self.grid.face_towards(target, parent_cell);
        }
        self.demes.record_birth(self.grid.deme_of(parent_cell));
        self.counters.births_this_update += 1;
        self.counters.total_births += 1;
        trace!(
            event = "birth",
            parent = %parent_id,
            child = %child_id,
            target,
            mutations = mutations.total(),
            "Offspring placed"
        );

        if target != parent_cell {
            self.after_divide(parent_cell)?;
        }

        Ok(DivideOutcome::Committed {
            target,
            child: child_id,
            genotype,
            mutations,
        })
    }

    fn abort_divide(&mut self, parent: OrganismId, stage: DivideStage, reason: DivideFailure) -> DivideOutcome {
        self.counters.divide_failures_this_update += 1;
        trace!(organism_id = %parent, stage = ?stage, %reason, "Divide aborted");
        DivideOutcome::aborted(stage, reason)
    }

    /// Close the parent's gestation and record it on its genotype.
    fn finish_parent(&mut self, cell: CellId, genotype: GenotypeId, copied: usize, executed: usize) -> Result<()> {
        let merit_config = &self.config.merit;
        let org = self
            .grid
            .organism_mut(cell)
            .ok_or_else(|| Error::InvalidState(format!("no parent in cell {}", cell)))?;
        org.phenotype.divide_reset(copied, executed, merit_config);
        let running = org.hardware.genome().clone();
        org.hardware.reset(&running);
        let phenotype = &org.phenotype;
        self.genotypes
            .record_gestation(genotype, phenotype.fitness, phenotype.merit, phenotype.gestation_time);
        let merit = phenotype.merit;
        self.scheduler.adjust(cell, Some(merit));
        Ok(())
    }

    /// Parent mutation and per-divide death for a surviving parent.
    fn after_divide(&mut self, parent_cell: CellId) -> Result<()> {
        if self.config.mutation.parent_mut > 0.0 {
            if let Some(org) = self.grid.organism_mut(parent_cell) {
                self.pipeline
                    .mutator()
                    .mutate_parent(org.hardware.genome_mut(), &mut self.rng);
            }
        }
        if self.rng.p(self.config.divide.death_prob) {
            trace!(cell = parent_cell, "Parent died at divide");
            self.kill_cell(parent_cell)?;
        }
        Ok(())
    }

    fn place_organism(
        &mut self,
        cell: CellId,
        genome: Genome,
        parent: Option<GenotypeId>,
        mut phenotype: Phenotype,
    ) -> Result<OrganismId> {
        if self.grid.is_occupied(cell) {
            return Err(Error::InvalidState(format!("cell {} is already occupied", cell)));
        }
        let genotype = self.genotypes.classify(&genome, parent, self.update);
        self.genotypes.add_organism(genotype)?;

        phenotype.max_cycles = self.draw_max_cycles(genome.len());
        let merit = phenotype.merit;
        let id = OrganismId(self.next_organism_id);
        self.next_organism_id += 1;
        let hardware = self.runtime.instantiate(&genome);
        self.grid.cell_mut(cell).organism = Some(Organism::new(id, genotype, genome, hardware, phenotype, self.update));

        self.scheduler.adjust(cell, Some(merit));
        self.demes.organism_added(self.grid.deme_of(cell));
        self.reaper.push(cell);
        Ok(id)
    }

    fn kill_cell(&mut self, cell: CellId) -> Result<bool> {
        let Some(org) = self.grid.cell_mut(cell).organism.take() else {
            return Ok(false);
        };
        self.genotypes.remove_organism(org.genotype)?;
        self.scheduler.adjust(cell, None);
        // The cell keeps its reaper position until something is born into it.
        self.demes.organism_removed(self.grid.deme_of(cell));
        self.counters.deaths_this_update += 1;
        trace!(
            event = "organism_death",
            organism_id = %org.id,
            cell,
            age = org.phenotype.age,
            generation = org.phenotype.generation,
            "Organism removed"
        );
        Ok(true)
    }

    /// Cycle budget before death by old age.
    fn draw_max_cycles(&mut self, genome_len: usize) -> Option<u64> {
        let death = &self.config.death;
        let scale = match death.death_method {
            DeathMethod::Never => return None,
            DeathMethod::AgeLimit => 1.0,
            DeathMethod::ProportionalAgeLimit => genome_len as f64,
        };
        let mut limit = death.age_limit as f64 * scale;
        if death.age_deviation > 0.0 {
            limit += self.rng.next_gaussian(0.0, death.age_deviation) * scale;
        }
        Some(limit.max(1.0).round() as u64)
    }

    fn check_cell(&self, cell: CellId) -> Result<()> {
        if cell >= self.grid.size() {
            return Err(Error::NotFound(format!("cell {} (world has {})", cell, self.grid.size())));
        }
        Ok(())
    }

    fn process_demes(&mut self) -> Result<()> {
        if !self.config.demes.any_trigger() || self.demes.len() < 2 {
            return Ok(());
        }
        for deme in 0..self.demes.len() {
            if let Some(trigger) = self.demes.trigger(deme) {
                self.replicate_deme(deme, trigger)?;
            }
        }
        Ok(())
    }

    fn replicate_deme(&mut self, source: usize, trigger: DemeTrigger) -> Result<()> {
        let Some(target) = self.demes.choose_target(source, &mut self.rng) else {
            return Ok(());
        };
        let deme_config = self.config.demes.clone();

        let germline = match self.demes.germline_founder(source) {
            Some(genome) if deme_config.use_germline => {
                let mut genome = genome.clone();
                let limits = *self.pipeline.limits();
                self.pipeline.mutator().mutate_sites(
                    &mut genome,
                    deme_config.germline_copy_mut,
                    deme_config.germline_ins_mut,
                    deme_config.germline_del_mut,
                    &limits,
                    &mut self.rng,
                );
                Some(genome)
            }
            _ => None,
        };
        let founders = match &germline {
            Some(genome) => vec![genome.clone()],
            None => self.demes.select_founders(&self.grid, source, &mut self.rng),
        };
        if founders.is_empty() {
            debug!(source, "Deme has no organisms to replicate");
            return Ok(());
        }

        let action = deme_config.divide_method.source_action();
        let source_founders = self.demes.deme(source).map(|d| d.founders().to_vec()).unwrap_or_default();

        self.clear_deme(target)?;
        self.found_deme(target, &founders)?;
        match action {
            SourceAction::Refound => {
                self.clear_deme(source)?;
                self.found_deme(source, &founders)?;
            }
            SourceAction::RestoreFounders if !source_founders.is_empty() => {
                self.clear_deme(source)?;
                self.found_deme(source, &source_founders)?;
            }
            _ => {}
        }

        match deme_config.reset_resources {
            ResourceReset::Both => {
                self.resources.reset_deme(source);
                self.resources.reset_deme(target);
            }
            ResourceReset::TargetOnly => self.resources.reset_deme(target),
            ResourceReset::Unchanged => {}
        }

        if let Some(genome) = &germline {
            self.demes.extend_germline(source, target, genome);
        }
        self.demes
            .finish_replication(source, target, &founders, action == SourceAction::Refound);
        self.counters.deme_replications += 1;
        info!(
            event = "deme_replication",
            update = self.update,
            source,
            target,
            trigger = ?trigger,
            founders = founders.len(),
            "Deme replicated"
        );
        Ok(())
    }

    fn clear_deme(&mut self, deme: usize) -> Result<()> {
        let cells = self.grid.deme_cells(deme).to_vec();
        for cell in cells {
            self.kill_cell(cell)?;
        }
        Ok(())
    }

    fn found_deme(&mut self, deme: usize, founders: &[Genome]) -> Result<()> {
        let cells = self
            .demes
            .placement_cells(&self.grid, deme, founders.len(), &mut self.rng);
        for (&cell, genome) in cells.iter().zip(founders) {
            self.kill_cell(cell)?;
            let phenotype = Phenotype::injected(genome.len(), &self.config.merit);
            self.place_organism(cell, genome.clone(), None, phenotype)?;
            match self.config.demes.organism_facing {
                OrganismFacing::Unchanged => {}
                OrganismFacing::NorthWest => self.grid.face_northwest(cell),
                OrganismFacing::Random => self.grid.face_random(cell, &mut self.rng),
            }
        }
        Ok(())
    }

    fn exchange_migrants(&mut self) -> Result<()> {
        let Some(mut migrator) = self.migrator.take() else {
            return Ok(());
        };
        let result = self.inject_migrants(&mut migrator);
        migrator.finish_exchange();
        self.migrator = Some(migrator);
        result
    }

    fn inject_migrants(&mut self, migrator: &mut Migrator) -> Result<()> {
        for message in migrator.collect_arrivals()? {
            let genome: Genome = match message.genome.parse() {
                Ok(genome) => genome,
                Err(e) => {
                    warn!(error = %e, "Dropping malformed migrant");
                    continue;
                }
            };
            let cell = match migrator.arrival_position(&message) {
                Some(pos) => match self.grid.index_of(pos) {
                    Some(cell) => cell,
                    None => {
                        warn!(x = pos.x, y = pos.y, "Migrant arrival cell outside the world");
                        continue;
                    }
                },
                None => self.rng.next_int(self.grid.size()),
            };
            match self.inject(genome, cell) {
                Ok(_) => self.counters.migrants_in += 1,
                Err(Error::Validation(reason)) => warn!(%reason, "Rejected migrant genome"),
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Current population statistics.
    pub fn stats(&self) -> PopulationStats {
        let mut stats = self.counters.clone();
        stats.update = self.update;
        stats.num_genotypes = self.genotypes.num_living_genotypes();
        stats.num_demes = self.demes.len();

        let mut count = 0usize;
        let (mut merit, mut fitness, mut gestation, mut generation) = (0.0, 0.0, 0.0, 0.0);
        let mut max_fitness: f64 = 0.0;
        for org in self.grid.cells().filter_map(|c| c.organism.as_ref()) {
            let p = &org.phenotype;
            count += 1;
            merit += p.merit;
            fitness += p.fitness;
            gestation += p.gestation_time as f64;
            generation += p.generation as f64;
            max_fitness = max_fitness.max(p.fitness);
        }
        stats.num_organisms = count;
        if count > 0 {
            let n = count as f64;
            stats.ave_merit = merit / n;
            stats.ave_fitness = fitness / n;
            stats.ave_gestation = gestation / n;
            stats.ave_generation = generation / n;
        } else {
            stats.ave_merit = 0.0;
            stats.ave_fitness = 0.0;
            stats.ave_gestation = 0.0;
            stats.ave_generation = 0.0;
        }
        stats.max_fitness = max_fitness;
        stats
    }

    /// Population invariants; a violation is an `InvalidState` error.
    pub fn check_invariants(&self) -> Result<()> {
        let occupied = self.grid.occupied_count() as u64;
        let living = self.genotypes.total_living();
        if occupied != living {
            return Err(Error::InvalidState(format!(
                "{} occupied cells but genotypes count {} living organisms",
                occupied, living
            )));
        }
        let deme_total: usize = self.demes.iter().map(|d| d.org_count()).sum();
        if deme_total as u64 != occupied {
            return Err(Error::InvalidState(format!(
                "{} occupied cells but demes count {} organisms",
                occupied, deme_total
            )));
        }
        if self.reaper.len() != self.grid.size() {
            return Err(Error::InvalidState(format!(
                "reaper queue holds {} of {} cells",
                self.reaper.len(),
                self.grid.size()
            )));
        }
        for cell in self.grid.cells() {
            if let Some(org) = &cell.organism {
                if !(org.phenotype.merit >= 0.0) {
                    return Err(Error::InvalidState(format!("cell {} holds merit {}", cell.id, org.phenotype.merit)));
                }
            }
        }
        Ok(())
    }

    fn emit_population_metrics(&self) {
        let stats = self.stats();
        info!(
            event = "population_metrics",
            update = stats.update,
            organisms = stats.num_organisms,
            genotypes = stats.num_genotypes,
            ave_merit = stats.ave_merit,
            ave_fitness = stats.ave_fitness,
            ave_gestation = stats.ave_gestation,
            ave_generation = stats.ave_generation,
            max_fitness = stats.max_fitness,
            births = stats.births_this_update,
            deaths = stats.deaths_this_update,
            divide_failures = stats.divide_failures_this_update,
            total_births = stats.total_births,
            deme_replications = stats.deme_replications,
            "Population metrics snapshot"
        );

        event!(
            Level::INFO,
            gauge_name = "population_total",
            gauge_value = stats.num_organisms,
            update = stats.update,
            "Population gauge"
        );

        event!(
            Level::INFO,
            gauge_name = "genotypes_living",
            gauge_value = stats.num_genotypes,
            update = stats.update,
            "Living genotypes"
        );

        event!(
            Level::INFO,
            gauge_name = "ave_fitness",
            gauge_value = stats.ave_fitness,
            update = stats.update,
            "Average fitness"
        );
    }

    fn emit_run_summary(&self) {
        let stats = self.stats();
        info!(
            event = "run_summary",
            final_update = stats.update,
            organisms = stats.num_organisms,
            genotypes = stats.num_genotypes,
            total_births = stats.total_births,
            deme_replications = stats.deme_replications,
            migrants_out = stats.migrants_out,
            migrants_in = stats.migrants_in,
            max_fitness = stats.max_fitness,
            exit_requested = self.exit_requested,
            "Run complete"
        );

        event!(
            Level::INFO,
            gauge_name = "final_population",
            gauge_value = stats.num_organisms,
            "Final population gauge"
        );
    }
}
