//! Genotype arena: one node per distinct genome, linked to its parent by id.
//!
//! Living counts move by exactly one per birth or death. Dead genotypes stay
//! in the arena until `prune` runs; with lineage tracking on, a dead genotype
//! is also kept while any descendant genotype still references it.

use digevo_core::{Error, GenotypeId, Result, RunningAverage};
use digevo_genome::Genome;
use std::collections::{BTreeMap, HashMap};
use tracing::trace;

#[derive(Debug, Clone)]
pub struct Genotype {
    id: GenotypeId,
    genome: Genome,
    parent: Option<GenotypeId>,
    depth: u32,
    birth_update: u64,
    num_living: u64,
    total_ever: u64,
    child_refs: u32,
    fitness: RunningAverage,
    merit: RunningAverage,
    gestation: RunningAverage,
    best_fitness: f64,
}

impl Genotype {
    pub fn id(&self) -> GenotypeId {
        self.id
    }

    pub fn genome(&self) -> &Genome {
        &self.genome
    }

    pub fn parent(&self) -> Option<GenotypeId> {
        self.parent
    }

    /// Number of ancestors back to an injected genotype.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn birth_update(&self) -> u64 {
        self.birth_update
    }

    pub fn num_living(&self) -> u64 {
        self.num_living
    }

    pub fn total_ever(&self) -> u64 {
        self.total_ever
    }

    /// Average fitness over completed gestations of this genotype.
    pub fn fitness(&self) -> f64 {
        self.fitness.average()
    }

    pub fn merit(&self) -> f64 {
        self.merit.average()
    }

    pub fn gestation_time(&self) -> f64 {
        self.gestation.average()
    }

    pub fn best_fitness(&self) -> f64 {
        self.best_fitness
    }
}

pub struct GenotypeArena {
    nodes: BTreeMap<GenotypeId, Genotype>,
    by_genome: HashMap<Genome, GenotypeId>,
    next_id: u64,
    track_lineages: bool,
}

impl GenotypeArena {
    pub fn new(track_lineages: bool) -> Self {
        Self {
            nodes: BTreeMap::new(),
            by_genome: HashMap::new(),
            next_id: 0,
            track_lineages,
        }
    }

    /// Genotype for `genome`, creating it under `parent` when unseen.
    pub fn classify(&mut self, genome: &Genome, parent: Option<GenotypeId>, update: u64) -> GenotypeId {
        if let Some(&id) = self.by_genome.get(genome) {
            return id;
        }

        let id = GenotypeId(self.next_id);
        self.next_id += 1;

        let parent = parent.filter(|p| self.nodes.contains_key(p));
        let depth = match parent.and_then(|p| self.nodes.get_mut(&p)) {
            Some(node) => {
                node.child_refs += 1;
                node.depth + 1
            }
            None => 0,
        };

        self.nodes.insert(
            id,
            Genotype {
                id,
                genome: genome.clone(),
                parent,
                depth,
                birth_update: update,
                num_living: 0,
                total_ever: 0,
                child_refs: 0,
                fitness: RunningAverage::new(),
                merit: RunningAverage::new(),
                gestation: RunningAverage::new(),
                best_fitness: 0.0,
            },
        );
        self.by_genome.insert(genome.clone(), id);
        trace!(genotype = %id, parent = ?parent, depth, "New genotype");
        id
    }

    pub fn add_organism(&mut self, id: GenotypeId) -> Result<()> {
        let node = self
            .nodes
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("genotype {}", id)))?;
        node.num_living += 1;
        node.total_ever += 1;
        Ok(())
    }

    pub fn remove_organism(&mut self, id: GenotypeId) -> Result<()> {
        let node = self
            .nodes
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("genotype {}", id)))?;
        if node.num_living == 0 {
            return Err(Error::InvalidState(format!(
                "genotype {} has no living organisms to remove",
                id
            )));
        }
        node.num_living -= 1;
        Ok(())
    }

    /// Record a completed gestation by an organism of this genotype.
    pub fn record_gestation(&mut self, id: GenotypeId, fitness: f64, merit: f64, gestation: u64) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.fitness.add(fitness);
            node.merit.add(merit);
            node.gestation.add(gestation as f64);
            if fitness > node.best_fitness {
                node.best_fitness = fitness;
            }
        }
    }

    /// Drop dead genotypes; returns how many were removed.
    pub fn prune(&mut self) -> usize {
        let mut removed = 0;
        loop {
            let dead: Vec<GenotypeId> = self
                .nodes
                .values()
                .filter(|n| n.num_living == 0 && (!self.track_lineages || n.child_refs == 0))
                .map(|n| n.id)
                .collect();
            if dead.is_empty() {
                break;
            }
            for id in dead {
                if let Some(node) = self.nodes.remove(&id) {
                    self.by_genome.remove(&node.genome);
                    if let Some(parent) = node.parent.and_then(|p| self.nodes.get_mut(&p)) {
                        parent.child_refs = parent.child_refs.saturating_sub(1);
                    }
                    removed += 1;
                }
            }
            if !self.track_lineages {
                break;
            }
        }
        removed
    }

    pub fn get(&self, id: GenotypeId) -> Option<&Genotype> {
        self.nodes.get(&id)
    }

    pub fn find(&self, genome: &Genome) -> Option<GenotypeId> {
        self.by_genome.get(genome).copied()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Genotypes with at least one living organism.
    pub fn num_living_genotypes(&self) -> usize {
        self.nodes.values().filter(|n| n.num_living > 0).count()
    }

    pub fn total_living(&self) -> u64 {
        self.nodes.values().map(|n| n.num_living).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Genotype> + '_ {
        self.nodes.values()
    }

    /// Ancestor chain starting at `id`, as far as the arena still holds it.
    pub fn lineage(&self, id: GenotypeId) -> Vec<GenotypeId> {
        let mut chain = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            match self.nodes.get(&current) {
                Some(node) => {
                    chain.push(current);
                    cursor = node.parent;
                }
                None => break,
            }
        }
        chain
    }
}
