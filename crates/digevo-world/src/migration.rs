//! Offspring migration between peer worlds.
//!
//! Each world sends migrants during its update and exchanges them at the
//! update boundary: barrier, drain, order by (source, tag), inject, barrier.
//! The tag is the number of messages the sender has already sent this
//! update, so arrival order is the same on every run.

use digevo_core::{Error, Geometry, MigrationConfig, MigrationStyle, Position, RandomSource, Result, WorldConfig};
use digevo_genome::Genome;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Barrier};
use tracing::{debug, trace};

/// A migrating genome and the cell its parent occupied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationMessage {
    pub genome: String,
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Envelope {
    source: usize,
    tag: u64,
    message: MigrationMessage,
}

pub trait MigrationTransport: Send {
    fn rank(&self) -> usize;

    fn size(&self) -> usize;

    fn send(&mut self, dest: usize, payload: Vec<u8>) -> Result<()>;

    /// Block until every peer reaches the same point.
    fn barrier(&self);

    /// Everything delivered to this endpoint so far.
    fn drain(&mut self) -> Vec<Vec<u8>>;
}

struct HubShared {
    mailboxes: Vec<Mutex<Vec<Vec<u8>>>>,
    barrier: Barrier,
}

/// In-process transport for peer worlds running on separate threads.
pub struct InProcessHub;

impl InProcessHub {
    /// One endpoint per peer; endpoint `i` has rank `i`.
    pub fn endpoints(size: usize) -> Vec<HubEndpoint> {
        let size = size.max(1);
        let shared = Arc::new(HubShared {
            mailboxes: (0..size).map(|_| Mutex::new(Vec::new())).collect(),
            barrier: Barrier::new(size),
        });
        (0..size)
            .map(|rank| HubEndpoint {
                rank,
                shared: Arc::clone(&shared),
            })
            .collect()
    }
}

pub struct HubEndpoint {
    rank: usize,
    shared: Arc<HubShared>,
}

impl MigrationTransport for HubEndpoint {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.shared.mailboxes.len()
    }

    fn send(&mut self, dest: usize, payload: Vec<u8>) -> Result<()> {
        let mailbox = self
            .shared
            .mailboxes
            .get(dest)
            .ok_or_else(|| Error::Migration(format!("no peer world with rank {}", dest)))?;
        mailbox.lock().push(payload);
        Ok(())
    }

    fn barrier(&self) {
        self.shared.barrier.wait();
    }

    fn drain(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut *self.shared.mailboxes[self.rank].lock())
    }
}

pub struct Migrator {
    transport: Box<dyn MigrationTransport>,
    style: MigrationStyle,
    migration_prob: f64,
    width: i32,
    height: i32,
    geometry: Geometry,
    universe_dim: usize,
    universe_x: usize,
    universe_y: usize,
    sent: u64,
    received: u64,
}

impl Migrator {
    pub fn new(config: &MigrationConfig, world: &WorldConfig, transport: Box<dyn MigrationTransport>) -> Result<Self> {
        let size = transport.size();
        let rank = transport.rank();
        let (universe_dim, universe_x, universe_y) = match config.style {
            MigrationStyle::MassAction => (0, 0, 0),
            MigrationStyle::Spatial => {
                let dim = (size as f64).sqrt() as usize;
                if dim * dim != size {
                    return Err(Error::Config("spatial migration worlds must be square".to_string()));
                }
                (dim, rank % dim, rank / dim)
            }
        };
        Ok(Self {
            transport,
            style: config.style,
            migration_prob: config.migration_prob,
            width: world.width,
            height: world.height,
            geometry: world.geometry,
            universe_dim,
            universe_x,
            universe_y,
            sent: 0,
            received: 0,
        })
    }

    pub fn rank(&self) -> usize {
        self.transport.rank()
    }

    pub fn size(&self) -> usize {
        self.transport.size()
    }

    pub fn style(&self) -> MigrationStyle {
        self.style
    }

    /// Migrants sent since the last exchange.
    pub fn pending(&self) -> u64 {
        self.sent
    }

    pub fn total_received(&self) -> u64 {
        self.received
    }

    fn on_world_edge(&self, pos: Position) -> bool {
        pos.x == 0 || pos.y == 0 || pos.x == self.width - 1 || pos.y == self.height - 1
    }

    /// Whether a birth from `pos` may leave this world under spatial migration.
    pub fn is_world_boundary(&self, pos: Position) -> Result<bool> {
        if self.style != MigrationStyle::Spatial || !self.on_world_edge(pos) {
            return Ok(false);
        }
        match self.geometry {
            Geometry::Grid => {
                let dim = self.universe_dim as i32;
                let ux = pos.x + self.width * self.universe_x as i32;
                let uy = pos.y + self.height * self.universe_y as i32;
                Ok(!(ux == 0 || uy == 0 || ux == self.width * dim - 1 || uy == self.height * dim - 1))
            }
            Geometry::Torus => Ok(true),
            other => Err(Error::Migration(format!(
                "cell migration needs a bounded grid or torus, not {:?}",
                other
            ))),
        }
    }

    /// Decide whether an offspring born from `pos` migrates.
    pub fn wants_migration(&self, pos: Position, rng: &mut RandomSource) -> Result<bool> {
        if self.size() < 2 {
            return Ok(false);
        }
        if self.style == MigrationStyle::Spatial && !self.is_world_boundary(pos)? {
            return Ok(false);
        }
        Ok(rng.p(self.migration_prob))
    }

    /// Peer world a migrant from `pos` is sent to.
    pub fn destination(&self, pos: Position, rng: &mut RandomSource) -> Option<usize> {
        match self.style {
            MigrationStyle::MassAction => Some(rng.next_int(self.size())),
            MigrationStyle::Spatial => {
                let dim = self.universe_dim as i32;
                let (mut ux, mut uy) = (self.universe_x as i32, self.universe_y as i32);
                if pos.x == 0 {
                    ux -= 1;
                } else if pos.x == self.width - 1 {
                    ux += 1;
                } else if pos.y == 0 {
                    uy -= 1;
                } else if pos.y == self.height - 1 {
                    uy += 1;
                } else {
                    return None;
                }
                if self.geometry == Geometry::Torus {
                    ux = ux.rem_euclid(dim);
                    uy = uy.rem_euclid(dim);
                }
                if ux < 0 || uy < 0 || ux >= dim || uy >= dim {
                    return None;
                }
                Some((uy * dim + ux) as usize)
            }
        }
    }

    /// Send `genome` to a peer; returns the destination rank.
    pub fn send(&mut self, genome: &Genome, pos: Position, rng: &mut RandomSource) -> Result<Option<usize>> {
        let Some(dest) = self.destination(pos, rng) else {
            return Ok(None);
        };
        let envelope = Envelope {
            source: self.rank(),
            tag: self.sent,
            message: MigrationMessage {
                genome: genome.to_string(),
                x: pos.x,
                y: pos.y,
            },
        };
        self.transport.send(dest, bincode::serialize(&envelope)?)?;
        trace!(dest, tag = self.sent, "Migrant sent");
        self.sent += 1;
        Ok(Some(dest))
    }

    /// First half of the boundary exchange: every migrant sent to this world,
    /// ordered by source rank then tag.
    pub fn collect_arrivals(&mut self) -> Result<Vec<MigrationMessage>> {
        self.transport.barrier();
        let mut envelopes = self
            .transport
            .drain()
            .iter()
            .map(|bytes| bincode::deserialize::<Envelope>(bytes))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        envelopes.sort_by_key(|e| (e.source, e.tag));
        debug!(rank = self.rank(), sent = self.sent, received = envelopes.len(), "Migration exchange");
        self.sent = 0;
        self.received += envelopes.len() as u64;
        Ok(envelopes.into_iter().map(|e| e.message).collect())
    }

    /// Second half of the exchange, after arrivals are injected.
    pub fn finish_exchange(&self) {
        self.transport.barrier();
    }

    /// Cell position a spatial migrant arrives at: its origin mirrored.
    ///
    /// `None` under mass action, where the arrival cell is random.
    pub fn arrival_position(&self, message: &MigrationMessage) -> Option<Position> {
        match self.style {
            MigrationStyle::MassAction => None,
            MigrationStyle::Spatial => Some(Position::new(
                self.width - message.x - 1,
                self.height - message.y - 1,
            )),
        }
    }
}
