//! Core type definitions for the population engine.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a cell in the world grid.
pub type CellId = usize;

/// Index of a deme (a contiguous band of cells).
pub type DemeId = usize;

/// Index of a resource in the resource table.
pub type ResourceId = usize;

/// Arena identifier for a genotype
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GenotypeId(pub u64);

impl fmt::Display for GenotypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}

/// Identifier for an organism instance, unique within one world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrganismId(pub u64);

impl fmt::Display for OrganismId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "o{}", self.0)
    }
}

/// 2D position in the world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn add(&self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// Apply toroidal wrapping for given world dimensions
    pub fn wrap(&self, width: i32, height: i32) -> Self {
        Self {
            x: ((self.x % width) + width) % width,
            y: ((self.y % height) + height) % height,
        }
    }

    pub fn in_bounds(&self, width: i32, height: i32) -> bool {
        self.x >= 0 && self.y >= 0 && self.x < width && self.y < height
    }

    /// Manhattan distance to another position
    pub fn manhattan_distance(&self, other: &Position) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }
}

/// Compass direction, in the order neighbor lists are built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    NorthWest,
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
}

impl Direction {
    pub fn to_delta(&self) -> (i32, i32) {
        match self {
            Direction::North => (0, -1),
            Direction::South => (0, 1),
            Direction::East => (1, 0),
            Direction::West => (-1, 0),
            Direction::NorthEast => (1, -1),
            Direction::NorthWest => (-1, -1),
            Direction::SouthEast => (1, 1),
            Direction::SouthWest => (-1, 1),
        }
    }

    pub fn all() -> [Direction; 8] {
        [
            Direction::NorthWest,
            Direction::North,
            Direction::NorthEast,
            Direction::East,
            Direction::SouthEast,
            Direction::South,
            Direction::SouthWest,
            Direction::West,
        ]
    }
}

/// Connection topology of the cells inside one deme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Geometry {
    /// Eight neighbors, clipped at the edges.
    Grid,
    /// Eight neighbors, wrapping at the edges.
    Torus,
    /// Every other cell is a neighbor.
    Clique,
    /// Six neighbors on offset rows, wrapping.
    Hex,
    /// Stacked torus layers linked vertically.
    Lattice,
    /// No connections at all.
    None,
}

impl Geometry {
    /// Decode the legacy integer geometry setting.
    pub fn from_code(code: i32) -> Result<Self> {
        match code {
            1 => Ok(Geometry::Grid),
            2 => Ok(Geometry::Torus),
            3 => Ok(Geometry::Clique),
            4 => Ok(Geometry::Hex),
            5 => Ok(Geometry::Lattice),
            7 => Ok(Geometry::None),
            other => Err(Error::Config(format!("unknown world geometry {}", other))),
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            Geometry::Grid => 1,
            Geometry::Torus => 2,
            Geometry::Clique => 3,
            Geometry::Hex => 4,
            Geometry::Lattice => 5,
            Geometry::None => 7,
        }
    }
}
