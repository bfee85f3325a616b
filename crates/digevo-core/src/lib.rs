//! Core types and utilities for the digevo population engine.

pub mod types;
pub mod config;
pub mod error;
pub mod fitness;
pub mod phenotype;
pub mod random;

pub use error::{Error, Result};
pub use types::*;
pub use config::*;
pub use fitness::*;
pub use phenotype::*;
pub use random::RandomSource;
