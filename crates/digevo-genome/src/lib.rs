//! Genome representation and mutation for digital organisms.
//!
//! A genome is a flat sequence of symbols from a small instruction alphabet.
//! This crate owns everything that touches genome content:
//! - the alphabet and its text form
//! - the genome type itself
//! - the offspring mutation pipeline
//! - length and alphabet validation

pub mod instruction;
pub mod genome;
pub mod mutation;
pub mod validation;

pub use instruction::{Instruction, InstructionSet};
pub use genome::Genome;
pub use mutation::{MutationCounts, MutationKind, MutationScope, MutationStage, Mutator};
pub use validation::{validate_genome, GenomeLimits};
