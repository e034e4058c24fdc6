//! Test queue
//!
//! Declarative run descriptions, parameter sweeps and the sequential batch
//! runner that turns each queued entry into a fresh [`Sim`](crate::sim::Sim).

pub mod config;
pub mod permutation;
pub mod runner;
pub mod test_queue;

pub use config::{TestConfig, TestParameters};
pub use permutation::{PermutationSet, generate_permutations, generate_range, parse_list};
pub use runner::BatchRunner;
pub use test_queue::TestQueue;
