//! Swarm Testbed - a research testbed for drone swarms
//!
//! Core modules:
//! - `physics`: 2D world on rapier2d (bodies, fixtures, sensors, ray casts)
//! - `sim`: Entities, collision dispatch and the per-tick simulation loop
//! - `behaviour`: Bounded parameters and pluggable steering strategies
//! - `queue`: Declarative test runs, parameter sweeps and the batch runner
//! - `map`: Map file schema and loading
//! - `observer`: Research data logging (JSON lines)

pub mod behaviour;
pub mod error;
pub mod map;
pub mod observer;
pub mod physics;
pub mod queue;
pub mod results;
pub mod settings;
pub mod sim;

pub use error::{Result, SimError};
pub use settings::Settings;

use glam::Vec2;

/// Simulation configuration constants
pub mod consts {
    /// Fixed simulation timestep (60 Hz)
    pub const SIM_DT: f32 = 1.0 / 60.0;
    /// Constraint solver iterations per physics step
    pub const SOLVER_ITERATIONS: usize = 4;

    /// Category bit of untyped world geometry and drone hulls
    pub const DEFAULT_CATEGORY: u16 = 0x0001;
    /// Mask that collides with every category
    pub const DEFAULT_MASK: u16 = 0xFFFF;

    /// Sim-level observer notification period (ticks)
    pub const SIM_LOG_INTERVAL_TICKS: u64 = 5;
    /// Per-entity observer throttle (seconds of simulation time)
    pub const ENTITY_LOG_INTERVAL: f64 = 0.1;

    /// Keep-out distance from the world border for RANDOM spawning
    pub const SPAWN_MARGIN: f32 = 2.0;

    /// Upper bound on runs generated by one parameter sweep
    pub const MAX_PERMUTATIONS: usize = 10_000;

    /// Angle between obstacle-detection rays (degrees)
    pub const RAY_ANGLE_STEP_DEG: f32 = 45.0;

    /// Chance that a freshly planted tree starts diseased
    pub const TREE_INFECTION_CHANCE: f32 = 0.05;
}

/// Clamp a vector's length to `max` (direction preserved)
#[inline]
pub fn clamp_magnitude(v: Vec2, max: f32) -> Vec2 {
    let len_sq = v.length_squared();
    if len_sq > max * max && len_sq > 0.0 {
        v / len_sq.sqrt() * max
    } else {
        v
    }
}

/// Unit vector for an angle in radians
#[inline]
pub fn direction(theta: f32) -> Vec2 {
    Vec2::new(theta.cos(), theta.sin())
}
