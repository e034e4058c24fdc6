//! Steering behaviours
//!
//! A behaviour is a strategy that reads the swarm and the world and writes a
//! new velocity for one drone at a time. Each behaviour owns a named set of
//! bounded parameters that external tooling (and the parameter-sweep
//! expander) can read and override without rebuilding the strategy.

pub mod dsp;
pub mod flocking;
pub mod levy_flocking;
pub mod parameter;
pub mod pheromone;
pub mod random_walk;
pub mod registry;
pub mod steering;

use std::collections::BTreeMap;

use glam::Vec2;
use rand_pcg::Pcg32;

use crate::physics::{BodyHandle, PhysicsWorld};
use crate::sim::EntityId;

pub use dsp::DspBehaviour;
pub use flocking::FlockingBehaviour;
pub use levy_flocking::LevyFlockingBehaviour;
pub use parameter::{Parameter, ParameterSet, parameter_values};
pub use pheromone::PheromoneBehaviour;
pub use random_walk::UniformRandomWalkBehaviour;
pub use registry::{BehaviourHandle, BehaviourRegistry};

/// Snapshot of one drone as seen by a behaviour
#[derive(Debug, Clone, Copy)]
pub struct DroneView {
    pub id: EntityId,
    pub body: BodyHandle,
    pub position: Vec2,
    pub velocity: Vec2,
    pub radius: f32,
    pub max_speed: f32,
    pub max_force: f32,
    pub camera_view_range: f32,
    pub obstacle_view_range: f32,
    pub drone_detection_range: f32,
}

/// Everything a behaviour may touch while steering one drone
pub struct SteeringContext<'a> {
    pub world: &'a mut PhysicsWorld,
    /// All drones, including the one being steered
    pub swarm: &'a [DroneView],
    pub rng: &'a mut Pcg32,
    /// Fixed timestep of the run
    pub dt: f32,
    /// Current simulation time
    pub time: f64,
    /// World extent (`[0, x] x [0, y]`)
    pub bounds: Vec2,
}

impl SteeringContext<'_> {
    /// Write the drone's new velocity to its body
    pub fn set_velocity(&mut self, drone: &DroneView, velocity: Vec2) {
        self.world.set_linear_velocity(drone.body, velocity);
    }
}

/// A steering strategy
pub trait Behaviour {
    /// Compute and apply a new velocity for `drone`
    fn execute(&mut self, ctx: &mut SteeringContext<'_>, drone: &DroneView);

    fn parameters(&self) -> &ParameterSet;

    fn parameters_mut(&mut self) -> &mut ParameterSet;

    /// Apply overrides by name. Unknown names are skipped; out-of-range
    /// values are reported and leave the parameter unchanged.
    fn set_parameters(&mut self, values: &BTreeMap<String, f32>) {
        let params = self.parameters_mut();
        for (name, value) in values {
            match params.get_mut(name) {
                Some(p) => {
                    if p.set(*value).is_err() {
                        log::warn!("Parameter '{name}' keeps {} (rejected {value})", p.value());
                    }
                }
                None => log::debug!("Skipping unknown parameter '{name}'"),
            }
        }
    }

    /// Current value of a parameter, or 0 if it does not exist
    fn parameter(&self, name: &str) -> f32 {
        self.parameters().get(name).map(Parameter::value).unwrap_or(0.0)
    }

    /// Drop per-drone auxiliary state (and any bodies the behaviour created)
    fn clean(&mut self, _world: &mut PhysicsWorld) {}
}

/// Build a parameter set from `(name, value, min, max)` rows
pub(crate) fn parameter_set(rows: &[(&str, f32, f32, f32)]) -> ParameterSet {
    rows.iter()
        .map(|&(name, value, min, max)| (name.to_string(), Parameter::clamped(value, min, max)))
        .collect()
}
