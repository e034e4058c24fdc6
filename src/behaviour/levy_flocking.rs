//! Flocking interleaved with Lévy-flight excursions

use std::collections::HashMap;
use std::f64::consts::PI;

use glam::Vec2;
use rand::Rng;
use rand_pcg::Pcg32;

use super::flocking::{
    ALIGNMENT_WEIGHT, COHESION_WEIGHT, OBSTACLE_AVOIDANCE_WEIGHT, SEPARATION_DISTANCE,
    SEPARATION_WEIGHT, align, cohere, separate,
};
use super::steering::{avoid_drones, avoid_obstacles, perform_ray_casting};
use super::{Behaviour, DroneView, ParameterSet, SteeringContext, parameter_set};
use crate::physics::PhysicsWorld;
use crate::sim::EntityId;
use crate::{clamp_magnitude, direction};

pub const LEVY_WEIGHT: &str = "Levy Weight";

/// Per-tick chance that a drone not already stepping starts a Lévy step
const STEP_CHANCE: f64 = 0.05;
/// Stability index of the step-length distribution
const LEVY_MU: f32 = 3.0;

#[derive(Debug, Clone, Copy, Default)]
struct LevyStep {
    direction: Vec2,
    length: f32,
    travelled: f32,
    active: bool,
}

#[derive(Debug, Clone)]
pub struct LevyFlockingBehaviour {
    params: ParameterSet,
    steps: HashMap<EntityId, LevyStep>,
}

impl LevyFlockingBehaviour {
    pub const NAME: &'static str = "Levy Flocking";

    pub fn new(
        separation_distance: f32,
        alignment_weight: f32,
        cohesion_weight: f32,
        separation_weight: f32,
        levy_weight: f32,
        obstacle_avoidance_weight: f32,
    ) -> Self {
        Self {
            params: parameter_set(&[
                (SEPARATION_DISTANCE, separation_distance, 0.0, 1000.0),
                (ALIGNMENT_WEIGHT, alignment_weight, 0.0, 2.0),
                (COHESION_WEIGHT, cohesion_weight, 0.0, 2.0),
                (SEPARATION_WEIGHT, separation_weight, 0.0, 5.0),
                (LEVY_WEIGHT, levy_weight, 0.0, 5.0),
                (OBSTACLE_AVOIDANCE_WEIGHT, obstacle_avoidance_weight, 0.0, 5.0),
            ]),
            steps: HashMap::new(),
        }
    }

    /// Whether `id` is currently in the middle of a Lévy step
    pub fn is_stepping(&self, id: EntityId) -> bool {
        self.steps.get(&id).is_some_and(|s| s.active)
    }

    fn levy_steering(&self, step: &LevyStep, obstacle: Vec2, drones: Vec2, drone: &DroneView) -> Vec2 {
        let desired = step.direction.normalize_or_zero() * drone.max_speed;
        let steering = clamp_magnitude(desired - drone.velocity, drone.max_force);
        self.parameter(LEVY_WEIGHT) * steering
            + self.parameter(OBSTACLE_AVOIDANCE_WEIGHT) * obstacle
            + drones
    }
}

impl Default for LevyFlockingBehaviour {
    fn default() -> Self {
        Self::new(173.0, 1.4, 0.69, 4.76, 1.0, 4.0)
    }
}

impl Behaviour for LevyFlockingBehaviour {
    fn execute(&mut self, ctx: &mut SteeringContext<'_>, drone: &DroneView) {
        let obstacles = perform_ray_casting(ctx.world, drone);
        let obstacle_avoidance = avoid_obstacles(&obstacles, drone);
        let drone_avoidance = avoid_drones(ctx.swarm, drone);

        let mut step = self.steps.get(&drone.id).copied().unwrap_or_default();
        let acceleration = if step.active {
            step.travelled += drone.velocity.length();
            let acc = self.levy_steering(&step, obstacle_avoidance, drone_avoidance, drone);
            if step.travelled >= step.length {
                step.travelled = 0.0;
                step.active = false;
            }
            acc
        } else if ctx.rng.random_bool(STEP_CHANCE) {
            step = LevyStep {
                direction: direction(ctx.rng.random_range(0.0..std::f32::consts::TAU)),
                length: levy(ctx.rng, LEVY_MU).length(),
                travelled: 0.0,
                active: true,
            };
            log::trace!("Drone {} starts a Lévy step of {:.2}", drone.id, step.length);
            self.levy_steering(&step, obstacle_avoidance, drone_avoidance, drone)
        } else {
            self.parameter(ALIGNMENT_WEIGHT) * align(ctx.swarm, drone)
                + self.parameter(SEPARATION_WEIGHT)
                    * separate(ctx.swarm, drone, self.parameter(SEPARATION_DISTANCE))
                + self.parameter(COHESION_WEIGHT) * cohere(ctx.swarm, drone)
                + self.parameter(OBSTACLE_AVOIDANCE_WEIGHT) * obstacle_avoidance
        };
        self.steps.insert(drone.id, step);

        let velocity = clamp_magnitude(drone.velocity + acceleration, drone.max_speed);
        ctx.set_velocity(drone, velocity);
    }

    fn parameters(&self) -> &ParameterSet {
        &self.params
    }

    fn parameters_mut(&mut self) -> &mut ParameterSet {
        &mut self.params
    }

    fn clean(&mut self, _world: &mut PhysicsWorld) {
        self.steps.clear();
    }
}

/// Sample a 2D Lévy-distributed displacement (Chambers-Mallows-Stuck).
///
/// Non-finite samples (a zero draw for the angle) collapse to the origin.
pub fn levy(rng: &mut Pcg32, mu: f32) -> Vec2 {
    let mu = f64::from(mu);
    let u1: f64 = rng.random();
    let u2: f64 = rng.random();
    let u3: f64 = rng.random();

    let big_u1 = u1 * PI / 2.0;
    let big_u2 = (u2 + 1.0) / 2.0;
    let phi = u3 * PI;

    let a = ((mu - 1.0) * big_u1).sin();
    let b = big_u1.cos().powf(1.0 / (1.0 - mu));
    let c = ((2.0 - mu) * big_u1).cos();
    let d = (a / b) * (c / big_u2);
    let r = d.powf((2.0 - mu) / (mu - 1.0));

    let point = Vec2::new((r * phi.cos()) as f32, (r * phi.sin()) as f32);
    if point.is_finite() { point } else { Vec2::ZERO }
}
