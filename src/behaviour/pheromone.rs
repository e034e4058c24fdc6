//! Pheromone avoidance: drones mark where they have been and steer away from
//! fresh marks, spreading the swarm over unexplored ground.

use glam::Vec2;

use super::flocking::OBSTACLE_AVOIDANCE_WEIGHT;
use super::steering::{avoid_obstacles, limit_speed, perform_ray_casting};
use super::{Behaviour, DroneView, ParameterSet, SteeringContext, parameter_set};
use crate::clamp_magnitude;
use crate::physics::PhysicsWorld;

pub const DECAY_RATE: &str = "Decay Rate";

/// Intensity of a freshly laid pheromone
pub const INITIAL_INTENSITY: f32 = 500.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pheromone {
    pub position: Vec2,
    pub intensity: f32,
}

#[derive(Debug, Clone)]
pub struct PheromoneBehaviour {
    params: ParameterSet,
    pheromones: Vec<Pheromone>,
}

impl PheromoneBehaviour {
    pub const NAME: &'static str = "Pheromone Avoidance";

    pub fn new(decay_rate: f32, obstacle_avoidance_weight: f32) -> Self {
        Self {
            params: parameter_set(&[
                (DECAY_RATE, decay_rate, 0.0, 50.0),
                (OBSTACLE_AVOIDANCE_WEIGHT, obstacle_avoidance_weight, 0.0, 3.0),
            ]),
            pheromones: Vec::new(),
        }
    }

    pub fn pheromones(&self) -> &[Pheromone] {
        &self.pheromones
    }

    fn lay(&mut self, position: Vec2) {
        self.pheromones.push(Pheromone {
            position,
            intensity: INITIAL_INTENSITY,
        });
    }

    /// Weaken every pheromone and drop the exhausted ones
    fn decay(&mut self) {
        let rate = self.parameter(DECAY_RATE);
        self.pheromones.retain_mut(|p| {
            p.intensity -= rate;
            p.intensity > 0.0
        });
    }

    /// Intensity-weighted flee from nearby pheromones, zero if none are in range
    fn repulsion(&self, drone: &DroneView) -> Option<Vec2> {
        let mut sum = Vec2::ZERO;
        let mut count = 0;
        for p in &self.pheromones {
            let d = drone.position.distance(p.position);
            if d > 0.0 && d < drone.obstacle_view_range {
                sum += (drone.position - p.position).normalize_or_zero() * (p.intensity / d);
                count += 1;
            }
        }
        (count > 0).then(|| (sum / count as f32).normalize_or_zero() * drone.max_speed)
    }
}

impl Default for PheromoneBehaviour {
    fn default() -> Self {
        Self::new(0.5, 1.0)
    }
}

impl Behaviour for PheromoneBehaviour {
    fn execute(&mut self, ctx: &mut SteeringContext<'_>, drone: &DroneView) {
        let obstacles = perform_ray_casting(ctx.world, drone);

        self.lay(drone.position);
        self.decay();

        let obstacle = self.parameter(OBSTACLE_AVOIDANCE_WEIGHT) * avoid_obstacles(&obstacles, drone);
        let mut steering = obstacle;
        if let Some(away) = self.repulsion(drone) {
            steering = clamp_magnitude(steering + away - drone.velocity, drone.max_force);
        }

        // The obstacle term is applied on top of the clamped steering as well
        let acceleration = steering + obstacle;
        let velocity = limit_speed(drone.velocity + acceleration, drone.max_speed);
        ctx.set_velocity(drone, velocity);
    }

    fn parameters(&self) -> &ParameterSet {
        &self.params
    }

    fn parameters_mut(&mut self) -> &mut ParameterSet {
        &mut self.params
    }

    fn clean(&mut self, _world: &mut PhysicsWorld) {
        self.pheromones.clear();
    }
}
