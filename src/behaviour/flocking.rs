//! Reynolds-style flocking: alignment, cohesion and separation over the whole
//! swarm, plus obstacle avoidance from ray casts.

use glam::Vec2;

use super::steering::{avoid_obstacles, limit_speed, perform_ray_casting};
use super::{Behaviour, DroneView, ParameterSet, SteeringContext, parameter_set};
use crate::clamp_magnitude;

pub const SEPARATION_DISTANCE: &str = "Separation Distance";
pub const ALIGNMENT_WEIGHT: &str = "Alignment Weight";
pub const COHESION_WEIGHT: &str = "Cohesion Weight";
pub const SEPARATION_WEIGHT: &str = "Separation Weight";
pub const OBSTACLE_AVOIDANCE_WEIGHT: &str = "Obstacle Avoidance Weight";

#[derive(Debug, Clone)]
pub struct FlockingBehaviour {
    params: ParameterSet,
}

impl FlockingBehaviour {
    pub const NAME: &'static str = "Flocking";

    pub fn new(
        separation_distance: f32,
        alignment_weight: f32,
        cohesion_weight: f32,
        separation_weight: f32,
        obstacle_avoidance_weight: f32,
    ) -> Self {
        Self {
            params: parameter_set(&[
                (SEPARATION_DISTANCE, separation_distance, 0.0, 1000.0),
                (ALIGNMENT_WEIGHT, alignment_weight, 0.0, 2.0),
                (COHESION_WEIGHT, cohesion_weight, 0.0, 2.0),
                (SEPARATION_WEIGHT, separation_weight, 0.0, 5.0),
                (OBSTACLE_AVOIDANCE_WEIGHT, obstacle_avoidance_weight, 0.0, 5.0),
            ]),
        }
    }
}

impl Default for FlockingBehaviour {
    fn default() -> Self {
        Self::new(173.0, 1.4, 0.69, 4.76, 4.0)
    }
}

impl Behaviour for FlockingBehaviour {
    fn execute(&mut self, ctx: &mut SteeringContext<'_>, drone: &DroneView) {
        let obstacles = perform_ray_casting(ctx.world, drone);

        let acceleration = self.parameter(ALIGNMENT_WEIGHT) * align(ctx.swarm, drone)
            + self.parameter(SEPARATION_WEIGHT)
                * separate(ctx.swarm, drone, self.parameter(SEPARATION_DISTANCE))
            + self.parameter(COHESION_WEIGHT) * cohere(ctx.swarm, drone)
            + self.parameter(OBSTACLE_AVOIDANCE_WEIGHT) * avoid_obstacles(&obstacles, drone);

        let velocity = limit_speed(drone.velocity + acceleration, drone.max_speed);
        ctx.set_velocity(drone, velocity);
    }

    fn parameters(&self) -> &ParameterSet {
        &self.params
    }

    fn parameters_mut(&mut self) -> &mut ParameterSet {
        &mut self.params
    }
}

/// Steer toward the swarm's mean heading
pub(crate) fn align(swarm: &[DroneView], drone: &DroneView) -> Vec2 {
    if swarm.is_empty() {
        return Vec2::ZERO;
    }
    let mean: Vec2 = swarm.iter().map(|d| d.velocity).sum::<Vec2>() / swarm.len() as f32;
    let desired = mean.normalize_or_zero() * drone.max_speed;
    clamp_magnitude(desired - drone.velocity, drone.max_force)
}

/// Steer toward the swarm's centre of mass
pub(crate) fn cohere(swarm: &[DroneView], drone: &DroneView) -> Vec2 {
    if swarm.is_empty() {
        return Vec2::ZERO;
    }
    let centre: Vec2 = swarm.iter().map(|d| d.position).sum::<Vec2>() / swarm.len() as f32;
    let desired = (centre - drone.position).normalize_or_zero() * drone.max_speed;
    clamp_magnitude(desired - drone.velocity, drone.max_force)
}

/// Steer away from drones closer than `distance`, weighted by inverse distance
pub(crate) fn separate(swarm: &[DroneView], drone: &DroneView, distance: f32) -> Vec2 {
    let mut sum = Vec2::ZERO;
    let mut count = 0;
    for other in swarm {
        let d = drone.position.distance(other.position);
        if d > 0.0 && d < distance {
            sum += (drone.position - other.position).normalize_or_zero() / d;
            count += 1;
        }
    }
    if count == 0 {
        return Vec2::ZERO;
    }
    let mean = sum / count as f32;
    if mean.length() <= 0.0 {
        return Vec2::ZERO;
    }
    let desired = mean.normalize() * drone.max_speed;
    clamp_magnitude(desired - drone.velocity, drone.max_force)
}
