//! Uniform random walk: each drone picks a random heading, holds it for a
//! random interval, then picks again.

use std::collections::HashMap;

use glam::Vec2;
use rand::Rng;

use super::flocking::OBSTACLE_AVOIDANCE_WEIGHT;
use super::steering::{avoid_drones, avoid_obstacles, limit_speed, perform_ray_casting};
use super::{Behaviour, DroneView, ParameterSet, SteeringContext, parameter_set};
use crate::physics::PhysicsWorld;
use crate::sim::EntityId;
use crate::{clamp_magnitude, direction};

pub const MAX_MAGNITUDE: &str = "Max Magnitude";
pub const FORCE_WEIGHT: &str = "Force Weight";

/// Upper bound (seconds) of the interval between heading changes
const MAX_INTERVAL: f32 = 5.0;

#[derive(Debug, Clone, Copy)]
struct WalkTimer {
    elapsed: f32,
    interval: f32,
    desired: Vec2,
}

#[derive(Debug, Clone)]
pub struct UniformRandomWalkBehaviour {
    params: ParameterSet,
    timers: HashMap<EntityId, WalkTimer>,
}

impl UniformRandomWalkBehaviour {
    pub const NAME: &'static str = "Uniform Random Walk";

    pub fn new(max_magnitude: f32, force_weight: f32, obstacle_avoidance_weight: f32) -> Self {
        Self {
            params: parameter_set(&[
                (MAX_MAGNITUDE, max_magnitude, 0.0, 20.0),
                (FORCE_WEIGHT, force_weight, 0.0, 20.0),
                (OBSTACLE_AVOIDANCE_WEIGHT, obstacle_avoidance_weight, 0.0, 3.0),
            ]),
            timers: HashMap::new(),
        }
    }

    /// Heading the drone is currently steering toward, once it has been seen
    pub fn desired_velocity(&self, id: EntityId) -> Option<Vec2> {
        self.timers.get(&id).map(|t| t.desired)
    }
}

impl Default for UniformRandomWalkBehaviour {
    fn default() -> Self {
        Self::new(10.0, 1.0, 1.0)
    }
}

impl Behaviour for UniformRandomWalkBehaviour {
    fn execute(&mut self, ctx: &mut SteeringContext<'_>, drone: &DroneView) {
        let obstacles = perform_ray_casting(ctx.world, drone);
        let obstacle_avoidance = avoid_obstacles(&obstacles, drone);
        let drone_avoidance = avoid_drones(ctx.swarm, drone);

        // Desired speed never exceeds the drone's own limit
        let speed = drone.max_speed.min(self.parameter(MAX_MAGNITUDE));
        let rng = &mut *ctx.rng;
        let timer = self.timers.entry(drone.id).or_insert_with(|| WalkTimer {
            elapsed: 0.0,
            interval: rng.random_range(0.0..MAX_INTERVAL),
            desired: drone.velocity,
        });
        timer.elapsed += ctx.dt;
        if timer.elapsed >= timer.interval {
            timer.desired = direction(rng.random_range(0.0..std::f32::consts::TAU)) * speed;
            timer.elapsed = 0.0;
            timer.interval = rng.random_range(0.0..MAX_INTERVAL);
        }
        let steer = clamp_magnitude(timer.desired - drone.velocity, drone.max_force);

        let acceleration = self.parameter(FORCE_WEIGHT) * steer
            + self.parameter(OBSTACLE_AVOIDANCE_WEIGHT) * obstacle_avoidance
            + drone_avoidance;
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
        self.timers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behaviour::test_support::{rng, run_once, swarm};

    #[test]
    fn test_defaults() {
        let w = UniformRandomWalkBehaviour::default();
        assert_eq!(w.parameter(MAX_MAGNITUDE), 10.0);
        assert_eq!(w.parameter(FORCE_WEIGHT), 1.0);
        assert_eq!(w.parameter(OBSTACLE_AVOIDANCE_WEIGHT), 1.0);
    }

    #[test]
    fn test_heading_changes_within_interval() {
        let (mut world, views) = swarm(&[(Vec2::ZERO, Vec2::new(1.0, 0.0))]);
        let mut rng = rng();
        let mut walk = UniformRandomWalkBehaviour::default();
        run_once(&mut walk, &mut world, &views, &mut rng, 0);
        let first = walk.desired_velocity(views[0].id).unwrap();

        // Intervals are below 5 s, so a new heading must be drawn within 5 s of ticks
        let ticks = (MAX_INTERVAL / crate::consts::SIM_DT) as usize + 2;
        let mut changed = false;
        for _ in 0..ticks {
            let v = run_once(&mut walk, &mut world, &views, &mut rng, 0);
            assert!(v.length() <= views[0].max_speed + 1e-4);
            changed |= walk.desired_velocity(views[0].id).unwrap() != first;
        }
        assert!(changed);
        let desired = walk.desired_velocity(views[0].id).unwrap();
        assert!((desired.length() - views[0].max_speed).abs() < 1e-3);
    }

    #[test]
    fn test_clean_forgets_timers() {
        let (mut world, views) = swarm(&[(Vec2::ZERO, Vec2::ZERO)]);
        let mut rng = rng();
        let mut walk = UniformRandomWalkBehaviour::default();
        run_once(&mut walk, &mut world, &views, &mut rng, 0);
        walk.clean(&mut world);
        assert!(walk.desired_velocity(views[0].id).is_none());
    }
}
