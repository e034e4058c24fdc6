//! Dispersive potential (DSP) coverage
//!
//! Every drone owns a virtual point that lives in the physics world as a
//! small dynamic body. Points repel each other when closer than an optimal
//! spacing `R` and attract beyond it, so they spread out into a lattice that
//! covers the map. Each drone chases its point and, once close, performs a
//! long random walk around it before returning.

use std::collections::BTreeMap;
use std::f32::consts::{PI, TAU};

use glam::Vec2;
use rand::Rng;

use super::steering::{avoid_drones, avoid_obstacles, limit_speed, perform_ray_casting};
use super::{Behaviour, DroneView, ParameterSet, SteeringContext, parameter_set};
use crate::physics::{BodyDef, BodyHandle, BodyType, FixtureDef, PhysicsWorld, Shape};
use crate::sim::EntityId;
use crate::{clamp_magnitude, direction};

const POINT_RADIUS: f32 = 2.0;
const POINT_MASS: f32 = 1.0;
const POINT_MAX_SPEED: f32 = 45.0;
/// Exponent of the distance falloff
const FALLOFF: f32 = 2.0;
/// Cap on the force applied to a point
const MAX_POINT_FORCE: f32 = 4000.0;
/// Hexagonal packing density
const PACKING_DENSITY: f32 = PI * 1.732_050_8 / 6.0;

/// Distance to its point at which a drone starts walking
const ARRIVAL_RADIUS: f32 = 40.0;
/// Duration (seconds) of a walk around the point
const WALK_DURATION: f32 = 141.421_36;
/// Upper bound (seconds) between heading changes during a walk
const MAX_TURN_INTERVAL: f32 = 15.0;
const OBSTACLE_AVOIDANCE_WEIGHT: f32 = 3.0;

#[derive(Debug, Clone, Copy)]
struct DspState {
    point: BodyHandle,
    walking: bool,
    elapsed: f32,
    since_turn: f32,
    turn_interval: f32,
    desired: Vec2,
}

#[derive(Debug, Clone)]
pub struct DspBehaviour {
    params: ParameterSet,
    drones: BTreeMap<EntityId, DspState>,
    spacing: f32,
    gravity: f32,
}

impl DspBehaviour {
    pub const NAME: &'static str = "DSPBehaviour";

    pub fn new() -> Self {
        Self {
            params: parameter_set(&[]),
            drones: BTreeMap::new(),
            spacing: 0.0,
            gravity: 0.0,
        }
    }

    /// Optimal spacing between neighbouring points for the last swarm size seen
    pub fn spacing(&self) -> f32 {
        self.spacing
    }

    /// Body of the virtual point owned by `id`
    pub fn point_of(&self, id: EntityId) -> Option<BodyHandle> {
        self.drones.get(&id).map(|s| s.point)
    }

    pub fn is_walking(&self, id: EntityId) -> bool {
        self.drones.get(&id).is_some_and(|s| s.walking)
    }

    /// Recompute `R` and the gravitational constant for `n` agents over `area`
    fn recalculate(&mut self, n: usize, area: f32) {
        let n = n.max(1) as f32;
        let area_per_agent = PACKING_DENSITY * area / n;
        self.spacing = (2.0 + n / 20.0) * (area_per_agent / PI).sqrt();
        let max_force = POINT_MASS * POINT_MAX_SPEED / (1.0 / 30.0);
        self.gravity = max_force
            * self.spacing.powf(FALLOFF)
            * (2.0 - 1.5f32.powf(1.0 - FALLOFF)).powf(FALLOFF / (1.0 - FALLOFF));
    }

    /// Signed force magnitude between two points: attractive beyond `R`, repulsive within
    fn potential(&self, from: Vec2, to: Vec2) -> f32 {
        let d = from.distance(to).max(1e-4);
        let sign = if d > self.spacing { 1.0 } else { -1.0 };
        sign * self.gravity / d.powf(FALLOFF)
    }

    fn spawn_point(world: &mut PhysicsWorld, position: Vec2) -> BodyHandle {
        let body = world.create_body(&BodyDef::new(BodyType::Dynamic, position));
        let mut fixture = FixtureDef::new(Shape::Circle {
            center: Vec2::ZERO,
            radius: POINT_RADIUS,
        });
        fixture.density = POINT_MASS / (PI * POINT_RADIUS * POINT_RADIUS);
        world.create_fixture(body, &fixture);
        body
    }

    /// Push this drone's point along the net potential of every other point
    fn move_point(&self, world: &mut PhysicsWorld, point: BodyHandle, bounds: Vec2) -> Option<Vec2> {
        let position = world.position(point)?;
        let mut force = Vec2::ZERO;
        for other in self.drones.values().filter(|s| s.point != point) {
            let Some(other_position) = world.position(other.point) else {
                continue;
            };
            let dir = (other_position - position).normalize_or(Vec2::X);
            force += self.potential(position, other_position) * dir;
        }
        let clamped = position.clamp(Vec2::ZERO, bounds);
        world.set_linear_velocity(point, clamp_magnitude(force, MAX_POINT_FORCE));
        if clamped != position {
            world.set_position(point, clamped);
        }
        Some(clamped)
    }
}

impl Default for DspBehaviour {
    fn default() -> Self {
        Self::new()
    }
}

impl Behaviour for DspBehaviour {
    fn execute(&mut self, ctx: &mut SteeringContext<'_>, drone: &DroneView) {
        if !self.drones.contains_key(&drone.id) {
            let point = Self::spawn_point(ctx.world, drone.position);
            self.drones.insert(
                drone.id,
                DspState {
                    point,
                    walking: false,
                    elapsed: 0.0,
                    since_turn: 0.0,
                    turn_interval: 0.0,
                    desired: Vec2::ZERO,
                },
            );
        }
        self.recalculate(ctx.swarm.len(), ctx.bounds.x * ctx.bounds.y);

        let obstacles = perform_ray_casting(ctx.world, drone);
        let obstacle_avoidance = avoid_obstacles(&obstacles, drone);
        let drone_avoidance = avoid_drones(ctx.swarm, drone);

        let Some(point) = self.point_of(drone.id) else {
            return;
        };
        let Some(target) = self.move_point(ctx.world, point, ctx.bounds) else {
            log::warn!("DSP point of drone {} vanished from the world", drone.id);
            self.drones.remove(&drone.id);
            return;
        };

        let Some(state) = self.drones.get_mut(&drone.id) else {
            return;
        };
        if drone.position.distance(target) < ARRIVAL_RADIUS && !state.walking && state.elapsed == 0.0 {
            state.walking = true;
        }

        let mut acceleration = Vec2::ZERO;
        if state.walking && state.elapsed >= WALK_DURATION {
            state.walking = false;
            state.elapsed = 0.0;
        } else if state.walking {
            if state.since_turn >= state.turn_interval {
                state.desired = direction(ctx.rng.random_range(0.0..TAU)) * drone.max_speed;
                state.since_turn = 0.0;
                state.turn_interval = ctx.rng.random_range(0.0..MAX_TURN_INTERVAL);
            }
            state.since_turn += ctx.dt;
            state.elapsed += ctx.dt;
            acceleration += clamp_magnitude(state.desired - drone.velocity, drone.max_force);
        }
        if !state.walking {
            let to_point = (target - drone.position).normalize_or(Vec2::X);
            acceleration += clamp_magnitude(to_point * drone.max_speed, drone.max_force);
        }

        acceleration += drone_avoidance + OBSTACLE_AVOIDANCE_WEIGHT * obstacle_avoidance;
        let velocity = limit_speed(drone.velocity + acceleration, drone.max_speed);
        ctx.set_velocity(drone, velocity);
    }

    fn parameters(&self) -> &ParameterSet {
        &self.params
    }

    fn parameters_mut(&mut self) -> &mut ParameterSet {
        &mut self.params
    }

    fn clean(&mut self, world: &mut PhysicsWorld) {
        for state in self.drones.values() {
            world.destroy_body(state.point);
        }
        self.drones.clear();
    }
}
