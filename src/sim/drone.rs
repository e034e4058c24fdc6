//! Drones: configuration bundles, per-drone state and spawning

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::collision::{CollisionManager, EntityKind};
use super::entity::{Colour, Entity, EntityArena, EntityData, EntityId};
use crate::behaviour::{BehaviourHandle, DroneView};
use crate::error::{Result, SimError};
use crate::observer::LogThrottle;
use crate::physics::{BodyDef, BodyType, FixtureDef, FixtureHandle, PhysicsWorld, Shape};

pub const DRONE_COLOUR: Colour = [0.7, 0.5, 0.5, 1.0];

/// Named, immutable bundle of drone capabilities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DroneConfiguration {
    pub name: String,
    pub camera_view_range: f32,
    pub obstacle_view_range: f32,
    pub max_speed: f32,
    pub max_force: f32,
    pub radius: f32,
    pub mass: f32,
    pub drone_detection_range: f32,
}

impl DroneConfiguration {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: &str,
        camera_view_range: f32,
        obstacle_view_range: f32,
        max_speed: f32,
        max_force: f32,
        radius: f32,
        mass: f32,
        drone_detection_range: f32,
    ) -> Self {
        Self {
            name: name.to_string(),
            camera_view_range,
            obstacle_view_range,
            max_speed,
            max_force,
            radius,
            mass,
            drone_detection_range,
        }
    }

    pub fn small() -> Self {
        Self::new("Small", 15.0, 50.2, 10.0, 0.3, 1.0, 1.5, 134.0)
    }
}

/// Name -> configuration table
#[derive(Debug, Clone, Default)]
pub struct DroneConfigRegistry {
    configs: BTreeMap<String, Rc<DroneConfiguration>>,
}

impl DroneConfigRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(DroneConfiguration::small());
        registry
    }

    /// Register under the configuration's own name, replacing any previous entry
    pub fn register(&mut self, config: DroneConfiguration) -> Rc<DroneConfiguration> {
        let config = Rc::new(config);
        self.configs.insert(config.name.clone(), config.clone());
        config
    }

    pub fn get(&self, name: &str) -> Option<Rc<DroneConfiguration>> {
        self.configs.get(name).cloned()
    }

    pub fn require(&self, name: &str) -> Result<Rc<DroneConfiguration>> {
        self.get(name)
            .ok_or_else(|| SimError::lookup("drone configuration", name))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.configs.keys().map(String::as_str)
    }
}

/// Drone-specific entity state
pub struct DroneState {
    behaviour: BehaviourHandle,
    sensor: Option<FixtureHandle>,
    camera_view_range: f32,
    obstacle_view_range: f32,
    drone_detection_range: f32,
    max_speed: f32,
    max_force: f32,
    mass: f32,
    found_this_tick: Vec<EntityId>,
}

impl DroneState {
    fn new(config: &DroneConfiguration, behaviour: BehaviourHandle) -> Self {
        Self {
            behaviour,
            sensor: None,
            camera_view_range: config.camera_view_range,
            obstacle_view_range: config.obstacle_view_range,
            drone_detection_range: config.drone_detection_range,
            max_speed: config.max_speed,
            max_force: config.max_force,
            mass: config.mass,
            found_this_tick: Vec::new(),
        }
    }

    pub fn behaviour(&self) -> &BehaviourHandle {
        &self.behaviour
    }

    pub fn set_behaviour(&mut self, behaviour: BehaviourHandle) {
        self.behaviour = behaviour;
    }

    pub fn sensor(&self) -> Option<FixtureHandle> {
        self.sensor
    }

    pub fn camera_view_range(&self) -> f32 {
        self.camera_view_range
    }

    pub fn obstacle_view_range(&self) -> f32 {
        self.obstacle_view_range
    }

    pub fn drone_detection_range(&self) -> f32 {
        self.drone_detection_range
    }

    pub fn max_speed(&self) -> f32 {
        self.max_speed
    }

    pub fn max_force(&self) -> f32 {
        self.max_force
    }

    pub fn mass(&self) -> f32 {
        self.mass
    }

    pub fn record_found(&mut self, target: EntityId) {
        self.found_this_tick.push(target);
    }

    pub fn found_targets(&self) -> &[EntityId] {
        &self.found_this_tick
    }

    /// Hand over this tick's finds, leaving the list empty
    pub fn take_found(&mut self) -> Vec<EntityId> {
        std::mem::take(&mut self.found_this_tick)
    }
}

impl fmt::Debug for DroneState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DroneState")
            .field("sensor", &self.sensor)
            .field("camera_view_range", &self.camera_view_range)
            .field("obstacle_view_range", &self.obstacle_view_range)
            .field("drone_detection_range", &self.drone_detection_range)
            .field("max_speed", &self.max_speed)
            .field("max_force", &self.max_force)
            .field("found_this_tick", &self.found_this_tick)
            .finish_non_exhaustive()
    }
}

/// Create a dynamic drone body with a solid hull and a detection sensor
#[allow(clippy::too_many_arguments)]
pub fn spawn_drone(
    world: &mut PhysicsWorld,
    arena: &mut EntityArena,
    collisions: &CollisionManager,
    config: &DroneConfiguration,
    behaviour: BehaviourHandle,
    position: Vec2,
    velocity: Vec2,
    serial: u32,
    throttle: LogThrottle,
) -> EntityId {
    let mut def = BodyDef::new(BodyType::Dynamic, position);
    def.linear_velocity = velocity;
    let body = world.create_body(&def);

    let id = arena.insert_with(|id| {
        let area = std::f32::consts::PI * config.radius * config.radius;
        let mut hull = FixtureDef::new(Shape::Circle {
            center: Vec2::ZERO,
            radius: config.radius,
        });
        hull.density = if area > 0.0 { config.mass / area } else { 0.0 };
        hull.user_data = Some(id.to_raw());
        world.create_fixture(body, &hull);

        Entity::new(
            id,
            serial,
            body,
            config.radius,
            DRONE_COLOUR,
            throttle,
            EntityData::Drone(DroneState::new(config, behaviour)),
        )
    });
    if let Some(entity) = arena.get_mut(id) {
        rebuild_sensor(world, entity, collisions);
    }
    id
}

/// Replace the drone's detection sensor with one sized to its camera range
pub fn rebuild_sensor(world: &mut PhysicsWorld, entity: &mut Entity, collisions: &CollisionManager) {
    let body = entity.body();
    let raw = entity.id().to_raw();
    let Some(drone) = entity.as_drone_mut() else {
        return;
    };
    if let Some(old) = drone.sensor.take() {
        world.destroy_fixture(old);
    }
    let mut sensor = FixtureDef::new(Shape::Circle {
        center: Vec2::ZERO,
        radius: drone.camera_view_range,
    });
    sensor.is_sensor = true;
    sensor.filter = collisions.filter(EntityKind::Drone);
    sensor.user_data = Some(raw);
    drone.sensor = world.create_fixture(body, &sensor);
}

/// Re-apply speed, force and ranges from `config` and resize the sensor
pub fn apply_configuration(
    world: &mut PhysicsWorld,
    entity: &mut Entity,
    config: &DroneConfiguration,
    collisions: &CollisionManager,
) {
    let Some(drone) = entity.as_drone_mut() else {
        return;
    };
    let range_changed = drone.camera_view_range != config.camera_view_range;
    drone.camera_view_range = config.camera_view_range;
    drone.obstacle_view_range = config.obstacle_view_range;
    drone.drone_detection_range = config.drone_detection_range;
    drone.max_speed = config.max_speed;
    drone.max_force = config.max_force;
    drone.mass = config.mass;
    if range_changed || drone.sensor.is_none() {
        rebuild_sensor(world, entity, collisions);
    }
}

/// Snapshot a drone for the behaviours
pub fn drone_view(entity: &Entity, world: &PhysicsWorld) -> Option<DroneView> {
    let drone = entity.as_drone()?;
    Some(DroneView {
        id: entity.id(),
        body: entity.body(),
        position: world.position(entity.body())?,
        velocity: world.linear_velocity(entity.body())?,
        radius: entity.radius(),
        max_speed: drone.max_speed,
        max_force: drone.max_force,
        camera_view_range: drone.camera_view_range,
        obstacle_view_range: drone.obstacle_view_range,
        drone_detection_range: drone.drone_detection_range,
    })
}
