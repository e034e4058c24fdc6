//! The simulation loop
//!
//! A [`Sim`] owns one physics world and every entity in it. The caller owns
//! the clock: each [`Sim::step`] advances physics, dispatches contacts, moves
//! `current_time` forward and runs one [`Sim::update`].

use std::rc::Rc;

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde_json::json;

use super::collision::EntityKind;
use super::contact::ContactListener;
use super::context::SimContext;
use super::drone::{DroneConfiguration, apply_configuration, drone_view, spawn_drone};
use super::entity::{Entity, EntityArena, EntityId};
use super::target::{TargetTemplate, spawn_target};
use crate::behaviour::{BehaviourHandle, DroneView, SteeringContext, parameter_values};
use crate::error::Result;
use crate::map::MapDefinition;
use crate::observer::{LogMessage, LogThrottle, ObserverHandle, notify_all};
use crate::physics::{BodyDef, BodyType, FixtureDef, PhysicsWorld, Shape};
use crate::queue::TestConfig;

/// Caller type used for simulation-level research log records
pub const SIM_CALLER: &str = "Sim";

/// Lifecycle derived from the clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimPhase {
    /// `current_time <= 0`
    Idle,
    Running,
    /// `current_time >= time_limit`
    Finished,
}

/// How drones are placed on reset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpawnType {
    /// Uniform in a disk around the map's spawn point, sized to the swarm
    #[default]
    Circular,
    /// Uniform over the world, minus a border margin
    Random,
}

pub struct Sim {
    ctx: SimContext,
    world: PhysicsWorld,
    arena: EntityArena,
    drones: Vec<EntityId>,
    targets: Vec<EntityId>,

    map: MapDefinition,
    behaviour_name: String,
    behaviour: BehaviourHandle,
    drone_config: Rc<DroneConfiguration>,
    listener: Rc<ContactListener>,
    target_template: Option<TargetTemplate>,
    num_drones: usize,
    num_targets: usize,
    spawn_type: SpawnType,

    current_time: f64,
    time_limit: f64,
    dt: f32,
    tick: u64,
    rng: Pcg32,

    observers: Vec<ObserverHandle>,
    found_this_step: Vec<EntityId>,
}

impl Sim {
    /// Build a runnable simulation for one queued test. Every name in the
    /// config must resolve against the context's registries.
    pub fn from_config(ctx: &SimContext, config: &TestConfig) -> Result<Self> {
        let behaviour = ctx.behaviours.borrow().instantiate(&config.behaviour_name)?;
        behaviour.borrow_mut().set_parameters(config.parameters.values());
        let drone_config = ctx.drone_configs.borrow().require(&config.drone_config_name)?;
        let listener = ctx.listeners.borrow().require(&config.contact_listener_name)?;
        let target_template = ctx.targets.borrow().resolve(&config.target_type)?;
        let map = ctx.maps.borrow().require(&config.map_name)?.clone();

        let mut world = map.build_world()?;
        world.set_solver_iterations(ctx.settings.solver_iterations);
        create_bounds(&mut world, map.bounds());

        let mut sim = Self {
            ctx: ctx.clone(),
            world,
            arena: EntityArena::new(),
            drones: Vec::new(),
            targets: Vec::new(),
            map,
            behaviour_name: config.behaviour_name.clone(),
            behaviour,
            drone_config,
            listener,
            target_template,
            num_drones: config.num_drones,
            num_targets: config.num_targets,
            spawn_type: SpawnType::default(),
            current_time: 0.0,
            time_limit: f64::from(config.time_limit),
            dt: ctx.settings.dt(),
            tick: 0,
            rng: Pcg32::seed_from_u64(ctx.settings.seed),
            observers: Vec::new(),
            found_this_step: Vec::new(),
        };
        sim.reset();
        log::info!(
            "Sim ready: {} on '{}' with {} drones, {} targets, {}s limit",
            sim.behaviour_name,
            sim.map.name,
            sim.num_drones,
            sim.num_targets,
            sim.time_limit
        );
        Ok(sim)
    }

    /// [`from_config`](Self::from_config), then attach `observers` and send
    /// them the run header (behaviour name and every parameter value)
    pub fn with_observers(ctx: &SimContext, config: &TestConfig, observers: &[ObserverHandle]) -> Result<Self> {
        let mut sim = Self::from_config(ctx, config)?;
        sim.attach_run_observers(observers);
        Ok(sim)
    }

    /// Attach `observers` and send them the run header
    pub fn attach_run_observers(&mut self, observers: &[ObserverHandle]) {
        for observer in observers {
            self.add_observer(observer.clone());
        }
        self.log_header();
    }

    fn log_header(&self) {
        let mut header = serde_json::Map::new();
        for (name, value) in parameter_values(self.behaviour.borrow().parameters()) {
            header.insert(name, json!(value));
        }
        header.insert("behaviour".to_string(), json!(self.behaviour_name));
        let message = LogMessage::new(self.current_time, SIM_CALLER, 0, &serde_json::Value::Object(header));
        notify_all(&self.observers, &message);
    }

    /// Remove every drone and target, zero the clock and spawn afresh
    pub fn reset(&mut self) {
        self.behaviour.borrow_mut().clean(&mut self.world);
        for id in self.drones.drain(..).chain(self.targets.drain(..)) {
            self.arena.despawn(&mut self.world, id);
        }
        self.current_time = 0.0;
        self.tick = 0;
        self.found_this_step.clear();

        self.spawn_drones();
        self.spawn_targets();
        log::debug!(
            "Reset: {} drones, {} targets, {} bodies",
            self.drones.len(),
            self.targets.len(),
            self.world.body_count()
        );
    }

    fn throttle(&self) -> LogThrottle {
        LogThrottle::new(self.ctx.settings.entity_log_interval, self.current_time)
    }

    fn spawn_drones(&mut self) {
        let config = self.drone_config.clone();
        let collisions = self.ctx.collisions.clone();
        let collisions = collisions.borrow();
        for serial in 0..self.num_drones {
            let position = self.spawn_position(&config);
            let angle = self.rng.random_range(0.0..std::f32::consts::TAU);
            let speed = if config.max_speed > 1.0 {
                self.rng.random_range(1.0..=config.max_speed)
            } else {
                config.max_speed
            };
            let throttle = self.throttle();
            let id = spawn_drone(
                &mut self.world,
                &mut self.arena,
                &collisions,
                &config,
                self.behaviour.clone(),
                position,
                crate::direction(angle) * speed,
                serial as u32,
                throttle,
            );
            self.attach_observers(id);
            self.drones.push(id);
        }
    }

    fn spawn_position(&mut self, config: &DroneConfiguration) -> Vec2 {
        match self.spawn_type {
            SpawnType::Circular => {
                // Disk whose area is num_drones^2 drone footprints
                let disk_radius = self.num_drones as f32 * config.radius;
                let reach = (disk_radius - config.radius).max(0.0);
                let theta = self.rng.random_range(0.0..std::f32::consts::TAU);
                let r = self.rng.random::<f32>().sqrt() * reach;
                self.map.drone_spawn_point + crate::direction(theta) * r
            }
            SpawnType::Random => {
                let margin = self.ctx.settings.spawn_margin;
                let x = uniform(&mut self.rng, margin, self.map.width - margin);
                let y = uniform(&mut self.rng, margin, self.map.height - margin);
                Vec2::new(x, y)
            }
        }
    }

    fn spawn_targets(&mut self) {
        let Some(template) = self.target_template else {
            return;
        };
        let collisions = self.ctx.collisions.clone();
        let collisions = collisions.borrow();
        for serial in 0..self.num_targets {
            let x = uniform(&mut self.rng, 0.0, self.map.width);
            let y = uniform(&mut self.rng, 0.0, self.map.height);
            let throttle = self.throttle();
            let id = spawn_target(
                &mut self.world,
                &mut self.arena,
                &collisions,
                &template,
                Vec2::new(x, y),
                serial as u32,
                &mut self.rng,
                throttle,
            );
            self.attach_observers(id);
            self.targets.push(id);
        }
    }

    fn attach_observers(&mut self, id: EntityId) {
        if let Some(entity) = self.arena.get_mut(id) {
            for observer in &self.observers {
                entity.add_observer(observer.clone());
            }
        }
    }

    /// Attach an observer to the Sim and to every live entity
    pub fn add_observer(&mut self, observer: ObserverHandle) {
        for entity in self.arena.iter_mut() {
            entity.add_observer(observer.clone());
        }
        self.observers.push(observer);
    }

    /// Switch every drone to a fresh instance of the named behaviour. The
    /// previous instance releases its per-drone state first.
    pub fn set_current_behaviour(&mut self, name: &str) -> Result<()> {
        let behaviour = self.ctx.behaviours.borrow().instantiate(name)?;
        self.behaviour.borrow_mut().clean(&mut self.world);
        for id in &self.drones {
            if let Some(drone) = self.arena.get_mut(*id).and_then(Entity::as_drone_mut) {
                drone.set_behaviour(behaviour.clone());
            }
        }
        log::info!("Behaviour {} -> {name}", self.behaviour_name);
        self.behaviour = behaviour;
        self.behaviour_name = name.to_string();
        Ok(())
    }

    /// Switch to the named drone configuration and re-apply it to every live drone
    pub fn set_drone_configuration(&mut self, name: &str) -> Result<()> {
        let config = self.ctx.drone_configs.borrow().require(name)?;
        let collisions = self.ctx.collisions.borrow();
        for id in &self.drones {
            if let Some(entity) = self.arena.get_mut(*id) {
                apply_configuration(&mut self.world, entity, &config, &collisions);
            }
        }
        self.drone_config = config;
        Ok(())
    }

    /// Takes effect on the next [`reset`](Self::reset)
    pub fn set_spawn_type(&mut self, spawn_type: SpawnType) {
        self.spawn_type = spawn_type;
    }

    /// One full tick: physics, contact dispatch, clock, update
    pub fn step(&mut self, dt: f32) {
        let events = self.world.step(dt);
        for event in &events {
            self.listener.handle_event(&mut self.arena, event);
        }
        self.advance_time(dt);
        self.update();
    }

    /// Move the clock forward without touching simulation state
    pub fn advance_time(&mut self, dt: f32) {
        self.current_time += f64::from(dt);
        self.dt = dt;
    }

    /// Step with `dt` until the time limit is reached. Returns the ticks taken.
    pub fn run(&mut self, dt: f32) -> u64 {
        if dt <= 0.0 {
            log::warn!("Refusing to run with non-positive timestep {dt}");
            return 0;
        }
        let mut ticks = 0;
        while self.phase() != SimPhase::Finished {
            let before = self.current_time;
            self.step(dt);
            ticks += 1;
            if self.current_time <= before {
                log::warn!("Clock stuck at {before}s with timestep {dt}; stopping run");
                break;
            }
        }
        ticks
    }

    /// Steer every drone once, collect this tick's finds and log. Does
    /// nothing unless the Sim is running.
    pub fn update(&mut self) {
        if self.phase() != SimPhase::Running {
            return;
        }
        self.found_this_step.clear();

        let mut views: Vec<DroneView> = self
            .drones
            .iter()
            .filter_map(|id| self.arena.get(*id).and_then(|e| drone_view(e, &self.world)))
            .collect();
        let bounds = self.map.bounds();
        for i in 0..views.len() {
            let drone = views[i];
            let Some(behaviour) = self
                .arena
                .get(drone.id)
                .and_then(Entity::as_drone)
                .map(|d| d.behaviour().clone())
            else {
                continue;
            };
            let mut ctx = SteeringContext {
                world: &mut self.world,
                swarm: &views,
                rng: &mut self.rng,
                dt: self.dt,
                time: self.current_time,
                bounds,
            };
            behaviour.borrow_mut().execute(&mut ctx, &drone);
            if let Some(velocity) = self.world.linear_velocity(drone.body) {
                views[i].velocity = velocity;
            }
        }

        for id in &self.drones {
            if let Some(drone) = self.arena.get_mut(*id).and_then(Entity::as_drone_mut) {
                self.found_this_step.extend(drone.take_found());
            }
        }

        self.log_entities();
        let interval = self.ctx.settings.sim_log_interval_ticks.max(1);
        if self.tick % interval == 0 {
            let payload = json!({ "targets_found": self.targets_found() });
            notify_all(&self.observers, &LogMessage::new(self.current_time, SIM_CALLER, 0, &payload));
        }
        self.tick += 1;
    }

    fn log_entities(&mut self) {
        let now = self.current_time;
        for entity in self.arena.iter_mut() {
            let (Some(p), Some(v)) = (
                self.world.position(entity.body()),
                self.world.linear_velocity(entity.body()),
            ) else {
                continue;
            };
            let payload = match entity.as_target() {
                Some(target) => json!({ "position": [p.x, p.y], "found": target.found }),
                None => json!({ "position": [p.x, p.y], "velocity": [v.x, v.y] }),
            };
            entity.log(now, &payload);
        }
    }

    pub fn phase(&self) -> SimPhase {
        if self.current_time <= 0.0 {
            SimPhase::Idle
        } else if self.current_time >= self.time_limit {
            SimPhase::Finished
        } else {
            SimPhase::Running
        }
    }

    pub fn is_finished(&self) -> bool {
        self.phase() == SimPhase::Finished
    }

    pub fn world(&self) -> &PhysicsWorld {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut PhysicsWorld {
        &mut self.world
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.arena.get(id)
    }

    pub fn drones(&self) -> impl Iterator<Item = &Entity> {
        self.drones.iter().filter_map(|id| self.arena.get(*id))
    }

    pub fn targets(&self) -> impl Iterator<Item = &Entity> {
        self.targets.iter().filter_map(|id| self.arena.get(*id))
    }

    pub fn drone_ids(&self) -> &[EntityId] {
        &self.drones
    }

    pub fn target_ids(&self) -> &[EntityId] {
        &self.targets
    }

    /// Targets reported by drones during the last update
    pub fn targets_found_this_step(&self) -> &[EntityId] {
        &self.found_this_step
    }

    /// Targets found at least once since the last reset
    pub fn targets_found(&self) -> usize {
        self.targets()
            .filter(|t| t.as_target().is_some_and(|s| s.found))
            .count()
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn time_limit(&self) -> f64 {
        self.time_limit
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn behaviour_name(&self) -> &str {
        &self.behaviour_name
    }

    pub fn behaviour(&self) -> &BehaviourHandle {
        &self.behaviour
    }

    pub fn drone_configuration(&self) -> &DroneConfiguration {
        &self.drone_config
    }

    pub fn map(&self) -> &MapDefinition {
        &self.map
    }

    pub fn spawn_type(&self) -> SpawnType {
        self.spawn_type
    }

    pub fn observers(&self) -> &[ObserverHandle] {
        &self.observers
    }
}

impl Drop for Sim {
    fn drop(&mut self) {
        if let Ok(mut behaviour) = self.behaviour.try_borrow_mut() {
            behaviour.clean(&mut self.world);
        }
    }
}

impl std::fmt::Debug for Sim {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sim")
            .field("behaviour", &self.behaviour_name)
            .field("map", &self.map.name)
            .field("drones", &self.drones.len())
            .field("targets", &self.targets.len())
            .field("current_time", &self.current_time)
            .field("time_limit", &self.time_limit)
            .finish_non_exhaustive()
    }
}

fn uniform(rng: &mut Pcg32, lo: f32, hi: f32) -> f32 {
    if hi > lo { rng.random_range(lo..hi) } else { (lo + hi) / 2.0 }
}

/// Static edges around `[0, w] x [0, h]`
fn create_bounds(world: &mut PhysicsWorld, extent: Vec2) {
    let ground = world.create_body(&BodyDef::new(BodyType::Static, Vec2::ZERO));
    let (w, h) = (extent.x, extent.y);
    let edges = [
        (Vec2::ZERO, Vec2::new(w, 0.0)),
        (Vec2::new(0.0, h), Vec2::new(w, h)),
        (Vec2::ZERO, Vec2::new(0.0, h)),
        (Vec2::new(w, 0.0), Vec2::new(w, h)),
    ];
    for (start, end) in edges {
        world.create_fixture(ground, &FixtureDef::new(Shape::Edge { start, end }));
    }
}

/// Count entities of one kind (used by tooling and tests)
pub fn count_kind<'a>(entities: impl Iterator<Item = &'a Entity>, kind: EntityKind) -> usize {
    entities.filter(|e| e.kind() == kind).count()
}
