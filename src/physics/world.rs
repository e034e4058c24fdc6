//! Physics world: a thin layer over rapier2d
//!
//! rapier owns body and collider storage; its generational handles are used
//! directly. Each fixture can carry a raw `u64` of user data (the owning
//! entity) which is packed into the collider's `user_data` and handed back in
//! contact events and ray-cast hits.
//!
//! rapier2d is built with `enhanced-determinism`. Contact events are sorted
//! before they are returned so a fixed seed replays identically.

use std::collections::HashMap;
use std::num::NonZeroUsize;

use glam::Vec2;
use rapier2d::prelude::{
    ActiveEvents, CCDSolver, ChannelEventCollector, Collider, ColliderHandle, ColliderSet,
    CollisionEvent, ContactForceEvent, DefaultBroadPhase, Group, ImpulseJointSet,
    IntegrationParameters, InteractionGroups, IslandManager, LockedAxes, MultibodyJointSet,
    NarrowPhase, PhysicsPipeline, QueryFilter, QueryPipeline, Ray, Real, RigidBody,
    RigidBodyBuilder, RigidBodyHandle, RigidBodySet, RigidBodyType, point, vector,
};

use super::shape::Shape;
use crate::consts;

pub type BodyHandle = RigidBodyHandle;
pub type FixtureHandle = ColliderHandle;

/// Simulation type of a body. Numeric values match the map file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyType {
    #[default]
    Static,
    Kinematic,
    Dynamic,
}

impl BodyType {
    pub fn as_index(self) -> u8 {
        match self {
            BodyType::Static => 0,
            BodyType::Kinematic => 1,
            BodyType::Dynamic => 2,
        }
    }

    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(BodyType::Static),
            1 => Some(BodyType::Kinematic),
            2 => Some(BodyType::Dynamic),
            _ => None,
        }
    }

    fn rapier(self) -> RigidBodyType {
        match self {
            BodyType::Static => RigidBodyType::Fixed,
            BodyType::Kinematic => RigidBodyType::KinematicVelocityBased,
            BodyType::Dynamic => RigidBodyType::Dynamic,
        }
    }

    fn from_rapier(body_type: RigidBodyType) -> Self {
        match body_type {
            RigidBodyType::Fixed => BodyType::Static,
            RigidBodyType::Dynamic => BodyType::Dynamic,
            RigidBodyType::KinematicPositionBased | RigidBodyType::KinematicVelocityBased => {
                BodyType::Kinematic
            }
        }
    }
}

/// Collision filtering data
///
/// Category and mask become rapier interaction groups. The group index is
/// stored with the fixture and written back to maps but takes no part in
/// filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Filter {
    pub category_bits: u16,
    pub mask_bits: u16,
    pub group_index: i16,
}

impl Default for Filter {
    fn default() -> Self {
        Self {
            category_bits: consts::DEFAULT_CATEGORY,
            mask_bits: consts::DEFAULT_MASK,
            group_index: 0,
        }
    }
}

impl Filter {
    /// Both sides must list the other's category in their mask
    pub fn should_collide(&self, other: &Filter) -> bool {
        self.groups().test(other.groups())
    }

    pub fn groups(&self) -> InteractionGroups {
        InteractionGroups::new(
            Group::from_bits_truncate(u32::from(self.category_bits)),
            Group::from_bits_truncate(u32::from(self.mask_bits)),
        )
    }

    fn from_groups(groups: InteractionGroups, group_index: i16) -> Self {
        Self {
            category_bits: groups.memberships.bits() as u16,
            mask_bits: groups.filter.bits() as u16,
            group_index,
        }
    }
}

// Collider user data layout: bits 0..64 entity id, bit 64 set when an id is
// present, bits 80..96 the filter group index.
const USER_PRESENT: u128 = 1 << 64;
const GROUP_SHIFT: u32 = 80;

fn pack_user_data(user_data: Option<u64>, group_index: i16) -> u128 {
    let id = user_data.map_or(0, |id| u128::from(id) | USER_PRESENT);
    id | (u128::from(group_index as u16) << GROUP_SHIFT)
}

fn unpack_user(raw: u128) -> Option<u64> {
    (raw & USER_PRESENT != 0).then_some(raw as u64)
}

fn unpack_group(raw: u128) -> i16 {
    (raw >> GROUP_SHIFT) as u16 as i16
}

fn to_vec2(v: &rapier2d::prelude::Vector<Real>) -> Vec2 {
    Vec2::new(v.x, v.y)
}

/// Body construction parameters
#[derive(Debug, Clone)]
pub struct BodyDef {
    pub body_type: BodyType,
    pub position: Vec2,
    pub angle: f32,
    pub linear_velocity: Vec2,
    pub angular_velocity: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub gravity_scale: f32,
    pub fixed_rotation: bool,
    pub bullet: bool,
}

impl Default for BodyDef {
    fn default() -> Self {
        Self {
            body_type: BodyType::Static,
            position: Vec2::ZERO,
            angle: 0.0,
            linear_velocity: Vec2::ZERO,
            angular_velocity: 0.0,
            linear_damping: 0.0,
            angular_damping: 0.0,
            gravity_scale: 1.0,
            fixed_rotation: false,
            bullet: false,
        }
    }
}

impl BodyDef {
    pub fn new(body_type: BodyType, position: Vec2) -> Self {
        Self {
            body_type,
            position,
            ..Default::default()
        }
    }

    fn build(&self) -> RigidBody {
        let mut builder = RigidBodyBuilder::new(self.body_type.rapier())
            .translation(vector![self.position.x, self.position.y])
            .rotation(self.angle)
            .linvel(vector![self.linear_velocity.x, self.linear_velocity.y])
            .angvel(self.angular_velocity)
            .linear_damping(self.linear_damping)
            .angular_damping(self.angular_damping)
            .gravity_scale(self.gravity_scale)
            .ccd_enabled(self.bullet)
            .can_sleep(false);
        if self.fixed_rotation {
            builder = builder.lock_rotations();
        }
        builder.build()
    }
}

/// Fixture construction parameters
#[derive(Debug, Clone)]
pub struct FixtureDef {
    pub shape: Shape,
    pub density: f32,
    pub friction: f32,
    pub restitution: f32,
    pub is_sensor: bool,
    pub filter: Filter,
    pub user_data: Option<u64>,
}

impl FixtureDef {
    pub fn new(shape: Shape) -> Self {
        Self {
            shape,
            density: 0.0,
            friction: 0.2,
            restitution: 0.0,
            is_sensor: false,
            filter: Filter::default(),
            user_data: None,
        }
    }

    fn build(&self) -> Option<Collider> {
        let collider = self
            .shape
            .collider_builder()?
            .density(self.density)
            .friction(self.friction)
            .restitution(self.restitution)
            .sensor(self.is_sensor)
            .collision_groups(self.filter.groups())
            .active_events(ActiveEvents::COLLISION_EVENTS)
            .user_data(pack_user_data(self.user_data, self.filter.group_index))
            .build();
        Some(collider)
    }
}

/// Snapshot of a body's state
#[derive(Debug, Clone)]
pub struct Body {
    pub body_type: BodyType,
    pub position: Vec2,
    pub angle: f32,
    pub linear_velocity: Vec2,
    pub angular_velocity: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub gravity_scale: f32,
    pub fixed_rotation: bool,
    pub bullet: bool,
    mass: f32,
    fixtures: Vec<FixtureHandle>,
}

impl Body {
    fn from_rapier(rb: &RigidBody) -> Self {
        Self {
            body_type: BodyType::from_rapier(rb.body_type()),
            position: to_vec2(rb.translation()),
            angle: rb.rotation().angle(),
            linear_velocity: to_vec2(rb.linvel()),
            angular_velocity: rb.angvel(),
            linear_damping: rb.linear_damping(),
            angular_damping: rb.angular_damping(),
            gravity_scale: rb.gravity_scale(),
            fixed_rotation: rb.locked_axes().contains(LockedAxes::ROTATION_LOCKED),
            bullet: rb.is_ccd_enabled(),
            mass: rb.mass(),
            fixtures: rb.colliders().to_vec(),
        }
    }

    pub fn mass(&self) -> f32 {
        self.mass
    }

    pub fn fixtures(&self) -> &[FixtureHandle] {
        &self.fixtures
    }
}

/// Snapshot of a fixture
#[derive(Debug, Clone)]
pub struct Fixture {
    pub shape: Shape,
    pub density: f32,
    pub friction: f32,
    pub restitution: f32,
    pub is_sensor: bool,
    pub filter: Filter,
    pub user_data: Option<u64>,
    body: Option<BodyHandle>,
}

impl Fixture {
    fn from_rapier(collider: &Collider) -> Option<Self> {
        Some(Self {
            shape: Shape::from_collider(collider)?,
            density: collider.density(),
            friction: collider.friction(),
            restitution: collider.restitution(),
            is_sensor: collider.is_sensor(),
            filter: Filter::from_groups(collider.collision_groups(), unpack_group(collider.user_data)),
            user_data: unpack_user(collider.user_data),
            body: collider.parent(),
        })
    }

    pub fn body(&self) -> Option<BodyHandle> {
        self.body
    }
}

/// Whether a contact started or ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactPhase {
    Begin,
    End,
}

/// Contact event between two fixtures.
///
/// User data is captured at the time of the event so end events for
/// destroyed fixtures still identify their owners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContactEvent {
    pub phase: ContactPhase,
    pub fixture_a: FixtureHandle,
    pub fixture_b: FixtureHandle,
    pub user_a: Option<u64>,
    pub user_b: Option<u64>,
}

/// Nearest fixture hit by a ray cast
#[derive(Debug, Clone, Copy)]
pub struct RayCastHit {
    pub fixture: FixtureHandle,
    pub body: BodyHandle,
    pub body_type: BodyType,
    pub is_sensor: bool,
    pub category_bits: u16,
    pub user_data: Option<u64>,
    pub point: Vec2,
    pub fraction: f32,
}

fn handle_key(handle: FixtureHandle) -> (u32, u32) {
    handle.into_raw_parts()
}

/// The 2D world
pub struct PhysicsWorld {
    pipeline: PhysicsPipeline,
    gravity: Vec2,
    integration_parameters: IntegrationParameters,
    islands: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    query_pipeline: QueryPipeline,
    /// User data of colliders removed since the last step, for their end events
    retired: HashMap<FixtureHandle, u128>,
}

impl PhysicsWorld {
    pub fn new(gravity: Vec2) -> Self {
        Self {
            pipeline: PhysicsPipeline::new(),
            gravity,
            integration_parameters: IntegrationParameters::default(),
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            retired: HashMap::new(),
        }
    }

    pub fn gravity(&self) -> Vec2 {
        self.gravity
    }

    pub fn set_gravity(&mut self, gravity: Vec2) {
        self.gravity = gravity;
    }

    /// Constraint solver iterations per step (at least one)
    pub fn set_solver_iterations(&mut self, iterations: usize) {
        self.integration_parameters.num_solver_iterations =
            NonZeroUsize::new(iterations).unwrap_or(NonZeroUsize::MIN);
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn fixture_count(&self) -> usize {
        self.colliders.len()
    }

    pub fn create_body(&mut self, def: &BodyDef) -> BodyHandle {
        self.bodies.insert(def.build())
    }

    /// Destroy a body and all its fixtures. Returns false for stale handles.
    pub fn destroy_body(&mut self, handle: BodyHandle) -> bool {
        let Some(rb) = self.bodies.get(handle) else {
            return false;
        };
        for &collider in rb.colliders() {
            if let Some(c) = self.colliders.get(collider) {
                self.retired.insert(collider, c.user_data);
            }
        }
        self.bodies
            .remove(
                handle,
                &mut self.islands,
                &mut self.colliders,
                &mut self.impulse_joints,
                &mut self.multibody_joints,
                true,
            )
            .is_some()
    }

    pub fn body(&self, handle: BodyHandle) -> Option<Body> {
        self.bodies.get(handle).map(Body::from_rapier)
    }

    pub fn bodies(&self) -> impl Iterator<Item = (BodyHandle, Body)> + '_ {
        self.bodies.iter().map(|(h, rb)| (h, Body::from_rapier(rb)))
    }

    pub fn position(&self, handle: BodyHandle) -> Option<Vec2> {
        self.bodies.get(handle).map(|rb| to_vec2(rb.translation()))
    }

    pub fn linear_velocity(&self, handle: BodyHandle) -> Option<Vec2> {
        self.bodies.get(handle).map(|rb| to_vec2(rb.linvel()))
    }

    pub fn body_type(&self, handle: BodyHandle) -> Option<BodyType> {
        self.bodies.get(handle).map(|rb| BodyType::from_rapier(rb.body_type()))
    }

    /// Teleport a body. Returns false for stale handles.
    pub fn set_position(&mut self, handle: BodyHandle, position: Vec2) -> bool {
        let Some(rb) = self.bodies.get_mut(handle) else {
            return false;
        };
        rb.set_translation(vector![position.x, position.y], true);
        true
    }

    pub fn set_linear_velocity(&mut self, handle: BodyHandle, velocity: Vec2) -> bool {
        let Some(rb) = self.bodies.get_mut(handle) else {
            return false;
        };
        rb.set_linvel(vector![velocity.x, velocity.y], true);
        true
    }

    /// Attach a fixture; `None` if the body no longer exists or the shape has no area
    pub fn create_fixture(&mut self, body: BodyHandle, def: &FixtureDef) -> Option<FixtureHandle> {
        self.bodies.get(body)?;
        let Some(collider) = def.build() else {
            log::warn!("Skipping degenerate fixture shape {:?}", def.shape);
            return None;
        };
        if def.filter.group_index != 0 {
            log::debug!("Fixture group index {} is stored but not filtered on", def.filter.group_index);
        }
        let handle = self
            .colliders
            .insert_with_parent(collider, body, &mut self.bodies);
        if let Some(rb) = self.bodies.get_mut(body) {
            rb.recompute_mass_properties_from_colliders(&self.colliders);
        }
        Some(handle)
    }

    /// Detach and drop a fixture. Returns false for stale handles.
    pub fn destroy_fixture(&mut self, handle: FixtureHandle) -> bool {
        let Some(collider) = self
            .colliders
            .remove(handle, &mut self.islands, &mut self.bodies, true)
        else {
            return false;
        };
        self.retired.insert(handle, collider.user_data);
        if let Some(rb) = collider.parent().and_then(|b| self.bodies.get_mut(b)) {
            rb.recompute_mass_properties_from_colliders(&self.colliders);
        }
        true
    }

    pub fn fixture(&self, handle: FixtureHandle) -> Option<Fixture> {
        self.colliders.get(handle).and_then(Fixture::from_rapier)
    }

    pub fn fixtures(&self) -> impl Iterator<Item = (FixtureHandle, Fixture)> + '_ {
        self.colliders
            .iter()
            .filter_map(|(h, c)| Fixture::from_rapier(c).map(|f| (h, f)))
    }

    fn user_of(&self, handle: FixtureHandle) -> Option<u64> {
        self.colliders
            .get(handle)
            .map(|c| c.user_data)
            .or_else(|| self.retired.get(&handle).copied())
            .and_then(unpack_user)
    }

    /// Advance the world by `dt` and report contacts that began or ended.
    ///
    /// Ends come before begins, each sorted by fixture handle.
    pub fn step(&mut self, dt: f32) -> Vec<ContactEvent> {
        self.integration_parameters.dt = dt;
        let (collision_send, collision_recv) = rapier2d::crossbeam::channel::unbounded::<CollisionEvent>();
        let (force_send, _force_recv) = rapier2d::crossbeam::channel::unbounded::<ContactForceEvent>();
        let event_handler = ChannelEventCollector::new(collision_send, force_send);

        self.pipeline.step(
            &vector![self.gravity.x, self.gravity.y],
            &self.integration_parameters,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &(),
            &event_handler,
        );

        let mut events = Vec::new();
        while let Ok(event) = collision_recv.try_recv() {
            let (phase, h1, h2) = match event {
                CollisionEvent::Started(h1, h2, _) => (ContactPhase::Begin, h1, h2),
                CollisionEvent::Stopped(h1, h2, _) => (ContactPhase::End, h1, h2),
            };
            let (a, b) = if handle_key(h1) <= handle_key(h2) { (h1, h2) } else { (h2, h1) };
            events.push(ContactEvent {
                phase,
                fixture_a: a,
                fixture_b: b,
                user_a: self.user_of(a),
                user_b: self.user_of(b),
            });
        }
        self.retired.clear();

        events.sort_by_key(|e| {
            let rank = match e.phase {
                ContactPhase::End => 0,
                ContactPhase::Begin => 1,
            };
            (rank, handle_key(e.fixture_a), handle_key(e.fixture_b))
        });
        events
    }

    /// Rebuild the ray-cast index after edits made outside of [`step`](Self::step)
    pub fn refresh_queries(&mut self) {
        self.query_pipeline.update(&self.colliders);
    }

    /// Cast a ray from `p1` to `p2` and return the nearest fixture `filter` accepts
    pub fn ray_cast(&self, p1: Vec2, p2: Vec2, filter: QueryFilter) -> Option<RayCastHit> {
        let delta = p2 - p1;
        if delta.length_squared() == 0.0 {
            return None;
        }
        let ray = Ray::new(point![p1.x, p1.y], vector![delta.x, delta.y]);
        let (fixture, fraction) =
            self.query_pipeline
                .cast_ray(&self.bodies, &self.colliders, &ray, 1.0, true, filter)?;
        let collider = self.colliders.get(fixture)?;
        let body = collider.parent()?;
        let rb = self.bodies.get(body)?;
        Some(RayCastHit {
            fixture,
            body,
            body_type: BodyType::from_rapier(rb.body_type()),
            is_sensor: collider.is_sensor(),
            category_bits: collider.collision_groups().memberships.bits() as u16,
            user_data: unpack_user(collider.user_data),
            point: p1 + delta * fraction,
            fraction,
        })
    }
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new(Vec2::ZERO)
    }
}

impl std::fmt::Debug for PhysicsWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhysicsWorld")
            .field("gravity", &self.gravity)
            .field("bodies", &self.bodies.len())
            .field("fixtures", &self.colliders.len())
            .finish()
    }
}
