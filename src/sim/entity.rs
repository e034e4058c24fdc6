//! Entities and the arena that owns them
//!
//! Every entity owns exactly one physics body. The body's fixtures carry the
//! entity's [`EntityId`] as raw user data so contacts and ray casts can be
//! resolved back to the entity.

use std::fmt;

use glam::Vec2;
use slotmap::{Key, KeyData, SlotMap, new_key_type};

use super::collision::EntityKind;
use super::drone::DroneState;
use super::target::TargetState;
use crate::observer::{LogMessage, LogThrottle, ObserverHandle, notify_all};
use crate::physics::{BodyHandle, PhysicsWorld};

/// RGBA colour
pub type Colour = [f32; 4];

new_key_type! {
    /// Stable generational handle to an entity
    pub struct EntityId;
}

impl EntityId {
    /// Pack into fixture user data
    pub fn to_raw(self) -> u64 {
        self.data().as_ffi()
    }

    pub fn from_raw(raw: u64) -> Self {
        KeyData::from_ffi(raw).into()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.data())
    }
}

/// Kind-specific payload
#[derive(Debug)]
pub enum EntityData {
    Drone(DroneState),
    Target(TargetState),
}

pub struct Entity {
    id: EntityId,
    /// Sequential number within its kind, used in research logs
    serial: u32,
    body: BodyHandle,
    radius: f32,
    pub colour: Colour,
    observers: Vec<ObserverHandle>,
    throttle: LogThrottle,
    pub data: EntityData,
}

impl Entity {
    pub fn new(
        id: EntityId,
        serial: u32,
        body: BodyHandle,
        radius: f32,
        colour: Colour,
        throttle: LogThrottle,
        data: EntityData,
    ) -> Self {
        Self {
            id,
            serial,
            body,
            radius,
            colour,
            observers: Vec::new(),
            throttle,
            data,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn serial(&self) -> u32 {
        self.serial
    }

    pub fn body(&self) -> BodyHandle {
        self.body
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn kind(&self) -> EntityKind {
        match &self.data {
            EntityData::Drone(_) => EntityKind::Drone,
            EntityData::Target(t) if t.tree.is_some() => EntityKind::Tree,
            EntityData::Target(_) => EntityKind::Target,
        }
    }

    pub fn position(&self, world: &PhysicsWorld) -> Vec2 {
        world.position(self.body).unwrap_or_default()
    }

    pub fn velocity(&self, world: &PhysicsWorld) -> Vec2 {
        world.linear_velocity(self.body).unwrap_or_default()
    }

    pub fn as_drone(&self) -> Option<&DroneState> {
        match &self.data {
            EntityData::Drone(d) => Some(d),
            EntityData::Target(_) => None,
        }
    }

    pub fn as_drone_mut(&mut self) -> Option<&mut DroneState> {
        match &mut self.data {
            EntityData::Drone(d) => Some(d),
            EntityData::Target(_) => None,
        }
    }

    pub fn as_target(&self) -> Option<&TargetState> {
        match &self.data {
            EntityData::Target(t) => Some(t),
            EntityData::Drone(_) => None,
        }
    }

    pub fn as_target_mut(&mut self) -> Option<&mut TargetState> {
        match &mut self.data {
            EntityData::Target(t) => Some(t),
            EntityData::Drone(_) => None,
        }
    }

    pub fn add_observer(&mut self, observer: ObserverHandle) {
        self.observers.push(observer);
    }

    pub fn observers(&self) -> &[ObserverHandle] {
        &self.observers
    }

    pub fn set_log_interval(&mut self, interval: f64) {
        self.throttle.set_interval(interval);
    }

    /// Send `payload` to every observer unless the last message went out
    /// less than one log interval ago. Returns whether it was sent.
    pub fn log(&mut self, now: f64, payload: &serde_json::Value) -> bool {
        if self.observers.is_empty() || !self.throttle.ready(now) {
            return false;
        }
        let message = LogMessage::new(now, self.kind().name(), self.serial, payload);
        notify_all(&self.observers, &message);
        true
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.id)
            .field("serial", &self.serial)
            .field("body", &self.body)
            .field("radius", &self.radius)
            .field("observers", &self.observers.len())
            .field("data", &self.data)
            .finish()
    }
}

/// Owns every live entity, addressed by [`EntityId`]
#[derive(Debug, Default)]
pub struct EntityArena {
    entities: SlotMap<EntityId, Entity>,
}

impl EntityArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entity built from the id it will receive
    pub fn insert_with(&mut self, build: impl FnOnce(EntityId) -> Entity) -> EntityId {
        self.entities.insert_with_key(build)
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(id)
    }

    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        self.entities.remove(id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Entity> {
        self.entities.values_mut()
    }

    /// Remove an entity together with its physics body
    pub fn despawn(&mut self, world: &mut PhysicsWorld, id: EntityId) -> bool {
        match self.remove(id) {
            Some(entity) => {
                world.destroy_body(entity.body);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::MemoryObserver;
    use crate::physics::BodyDef;
    use crate::sim::target::TargetState;
    use std::rc::Rc;

    fn plain_target(arena: &mut EntityArena, world: &mut PhysicsWorld) -> EntityId {
        let body = world.create_body(&BodyDef::default());
        arena.insert_with(|id| {
            Entity::new(
                id,
                0,
                body,
                1.0,
                [1.0; 4],
                LogThrottle::new(0.1, 0.0),
                EntityData::Target(TargetState::default()),
            )
        })
    }

    #[test]
    fn test_raw_round_trip() {
        let mut keys: SlotMap<EntityId, ()> = SlotMap::with_key();
        let first = keys.insert(());
        keys.remove(first);
        let id = keys.insert(());
        assert_ne!(id, first);
        assert_eq!(EntityId::from_raw(id.to_raw()), id);
        assert_eq!(id.to_string(), "1v3");
    }

    #[test]
    fn test_despawn_destroys_body() {
        let mut world = PhysicsWorld::default();
        let mut arena = EntityArena::new();
        let id = plain_target(&mut arena, &mut world);
        assert_eq!(world.body_count(), 1);
        assert_eq!(arena.get(id).unwrap().kind(), EntityKind::Target);
        assert!(arena.despawn(&mut world, id));
        assert_eq!(world.body_count(), 0);
        assert!(!arena.contains(id));
        assert!(!arena.despawn(&mut world, id));
    }

    #[test]
    fn test_stale_id_after_reuse() {
        let mut world = PhysicsWorld::default();
        let mut arena = EntityArena::new();
        let first = plain_target(&mut arena, &mut world);
        arena.despawn(&mut world, first);
        let second = plain_target(&mut arena, &mut world);
        assert_ne!(first, second);
        assert_eq!(first.to_raw() as u32, second.to_raw() as u32);
        assert!(arena.get(first).is_none());
        assert!(arena.get(second).is_some());
    }

    #[test]
    fn test_log_is_throttled() {
        let mut world = PhysicsWorld::default();
        let mut arena = EntityArena::new();
        let id = plain_target(&mut arena, &mut world);
        let memory = Rc::new(MemoryObserver::new());
        let entity = arena.get_mut(id).unwrap();
        entity.add_observer(memory.clone());

        let payload = serde_json::json!({"found": false});
        assert!(!entity.log(0.05, &payload));
        assert!(entity.log(0.15, &payload));
        assert!(!entity.log(0.2, &payload));
        assert!(entity.log(0.3, &payload));
        assert_eq!(memory.len(), 2);
        assert_eq!(memory.messages()[0].caller_type, "Target");
    }
}
