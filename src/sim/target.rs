//! Targets and trees
//!
//! A target is a static disc that drone sensors can find. A tree is a target
//! that can also be diseased and counts how often drones mapped it.

use std::collections::BTreeMap;

use glam::Vec2;
use rand::Rng;
use rand_pcg::Pcg32;

use super::collision::{CollisionManager, EntityKind};
use super::entity::{Colour, Entity, EntityArena, EntityData, EntityId};
use crate::consts;
use crate::error::{Result, SimError};
use crate::observer::LogThrottle;
use crate::physics::{BodyDef, BodyType, FixtureDef, PhysicsWorld, Shape};

/// Target type name meaning "spawn no targets"
pub const NO_TARGETS: &str = "null";

pub const NOT_FOUND_COLOUR: Colour = [0.476, 0.253, 0.253, 0.125];
pub const FOUND_COLOUR: Colour = [0.385, 0.46, 0.33, 0.125];
pub const DISEASED_COLOUR: Colour = [0.55, 0.35, 0.1, 0.125];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TreeState {
    pub diseased: bool,
    pub mapped: bool,
    currently_mapped: bool,
    num_mapped: u32,
}

impl TreeState {
    pub fn new(diseased: bool) -> Self {
        Self {
            diseased,
            ..Default::default()
        }
    }

    /// Count one mapping, at most once until [`reset_mapping`](Self::reset_mapping)
    pub fn add_num_mapped(&mut self) {
        if !self.currently_mapped {
            self.num_mapped += 1;
            self.currently_mapped = true;
        }
    }

    pub fn reset_mapping(&mut self) {
        self.currently_mapped = false;
    }

    pub fn is_currently_mapped(&self) -> bool {
        self.currently_mapped
    }

    pub fn num_mapped(&self) -> u32 {
        self.num_mapped
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TargetState {
    pub found: bool,
    /// Present when the target is a tree
    pub tree: Option<TreeState>,
}

impl TargetState {
    pub fn tree(diseased: bool) -> Self {
        Self {
            found: false,
            tree: Some(TreeState::new(diseased)),
        }
    }
}

/// How to build one named target type
#[derive(Debug, Clone, Copy)]
pub struct TargetTemplate {
    pub radius: f32,
    pub build: fn(&mut Pcg32) -> TargetState,
}

fn plain_target(_: &mut Pcg32) -> TargetState {
    TargetState::default()
}

fn planted_tree(rng: &mut Pcg32) -> TargetState {
    TargetState::tree(rng.random_bool(f64::from(consts::TREE_INFECTION_CHANCE)))
}

/// Named target constructors
#[derive(Debug, Clone, Default)]
pub struct TargetFactory {
    templates: BTreeMap<String, TargetTemplate>,
}

impl TargetFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let mut factory = Self::new();
        factory.register(
            "Target",
            TargetTemplate {
                radius: 1.0,
                build: plain_target,
            },
        );
        factory.register(
            "Tree",
            TargetTemplate {
                radius: 5.0,
                build: planted_tree,
            },
        );
        factory
    }

    pub fn register(&mut self, name: &str, template: TargetTemplate) {
        self.templates.insert(name.to_string(), template);
    }

    pub fn get(&self, name: &str) -> Option<TargetTemplate> {
        self.templates.get(name).copied()
    }

    /// Resolve a target type; `"null"` yields `None`, unknown names fail
    pub fn resolve(&self, name: &str) -> Result<Option<TargetTemplate>> {
        if name == NO_TARGETS {
            return Ok(None);
        }
        self.get(name)
            .map(Some)
            .ok_or_else(|| SimError::lookup("target type", name))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }
}

/// Create a static target body with one marker fixture and add it to the arena
#[allow(clippy::too_many_arguments)]
pub fn spawn_target(
    world: &mut PhysicsWorld,
    arena: &mut EntityArena,
    collisions: &CollisionManager,
    template: &TargetTemplate,
    position: Vec2,
    serial: u32,
    rng: &mut Pcg32,
    throttle: LogThrottle,
) -> EntityId {
    let state = (template.build)(rng);
    let kind = if state.tree.is_some() {
        EntityKind::Tree
    } else {
        EntityKind::Target
    };
    let colour = match state.tree {
        Some(tree) if tree.diseased => DISEASED_COLOUR,
        _ => NOT_FOUND_COLOUR,
    };

    let body = world.create_body(&BodyDef::new(BodyType::Static, position));
    arena.insert_with(|id| {
        // Solid so drone sensors can detect it; its mask only admits those sensors
        let mut marker = FixtureDef::new(Shape::Circle {
            center: Vec2::ZERO,
            radius: template.radius,
        });
        marker.filter = collisions.filter(kind);
        marker.user_data = Some(id.to_raw());
        world.create_fixture(body, &marker);

        Entity::new(
            id,
            serial,
            body,
            template.radius,
            colour,
            throttle,
            EntityData::Target(state),
        )
    })
}

/// Mark a target found and recolour it
pub fn mark_found(entity: &mut Entity) {
    let Some(target) = entity.as_target_mut() else {
        return;
    };
    target.found = true;
    let diseased = target.tree.is_some_and(|t| t.diseased);
    if !diseased {
        entity.colour = FOUND_COLOUR;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_tree_mapping_is_debounced() {
        let mut tree = TreeState::new(false);
        tree.add_num_mapped();
        tree.add_num_mapped();
        assert_eq!(tree.num_mapped(), 1);
        assert!(tree.is_currently_mapped());
        tree.reset_mapping();
        tree.add_num_mapped();
        assert_eq!(tree.num_mapped(), 2);
    }

    #[test]
    fn test_factory_resolution() {
        let factory = TargetFactory::with_defaults();
        assert!(factory.resolve(NO_TARGETS).unwrap().is_none());
        assert_eq!(factory.resolve("Tree").unwrap().unwrap().radius, 5.0);
        assert_eq!(factory.resolve("Target").unwrap().unwrap().radius, 1.0);
        assert!(matches!(
            factory.resolve("Rock"),
            Err(SimError::Lookup { kind: "target type", .. })
        ));
    }

    #[test]
    fn test_some_trees_start_diseased() {
        let factory = TargetFactory::with_defaults();
        let tree = factory.get("Tree").unwrap();
        let mut rng = Pcg32::seed_from_u64(1);
        let diseased = (0..2000)
            .filter(|_| (tree.build)(&mut rng).tree.unwrap().diseased)
            .count();
        assert!(diseased > 40 && diseased < 200, "{diseased}");
    }

    #[test]
    fn test_spawned_target_is_static_marker() {
        let mut world = PhysicsWorld::default();
        let mut arena = EntityArena::new();
        let collisions = CollisionManager::with_defaults();
        let template = TargetFactory::with_defaults().get("Target").unwrap();
        let mut rng = Pcg32::seed_from_u64(1);
        let id = spawn_target(
            &mut world,
            &mut arena,
            &collisions,
            &template,
            Vec2::new(3.0, 4.0),
            0,
            &mut rng,
            LogThrottle::new(0.1, 0.0),
        );

        let entity = arena.get(id).unwrap();
        assert_eq!(entity.kind(), EntityKind::Target);
        let body = world.body(entity.body()).unwrap();
        assert_eq!(body.body_type, BodyType::Static);
        assert_eq!(body.fixtures().len(), 1);
        let fixture = world.fixture(body.fixtures()[0]).unwrap();
        assert!(!fixture.is_sensor);
        assert_eq!(fixture.user_data, Some(id.to_raw()));
        assert_eq!(fixture.filter, collisions.filter(EntityKind::Target));
    }

    #[test]
    fn test_mark_found() {
        let mut world = PhysicsWorld::default();
        let mut arena = EntityArena::new();
        let collisions = CollisionManager::with_defaults();
        let template = TargetFactory::with_defaults().get("Target").unwrap();
        let mut rng = Pcg32::seed_from_u64(1);
        let id = spawn_target(
            &mut world,
            &mut arena,
            &collisions,
            &template,
            Vec2::ZERO,
            0,
            &mut rng,
            LogThrottle::new(0.1, 0.0),
        );
        let entity = arena.get_mut(id).unwrap();
        mark_found(entity);
        assert!(entity.as_target().unwrap().found);
        assert_eq!(entity.colour, FOUND_COLOUR);
    }
}
