//! Map files
//!
//! A map is a JSON description of the static world geometry (plus the drone
//! spawn point and world extent). Loading instantiates the bodies in a fresh
//! [`PhysicsWorld`]; [`MapDefinition::from_world`] is the structural inverse.

use std::collections::BTreeMap;
use std::path::Path;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::physics::{BodyDef, BodyType, Filter, FixtureDef, PhysicsWorld, Shape};

fn default_extent() -> f32 {
    2000.0
}

fn one() -> f32 {
    1.0
}

/// Geometry of one fixture, keyed by shape kind in the file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeRecord {
    Polygon(Vec<Vec2>),
    Circle { center: Vec2, radius: f32 },
    Edge { start: Vec2, end: Vec2 },
}

impl From<&Shape> for ShapeRecord {
    fn from(shape: &Shape) -> Self {
        match shape {
            Shape::Circle { center, radius } => ShapeRecord::Circle {
                center: *center,
                radius: *radius,
            },
            Shape::Polygon { vertices } => ShapeRecord::Polygon(vertices.clone()),
            Shape::Edge { start, end } => ShapeRecord::Edge {
                start: *start,
                end: *end,
            },
        }
    }
}

impl From<&ShapeRecord> for Shape {
    fn from(record: &ShapeRecord) -> Self {
        match record {
            ShapeRecord::Circle { center, radius } => Shape::Circle {
                center: *center,
                radius: *radius,
            },
            ShapeRecord::Polygon(vertices) => Shape::Polygon {
                vertices: vertices.clone(),
            },
            ShapeRecord::Edge { start, end } => Shape::Edge {
                start: *start,
                end: *end,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureRecord {
    #[serde(default)]
    pub density: f32,
    #[serde(default)]
    pub friction: f32,
    #[serde(default)]
    pub restitution: f32,
    #[serde(default)]
    pub is_sensor: bool,
    pub category_bits: u16,
    pub mask_bits: u16,
    #[serde(default)]
    pub group_index: i16,
    #[serde(flatten)]
    pub shape: ShapeRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyRecord {
    /// 0 static, 1 kinematic, 2 dynamic
    #[serde(rename = "type")]
    pub body_type: u8,
    pub position: Vec2,
    #[serde(default)]
    pub angle: f32,
    #[serde(default)]
    pub linear_damping: f32,
    #[serde(default)]
    pub angular_damping: f32,
    #[serde(default = "one")]
    pub gravity_scale: f32,
    #[serde(default)]
    pub fixed_rotation: bool,
    #[serde(default)]
    pub bullet: bool,
    #[serde(default)]
    pub fixtures: Vec<FixtureRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapDefinition {
    pub name: String,
    #[serde(default = "default_extent")]
    pub width: f32,
    #[serde(default = "default_extent")]
    pub height: f32,
    #[serde(default)]
    pub drone_spawn_point: Vec2,
    #[serde(default)]
    pub bodies: Vec<BodyRecord>,
}

impl MapDefinition {
    /// A map with no geometry; drones spawn in the middle
    pub fn open(name: &str, width: f32, height: f32) -> Self {
        Self {
            name: name.to_string(),
            width,
            height,
            drone_spawn_point: Vec2::new(width / 2.0, height / 2.0),
            bodies: Vec::new(),
        }
    }

    /// World extent as a vector
    pub fn bounds(&self) -> Vec2 {
        Vec2::new(self.width, self.height)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| SimError::resource(path, e))?;
        let map: Self = serde_json::from_str(&json)?;
        log::debug!("Loaded map '{}' ({} bodies)", map.name, map.bodies.len());
        Ok(map)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir).map_err(|e| SimError::resource(dir, e))?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|e| SimError::resource(path, e))?;
        log::info!("Map '{}' saved to {}", self.name, path.display());
        Ok(())
    }

    /// Instantiate every body and fixture in a fresh zero-gravity world
    pub fn build_world(&self) -> Result<PhysicsWorld> {
        let mut world = PhysicsWorld::new(Vec2::ZERO);
        for record in &self.bodies {
            let body_type = BodyType::from_index(record.body_type)
                .ok_or_else(|| SimError::lookup("body type", record.body_type.to_string()))?;
            let def = BodyDef {
                body_type,
                position: record.position,
                angle: record.angle,
                linear_damping: record.linear_damping,
                angular_damping: record.angular_damping,
                gravity_scale: record.gravity_scale,
                fixed_rotation: record.fixed_rotation,
                bullet: record.bullet,
                ..Default::default()
            };
            let body = world.create_body(&def);
            for f in &record.fixtures {
                let mut fixture = FixtureDef::new(Shape::from(&f.shape));
                fixture.density = f.density;
                fixture.friction = f.friction;
                fixture.restitution = f.restitution;
                fixture.is_sensor = f.is_sensor;
                fixture.filter = Filter {
                    category_bits: f.category_bits,
                    mask_bits: f.mask_bits,
                    group_index: f.group_index,
                };
                world.create_fixture(body, &fixture);
            }
        }
        Ok(world)
    }

    /// Capture the bodies of `world` as a map
    pub fn from_world(name: &str, width: f32, height: f32, drone_spawn_point: Vec2, world: &PhysicsWorld) -> Self {
        let bodies = world
            .bodies()
            .map(|(_, body)| BodyRecord {
                body_type: body.body_type.as_index(),
                position: body.position,
                angle: body.angle,
                linear_damping: body.linear_damping,
                angular_damping: body.angular_damping,
                gravity_scale: body.gravity_scale,
                fixed_rotation: body.fixed_rotation,
                bullet: body.bullet,
                fixtures: body
                    .fixtures()
                    .iter()
                    .filter_map(|h| world.fixture(*h))
                    .map(|f| FixtureRecord {
                        density: f.density,
                        friction: f.friction,
                        restitution: f.restitution,
                        is_sensor: f.is_sensor,
                        category_bits: f.filter.category_bits,
                        mask_bits: f.filter.mask_bits,
                        group_index: f.filter.group_index,
                        shape: ShapeRecord::from(&f.shape),
                    })
                    .collect(),
            })
            .collect();
        Self {
            name: name.to_string(),
            width,
            height,
            drone_spawn_point,
            bodies,
        }
    }
}

/// All known maps by name
#[derive(Debug, Clone, Default)]
pub struct MapStore {
    maps: BTreeMap<String, MapDefinition>,
}

impl MapStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `*.json` file in `dir`. Files that fail to parse are
    /// reported and skipped. Returns how many maps were added.
    pub fn load_all(&mut self, dir: &Path) -> Result<usize> {
        let entries = std::fs::read_dir(dir).map_err(|e| SimError::resource(dir, e))?;
        let mut paths: Vec<_> = entries
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        let mut loaded = 0;
        for path in paths {
            match MapDefinition::load(&path) {
                Ok(map) => {
                    self.insert(map);
                    loaded += 1;
                }
                Err(e) => log::warn!("Skipping map {}: {e}", path.display()),
            }
        }
        log::info!("Loaded {loaded} maps from {}", dir.display());
        Ok(loaded)
    }

    pub fn insert(&mut self, map: MapDefinition) {
        self.maps.insert(map.name.clone(), map);
    }

    pub fn get(&self, name: &str) -> Option<&MapDefinition> {
        self.maps.get(name)
    }

    pub fn require(&self, name: &str) -> Result<&MapDefinition> {
        self.get(name).ok_or_else(|| SimError::lookup("map", name))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.maps.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "name": "corridor",
        "width": 400.0,
        "height": 300.0,
        "drone_spawn_point": [50.0, 150.0],
        "bodies": [{
            "type": 0,
            "position": [0.0, 0.0],
            "angle": 0.0,
            "linear_damping": 0.0,
            "angular_damping": 0.0,
            "gravity_scale": 1.0,
            "fixed_rotation": false,
            "bullet": false,
            "fixtures": [
                {"density": 0.0, "friction": 0.2, "restitution": 0.0, "is_sensor": false,
                 "category_bits": 1, "mask_bits": 65535, "group_index": 0,
                 "edge": {"start": [100.0, 0.0], "end": [100.0, 200.0]}},
                {"density": 0.0, "friction": 0.2, "restitution": 0.0, "is_sensor": false,
                 "category_bits": 1, "mask_bits": 65535, "group_index": 0,
                 "polygon": [[200.0, 0.0], [250.0, 0.0], [250.0, 50.0]]},
                {"density": 1.0, "friction": 0.5, "restitution": 0.1, "is_sensor": true,
                 "category_bits": 4, "mask_bits": 2, "group_index": -1,
                 "circle": {"center": [300.0, 100.0], "radius": 10.0}}
            ]
        }]
    }"#;

    #[test]
    fn test_parse_and_build() {
        let map: MapDefinition = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(map.bounds(), Vec2::new(400.0, 300.0));
        assert_eq!(map.drone_spawn_point, Vec2::new(50.0, 150.0));
        let world = map.build_world().unwrap();
        assert_eq!(world.body_count(), 1);
        assert_eq!(world.fixture_count(), 3);
        let sensor = world.fixtures().find(|(_, f)| f.is_sensor).unwrap().1;
        assert_eq!(sensor.filter.group_index, -1);
        assert_eq!(sensor.filter.mask_bits, 2);
    }

    #[test]
    fn test_world_round_trip_preserves_fields() {
        let map: MapDefinition = serde_json::from_str(SAMPLE).unwrap();
        let world = map.build_world().unwrap();
        let captured = MapDefinition::from_world(&map.name, map.width, map.height, map.drone_spawn_point, &world);
        assert_eq!(captured, map);
    }

    #[test]
    fn test_unknown_body_type_fails() {
        let mut map: MapDefinition = serde_json::from_str(SAMPLE).unwrap();
        map.bodies[0].body_type = 9;
        assert!(matches!(map.build_world(), Err(SimError::Lookup { kind: "body type", .. })));
    }

    #[test]
    fn test_missing_file_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ghost.json");
        match MapDefinition::load(&path) {
            Err(SimError::Resource { path: p, .. }) => assert_eq!(p, path),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_store_skips_broken_files() {
        let dir = tempfile::tempdir().unwrap();
        let map: MapDefinition = serde_json::from_str(SAMPLE).unwrap();
        map.save(&dir.path().join("corridor.json")).unwrap();
        MapDefinition::open("open", 100.0, 100.0)
            .save(&dir.path().join("open.json"))
            .unwrap();
        std::fs::write(dir.path().join("broken.json"), "{").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut store = MapStore::new();
        assert_eq!(store.load_all(dir.path()).unwrap(), 2);
        assert_eq!(store.names().collect::<Vec<_>>(), vec!["corridor", "open"]);
        assert!(store.require("corridor").is_ok());
        assert!(matches!(store.require("maze"), Err(SimError::Lookup { kind: "map", .. })));
    }
}
