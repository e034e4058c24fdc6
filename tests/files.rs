//! File formats: maps, queues and settings written and read back from disk

use glam::Vec2;
use swarm_testbed::map::{MapDefinition, MapStore};
use swarm_testbed::physics::{BodyDef, BodyType, FixtureDef, PhysicsWorld, Shape};
use swarm_testbed::queue::{TestConfig, TestQueue};

#[test]
fn test_map_save_is_inverse_of_load() {
    let dir = tempfile::tempdir().unwrap();
    let mut world = PhysicsWorld::default();
    let wall = world.create_body(&BodyDef::new(BodyType::Static, Vec2::new(10.0, 20.0)));
    world.create_fixture(
        wall,
        &FixtureDef::new(Shape::Polygon {
            vertices: vec![Vec2::ZERO, Vec2::new(5.0, 0.0), Vec2::new(5.0, 5.0), Vec2::new(0.0, 5.0)],
        }),
    );
    let post = world.create_body(&BodyDef::new(BodyType::Kinematic, Vec2::new(50.0, 50.0)));
    world.create_fixture(
        post,
        &FixtureDef::new(Shape::Circle {
            center: Vec2::ZERO,
            radius: 3.0,
        }),
    );

    let map = MapDefinition::from_world("yard", 120.0, 80.0, Vec2::new(60.0, 40.0), &world);
    let path = dir.path().join("yard.json");
    map.save(&path).unwrap();
    let loaded = MapDefinition::load(&path).unwrap();
    assert_eq!(loaded, map);

    let rebuilt = loaded.build_world().unwrap();
    assert_eq!(rebuilt.body_count(), 2);
    assert_eq!(MapDefinition::from_world("yard", 120.0, 80.0, Vec2::new(60.0, 40.0), &rebuilt), map);

    let mut store = MapStore::new();
    assert_eq!(store.load_all(dir.path()).unwrap(), 1);
    assert_eq!(store.get("yard"), Some(&map));
}

#[test]
fn test_queue_file_is_plain_json_array() {
    let dir = tempfile::tempdir().unwrap();
    let mut queue = TestQueue::new();
    let mut config = TestConfig::new("Levy Flocking", "Small", "yard", 25, 90.0);
    config.num_targets = 40;
    config.target_type = "Tree".to_string();
    config.parameters.set("Levy Weight", 2.0);
    queue.push(config.clone());
    let path = dir.path().join("queue.json");
    queue.save(&path).unwrap();

    let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    let entry = &raw.as_array().unwrap()[0];
    for key in [
        "behaviour_name",
        "parameters",
        "drone_config_name",
        "map_name",
        "num_drones",
        "num_targets",
        "time_limit",
        "target_type",
        "contact_listener_name",
        "keep",
    ] {
        assert!(entry.get(key).is_some(), "missing {key}");
    }
    assert_eq!(entry["parameters"]["Levy Weight"], 2.0);

    let mut loaded = TestQueue::load(&path).unwrap();
    assert_eq!(loaded.pop().unwrap(), config);
}
