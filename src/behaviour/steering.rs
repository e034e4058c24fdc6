//! Steering helpers shared by the behaviours

use glam::Vec2;
use rapier2d::prelude::{Collider, ColliderHandle};

use super::DroneView;
use crate::physics::{BodyType, PhysicsWorld, QueryFilter};
use crate::{clamp_magnitude, consts, direction};

/// Cast rays all around the drone and collect the points where they first
/// meet static world geometry.
///
/// Sensors, typed fixtures (targets, trees) and dynamic bodies are seen
/// through. A kinematic body stops the ray without producing a point.
pub fn perform_ray_casting(world: &PhysicsWorld, drone: &DroneView) -> Vec<Vec2> {
    let range = drone.obstacle_view_range;
    let rays = (360.0 / consts::RAY_ANGLE_STEP_DEG) as usize;
    let untyped = |_: ColliderHandle, c: &Collider| {
        c.collision_groups().memberships.bits() == u32::from(consts::DEFAULT_CATEGORY)
    };
    let filter = QueryFilter::exclude_dynamic()
        .exclude_sensors()
        .predicate(&untyped);
    let mut points = Vec::new();
    for i in 0..rays {
        let angle = (i as f32 * consts::RAY_ANGLE_STEP_DEG).to_radians();
        let end = drone.position + direction(angle) * range;
        let blocker = world.ray_cast(drone.position, end, filter);
        if let Some(hit) = blocker.filter(|h| h.body_type == BodyType::Static) {
            points.push(hit.point);
        }
    }
    points
}

/// Inverse-distance weighted flee from `points` within `range`, turned into a
/// force-limited steering correction. Zero when nothing is in range.
fn flee(points: impl Iterator<Item = Vec2>, range: f32, drone: &DroneView) -> Vec2 {
    let mut sum = Vec2::ZERO;
    let mut count = 0;
    for point in points {
        let d = drone.position.distance(point);
        if d > 0.0 && d < range {
            sum += (drone.position - point).normalize_or_zero() / d;
            count += 1;
        }
    }
    if count == 0 {
        return Vec2::ZERO;
    }
    let desired = (sum / count as f32).normalize_or_zero() * drone.max_speed;
    clamp_magnitude(desired - drone.velocity, drone.max_force)
}

/// Steer away from obstacle points closer than the obstacle view range
pub fn avoid_obstacles(points: &[Vec2], drone: &DroneView) -> Vec2 {
    flee(points.iter().copied(), drone.obstacle_view_range, drone)
}

/// Steer away from other drones closer than the drone detection range
pub fn avoid_drones(swarm: &[DroneView], drone: &DroneView) -> Vec2 {
    flee(
        swarm.iter().filter(|d| d.id != drone.id).map(|d| d.position),
        drone.drone_detection_range,
        drone,
    )
}

/// Force-limited correction toward `target` at full speed
pub fn steer_to(target: Vec2, drone: &DroneView) -> Vec2 {
    let desired = (target - drone.position).normalize_or_zero() * drone.max_speed;
    clamp_magnitude(desired - drone.velocity, drone.max_force)
}

/// Cap speed at `max_speed`. The small bias keeps the direction defined for a
/// drone at rest.
pub fn limit_speed(velocity: Vec2, max_speed: f32) -> Vec2 {
    let speed = 0.001 + velocity.length();
    let dir = velocity / speed;
    dir * speed.min(max_speed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behaviour::test_support::swarm;
    use crate::physics::{BodyDef, FixtureDef, Filter, Shape};

    fn wall(world: &mut PhysicsWorld, x: f32, filter: Filter, body_type: BodyType) {
        let body = world.create_body(&BodyDef::new(body_type, Vec2::ZERO));
        let mut def = FixtureDef::new(Shape::Edge {
            start: Vec2::new(x, -100.0),
            end: Vec2::new(x, 100.0),
        });
        def.filter = filter;
        world.create_fixture(body, &def).unwrap();
    }

    #[test]
    fn test_ray_casting_finds_static_wall() {
        let (mut world, views) = swarm(&[(Vec2::ZERO, Vec2::ZERO)]);
        wall(&mut world, 20.0, Filter::default(), BodyType::Static);
        world.refresh_queries();
        let points = perform_ray_casting(&world, &views[0]);
        // 0 deg and the two 45 deg rays reach the wall within 50 units
        assert_eq!(points.len(), 3);
        assert!(points.iter().all(|p| (p.x - 20.0).abs() < 1e-3));
    }

    #[test]
    fn test_ray_casting_ignores_typed_and_kinematic_geometry() {
        let (mut world, views) = swarm(&[(Vec2::ZERO, Vec2::ZERO)]);
        let typed = Filter {
            category_bits: 0x0004,
            ..Filter::default()
        };
        wall(&mut world, 10.0, typed, BodyType::Static);
        wall(&mut world, -10.0, Filter::default(), BodyType::Kinematic);
        world.refresh_queries();
        assert!(perform_ray_casting(&world, &views[0]).is_empty());
    }

    #[test]
    fn test_avoid_drones_pushes_away() {
        let (_, views) = swarm(&[(Vec2::ZERO, Vec2::ZERO), (Vec2::new(5.0, 0.0), Vec2::ZERO)]);
        let steer = avoid_drones(&views, &views[0]);
        assert!(steer.x < 0.0);
        assert!(steer.length() <= views[0].max_force + 1e-5);
    }

    #[test]
    fn test_avoid_drones_out_of_range_is_zero() {
        let (_, views) = swarm(&[(Vec2::ZERO, Vec2::ZERO), (Vec2::new(500.0, 0.0), Vec2::ZERO)]);
        assert_eq!(avoid_drones(&views, &views[0]), Vec2::ZERO);
    }

    #[test]
    fn test_avoid_obstacles_ignores_coincident_points() {
        let (_, views) = swarm(&[(Vec2::ZERO, Vec2::ZERO)]);
        assert_eq!(avoid_obstacles(&[Vec2::ZERO], &views[0]), Vec2::ZERO);
        let steer = avoid_obstacles(&[Vec2::new(0.0, 10.0)], &views[0]);
        assert!(steer.y < 0.0);
    }

    #[test]
    fn test_steer_to_is_force_limited() {
        let (_, views) = swarm(&[(Vec2::ZERO, Vec2::ZERO)]);
        let steer = steer_to(Vec2::new(100.0, 0.0), &views[0]);
        assert!((steer.length() - views[0].max_force).abs() < 1e-5);
        assert!(steer.x > 0.0);
    }

    #[test]
    fn test_limit_speed() {
        let v = limit_speed(Vec2::new(30.0, 40.0), 10.0);
        assert!((v.length() - 10.0).abs() < 1e-3);
        assert_eq!(limit_speed(Vec2::ZERO, 10.0), Vec2::ZERO);
        let slow = limit_speed(Vec2::new(1.0, 0.0), 10.0);
        assert!((slow.x - 1.0).abs() < 1e-5);
    }
}
