//! Fixture shapes
//!
//! A plain description of a fixture's geometry in body-local space. It is
//! what maps store and what callers hand to [`PhysicsWorld`](super::PhysicsWorld);
//! rapier owns the actual collision shape.

use glam::Vec2;
use rapier2d::prelude::{Collider, ColliderBuilder, point, vector};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    Circle { center: Vec2, radius: f32 },
    /// Convex polygon, counter-clockwise
    Polygon { vertices: Vec<Vec2> },
    Edge { start: Vec2, end: Vec2 },
}

impl Shape {
    pub fn circle(radius: f32) -> Self {
        Shape::Circle {
            center: Vec2::ZERO,
            radius,
        }
    }

    /// Enclosed area (zero for edges)
    pub fn area(&self) -> f32 {
        match self {
            Shape::Circle { radius, .. } => std::f32::consts::PI * radius * radius,
            Shape::Edge { .. } => 0.0,
            Shape::Polygon { vertices } => {
                let n = vertices.len();
                let twice: f32 = (0..n)
                    .map(|i| vertices[i].perp_dot(vertices[(i + 1) % n]))
                    .sum();
                twice.abs() / 2.0
            }
        }
    }

    /// Collider builder for this geometry; `None` for a polygon with no area
    pub(crate) fn collider_builder(&self) -> Option<ColliderBuilder> {
        match self {
            Shape::Circle { center, radius } => {
                Some(ColliderBuilder::ball(*radius).translation(vector![center.x, center.y]))
            }
            Shape::Edge { start, end } => Some(ColliderBuilder::segment(
                point![start.x, start.y],
                point![end.x, end.y],
            )),
            Shape::Polygon { vertices } => {
                if self.area() <= f32::EPSILON {
                    return None;
                }
                let points: Vec<_> = vertices.iter().map(|v| point![v.x, v.y]).collect();
                ColliderBuilder::convex_polyline(points)
            }
        }
    }

    /// Read the geometry back from a collider
    pub(crate) fn from_collider(collider: &Collider) -> Option<Self> {
        let shape = collider.shape();
        if let Some(ball) = shape.as_ball() {
            let local = collider.position_wrt_parent().unwrap_or(collider.position());
            return Some(Shape::Circle {
                center: Vec2::new(local.translation.vector.x, local.translation.vector.y),
                radius: ball.radius,
            });
        }
        if let Some(segment) = shape.as_segment() {
            return Some(Shape::Edge {
                start: Vec2::new(segment.a.x, segment.a.y),
                end: Vec2::new(segment.b.x, segment.b.y),
            });
        }
        shape.as_convex_polygon().map(|polygon| Shape::Polygon {
            vertices: polygon.points().iter().map(|p| Vec2::new(p.x, p.y)).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_area() {
        assert!((Shape::circle(1.0).area() - std::f32::consts::PI).abs() < 1e-5);
        let square = Shape::Polygon {
            vertices: vec![
                Vec2::ZERO,
                Vec2::new(2.0, 0.0),
                Vec2::new(2.0, 2.0),
                Vec2::new(0.0, 2.0),
            ],
        };
        assert!((square.area() - 4.0).abs() < 1e-5);
        let edge = Shape::Edge {
            start: Vec2::ZERO,
            end: Vec2::X,
        };
        assert_eq!(edge.area(), 0.0);
    }

    #[test]
    fn test_degenerate_polygon_has_no_collider() {
        let line = Shape::Polygon {
            vertices: vec![Vec2::ZERO, Vec2::X, Vec2::new(2.0, 0.0)],
        };
        assert!(line.collider_builder().is_none());
    }

    #[test]
    fn test_shapes_read_back_from_colliders() {
        let shapes = [
            Shape::Circle {
                center: Vec2::new(1.0, -2.0),
                radius: 3.0,
            },
            Shape::Edge {
                start: Vec2::new(-1.0, 0.0),
                end: Vec2::new(4.0, 2.0),
            },
            Shape::Polygon {
                vertices: vec![Vec2::new(1.0, 0.0), Vec2::new(3.0, 0.0), Vec2::new(3.0, 2.0)],
            },
        ];
        for shape in shapes {
            let collider = shape.collider_builder().unwrap().build();
            assert_eq!(Shape::from_collider(&collider), Some(shape));
        }
    }
}
