//! 2D physics on rapier2d
//!
//! Bodies, fixtures with category/mask filtering, sensors, ray casts and
//! contact begin/end events.

pub mod shape;
pub mod world;

pub use rapier2d::prelude::QueryFilter;
pub use shape::Shape;
pub use world::{
    Body, BodyDef, BodyHandle, BodyType, ContactEvent, ContactPhase, Filter, Fixture, FixtureDef,
    FixtureHandle, PhysicsWorld, RayCastHit,
};
