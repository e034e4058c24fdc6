//! Simulation module
//!
//! Entities bound to physics bodies, kind-pair contact dispatch and the
//! per-tick loop. Everything here is single-threaded and deterministic:
//! - Fixed timestep supplied by the caller
//! - Seeded RNG only
//! - Stable iteration order (spawn order, by entity ID)

pub mod collision;
pub mod contact;
pub mod context;
pub mod core;
pub mod drone;
pub mod entity;
pub mod target;

pub use collision::{CollisionConfig, CollisionManager, EntityKind};
pub use contact::{ContactHandler, ContactListener, ContactListenerRegistry, default_listener};
pub use context::SimContext;
pub use core::{SIM_CALLER, Sim, SimPhase, SpawnType};
pub use drone::{DroneConfigRegistry, DroneConfiguration, DroneState};
pub use entity::{Colour, Entity, EntityArena, EntityData, EntityId};
pub use target::{NO_TARGETS, TargetFactory, TargetState, TargetTemplate, TreeState};
