//! Collision categories per entity kind
//!
//! Each kind gets its own category bit the first time it is registered,
//! starting above the default bit used by walls and drone hulls. A kind's
//! mask is always the OR of its partners' category bits, so fixtures only
//! report contacts with the kinds they declared interest in.

use serde::{Deserialize, Serialize};

use crate::consts;
use crate::physics::Filter;

/// Closed set of entity kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    Drone,
    Target,
    Tree,
}

impl EntityKind {
    pub const COUNT: usize = 3;
    pub const ALL: [EntityKind; Self::COUNT] = [EntityKind::Drone, EntityKind::Target, EntityKind::Tree];

    /// Dense index for dispatch tables
    pub fn index(self) -> usize {
        match self {
            EntityKind::Drone => 0,
            EntityKind::Target => 1,
            EntityKind::Tree => 2,
        }
    }

    /// Name used as `caller_type` in research logs
    pub fn name(self) -> &'static str {
        match self {
            EntityKind::Drone => "Drone",
            EntityKind::Target => "Target",
            EntityKind::Tree => "Tree",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CollisionConfig {
    pub category_bits: u16,
    pub mask_bits: u16,
}

impl CollisionConfig {
    pub fn filter(&self) -> Filter {
        Filter {
            category_bits: self.category_bits,
            mask_bits: self.mask_bits,
            group_index: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CollisionManager {
    configs: [Option<CollisionConfig>; EntityKind::COUNT],
    partners: [Vec<EntityKind>; EntityKind::COUNT],
    next_category: u16,
}

impl Default for CollisionManager {
    fn default() -> Self {
        Self {
            configs: [None; EntityKind::COUNT],
            partners: Default::default(),
            next_category: consts::DEFAULT_CATEGORY << 1,
        }
    }
}

impl CollisionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drones sense targets and trees; both only report drones
    pub fn with_defaults() -> Self {
        let mut manager = Self::new();
        manager.register_kind(EntityKind::Drone, &[EntityKind::Target, EntityKind::Tree]);
        manager.register_kind(EntityKind::Target, &[EntityKind::Drone]);
        manager.register_kind(EntityKind::Tree, &[EntityKind::Drone]);
        manager
    }

    /// Register `kind` (allocating a category bit on first sight), store its
    /// partners and recompute every mask
    pub fn register_kind(&mut self, kind: EntityKind, partners: &[EntityKind]) {
        let i = kind.index();
        if self.configs[i].is_none() {
            let category_bits = self.next_category;
            self.next_category <<= 1;
            log::debug!("Collision category {category_bits:#06x} -> {kind}");
            self.configs[i] = Some(CollisionConfig {
                category_bits,
                mask_bits: 0,
            });
        }
        self.partners[i] = partners.to_vec();
        self.recompute_masks();
    }

    fn recompute_masks(&mut self) {
        for kind in EntityKind::ALL {
            let mask = self.partners[kind.index()]
                .iter()
                .filter_map(|p| self.configs[p.index()])
                .fold(0u16, |acc, c| acc | c.category_bits);
            if let Some(config) = self.configs[kind.index()].as_mut() {
                config.mask_bits = mask;
            }
        }
    }

    pub fn config(&self, kind: EntityKind) -> Option<CollisionConfig> {
        self.configs[kind.index()]
    }

    pub fn partners(&self, kind: EntityKind) -> &[EntityKind] {
        &self.partners[kind.index()]
    }

    /// Fixture filter for `kind`; unregistered kinds get the default filter
    pub fn filter(&self, kind: EntityKind) -> Filter {
        self.config(kind).map(|c| c.filter()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_default_registration() {
        let manager = CollisionManager::with_defaults();
        let drone = manager.config(EntityKind::Drone).unwrap();
        let target = manager.config(EntityKind::Target).unwrap();
        let tree = manager.config(EntityKind::Tree).unwrap();
        assert_eq!(drone.category_bits, 0x0002);
        assert_eq!(target.category_bits, 0x0004);
        assert_eq!(tree.category_bits, 0x0008);
        assert_eq!(drone.mask_bits, 0x0004 | 0x0008);
        assert_eq!(target.mask_bits, 0x0002);
        assert_eq!(tree.mask_bits, 0x0002);
    }

    #[test]
    fn test_registered_pairs_collide() {
        let manager = CollisionManager::with_defaults();
        let drone = manager.filter(EntityKind::Drone);
        assert!(drone.should_collide(&manager.filter(EntityKind::Tree)));
        assert!(drone.should_collide(&manager.filter(EntityKind::Target)));
        assert!(!drone.should_collide(&drone));
        assert!(!drone.should_collide(&Filter::default()));
    }

    #[test]
    fn test_reregistration_keeps_category() {
        let mut manager = CollisionManager::with_defaults();
        let before = manager.config(EntityKind::Drone).unwrap().category_bits;
        manager.register_kind(EntityKind::Drone, &[EntityKind::Drone]);
        let after = manager.config(EntityKind::Drone).unwrap();
        assert_eq!(after.category_bits, before);
        assert_eq!(after.mask_bits, before);
        assert_eq!(manager.partners(EntityKind::Drone), &[EntityKind::Drone]);
    }

    #[test]
    fn test_unregistered_kind_uses_default_filter() {
        let manager = CollisionManager::new();
        assert_eq!(manager.filter(EntityKind::Tree), Filter::default());
    }

    fn kind() -> impl Strategy<Value = EntityKind> {
        prop::sample::select(EntityKind::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn test_bits_distinct_and_masks_match_partners(
            ops in prop::collection::vec((kind(), prop::collection::vec(kind(), 0..3)), 1..12)
        ) {
            let mut manager = CollisionManager::new();
            for (k, partners) in &ops {
                manager.register_kind(*k, partners);
            }

            let registered: Vec<_> = EntityKind::ALL
                .into_iter()
                .filter_map(|k| manager.config(k).map(|c| (k, c)))
                .collect();
            for (i, (_, a)) in registered.iter().enumerate() {
                prop_assert!(a.category_bits.is_power_of_two());
                prop_assert!(a.category_bits > consts::DEFAULT_CATEGORY);
                for (_, b) in &registered[i + 1..] {
                    prop_assert_ne!(a.category_bits, b.category_bits);
                }
            }
            for (k, c) in &registered {
                let expected = manager
                    .partners(*k)
                    .iter()
                    .filter_map(|p| manager.config(*p))
                    .fold(0u16, |acc, p| acc | p.category_bits);
                prop_assert_eq!(c.mask_bits, expected);
            }
        }
    }
}
