//! Shared registries for one or more simulations

use std::cell::RefCell;
use std::rc::Rc;

use super::collision::CollisionManager;
use super::contact::ContactListenerRegistry;
use super::drone::DroneConfigRegistry;
use super::target::TargetFactory;
use crate::behaviour::BehaviourRegistry;
use crate::error::Result;
use crate::map::MapStore;
use crate::settings::Settings;

/// Registries and settings handed to every [`Sim`](super::Sim) and to the
/// batch runner. Cloning shares the registries.
#[derive(Debug, Clone)]
pub struct SimContext {
    pub behaviours: Rc<RefCell<BehaviourRegistry>>,
    pub drone_configs: Rc<RefCell<DroneConfigRegistry>>,
    pub collisions: Rc<RefCell<CollisionManager>>,
    pub listeners: Rc<RefCell<ContactListenerRegistry>>,
    pub targets: Rc<RefCell<TargetFactory>>,
    pub maps: Rc<RefCell<MapStore>>,
    pub settings: Rc<Settings>,
}

impl SimContext {
    /// Built-in behaviours, configurations, listeners and target types; no maps
    pub fn with_settings(settings: Settings) -> Self {
        Self {
            behaviours: Rc::new(RefCell::new(BehaviourRegistry::with_defaults())),
            drone_configs: Rc::new(RefCell::new(DroneConfigRegistry::with_defaults())),
            collisions: Rc::new(RefCell::new(CollisionManager::with_defaults())),
            listeners: Rc::new(RefCell::new(ContactListenerRegistry::with_defaults())),
            targets: Rc::new(RefCell::new(TargetFactory::with_defaults())),
            maps: Rc::new(RefCell::new(MapStore::new())),
            settings: Rc::new(settings),
        }
    }

    pub fn with_defaults() -> Self {
        Self::with_settings(Settings::default())
    }

    /// Load every map from the configured maps directory
    pub fn load_maps(&self) -> Result<usize> {
        let dir = self.settings.resolved_maps_dir();
        self.maps.borrow_mut().load_all(&dir)
    }
}

impl Default for SimContext {
    fn default() -> Self {
        Self::with_defaults()
    }
}
