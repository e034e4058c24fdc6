//! Name -> behaviour lookup shared by every simulation in a batch
//!
//! Each name maps to a factory plus a template instance. The template holds
//! the parameter values tooling reads and edits; every Sim gets its own
//! instance built by the factory and seeded with the template's values, so
//! per-drone state never leaks between Sims.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use super::{
    Behaviour, DspBehaviour, FlockingBehaviour, LevyFlockingBehaviour, PheromoneBehaviour,
    UniformRandomWalkBehaviour, parameter_values,
};
use crate::error::{Result, SimError};

/// Shared, mutable behaviour. Drones of the same run hold clones of one handle.
pub type BehaviourHandle = Rc<RefCell<dyn Behaviour>>;

type Factory = Rc<dyn Fn() -> BehaviourHandle>;

#[derive(Clone)]
struct Entry {
    factory: Factory,
    template: BehaviourHandle,
}

#[derive(Clone, Default)]
pub struct BehaviourRegistry {
    behaviours: BTreeMap<String, Entry>,
}

impl BehaviourRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in behaviours under their canonical names
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.add(FlockingBehaviour::NAME, FlockingBehaviour::default);
        registry.add(LevyFlockingBehaviour::NAME, LevyFlockingBehaviour::default);
        registry.add(PheromoneBehaviour::NAME, PheromoneBehaviour::default);
        registry.add(UniformRandomWalkBehaviour::NAME, UniformRandomWalkBehaviour::default);
        registry.add(DspBehaviour::NAME, DspBehaviour::default);
        registry
    }

    /// Register a factory, replacing any previous one with the same name.
    /// Returns the template instance.
    pub fn add<B, F>(&mut self, name: &str, factory: F) -> BehaviourHandle
    where
        B: Behaviour + 'static,
        F: Fn() -> B + 'static,
    {
        let factory: Factory = Rc::new(move || -> BehaviourHandle { Rc::new(RefCell::new(factory())) });
        let template = factory();
        let entry = Entry {
            factory,
            template: template.clone(),
        };
        if self.behaviours.insert(name.to_string(), entry).is_some() {
            log::debug!("Replaced behaviour '{name}'");
        }
        template
    }

    /// Template instance holding the registered parameter values
    pub fn get(&self, name: &str) -> Option<BehaviourHandle> {
        self.behaviours.get(name).map(|e| e.template.clone())
    }

    /// Like [`get`](Self::get) but reports a lookup error
    pub fn require(&self, name: &str) -> Result<BehaviourHandle> {
        self.get(name).ok_or_else(|| SimError::lookup("behaviour", name))
    }

    /// Fresh instance carrying the template's current parameter values
    pub fn instantiate(&self, name: &str) -> Result<BehaviourHandle> {
        let entry = self
            .behaviours
            .get(name)
            .ok_or_else(|| SimError::lookup("behaviour", name))?;
        let values = parameter_values(entry.template.borrow().parameters());
        let instance = (entry.factory)();
        instance.borrow_mut().set_parameters(&values);
        Ok(instance)
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.behaviours.remove(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.behaviours.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.behaviours.len()
    }

    pub fn is_empty(&self) -> bool {
        self.behaviours.is_empty()
    }
}

impl std::fmt::Debug for BehaviourRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
