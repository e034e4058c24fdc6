//! Kind-pair contact dispatch
//!
//! A listener maps `(kind_a, kind_b)` to a handler for contact begin and
//! contact end. Registering `(A, B)` also answers `(B, A)` by calling the same
//! handler with the arguments swapped, so a handler always receives its
//! entities in the order it was registered with.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use super::collision::EntityKind;
use super::entity::{EntityArena, EntityId};
use super::target::mark_found;
use crate::error::{Result, SimError};
use crate::physics::{ContactEvent, ContactPhase};

/// Contact handler; receives the arena and the two entities in registration order
pub type ContactHandler = Rc<dyn Fn(&mut EntityArena, EntityId, EntityId)>;

type DispatchTable = [[Option<ContactHandler>; EntityKind::COUNT]; EntityKind::COUNT];

#[derive(Default)]
pub struct ContactListener {
    name: String,
    begin: DispatchTable,
    end: DispatchTable,
    /// Kind pairs that began contact without a handler
    unhandled: RefCell<BTreeSet<(EntityKind, EntityKind)>>,
}

impl ContactListener {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn on_begin(
        &mut self,
        a: EntityKind,
        b: EntityKind,
        handler: impl Fn(&mut EntityArena, EntityId, EntityId) + 'static,
    ) {
        register(&mut self.begin, a, b, Rc::new(handler));
    }

    pub fn on_end(
        &mut self,
        a: EntityKind,
        b: EntityKind,
        handler: impl Fn(&mut EntityArena, EntityId, EntityId) + 'static,
    ) {
        register(&mut self.end, a, b, Rc::new(handler));
    }

    pub fn handles_begin(&self, a: EntityKind, b: EntityKind) -> bool {
        self.begin[a.index()][b.index()].is_some()
    }

    /// Run the begin handler for two entities. Returns false (and logs) when
    /// no handler is registered for their kinds.
    pub fn begin_contact(&self, arena: &mut EntityArena, a: EntityId, b: EntityId) -> bool {
        self.dispatch(&self.begin, arena, a, b, true)
    }

    pub fn end_contact(&self, arena: &mut EntityArena, a: EntityId, b: EntityId) -> bool {
        self.dispatch(&self.end, arena, a, b, false)
    }

    /// Kind pairs that began contact with no begin handler, each warned about once
    pub fn unhandled_pairs(&self) -> Vec<(EntityKind, EntityKind)> {
        self.unhandled.borrow().iter().copied().collect()
    }

    /// Route a physics contact event. Fixtures without an owning entity
    /// (walls, auxiliary bodies) are ignored.
    pub fn handle_event(&self, arena: &mut EntityArena, event: &ContactEvent) -> bool {
        let (Some(a), Some(b)) = (event.user_a, event.user_b) else {
            return false;
        };
        let (a, b) = (EntityId::from_raw(a), EntityId::from_raw(b));
        match event.phase {
            ContactPhase::Begin => self.begin_contact(arena, a, b),
            ContactPhase::End => self.end_contact(arena, a, b),
        }
    }

    fn dispatch(&self, table: &DispatchTable, arena: &mut EntityArena, a: EntityId, b: EntityId, begin: bool) -> bool {
        let (Some(kind_a), Some(kind_b)) = (arena.get(a).map(|e| e.kind()), arena.get(b).map(|e| e.kind())) else {
            log::trace!("Contact between despawned entities {a} and {b}");
            return false;
        };
        match &table[kind_a.index()][kind_b.index()] {
            Some(handler) => {
                handler(arena, a, b);
                true
            }
            None => {
                if begin && self.unhandled.borrow_mut().insert((kind_a, kind_b)) {
                    log::warn!("{}: no handler for {kind_a} x {kind_b}, contact ignored", self.name);
                }
                false
            }
        }
    }
}

impl std::fmt::Debug for ContactListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContactListener").field("name", &self.name).finish_non_exhaustive()
    }
}

fn register(table: &mut DispatchTable, a: EntityKind, b: EntityKind, handler: ContactHandler) {
    table[a.index()][b.index()] = Some(handler.clone());
    if a != b {
        table[b.index()][a.index()] = Some(Rc::new(move |arena: &mut EntityArena, x, y| handler(arena, y, x)));
    }
}

/// Drone found a target (or tree)
fn drone_finds_target(arena: &mut EntityArena, drone: EntityId, target: EntityId) {
    let Some(entity) = arena.get_mut(target) else {
        return;
    };
    mark_found(entity);
    if let Some(tree) = entity.as_target_mut().and_then(|t| t.tree.as_mut()) {
        tree.mapped = true;
        tree.add_num_mapped();
    }
    if let Some(d) = arena.get_mut(drone).and_then(|e| e.as_drone_mut()) {
        d.record_found(target);
    }
}

fn drone_leaves_tree(arena: &mut EntityArena, _drone: EntityId, tree: EntityId) {
    if let Some(t) = arena
        .get_mut(tree)
        .and_then(|e| e.as_target_mut())
        .and_then(|t| t.tree.as_mut())
    {
        t.reset_mapping();
    }
}

/// The `"Default"` listener: drones find targets and map trees
pub fn default_listener() -> ContactListener {
    let mut listener = ContactListener::new(ContactListenerRegistry::DEFAULT);
    listener.on_begin(EntityKind::Drone, EntityKind::Tree, drone_finds_target);
    listener.on_begin(EntityKind::Drone, EntityKind::Target, drone_finds_target);
    listener.on_begin(EntityKind::Drone, EntityKind::Drone, |_, _, _| {});
    listener.on_end(EntityKind::Drone, EntityKind::Tree, drone_leaves_tree);
    listener
}

/// Named listeners
#[derive(Debug, Clone, Default)]
pub struct ContactListenerRegistry {
    listeners: BTreeMap<String, Rc<ContactListener>>,
}

impl ContactListenerRegistry {
    pub const DEFAULT: &'static str = "Default";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(default_listener());
        registry
    }

    pub fn register(&mut self, listener: ContactListener) -> Rc<ContactListener> {
        let listener = Rc::new(listener);
        self.listeners.insert(listener.name.clone(), listener.clone());
        listener
    }

    pub fn get(&self, name: &str) -> Option<Rc<ContactListener>> {
        self.listeners.get(name).cloned()
    }

    pub fn require(&self, name: &str) -> Result<Rc<ContactListener>> {
        self.get(name)
            .ok_or_else(|| SimError::lookup("contact listener", name))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.listeners.keys().map(String::as_str)
    }
}
