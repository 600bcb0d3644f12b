//! Central hub of the runtime: entity lifecycle, type-erased component
//! storage, system scheduling, hooks, bindings, scenes and templates.
//!
//! The registry is single-threaded; every public method takes `&self` and
//! internal state lives behind [`RefCell`]s so systems and event handlers can
//! re-enter freely during a tick.

pub mod component_fns;
pub(crate) mod hooks;
pub(crate) mod type_keys;

use core::any::{self, Any, TypeId};
use core::cell::{Ref, RefCell, RefMut};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use bytes::Bytes;
use fnv::{FnvHashMap, FnvHashSet};
use log::{debug, error};

use crate::clock::Clock;
use crate::component::{Component, Hookable};
use crate::ctx::Ctx;
use crate::entity::{Entity, EntityIdMap};
use crate::error::Error;
use crate::scene::{Scene, SceneState};
use crate::storage::SparseStore;
use crate::value::ValueMap;
use crate::wire::Encode;
use component_fns::{ComponentFns, ComponentState};
use hooks::{HookResolver, self_hook_key};
use type_keys::TypeKeyMap;

/// Shared handle to the sparse store of one component type.
///
/// Handles are cheap to clone; systems grab one per zipped store and borrow
/// it for the duration of the iteration.
pub struct Components<T>(Rc<RefCell<SparseStore<T>>>);

impl<T> Default for Components<T> {
    fn default() -> Self {
        Self(Rc::new(RefCell::new(SparseStore::new())))
    }
}

impl<T> Clone for Components<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T> Components<T> {
    pub fn borrow(&self) -> Ref<'_, SparseStore<T>> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, SparseStore<T>> {
        self.0.borrow_mut()
    }
}

/// Conjunction of component types for [`Registry::has_all`].
pub trait ComponentSet {
    fn all_present(registry: &Registry, entity: Entity) -> bool;
}

macro_rules! impl_component_set {
    ($($C:ident),*) => {
        impl<$($C: Component),*> ComponentSet for ($($C,)*) {
            fn all_present(registry: &Registry, entity: Entity) -> bool {
                $(registry.has::<$C>(entity) &&)* true
            }
        }
    };
}

variadics_please::all_tuples!(impl_component_set, 1, 12, C);

struct SystemEntry {
    priority: usize,
    run: Rc<dyn Fn(&Ctx)>,
}

#[allow(dead_code)]
struct Binding {
    target_entity: Entity,
    target_type: TypeId,
    target_field: String,
    source: String,
    updater: Rc<dyn Fn(&Registry)>,
    serializer: Rc<dyn Fn(&Registry) -> Option<Bytes>>,
}

#[derive(Default)]
struct EntityAllocator {
    max: u32,
    dead: VecDeque<Entity>,
    dying: FnvHashSet<Entity>,
}

/// The registry. See the module docs.
#[derive(Default)]
pub struct Registry {
    stores: RefCell<HashMap<TypeId, Box<dyn Any>>>,
    fns: RefCell<HashMap<TypeId, ComponentFns>>,
    keys: RefCell<TypeKeyMap>,
    entities: RefCell<EntityAllocator>,
    systems: RefCell<Vec<SystemEntry>>,
    bindings: RefCell<Vec<Binding>>,
    hooks: RefCell<FnvHashMap<String, HookResolver>>,
    global_hooks: RefCell<FnvHashMap<String, HookResolver>>,
    scenes: RefCell<FnvHashMap<String, SceneState>>,
    current_scenes: RefCell<Vec<String>>,
    templates: RefCell<FnvHashMap<String, ValueMap>>,
    clock: RefCell<Clock>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Entities
    // ------------------------------------------------------------------

    /// Allocates an entity id, preferring recycled ids over fresh ones.
    pub fn spawn(&self) -> Entity {
        let mut entities = self.entities.borrow_mut();
        if let Some(entity) = entities.dead.pop_front() {
            entity
        } else {
            let entity = Entity::from_index(entities.max);
            entities.max += 1;
            entity
        }
    }

    /// Marks an entity for deletion at the end of the tick.
    ///
    /// Safe to call repeatedly and safe during iteration; the entity stays
    /// fully accessible until [`Registry::process_deletions`] runs.
    pub fn kill(&self, entity: Entity) {
        self.entities.borrow_mut().dying.insert(entity);
    }

    pub fn is_dying(&self, entity: Entity) -> bool {
        self.entities.borrow().dying.contains(&entity)
    }

    /// Erases every component of each entity marked for deletion, then
    /// returns the ids to the recycler.
    pub fn process_deletions(&self) {
        let dying = {
            let mut entities = self.entities.borrow_mut();
            let mut dying: Vec<_> = entities.dying.drain().collect();
            dying.sort_unstable();
            dying
        };
        if dying.is_empty() {
            return;
        }

        let erasers: Vec<_> = self
            .fns
            .borrow()
            .values()
            .map(|fns| Rc::clone(&fns.erase))
            .collect();
        for &entity in &dying {
            for erase in &erasers {
                erase(self, entity);
            }
        }

        let mut entities = self.entities.borrow_mut();
        entities.dead.extend(dying);
    }

    // ------------------------------------------------------------------
    // Components
    // ------------------------------------------------------------------

    /// Registers a component type under a unique string key.
    ///
    /// Registration is idempotent in the replacing sense: registering a key
    /// again installs a fresh store, dropping any existing slots.
    pub fn register<T: Component>(&self, key: &str) -> Components<T> {
        let type_id = TypeId::of::<T>();
        let handle = Components::<T>::default();
        self.stores
            .borrow_mut()
            .insert(type_id, Box::new(handle.clone()));
        self.fns
            .borrow_mut()
            .insert(type_id, ComponentFns::new::<T>(key));
        self.keys.borrow_mut().insert(type_id, key);
        handle
    }

    /// Returns the store handle for a registered component type.
    pub fn components<T: Component>(&self) -> Result<Components<T>, Error> {
        let stores = self.stores.borrow();
        let entry = stores
            .get(&TypeId::of::<T>())
            .ok_or(Error::UnregisteredType(any::type_name::<T>()))?;
        let handle = entry
            .downcast_ref::<Components<T>>()
            .ok_or(Error::UnregisteredType(any::type_name::<T>()))?;
        Ok(handle.clone())
    }

    /// Attaches a component to an entity, replacing any existing one.
    pub fn add<T: Component>(&self, entity: Entity, component: T) -> Result<(), Error> {
        self.components::<T>()?
            .borrow_mut()
            .insert_at(entity.slot(), component);
        Ok(())
    }

    /// Removes a component from an entity. No-op if absent.
    pub fn remove<T: Component>(&self, entity: Entity) {
        if let Ok(components) = self.components::<T>() {
            components.borrow_mut().erase(entity.slot());
        }
    }

    /// Calls `f` with a shared reference to the entity's component.
    pub fn with<T: Component, R>(&self, entity: Entity, f: impl FnOnce(&T) -> R) -> Option<R> {
        let components = self.components::<T>().ok()?;
        let store = components.borrow();
        store.get(entity.slot()).map(f)
    }

    /// Calls `f` with a mutable reference to the entity's component.
    pub fn with_mut<T: Component, R>(
        &self,
        entity: Entity,
        f: impl FnOnce(&mut T) -> R,
    ) -> Option<R> {
        let components = self.components::<T>().ok()?;
        let mut store = components.borrow_mut();
        store.get_mut(entity.slot()).map(f)
    }

    /// Returns a copy of the entity's component.
    pub fn get_cloned<T: Component + Clone>(&self, entity: Entity) -> Option<T> {
        self.with::<T, T>(entity, T::clone)
    }

    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        self.with::<T, ()>(entity, |_| ()).is_some()
    }

    /// `true` when the entity has every component of the tuple `S`.
    pub fn has_all<S: ComponentSet>(&self, entity: Entity) -> bool {
        S::all_present(self, entity)
    }

    /// Deserializes and attaches a component by string key.
    ///
    /// Unknown keys and malformed payloads are logged and skipped.
    pub fn emplace_from_bytes(&self, entity: Entity, key: &str, bytes: &Bytes) {
        let Some(type_id) = self.keys.borrow().type_of(key) else {
            error!("unknown component key `{key}`");
            return;
        };
        let Some(emplace) = self
            .fns
            .borrow()
            .get(&type_id)
            .map(|fns| Rc::clone(&fns.emplace))
        else {
            error!("unknown component key `{key}`");
            return;
        };
        if let Err(err) = emplace(self, entity, bytes) {
            error!("failed to emplace `{key}` on entity {entity}: {err}");
        }
    }

    /// String key of a registered component type.
    pub fn component_key<T: Component>(&self) -> Option<String> {
        self.keys.borrow().key_of(TypeId::of::<T>())
    }

    // ------------------------------------------------------------------
    // Systems
    // ------------------------------------------------------------------

    /// Inserts a system into the priority-ordered queue. Lower priorities run
    /// earlier; equal priorities keep insertion order.
    pub fn add_system(&self, priority: usize, system: impl Fn(&Ctx) + 'static) {
        let mut systems = self.systems.borrow_mut();
        let position = systems.partition_point(|entry| entry.priority <= priority);
        systems.insert(
            position,
            SystemEntry {
                priority,
                run: Rc::new(system),
            },
        );
    }

    /// Runs every system in priority order.
    ///
    /// The queue is snapshotted first, so systems added during the tick only
    /// execute from the next tick on.
    pub fn run_systems(&self, ctx: &Ctx) {
        let pending: Vec<_> = self
            .systems
            .borrow()
            .iter()
            .map(|entry| Rc::clone(&entry.run))
            .collect();
        for run in pending {
            run(ctx);
        }
    }

    // ------------------------------------------------------------------
    // Hooks
    // ------------------------------------------------------------------

    /// Installs a resolver that exposes the fields of `entity`'s `T`
    /// component under the raw key `key`.
    pub fn register_hook<T: Component + Hookable>(&self, key: &str, entity: Entity) {
        self.hooks
            .borrow_mut()
            .insert(key.to_string(), hooks::component_resolver::<T>(entity));
    }

    /// Installs a self-scoped resolver: the key is the component key suffixed
    /// with the entity id, which is what `self`-scoped hook expressions look
    /// up.
    pub fn register_self_hook<T: Component + Hookable>(&self, component_key: &str, entity: Entity) {
        self.register_hook::<T>(&self_hook_key(component_key, entity), entity);
    }

    /// Installs a resolver in the global table under an arbitrary name.
    pub fn register_global_hook<T: Component + Hookable>(&self, name: &str, entity: Entity) {
        self.global_hooks
            .borrow_mut()
            .insert(name.to_string(), hooks::component_resolver::<T>(entity));
    }

    /// Calls `f` with the hooked field re-typed to `T`. Absent hooks and type
    /// mismatches return `None`; mismatches are logged.
    pub fn with_hooked_value<T: 'static, R>(
        &self,
        component: &str,
        field: &str,
        f: impl FnOnce(&mut T) -> R,
    ) -> Option<R> {
        Self::resolve_hooked(&self.hooks, self, component, field, f)
    }

    /// [`Registry::with_hooked_value`] against the global hook table.
    pub fn with_global_hooked_value<T: 'static, R>(
        &self,
        name: &str,
        field: &str,
        f: impl FnOnce(&mut T) -> R,
    ) -> Option<R> {
        Self::resolve_hooked(&self.global_hooks, self, name, field, f)
    }

    /// Returns a copy of the hooked field.
    pub fn hooked_value<T: Clone + 'static>(&self, component: &str, field: &str) -> Option<T> {
        self.with_hooked_value(component, field, |value: &mut T| value.clone())
    }

    /// Returns a copy of a globally hooked field.
    pub fn global_hooked_value<T: Clone + 'static>(&self, name: &str, field: &str) -> Option<T> {
        self.with_global_hooked_value(name, field, |value: &mut T| value.clone())
    }

    /// Overwrites the hooked field with `value`.
    pub fn set_hooked_value<T: 'static>(
        &self,
        component: &str,
        field: &str,
        value: T,
    ) -> Option<()> {
        self.with_hooked_value(component, field, move |slot: &mut T| *slot = value)
    }

    fn resolve_hooked<T: 'static, R>(
        table: &RefCell<FnvHashMap<String, HookResolver>>,
        registry: &Registry,
        component: &str,
        field: &str,
        f: impl FnOnce(&mut T) -> R,
    ) -> Option<R> {
        let resolver = Rc::clone(table.borrow().get(component)?);
        let mut result = None;
        let mut callback = Some(f);
        let mut mismatched = false;
        resolver(registry, field, &mut |any| match any.downcast_mut::<T>() {
            Some(value) => {
                if let Some(f) = callback.take() {
                    result = Some(f(value));
                }
            }
            None => mismatched = true,
        });
        if mismatched {
            error!(
                "hook `{component}:{field}` does not hold a `{}`",
                any::type_name::<T>()
            );
        }
        result
    }

    // ------------------------------------------------------------------
    // Bindings
    // ------------------------------------------------------------------

    /// Registers a live binding: every tick the value at `source` (a
    /// `scope:Component:field` expression) is copied into `field` of the
    /// entity's `C` component.
    ///
    /// Resolution failures are swallowed; the binding stays until
    /// [`Registry::clear_bindings`]. Writes are skipped when the source
    /// already equals the target.
    pub fn register_binding<C, T>(&self, entity: Entity, field: &str, source: &str)
    where
        C: Component + Hookable,
        T: Clone + PartialEq + 'static,
    {
        let target_field = field.to_string();
        let source_expr = source.to_string();

        let updater_field = target_field.clone();
        let updater_source = source_expr.clone();
        let updater: Rc<dyn Fn(&Registry)> = Rc::new(move |registry| {
            let Some((scope, component, source_field)) = hooks::parse_scoped(&updater_source)
            else {
                return;
            };
            let value: Option<T> = match scope {
                hooks::Scope::Entity => {
                    registry.hooked_value(&self_hook_key(component, entity), source_field)
                }
                hooks::Scope::Global => registry.global_hooked_value(component, source_field),
            };
            let Some(value) = value else {
                return;
            };
            let Ok(components) = registry.components::<C>() else {
                return;
            };
            let mut store = components.borrow_mut();
            let Some(target) = store.get_mut(entity.slot()) else {
                return;
            };
            let Some(field_any) = target.hook_field(&updater_field) else {
                return;
            };
            let Some(slot) = field_any.downcast_mut::<T>() else {
                return;
            };
            if *slot != value {
                *slot = value;
            }
        });

        let serializer: Rc<dyn Fn(&Registry) -> Option<Bytes>> = Rc::new(move |registry| {
            let components = registry.components::<C>().ok()?;
            let store = components.borrow();
            store.get(entity.slot()).map(Encode::to_bytes)
        });

        self.bindings.borrow_mut().push(Binding {
            target_entity: entity,
            target_type: TypeId::of::<C>(),
            target_field,
            source: source_expr,
            updater,
            serializer,
        });
    }

    /// Runs every binding updater in registration order.
    pub fn update_bindings(&self) {
        let updaters: Vec<_> = self
            .bindings
            .borrow()
            .iter()
            .map(|binding| Rc::clone(&binding.updater))
            .collect();
        for updater in updaters {
            updater(self);
        }
    }

    /// Re-encodes every binding target, for downstream replication.
    pub fn serialize_bindings(&self) -> Vec<(Entity, Bytes)> {
        let serializers: Vec<_> = self
            .bindings
            .borrow()
            .iter()
            .map(|binding| (binding.target_entity, Rc::clone(&binding.serializer)))
            .collect();
        serializers
            .iter()
            .filter_map(|(entity, serialize)| Some((*entity, serialize(self)?)))
            .collect()
    }

    /// Drops every binding.
    pub fn clear_bindings(&self) {
        self.bindings.borrow_mut().clear();
    }

    // ------------------------------------------------------------------
    // Scenes
    // ------------------------------------------------------------------

    /// Registers a scene name with its initial state, replacing any previous
    /// state.
    pub fn add_scene(&self, name: &str, state: SceneState) {
        self.scenes.borrow_mut().insert(name.to_string(), state);
    }

    /// Registers the [`Scene`] component type. Idempotent.
    pub fn init_scene_management(&self) {
        if self.keys.borrow().type_of("scene").is_some() {
            return;
        }
        self.register::<Scene>("scene");
    }

    /// Populates the current-scene list from initial states: the single
    /// `Main` scene plus every `Active` scene.
    pub fn setup_scene_systems(&self) {
        let scenes = self.scenes.borrow();
        let mut current = self.current_scenes.borrow_mut();
        current.clear();
        if let Some((name, _)) = scenes
            .iter()
            .find(|&(_, &state)| state == SceneState::Main)
        {
            current.push(name.clone());
        }
        for (name, &state) in scenes.iter() {
            if state == SceneState::Active {
                current.push(name.clone());
            }
        }
    }

    /// Appends a scene to the current-scene list.
    pub fn set_current_scene(&self, name: &str) {
        self.current_scenes.borrow_mut().push(name.to_string());
    }

    /// Removes every occurrence of a scene from the current-scene list.
    pub fn remove_current_scene(&self, name: &str) {
        self.current_scenes
            .borrow_mut()
            .retain(|current| current != name);
    }

    pub fn remove_all_scenes(&self) {
        self.current_scenes.borrow_mut().clear();
    }

    pub fn current_scenes(&self) -> Vec<String> {
        self.current_scenes.borrow().clone()
    }

    /// Consults the entity's [`Scene`] component, if any: entities without
    /// one always participate.
    pub fn is_in_current_scene(&self, entity: Entity) -> bool {
        match self.with::<Scene, _>(entity, |scene| scene.scene_name.clone()) {
            Some(name) => self.current_scenes.borrow().contains(&name),
            None => true,
        }
    }

    // ------------------------------------------------------------------
    // Serialization and entity translation
    // ------------------------------------------------------------------

    /// Snapshots every registered component store as `(key, entries)` pairs,
    /// sorted by key for determinism.
    pub fn state_snapshot(&self) -> Vec<ComponentState> {
        let snapshots: Vec<_> = self
            .fns
            .borrow()
            .values()
            .map(|fns| Rc::clone(&fns.snapshot))
            .collect();
        let mut states: Vec<_> = snapshots.iter().map(|snapshot| snapshot(self)).collect();
        states.sort_by(|a, b| a.key.cmp(&b.key));
        states
    }

    /// Rewrites every entity reference inside a serialized component.
    ///
    /// Unknown component keys are an error.
    pub fn translate_component(
        &self,
        key: &str,
        bytes: &Bytes,
        map: &EntityIdMap,
    ) -> Result<Bytes, Error> {
        let type_id = self
            .keys
            .borrow()
            .type_of(key)
            .ok_or_else(|| Error::UnknownComponent(key.to_string()))?;
        let translate = self
            .fns
            .borrow()
            .get(&type_id)
            .map(|fns| Rc::clone(&fns.translate))
            .ok_or_else(|| Error::UnknownComponent(key.to_string()))?;
        translate(bytes, map)
    }

    // ------------------------------------------------------------------
    // Templates
    // ------------------------------------------------------------------

    /// Stores a named entity template.
    pub fn add_template(&self, name: &str, config: ValueMap) {
        self.templates.borrow_mut().insert(name.to_string(), config);
    }

    /// Returns a copy of a named template.
    pub fn template(&self, name: &str) -> Option<ValueMap> {
        let templates = self.templates.borrow();
        let template = templates.get(name);
        if template.is_none() {
            debug!("template `{name}` not found");
        }
        template.cloned()
    }

    // ------------------------------------------------------------------
    // Clock
    // ------------------------------------------------------------------

    pub fn clock(&self) -> Clock {
        *self.clock.borrow()
    }

    pub(crate) fn tick_clock(&self) {
        self.clock.borrow_mut().tick();
    }
}
