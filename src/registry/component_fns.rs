//! Type-erased functions installed per component type at registration.
//!
//! Each closure is monomorphized over the concrete component and fetches the
//! store fresh from the registry on every call, so re-registering a type
//! never leaves a stale store captured anywhere.

use std::rc::Rc;

use bytes::Bytes;

use crate::component::Component;
use crate::entity::{Entity, EntityIdMap};
use crate::error::Error;
use crate::registry::Registry;
use crate::wire::{Decode, Encode};

/// Serialized snapshot of one component store.
#[derive(Clone, Debug, PartialEq)]
pub struct ComponentState {
    pub key: String,
    pub entries: Vec<(Entity, Bytes)>,
}

pub(crate) struct ComponentFns {
    /// Clears the entity's slot.
    pub erase: Rc<dyn Fn(&Registry, Entity)>,
    /// Decodes a payload and stores it at the entity's slot.
    pub emplace: Rc<dyn Fn(&Registry, Entity, &Bytes) -> Result<(), Error>>,
    /// Serializes every occupied slot.
    pub snapshot: Rc<dyn Fn(&Registry) -> ComponentState>,
    /// Rewrites entity references inside a serialized instance.
    pub translate: Rc<dyn Fn(&Bytes, &EntityIdMap) -> Result<Bytes, Error>>,
}

impl ComponentFns {
    pub(crate) fn new<T: Component>(key: &str) -> Self {
        let snapshot_key = key.to_string();
        Self {
            erase: Rc::new(|registry, entity| {
                if let Ok(components) = registry.components::<T>() {
                    components.borrow_mut().erase(entity.slot());
                }
            }),
            emplace: Rc::new(|registry, entity, bytes| {
                let component = T::from_bytes(bytes)?;
                registry.components::<T>()?.borrow_mut().insert_at(entity.slot(), component);
                Ok(())
            }),
            snapshot: Rc::new(move |registry| {
                let mut state = ComponentState {
                    key: snapshot_key.clone(),
                    entries: Vec::new(),
                };
                if let Ok(components) = registry.components::<T>() {
                    for (index, component) in components.borrow().iter() {
                        state
                            .entries
                            .push((Entity::from_index(index as u32), component.to_bytes()));
                    }
                }
                state
            }),
            translate: Rc::new(|bytes, map| {
                let mut component = T::from_bytes(bytes)?;
                component.map_entities(map);
                Ok(component.to_bytes())
            }),
        }
    }
}
