//! Typed event bus with priorities, re-entrant synchronous dispatch, binary
//! and structured-value emission paths and entity remapping.

pub mod builtin;

use core::any::{Any, TypeId};
use core::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use bytes::Bytes;
use fnv::FnvHashMap;
use log::error;

use crate::component::Event;
use crate::ctx::Ctx;
use crate::entity::{Entity, EntityIdMap};
use crate::error::Error;
use crate::registry::type_keys::TypeKeyMap;
use crate::value::ValueMap;
use crate::wire::{Decode, Encode};

/// Depth bound for nested emission. A handler chain that nests deeper is
/// considered runaway recursion and aborts the tick.
pub const MAX_EMIT_DEPTH: usize = 64;

/// Token returned by [`EventManager::on`], used to remove one handler.
pub type HandlerId = u64;

struct Handler<E> {
    id: HandlerId,
    priority: usize,
    func: Rc<dyn Fn(&E, &Ctx)>,
}

impl<E> Clone for Handler<E> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            priority: self.priority,
            func: Rc::clone(&self.func),
        }
    }
}

/// Erased per-name dispatch functions, installed on first registration.
struct EventFns {
    dispatch_bytes: Rc<dyn Fn(&EventManager, &Ctx, &Bytes) -> Result<(), Error>>,
    translate: Rc<dyn Fn(&Bytes, &EntityIdMap) -> Result<Bytes, Error>>,
}

/// Erased per-type builder functions for the structured-value path.
struct BuilderFns {
    build: Rc<dyn Fn(&Ctx, &ValueMap, Option<Entity>) -> Result<Box<dyn Any>, Error>>,
    invoke: Rc<dyn Fn(&EventManager, &Ctx, &dyn Any)>,
    encode: Rc<dyn Fn(&Ctx, &ValueMap, Option<Entity>) -> Result<Bytes, Error>>,
}

/// The event bus. See the module docs.
#[derive(Default)]
pub struct EventManager {
    handlers: RefCell<HashMap<TypeId, Box<dyn Any>>>,
    fns: RefCell<FnvHashMap<String, EventFns>>,
    builders: RefCell<HashMap<TypeId, BuilderFns>>,
    keys: RefCell<TypeKeyMap>,
    depth: Cell<usize>,
    recursion_tripped: Cell<bool>,
    stop_flags: RefCell<Vec<bool>>,
}

impl EventManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for `E` under `name`.
    ///
    /// The first registration for an event type installs its name mapping,
    /// structured-value builder, invoker, entity translator and binary
    /// dispatcher; later calls only append the handler. Handlers run in
    /// ascending priority order, insertion order among equals.
    pub fn on<E: Event>(
        &self,
        name: &str,
        priority: usize,
        handler: impl Fn(&E, &Ctx) + 'static,
    ) -> HandlerId {
        let type_id = TypeId::of::<E>();
        self.keys.borrow_mut().insert(type_id, name);

        self.fns
            .borrow_mut()
            .entry(name.to_string())
            .or_insert_with(|| EventFns {
                dispatch_bytes: Rc::new(|events, ctx, bytes| {
                    let event = E::from_bytes(bytes)?;
                    events.dispatch(ctx, &event);
                    Ok(())
                }),
                translate: Rc::new(|bytes, map| {
                    let mut event = E::from_bytes(bytes)?;
                    event.map_entities(map);
                    Ok(event.to_bytes())
                }),
            });

        self.builders
            .borrow_mut()
            .entry(type_id)
            .or_insert_with(|| BuilderFns {
                build: Rc::new(|ctx, params, entity| {
                    Ok(Box::new(E::from_config(ctx, params, entity)?))
                }),
                invoke: Rc::new(|events, ctx, event| {
                    if let Some(event) = event.downcast_ref::<E>() {
                        events.dispatch(ctx, event);
                    }
                }),
                encode: Rc::new(|ctx, params, entity| {
                    Ok(E::from_config(ctx, params, entity)?.to_bytes())
                }),
            });

        let id = fastrand::u64(..);
        let mut handlers = self.handlers.borrow_mut();
        let list = handlers
            .entry(type_id)
            .or_insert_with(|| Box::new(Vec::<Handler<E>>::new()));
        let list = list
            .downcast_mut::<Vec<Handler<E>>>()
            .expect("handler lists are keyed by type id");
        let position = list.partition_point(|handler| handler.priority <= priority);
        list.insert(
            position,
            Handler {
                id,
                priority,
                func: Rc::new(handler),
            },
        );
        id
    }

    /// Removes one handler by id. Safe on unknown ids.
    pub fn off<E: Event>(&self, id: HandlerId) -> bool {
        let mut handlers = self.handlers.borrow_mut();
        let Some(list) = handlers.get_mut(&TypeId::of::<E>()) else {
            return false;
        };
        let Some(list) = list.downcast_mut::<Vec<Handler<E>>>() else {
            return false;
        };
        let before = list.len();
        list.retain(|handler| handler.id != id);
        list.len() != before
    }

    /// Removes every handler for `E`. Safe when none are registered.
    pub fn off_all<E: Event>(&self) {
        self.handlers.borrow_mut().remove(&TypeId::of::<E>());
    }

    /// Emits a typed event, invoking each handler synchronously in priority
    /// order before returning.
    pub fn emit<E: Event>(&self, ctx: &Ctx, event: E) {
        self.dispatch(ctx, &event);
    }

    /// Builds an event from a structured-value object and dispatches it.
    ///
    /// Unknown names and construction failures are logged no-ops.
    pub fn emit_value(&self, ctx: &Ctx, name: &str, params: &ValueMap, entity: Option<Entity>) {
        let Some(type_id) = self.keys.borrow().type_of(name) else {
            error!("unknown event `{name}`");
            return;
        };
        let Some((build, invoke)) = self
            .builders
            .borrow()
            .get(&type_id)
            .map(|fns| (Rc::clone(&fns.build), Rc::clone(&fns.invoke)))
        else {
            error!("unknown event `{name}`");
            return;
        };
        match build(ctx, params, entity) {
            Ok(event) => invoke(self, ctx, event.as_ref()),
            Err(err) => error!("failed to build event `{name}`: {err}"),
        }
    }

    /// Decodes an event from bytes and dispatches it.
    ///
    /// Unknown names and malformed payloads are logged no-ops.
    pub fn emit_bytes(&self, ctx: &Ctx, name: &str, bytes: &Bytes) {
        let Some(dispatch) = self
            .fns
            .borrow()
            .get(name)
            .map(|fns| Rc::clone(&fns.dispatch_bytes))
        else {
            error!("unknown event `{name}`");
            return;
        };
        if let Err(err) = dispatch(self, ctx, bytes) {
            error!("failed to decode event `{name}`: {err}");
        }
    }

    /// Builds an event from a structured-value object and returns its binary
    /// encoding without dispatching. Used for replication.
    pub fn event_bytes(
        &self,
        ctx: &Ctx,
        name: &str,
        params: &ValueMap,
        entity: Option<Entity>,
    ) -> Result<Bytes, Error> {
        let type_id = self
            .keys
            .borrow()
            .type_of(name)
            .ok_or_else(|| Error::UnknownEvent(name.to_string()))?;
        let encode = self
            .builders
            .borrow()
            .get(&type_id)
            .map(|fns| Rc::clone(&fns.encode))
            .ok_or_else(|| Error::UnknownEvent(name.to_string()))?;
        encode(ctx, params, entity)
    }

    /// Rewrites every entity reference inside a serialized event.
    ///
    /// Unknown event names pass the bytes through unchanged.
    pub fn translate_event(
        &self,
        name: &str,
        bytes: &Bytes,
        map: &EntityIdMap,
    ) -> Result<Bytes, Error> {
        let Some(translate) = self
            .fns
            .borrow()
            .get(name)
            .map(|fns| Rc::clone(&fns.translate))
        else {
            return Ok(bytes.clone());
        };
        translate(bytes, map)
    }

    /// Stops the remaining handlers of the innermost running chain.
    ///
    /// Outside of dispatch this is a no-op.
    pub fn stop_propagation(&self) {
        if let Some(flag) = self.stop_flags.borrow_mut().last_mut() {
            *flag = true;
        }
    }

    /// String name of a registered event type.
    pub fn event_key<E: Event>(&self) -> Option<String> {
        self.keys.borrow().key_of(TypeId::of::<E>())
    }

    /// Returns and clears the recursion-trip latch. Checked by the tick
    /// driver; a tripped latch aborts the tick.
    pub fn take_recursion_trip(&self) -> bool {
        self.recursion_tripped.replace(false)
    }

    fn dispatch<E: Event>(&self, ctx: &Ctx, event: &E) {
        let snapshot: Vec<Handler<E>> = {
            let handlers = self.handlers.borrow();
            let Some(list) = handlers.get(&TypeId::of::<E>()) else {
                return;
            };
            let Some(list) = list.downcast_ref::<Vec<Handler<E>>>() else {
                return;
            };
            list.clone()
        };

        let depth = self.depth.get() + 1;
        if depth > MAX_EMIT_DEPTH {
            self.recursion_tripped.set(true);
            error!("event emission nested deeper than {MAX_EMIT_DEPTH} levels, aborting dispatch");
            return;
        }
        self.depth.set(depth);
        self.stop_flags.borrow_mut().push(false);

        for handler in &snapshot {
            (handler.func)(event, ctx);
            let stopped = self.stop_flags.borrow().last().copied().unwrap_or(false);
            if stopped || self.recursion_tripped.get() {
                break;
            }
        }

        self.stop_flags.borrow_mut().pop();
        self.depth.set(self.depth.get() - 1);
    }
}
