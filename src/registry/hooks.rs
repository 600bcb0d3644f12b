//! Hook resolvers: runtime, name-based access to component fields.
//!
//! A resolver maps a field name to an erased mutable view of that field on a
//! specific entity's component. Resolvers are stored under string keys; the
//! self-scoped variant suffixes the component key with the entity id so the
//! same component type can be hooked per entity.

use core::any::Any;
use std::rc::Rc;

use crate::component::{Component, Hookable};
use crate::entity::Entity;
use crate::registry::Registry;

/// Looks up `field` and, when present, invokes the visitor with an erased
/// mutable view of it.
pub(crate) type HookResolver = Rc<dyn Fn(&Registry, &str, &mut dyn FnMut(&mut dyn Any))>;

/// Key under which `self`-scoped hook expressions look up a component of a
/// specific entity.
pub(crate) fn self_hook_key(component_key: &str, entity: Entity) -> String {
    format!("{component_key}{{{}}}", entity.index())
}

/// Resolver over the `T` component of `entity`.
pub(crate) fn component_resolver<T: Component + Hookable>(entity: Entity) -> HookResolver {
    Rc::new(move |registry, field, visit| {
        let Ok(components) = registry.components::<T>() else {
            return;
        };
        let mut store = components.borrow_mut();
        let Some(component) = store.get_mut(entity.slot()) else {
            return;
        };
        if let Some(value) = component.hook_field(field) {
            visit(value);
        }
    })
}

/// Scope of a hook expression.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Scope {
    /// `self:` — resolved against the configured entity.
    Entity,
    /// `global:` — resolved against the registry-wide table.
    Global,
}

/// Splits a `scope:component:field` expression. Returns `None` when the shape
/// or the scope is wrong; diagnostics are the caller's concern because tick
/// paths stay silent while configuration paths log.
pub(crate) fn parse_scoped(expr: &str) -> Option<(Scope, &str, &str)> {
    let mut parts = expr.splitn(3, ':');
    let scope = parts.next()?;
    let component = parts.next()?;
    let field = parts.next()?;
    if component.is_empty() || field.is_empty() {
        return None;
    }
    let scope = match scope {
        "self" => Scope::Entity,
        "global" => Scope::Global,
        _ => return None,
    };
    Some((scope, component, field))
}
