//! Configuration value resolution: literals, `@self`, static `%` hook reads
//! and live `#` bindings.
//!
//! The grammar inside a string value is
//!
//! ```text
//! expr    := literal | '@' 'self' | '%' scoped | '#' scoped
//! scoped  := scope ':' component ':' field
//! scope   := 'self' | 'global'
//! ```
//!
//! Unknown scopes, malformed expressions and type mismatches log one
//! diagnostic and resolve to absent.

use log::error;

use crate::component::{Component, FromConfig, Hookable};
use crate::ctx::Ctx;
use crate::entity::Entity;
use crate::registry::hooks::{self, Scope, self_hook_key};
use crate::value::{Value, ValueMap};

/// A type extractable from a configuration [`Value`].
///
/// Literal extraction is strict per variant, except that reals widen from
/// integers. `from_self_entity` backs `"@self"` substitution and yields
/// absent for every type but [`Entity`].
pub trait ConfigValue: Sized + Clone + 'static {
    fn from_value(ctx: &Ctx, value: &Value, entity: Option<Entity>) -> Option<Self>;

    fn from_self_entity(entity: Entity) -> Option<Self> {
        let _ = entity;
        None
    }
}

impl ConfigValue for i64 {
    fn from_value(_ctx: &Ctx, value: &Value, _entity: Option<Entity>) -> Option<Self> {
        value.as_int()
    }
}

impl ConfigValue for i32 {
    fn from_value(_ctx: &Ctx, value: &Value, _entity: Option<Entity>) -> Option<Self> {
        value.as_int().and_then(|value| i32::try_from(value).ok())
    }
}

impl ConfigValue for u32 {
    fn from_value(_ctx: &Ctx, value: &Value, _entity: Option<Entity>) -> Option<Self> {
        value.as_int().and_then(|value| u32::try_from(value).ok())
    }
}

impl ConfigValue for f64 {
    fn from_value(_ctx: &Ctx, value: &Value, _entity: Option<Entity>) -> Option<Self> {
        value.as_real()
    }
}

impl ConfigValue for f32 {
    fn from_value(_ctx: &Ctx, value: &Value, _entity: Option<Entity>) -> Option<Self> {
        value.as_real().map(|value| value as f32)
    }
}

impl ConfigValue for bool {
    fn from_value(_ctx: &Ctx, value: &Value, _entity: Option<Entity>) -> Option<Self> {
        value.as_bool()
    }
}

impl ConfigValue for String {
    fn from_value(_ctx: &Ctx, value: &Value, _entity: Option<Entity>) -> Option<Self> {
        value.as_str().map(str::to_string)
    }
}

impl ConfigValue for Value {
    fn from_value(_ctx: &Ctx, value: &Value, _entity: Option<Entity>) -> Option<Self> {
        Some(value.clone())
    }
}

impl ConfigValue for ValueMap {
    fn from_value(_ctx: &Ctx, value: &Value, _entity: Option<Entity>) -> Option<Self> {
        value.as_object().cloned()
    }
}

impl ConfigValue for Vec<Value> {
    fn from_value(_ctx: &Ctx, value: &Value, _entity: Option<Entity>) -> Option<Self> {
        value.as_array().map(<[Value]>::to_vec)
    }
}

impl ConfigValue for Entity {
    fn from_value(_ctx: &Ctx, value: &Value, _entity: Option<Entity>) -> Option<Self> {
        let index = value.as_int()?;
        u32::try_from(index).ok().map(Entity::from_index)
    }

    fn from_self_entity(entity: Entity) -> Option<Self> {
        Some(entity)
    }
}

/// Extraction helper for composite [`ConfigValue`] impls built on
/// [`FromConfig`]: accepts an object and runs the type's configuration
/// constructor.
pub fn object_value<T: FromConfig>(
    ctx: &Ctx,
    value: &Value,
    entity: Option<Entity>,
) -> Option<T> {
    let object = value.as_object()?;
    match T::from_config(ctx, object, entity) {
        Ok(value) => Some(value),
        Err(err) => {
            error!("object construction failed: {err}");
            None
        }
    }
}

/// Returns a copy of the value at `key`, resolving `%`/`#` expressions as
/// static reads. No binding is registered, and with no entity at hand
/// `self`-scoped expressions log and resolve to absent.
pub fn get_value_copy<T: ConfigValue>(ctx: &Ctx, object: &ValueMap, key: &str) -> Option<T> {
    let value = object.get(key)?;
    if let Value::Str(text) = value {
        if let Some(expr) = text.strip_prefix(['%', '#']) {
            return resolve_scoped(ctx, expr, None);
        }
    }
    T::from_value(ctx, value, None)
}

/// Full resolution for a component field: literals, `"@self"`, static `%`
/// reads, and `#` expressions that additionally register a live binding from
/// the source into `target.key`.
///
/// A `#` binding is registered even when the source does not resolve yet; the
/// returned value then falls back to the target type's default.
pub fn get_value<C, T>(ctx: &Ctx, object: &ValueMap, entity: Entity, key: &str) -> Option<T>
where
    C: Component + Hookable,
    T: ConfigValue + PartialEq + Default,
{
    let value = object.get(key)?;
    if let Value::Str(text) = value {
        if let Some(tail) = text.strip_prefix('@') {
            if tail == "self" {
                return T::from_self_entity(entity);
            }
        }
        if let Some(expr) = text.strip_prefix('#') {
            ctx.registry.register_binding::<C, T>(entity, key, expr);
            return Some(resolve_scoped(ctx, expr, Some(entity)).unwrap_or_default());
        }
        if let Some(expr) = text.strip_prefix('%') {
            return resolve_scoped(ctx, expr, Some(entity));
        }
    }
    T::from_value(ctx, value, Some(entity))
}

fn resolve_scoped<T: ConfigValue>(ctx: &Ctx, expr: &str, entity: Option<Entity>) -> Option<T> {
    let Some((scope, component, field)) = hooks::parse_scoped(expr) else {
        error!("invalid hook expression `{expr}`, expected `scope:component:field`");
        return None;
    };
    match scope {
        Scope::Entity => {
            let Some(entity) = entity else {
                error!("hook expression `{expr}` is self-scoped but no entity is available");
                return None;
            };
            ctx.registry
                .hooked_value(&self_hook_key(component, entity), field)
        }
        Scope::Global => ctx.registry.global_hooked_value(component, field),
    }
}
