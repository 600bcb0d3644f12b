//! Contracts a type must satisfy to participate in the runtime.

use core::any::Any;

use crate::ctx::Ctx;
use crate::entity::{Entity, MapEntities};
use crate::error::Error;
use crate::value::ValueMap;
use crate::wire::{Decode, Encode};

/// A storable component: binary-encodable both ways and translatable through
/// an entity-id map. Implemented automatically.
pub trait Component: Encode + Decode + MapEntities + 'static {}

impl<T: Encode + Decode + MapEntities + 'static> Component for T {}

/// Name-based mutable access to the fields of a component.
///
/// `hook_field` returns an erased mutable view of the requested field; callers
/// re-check the concrete type and treat a mismatch as absent. Nested access
/// uses dotted names (`"speed.x"`), and a field named `"value"` conventionally
/// exposes the whole component.
pub trait Hookable {
    fn hook_field(&mut self, field: &str) -> Option<&mut dyn Any>;
}

/// Construction from a structured configuration object.
///
/// `entity` is the id of the entity being configured, when there is one; it
/// backs `"@self"` substitution and self-scoped hook expressions.
pub trait FromConfig: Sized {
    fn from_config(ctx: &Ctx, config: &ValueMap, entity: Option<Entity>) -> Result<Self, Error>;
}

/// An event: a component that can additionally be built from configuration,
/// so it is emittable from the structured-value path. Implemented
/// automatically.
pub trait Event: Component + FromConfig {}

impl<T: Component + FromConfig> Event for T {}

/// Implements [`Hookable`] by listing `"name" => field` arms.
///
/// The whole component is exposed automatically under `"value"`.
#[macro_export]
macro_rules! hookable {
    ($ty:ty { $($name:literal => $($field:ident).+),* $(,)? }) => {
        impl $crate::component::Hookable for $ty {
            fn hook_field(&mut self, field: &str) -> Option<&mut dyn ::core::any::Any> {
                match field {
                    $($name => Some(&mut self.$($field).+),)*
                    "value" => Some(self),
                    _ => None,
                }
            }
        }
    };
}
