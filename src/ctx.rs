use crate::event::EventManager;
use crate::loader::EntityLoader;
use crate::registry::Registry;

/// Borrowed view of the runtime handed to systems, event handlers and
/// component initializers.
///
/// The runtime is single-threaded and cooperative; everything reachable from
/// a `Ctx` uses interior mutability, so re-entrant calls (a handler emitting
/// further events, an initializer loading another plugin) are ordinary calls.
#[derive(Clone, Copy)]
pub struct Ctx<'a> {
    pub registry: &'a Registry,
    pub events: &'a EventManager,
    pub loader: &'a EntityLoader,
}
