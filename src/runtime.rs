//! The tick driver: owns the registry, event manager and entity loader and
//! advances the runtime one cooperative tick at a time.

use core::cell::Cell;
use std::path::Path;
use std::rc::Rc;

use bytes::Bytes;
use crossbeam_channel::{Receiver, Sender, unbounded};
use log::{debug, error, info, warn};

use crate::ctx::Ctx;
use crate::error::Error;
use crate::event::builtin::{Log, LogLevel, SceneChange, Shutdown, SpawnRequest};
use crate::event::{EventManager, MAX_EMIT_DEPTH};
use crate::loader::EntityLoader;
use crate::registry::Registry;
use crate::scene::SceneState;

/// Priority of the system draining the background event queue. Runs before
/// ordinary systems so queued events land in the same tick.
pub const QUEUE_DRAIN_PRIORITY: usize = 0;

/// An encoded event pushed from a background thread.
#[derive(Clone, Debug)]
pub struct QueuedEvent {
    pub name: String,
    pub payload: Bytes,
}

/// Thread-safe producer half of the background event queue.
///
/// Plugins doing I/O on their own threads clone one of these and push encoded
/// events; the core drains the queue on each tick and re-enters them through
/// the binary emission path. The queue is unbounded and FIFO; producers never
/// block.
#[derive(Clone)]
pub struct EventSender(Sender<QueuedEvent>);

impl EventSender {
    /// Queues an encoded event. Returns `false` once the engine is gone.
    pub fn send(&self, name: impl Into<String>, payload: Bytes) -> bool {
        self.0
            .send(QueuedEvent {
                name: name.into(),
                payload,
            })
            .is_ok()
    }
}

/// The engine: registry, event bus and loader under a single tick loop.
pub struct Engine {
    registry: Registry,
    events: EventManager,
    loader: EntityLoader,
    sender: Sender<QueuedEvent>,
    shutdown: Rc<Cell<Option<i32>>>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        let engine = Self {
            registry: Registry::new(),
            events: EventManager::new(),
            loader: EntityLoader::new(),
            sender,
            shutdown: Rc::new(Cell::new(None)),
        };
        engine.registry.init_scene_management();
        engine.install_queue_drain(receiver);
        engine.install_core_handlers();
        engine
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn events(&self) -> &EventManager {
        &self.events
    }

    pub fn loader(&self) -> &EntityLoader {
        &self.loader
    }

    /// Borrowed view handed to systems, handlers and initializers.
    pub fn ctx(&self) -> Ctx<'_> {
        Ctx {
            registry: &self.registry,
            events: &self.events,
            loader: &self.loader,
        }
    }

    /// Producer handle for background threads.
    pub fn event_sender(&self) -> EventSender {
        EventSender(self.sender.clone())
    }

    /// Loads a configuration directory through the entity loader.
    pub fn load(&self, directory: impl AsRef<Path>) -> Result<(), Error> {
        self.loader.load(&self.ctx(), directory.as_ref())
    }

    /// Advances the runtime one tick: refresh bindings, run systems (the
    /// background queue drains first among them), finalize deletions, tick
    /// the clock.
    ///
    /// Returns an error when the emission recursion limit tripped during the
    /// tick; the tick is considered aborted.
    pub fn tick(&self) -> Result<(), Error> {
        let ctx = self.ctx();
        self.registry.update_bindings();
        self.registry.run_systems(&ctx);
        self.registry.process_deletions();
        self.registry.tick_clock();
        if self.events.take_recursion_trip() {
            return Err(Error::RecursionLimit(MAX_EMIT_DEPTH));
        }
        Ok(())
    }

    /// Runs ticks until a [`Shutdown`] event is handled, then returns its
    /// exit code. The tick that received the shutdown completes normally.
    pub fn run(&self) -> Result<i32, Error> {
        loop {
            self.tick()?;
            if let Some(exit_code) = self.shutdown.get() {
                info!("shutting down with exit code {exit_code}");
                return Ok(exit_code);
            }
        }
    }

    fn install_queue_drain(&self, receiver: Receiver<QueuedEvent>) {
        self.registry
            .add_system(QUEUE_DRAIN_PRIORITY, move |ctx| {
                while let Ok(event) = receiver.try_recv() {
                    ctx.events.emit_bytes(ctx, &event.name, &event.payload);
                }
            });
    }

    fn install_core_handlers(&self) {
        let shutdown = Rc::clone(&self.shutdown);
        self.events.on::<Shutdown>("shutdown", 0, move |event, _ctx| {
            debug!("shutdown requested: {}", event.reason);
            shutdown.set(Some(event.exit_code));
        });

        self.events.on::<Log>("log", 0, |event, _ctx| match event.level {
            LogLevel::Error => error!("[{}] {}", event.source, event.message),
            LogLevel::Warning => warn!("[{}] {}", event.source, event.message),
            LogLevel::Info => info!("[{}] {}", event.source, event.message),
            LogLevel::Debug => debug!("[{}] {}", event.source, event.message),
        });

        self.events
            .on::<SceneChange>("scene_change", 0, |event, ctx| {
                if event.state == SceneState::Disabled {
                    ctx.registry.remove_current_scene(&event.scene);
                } else {
                    ctx.registry.add_scene(&event.scene, event.state);
                    ctx.registry.set_current_scene(&event.scene);
                }
            });

        self.events
            .on::<SpawnRequest>("spawn_request", 0, |event, ctx| {
                ctx.loader
                    .load_entity_template(ctx, &event.template, &[], Some(&event.overrides));
            });
    }
}
