#![warn(clippy::doc_markdown)]
#![doc = include_str!("../README.md")]

pub mod clock;
pub mod component;
pub mod config;
pub mod ctx;
pub mod entity;
pub mod error;
pub mod event;
pub mod loader;
pub mod plugin;
pub mod registry;
pub mod runtime;
pub mod scene;
pub mod storage;
pub mod value;
pub mod wire;

pub mod prelude {
    pub use super::{
        clock::Clock,
        component::{Component, Event, FromConfig, Hookable},
        config::{ConfigValue, get_value, get_value_copy, object_value},
        ctx::Ctx,
        entity::{Entity, EntityIdMap, MapEntities},
        error::Error,
        event::builtin::{Log, LogLevel, SceneChange, Shutdown, SpawnRequest},
        event::{EventManager, HandlerId},
        hookable,
        loader::EntityLoader,
        plugin::{Plugin, PluginEntry, PluginHost},
        registry::component_fns::ComponentState,
        registry::{Components, Registry},
        runtime::{Engine, EventSender, QueuedEvent},
        scene::{Scene, SceneState},
        storage::{SparseStore, Zip, ZipIndexed, zip, zip_filtered},
        value::{Value, ValueMap},
        wire::{Decode, DecodeError, Encode},
    };
}
