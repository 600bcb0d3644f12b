//! Configuration-driven entity instantiation.
//!
//! The loader walks a directory of configuration files and, for each file,
//! ensures listed plugins are loaded, registers templates and scenes, then
//! spawns the described entities, routing every component key to the plugin
//! providing it.

use std::fs;
use std::path::Path;

use bytes::Bytes;
use log::{debug, error};

use crate::ctx::Ctx;
use crate::entity::Entity;
use crate::error::Error;
use crate::plugin::{PluginEntry, PluginHost};
use crate::scene::{Scene, SceneState};
use crate::value::{self, Value, ValueMap};

const CONFIG_EXTENSION: &str = "json";
const TEMPLATE_CHAIN_LIMIT: usize = 32;

/// Loads entities and plugins from declarative configuration.
#[derive(Default)]
pub struct EntityLoader {
    host: PluginHost,
}

impl EntityLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn host(&self) -> &PluginHost {
        &self.host
    }

    /// Registers a statically linked plugin constructor.
    pub fn register_static_plugin(&self, name: &str, entry: PluginEntry) {
        self.host.register_static(name, entry);
    }

    /// Ensures a plugin is loaded, optionally passing it a configuration
    /// object.
    pub fn load_plugin(&self, ctx: &Ctx, name: &str, config: Option<&Value>) -> Result<(), Error> {
        self.host.load_plugin(ctx, name, config)
    }

    /// Recursively walks `directory` and loads every configuration file.
    ///
    /// Load order within a directory is undefined; files must be idempotent.
    /// Per-file failures are logged and do not stop the walk.
    pub fn load(&self, ctx: &Ctx, directory: &Path) -> Result<(), Error> {
        for entry in fs::read_dir(directory)? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    error!("failed to read directory entry: {err}");
                    continue;
                }
            };
            let path = entry.path();
            if path.is_dir() {
                if let Err(err) = self.load(ctx, &path) {
                    error!("failed to read directory {}: {err}", path.display());
                }
            } else if path.extension().is_some_and(|ext| ext == CONFIG_EXTENSION) {
                if let Err(err) = self.load_file(ctx, &path) {
                    error!("failed to load {}: {err}", path.display());
                }
            }
        }
        Ok(())
    }

    /// Loads one configuration file.
    pub fn load_file(&self, ctx: &Ctx, path: &Path) -> Result<(), Error> {
        let text = fs::read_to_string(path)?;
        let root = Value::parse_str(&text).map_err(Error::Parse)?;
        let Some(root) = root.as_object() else {
            error!("{}: top-level value is not an object", path.display());
            return Ok(());
        };
        self.load_description(ctx, root, &path.display().to_string());
        Ok(())
    }

    /// Processes one entity description: `plugins`, `templates`, `scenes`
    /// and `entities` keys.
    pub fn load_description(&self, ctx: &Ctx, description: &ValueMap, source: &str) {
        if let Some(plugins) = description.get("plugins").and_then(Value::as_array) {
            for plugin in plugins {
                let (name, config) = match plugin {
                    Value::Str(name) => (Some(name.as_str()), None),
                    Value::Object(entry) => (
                        entry.get("name").and_then(Value::as_str),
                        entry.get("config"),
                    ),
                    _ => (None, None),
                };
                let Some(name) = name else {
                    error!("{source}: malformed plugin entry");
                    continue;
                };
                if let Err(err) = self.host.load_plugin(ctx, name, config) {
                    error!("{source}: {err}");
                }
            }
        }

        if let Some(templates) = description.get("templates").and_then(Value::as_array) {
            for template in templates {
                let Some(entry) = template.as_object() else {
                    error!("{source}: malformed template entry");
                    continue;
                };
                let name = entry.get("name").and_then(Value::as_str);
                let config = entry.get("config").and_then(Value::as_object);
                match (name, config) {
                    (Some(name), Some(config)) => ctx.registry.add_template(name, config.clone()),
                    _ => error!("{source}: template entry needs `name` and `config`"),
                }
            }
        }

        if let Some(scenes) = description.get("scenes").and_then(Value::as_array) {
            for scene in scenes {
                let Some(entry) = scene.as_object() else {
                    error!("{source}: malformed scene entry");
                    continue;
                };
                let name = entry.get("name").and_then(Value::as_str);
                let state = entry
                    .get("state")
                    .and_then(Value::as_str)
                    .and_then(SceneState::parse)
                    .unwrap_or(SceneState::Active);
                match name {
                    Some(name) => ctx.registry.add_scene(name, state),
                    None => error!("{source}: scene entry needs `name`"),
                }
            }
        }

        if let Some(entities) = description.get("entities").and_then(Value::as_array) {
            for (index, entity) in entities.iter().enumerate() {
                let Some(config) = entity.as_object() else {
                    error!("{source}: entity #{index} is not an object");
                    continue;
                };
                self.load_entity(ctx, config, &format!("{source}: entity #{index}"));
            }
        }
    }

    /// Spawns an entity from its configuration, resolving the template chain
    /// first. Returns the id even when some components failed to initialize.
    pub fn load_entity(&self, ctx: &Ctx, config: &ValueMap, source: &str) -> Entity {
        let merged = self.resolve_template_chain(ctx, config);
        let entity = ctx.registry.spawn();
        self.load_components(ctx, entity, &merged, source);
        entity
    }

    /// Instantiates a named template: spawns an entity, substitutes
    /// `overrides` parameters into the template chain, applies raw
    /// pre-encoded components, then runs the normal initializer path.
    pub fn load_entity_template(
        &self,
        ctx: &Ctx,
        name: &str,
        additionals: &[(String, Bytes)],
        overrides: Option<&ValueMap>,
    ) -> Option<Entity> {
        let Some(template) = ctx.registry.template(name) else {
            error!("template `{name}` not found");
            return None;
        };
        let mut config = self.resolve_template_chain(ctx, &template);
        if let Some(params) = overrides {
            value::substitute_object(&mut config, params);
        }

        let entity = ctx.registry.spawn();
        for (key, bytes) in additionals {
            ctx.registry.emplace_from_bytes(entity, key, bytes);
        }
        self.load_components(ctx, entity, &config, &format!("template `{name}`"));
        Some(entity)
    }

    /// Runs the owning plugin's initializer for every component key of
    /// `config`. A failing component aborts only itself; the entity keeps
    /// everything that loaded.
    pub fn load_components(&self, ctx: &Ctx, entity: Entity, config: &ValueMap, source: &str) {
        for (key, config_value) in config {
            if key == "template" {
                continue;
            }
            if key == "scene" {
                self.load_scene_tag(ctx, entity, config_value, source);
                continue;
            }

            let (plugin_name, component_key) = match key.split_once(':') {
                Some((plugin, component)) => (Some(plugin.to_string()), component),
                None => (self.host.owner_of(key), key.as_str()),
            };
            let Some(plugin_name) = plugin_name else {
                error!("{source}: no plugin provides component `{key}`");
                continue;
            };
            if let Err(err) = self.host.load_plugin(ctx, &plugin_name, None) {
                error!("{source}: {err}");
                continue;
            }
            match self.host.plugin(&plugin_name) {
                Some(plugin) => {
                    if let Err(err) = plugin.set_component(ctx, entity, component_key, config_value)
                    {
                        error!("{source}: component `{key}`: {err}");
                    }
                }
                None => error!("{source}: plugin `{plugin_name}` is not loaded"),
            }
        }
    }

    /// Attaches the [`Scene`] tag described by a `"scene"` key: either a
    /// scene name string or `{"name": ..., "state": ...}`.
    fn load_scene_tag(&self, ctx: &Ctx, entity: Entity, config_value: &Value, source: &str) {
        let (name, state) = match config_value {
            Value::Str(name) => (Some(name.as_str()), SceneState::Active),
            Value::Object(entry) => (
                entry.get("name").and_then(Value::as_str),
                entry
                    .get("state")
                    .and_then(Value::as_str)
                    .and_then(SceneState::parse)
                    .unwrap_or(SceneState::Active),
            ),
            _ => (None, SceneState::Active),
        };
        let Some(name) = name else {
            error!("{source}: malformed `scene` value");
            return;
        };
        if let Err(err) = ctx.registry.add(
            entity,
            Scene {
                scene_name: name.to_string(),
                state,
            },
        ) {
            error!("{source}: {err}");
        }
    }

    /// Merges a configuration over its template chain, innermost template
    /// first.
    fn resolve_template_chain(&self, ctx: &Ctx, config: &ValueMap) -> ValueMap {
        let mut chain = vec![config.clone()];
        loop {
            let Some(parent) = chain
                .last()
                .and_then(|layer| layer.get("template"))
                .and_then(Value::as_str)
                .map(str::to_string)
            else {
                break;
            };
            if chain.len() >= TEMPLATE_CHAIN_LIMIT {
                error!("template chain deeper than {TEMPLATE_CHAIN_LIMIT}, truncating");
                break;
            }
            let Some(parent_config) = ctx.registry.template(&parent) else {
                debug!("template `{parent}` not found");
                break;
            };
            chain.push(parent_config);
        }

        let mut merged = ValueMap::new();
        for layer in chain.iter().rev() {
            merged = value::merge_objects(&merged, layer);
        }
        merged
    }
}
