//! Plugins: dynamically loaded (or statically linked) modules contributing
//! component types, event handlers, systems and component initializers.

use core::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use fnv::{FnvHashMap, FnvHashSet};
use log::{debug, warn};

use crate::ctx::Ctx;
use crate::entity::Entity;
use crate::error::Error;
use crate::value::Value;

/// A loaded plugin instance.
///
/// A plugin does its registration work (component types, event handlers,
/// systems) while being constructed by its entry point; afterwards the host
/// only routes component initialization through it.
pub trait Plugin: 'static {
    /// Component keys this plugin can initialize from configuration.
    fn component_keys(&self) -> Vec<String> {
        Vec::new()
    }

    /// Initializes one component on `entity` from its configuration value.
    ///
    /// An error aborts only this component; the caller reports it with the
    /// configuration source attached and the entity keeps everything else.
    fn set_component(&self, ctx: &Ctx, entity: Entity, key: &str, value: &Value)
    -> Result<(), Error>;
}

/// Constructor every plugin exposes.
///
/// Dynamic libraries export it as the `entry_point` symbol; statically linked
/// plugins register the same signature with
/// [`PluginHost::register_static`]. The [`Ctx`] gives the constructor the
/// registry, the event manager and the entity loader; `config` is the
/// optional configuration object passed at load time.
pub type PluginEntry = fn(&Ctx, Option<&Value>) -> Box<dyn Plugin>;

/// Produces a plugin instance. One implementation per linking model.
pub trait PluginLoader {
    fn load(&self, ctx: &Ctx, config: Option<&Value>) -> Result<Box<dyn Plugin>, Error>;
}

/// Loads a plugin from a dynamic library exposing `entry_point`.
pub struct DylibLoader {
    library: libloading::Library,
    name: String,
}

impl DylibLoader {
    pub fn open(name: &str, path: &Path) -> Result<Self, Error> {
        let library = unsafe { libloading::Library::new(path) }
            .map_err(|err| Error::plugin(name, err))?;
        Ok(Self {
            library,
            name: name.to_string(),
        })
    }
}

impl PluginLoader for DylibLoader {
    fn load(&self, ctx: &Ctx, config: Option<&Value>) -> Result<Box<dyn Plugin>, Error> {
        let entry: libloading::Symbol<PluginEntry> =
            unsafe { self.library.get(b"entry_point") }
                .map_err(|err| Error::plugin(&self.name, err))?;
        Ok(entry(ctx, config))
    }
}

/// Loads a statically linked plugin from a registered constructor.
pub struct StaticLoader {
    entry: PluginEntry,
}

impl StaticLoader {
    pub fn new(entry: PluginEntry) -> Self {
        Self { entry }
    }
}

impl PluginLoader for StaticLoader {
    fn load(&self, ctx: &Ctx, config: Option<&Value>) -> Result<Box<dyn Plugin>, Error> {
        Ok((self.entry)(ctx, config))
    }
}

/// Owns plugin loaders and instances and routes component keys to the plugin
/// providing them.
pub struct PluginHost {
    loaders: RefCell<FnvHashMap<String, Rc<dyn PluginLoader>>>,
    plugins: RefCell<FnvHashMap<String, Rc<dyn Plugin>>>,
    owners: RefCell<FnvHashMap<String, String>>,
    loading: RefCell<FnvHashSet<String>>,
    search_dir: RefCell<PathBuf>,
}

impl Default for PluginHost {
    fn default() -> Self {
        Self {
            loaders: RefCell::default(),
            plugins: RefCell::default(),
            owners: RefCell::default(),
            loading: RefCell::default(),
            search_dir: RefCell::new(PathBuf::from("plugins")),
        }
    }
}

impl PluginHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory searched for dynamic plugin libraries.
    pub fn set_search_dir(&self, dir: impl Into<PathBuf>) {
        *self.search_dir.borrow_mut() = dir.into();
    }

    /// Registers a statically linked plugin constructor under `name`.
    pub fn register_static(&self, name: &str, entry: PluginEntry) {
        self.loaders
            .borrow_mut()
            .insert(name.to_string(), Rc::new(StaticLoader::new(entry)));
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.plugins.borrow().contains_key(name)
    }

    /// Ensures a plugin is loaded. Idempotent; a plugin's constructor may
    /// itself load its dependencies, and a cycle degenerates to a no-op
    /// instead of recursing.
    pub fn load_plugin(&self, ctx: &Ctx, name: &str, config: Option<&Value>) -> Result<(), Error> {
        if self.is_loaded(name) {
            return Ok(());
        }
        if !self.loading.borrow_mut().insert(name.to_string()) {
            warn!("plugin dependency cycle through `{name}`");
            return Ok(());
        }
        let result = self.load_plugin_inner(ctx, name, config);
        self.loading.borrow_mut().remove(name);
        result
    }

    fn load_plugin_inner(
        &self,
        ctx: &Ctx,
        name: &str,
        config: Option<&Value>,
    ) -> Result<(), Error> {
        let existing = self.loaders.borrow().get(name).cloned();
        let loader = match existing {
            Some(loader) => loader,
            None => {
                let path = self.library_path(name);
                debug!("loading plugin `{name}` from {}", path.display());
                let loader: Rc<dyn PluginLoader> = Rc::new(DylibLoader::open(name, &path)?);
                self.loaders
                    .borrow_mut()
                    .insert(name.to_string(), Rc::clone(&loader));
                loader
            }
        };

        let plugin: Rc<dyn Plugin> = Rc::from(loader.load(ctx, config)?);
        {
            let mut owners = self.owners.borrow_mut();
            for key in plugin.component_keys() {
                owners.insert(key, name.to_string());
            }
        }
        self.plugins.borrow_mut().insert(name.to_string(), plugin);
        Ok(())
    }

    pub fn plugin(&self, name: &str) -> Option<Rc<dyn Plugin>> {
        self.plugins.borrow().get(name).cloned()
    }

    /// Name of the plugin providing a component key.
    pub fn owner_of(&self, component_key: &str) -> Option<String> {
        self.owners.borrow().get(component_key).cloned()
    }

    fn library_path(&self, name: &str) -> PathBuf {
        let file = format!(
            "{}{name}{}",
            std::env::consts::DLL_PREFIX,
            std::env::consts::DLL_SUFFIX
        );
        self.search_dir.borrow().join(file)
    }
}
