//! Component modules
//!
//! A module bundles one or more component factories. Modules are either
//! registered statically (compiled in) or loaded at runtime from shared
//! libraries (.so/.dylib/.dll) found in the search paths; the latter needs
//! the `dynamic-modules` feature.
//!
//! # Writing a dynamic module
//!
//! ```rust,ignore
//! use roboport_core::manager::{factory_fn, ComponentModule, ModuleManifest};
//!
//! pub struct DevicesModule;
//!
//! impl ComponentModule for DevicesModule {
//!     fn manifest(&self) -> ModuleManifest {
//!         ModuleManifest::new("devices", "0.3.0", ">=0.1")
//!     }
//!
//!     fn factories(&self) -> Vec<(String, Arc<dyn ComponentFactory>)> {
//!         vec![("RangeSensor".into(), factory_fn(RangeSensor::create))]
//!     }
//! }
//!
//! roboport_core::export_module!(DevicesModule);
//! ```

use super::factory::ComponentFactory;
use crate::error::{RoboportError, RoboportResult};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[cfg(feature = "dynamic-modules")]
use libloading::Library;

/// Signature of a module's entry point
///
/// The returned module must be built against the same runtime version;
/// the manifest's `runtime_version` requirement is checked after loading.
#[allow(improper_ctypes_definitions)]
pub type ModuleEntryFn = unsafe extern "C" fn() -> Box<dyn ComponentModule>;

/// Name of the entry point symbol for dynamic loading
pub const MODULE_ENTRY_SYMBOL: &str = "roboport_module_entry";

/// Export a [`ComponentModule`] from a `cdylib` crate
#[macro_export]
macro_rules! export_module {
    ($module:expr) => {
        #[no_mangle]
        #[allow(improper_ctypes_definitions)]
        pub extern "C" fn roboport_module_entry() -> Box<dyn $crate::manager::ComponentModule> {
            Box::new($module)
        }
    };
}

/// Module metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleManifest {
    /// Unique module id
    pub id: String,
    /// Module version (semver)
    pub version: String,
    /// Runtime versions this module works with (semver requirement, `*` for any)
    pub runtime_version: String,
    #[serde(default)]
    pub description: String,
}

impl ModuleManifest {
    pub fn new(id: &str, version: &str, runtime_version: &str) -> Self {
        Self {
            id: id.to_string(),
            version: version.to_string(),
            runtime_version: runtime_version.to_string(),
            description: String::new(),
        }
    }

    /// Check `runtime_version` against the running runtime's version
    pub fn check_compatible(&self, runtime: &str) -> RoboportResult<()> {
        let req = semver::VersionReq::parse(self.runtime_version.trim()).map_err(|e| {
            RoboportError::module(
                &self.id,
                format!("bad runtime requirement '{}': {}", self.runtime_version, e),
            )
        })?;
        let version = semver::Version::parse(runtime)
            .map_err(|e| RoboportError::module(&self.id, format!("bad runtime version '{}': {}", runtime, e)))?;

        if req.matches(&version) {
            Ok(())
        } else {
            Err(RoboportError::module(
                &self.id,
                format!("requires runtime {}, found {}", self.runtime_version, runtime),
            ))
        }
    }
}

/// A bundle of component factories
pub trait ComponentModule: Send + Sync {
    fn manifest(&self) -> ModuleManifest;

    /// `(type name, factory)` pairs to register
    fn factories(&self) -> Vec<(String, Arc<dyn ComponentFactory>)>;
}

/// A module found in a search path or registered statically
#[derive(Debug, Clone)]
pub struct DiscoveredModule {
    pub id: String,
    /// Library path; empty for static modules
    pub path: PathBuf,
    pub is_static: bool,
}

/// A loaded module; for dynamic modules the library handle is kept alive
/// for as long as the module is.
struct LoadedModule {
    module: Arc<dyn ComponentModule>,
    #[cfg(feature = "dynamic-modules")]
    _library: Option<Library>,
}

/// Discovers and loads component modules
pub struct ModuleLoader {
    search_paths: Vec<PathBuf>,
    discovered: HashMap<String, DiscoveredModule>,
    static_modules: HashMap<String, Arc<dyn ComponentModule>>,
    loaded: RwLock<HashMap<String, Arc<LoadedModule>>>,
    runtime_version: String,
}

impl ModuleLoader {
    pub fn new() -> Self {
        Self::with_version(env!("CARGO_PKG_VERSION"))
    }

    pub fn with_version(runtime_version: &str) -> Self {
        Self {
            search_paths: Vec::new(),
            discovered: HashMap::new(),
            static_modules: HashMap::new(),
            loaded: RwLock::new(HashMap::new()),
            runtime_version: runtime_version.to_string(),
        }
    }

    /// Add a search path; `~/` expands to the home directory
    pub fn add_search_path(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        let expanded = match path.to_str().and_then(|s| s.strip_prefix("~/")) {
            Some(rest) => dirs::home_dir()
                .map(|home| home.join(rest))
                .unwrap_or_else(|| path.to_path_buf()),
            None => path.to_path_buf(),
        };

        if !self.search_paths.contains(&expanded) {
            self.search_paths.push(expanded);
        }
    }

    /// `~/.roboport/modules`, then the system module directories
    pub fn add_default_search_paths(&mut self) {
        self.add_search_path("~/.roboport/modules");

        #[cfg(unix)]
        {
            self.add_search_path("/usr/local/lib/roboport/modules");
            self.add_search_path("/usr/lib/roboport/modules");
        }
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Register a compiled-in module
    pub fn register_static(&mut self, module: Arc<dyn ComponentModule>) {
        let id = module.manifest().id;
        self.discovered.insert(
            id.clone(),
            DiscoveredModule {
                id: id.clone(),
                path: PathBuf::new(),
                is_static: true,
            },
        );
        self.static_modules.insert(id, module);
    }

    /// Scan the search paths for module libraries.
    ///
    /// Ids come from file names: `libroboport_<id>`, `roboport-<id>` or
    /// `lib<id>`, with underscores turned into dashes.
    pub fn discover(&mut self) -> Vec<DiscoveredModule> {
        let mut found: Vec<DiscoveredModule> = self
            .discovered
            .values()
            .filter(|m| m.is_static)
            .cloned()
            .collect();

        #[cfg(feature = "dynamic-modules")]
        {
            let extension = std::env::consts::DLL_EXTENSION;

            for search_path in &self.search_paths {
                let Ok(entries) = std::fs::read_dir(search_path) else {
                    continue;
                };

                for entry in entries.filter_map(|e| e.ok()) {
                    let path = entry.path();
                    if path.extension().and_then(|s| s.to_str()) != Some(extension) {
                        continue;
                    }
                    let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                        continue;
                    };

                    let id = module_id_from_stem(stem);
                    if self.discovered.contains_key(&id) {
                        continue;
                    }

                    let info = DiscoveredModule {
                        id: id.clone(),
                        path: path.clone(),
                        is_static: false,
                    };
                    log::debug!("Discovered module '{}' at {:?}", id, path);
                    self.discovered.insert(id, info.clone());
                    found.push(info);
                }
            }
        }

        found
    }

    pub fn is_discovered(&self, id: &str) -> bool {
        self.discovered.contains_key(id)
    }

    pub fn is_loaded(&self, id: &str) -> bool {
        self.loaded.read().contains_key(id)
    }

    /// Load a module by id, returning the cached module if already loaded
    pub fn load(&self, id: &str) -> RoboportResult<Arc<dyn ComponentModule>> {
        if let Some(loaded) = self.loaded.read().get(id) {
            return Ok(loaded.module.clone());
        }

        let info = self
            .discovered
            .get(id)
            .ok_or_else(|| RoboportError::NotFound(format!("module '{}'", id)))?;

        let loaded = if info.is_static {
            let module = self
                .static_modules
                .get(id)
                .cloned()
                .ok_or_else(|| crate::roboport_internal!("static module '{}' vanished", id))?;
            LoadedModule {
                module,
                #[cfg(feature = "dynamic-modules")]
                _library: None,
            }
        } else {
            self.load_dynamic(id, &info.path)?
        };

        loaded
            .module
            .manifest()
            .check_compatible(&self.runtime_version)?;

        let module = loaded.module.clone();
        self.loaded.write().insert(id.to_string(), Arc::new(loaded));
        log::info!("Loaded module '{}'", id);
        Ok(module)
    }

    #[cfg(feature = "dynamic-modules")]
    fn load_dynamic(&self, id: &str, path: &Path) -> RoboportResult<LoadedModule> {
        // SAFETY: module libraries are trusted to export MODULE_ENTRY_SYMBOL
        // with the ModuleEntryFn signature, built against this runtime.
        unsafe {
            let library = Library::new(path).map_err(|e| {
                RoboportError::module(id, format!("failed to load {:?}: {}", path, e))
            })?;

            let entry: libloading::Symbol<ModuleEntryFn> = library
                .get(MODULE_ENTRY_SYMBOL.as_bytes())
                .map_err(|e| {
                    RoboportError::module(
                        id,
                        format!("missing entry point '{}': {}", MODULE_ENTRY_SYMBOL, e),
                    )
                })?;

            let module: Arc<dyn ComponentModule> = Arc::from(entry());
            Ok(LoadedModule {
                module,
                _library: Some(library),
            })
        }
    }

    #[cfg(not(feature = "dynamic-modules"))]
    fn load_dynamic(&self, id: &str, _path: &Path) -> RoboportResult<LoadedModule> {
        Err(RoboportError::module(
            id,
            "dynamic modules require the 'dynamic-modules' feature",
        ))
    }

    /// Ids of loaded modules
    pub fn loaded_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.loaded.read().keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl Default for ModuleLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn module_id_from_stem(stem: &str) -> String {
    if let Some(rest) = stem.strip_prefix("libroboport_") {
        rest.replace('_', "-")
    } else if let Some(rest) = stem.strip_prefix("roboport-") {
        rest.to_string()
    } else if let Some(rest) = stem.strip_prefix("lib") {
        rest.replace('_', "-")
    } else {
        stem.replace('_', "-")
    }
}
