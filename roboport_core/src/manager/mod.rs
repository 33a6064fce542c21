//! # Component manager
//!
//! The process-level registry: component factories and the modules that
//! provide them, hosted instances, execution contexts, connections made by
//! name, and the naming service remote clients use to find instances.
//!
//! ```rust
//! use roboport_core::manager::{factory_fn, Manager, ManagerConfig};
//! use roboport_core::{Component, ComponentConfig, PortSet, RoboportResult};
//!
//! struct Idle;
//!
//! impl Component for Idle {
//!     fn on_tick(&mut self) -> RoboportResult<()> {
//!         Ok(())
//!     }
//! }
//!
//! let manager = Manager::new(ManagerConfig::default());
//! manager
//!     .register_factory("Idle", factory_fn(|_: &mut PortSet| Ok(Box::new(Idle))))
//!     .unwrap();
//! let idle = manager.create_instance("Idle", "idle", ComponentConfig::new()).unwrap();
//! idle.bring_up().unwrap();
//! manager.activate("idle").unwrap();
//! manager.shutdown();
//! ```

pub mod component_manager;
pub mod endpoint;
pub mod factory;
pub mod module;
pub mod naming;

pub use component_manager::{DaemonHealth, Manager, ManagerConfig};
pub use endpoint::{LoopbackBinding, ManagerEndpoint};
pub use factory::{factory_fn, ComponentFactory, FactoryRegistry};
pub use module::{
    ComponentModule, DiscoveredModule, ModuleEntryFn, ModuleLoader, ModuleManifest,
    MODULE_ENTRY_SYMBOL,
};
pub use naming::{NamingEntry, NamingService};
