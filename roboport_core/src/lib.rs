//! # roboport core
//!
//! The component hosting runtime. This crate provides:
//!
//! - **Components**: units of behavior behind a fixed set of lifecycle
//!   callbacks, hosted as [`ComponentInstance`]s
//! - **Communication**: typed ports and the buffered connections between them
//! - **Scheduling**: execution contexts ticking their participants
//! - **Manager**: factory registry, instance and connection bookkeeping,
//!   module loading and the naming service
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use roboport_core::manager::{factory_fn, Manager, ManagerConfig};
//! use roboport_core::roboport_types::RangeData;
//! use roboport_core::scheduling::TickPolicy;
//! use roboport_core::{clog, Component, ComponentConfig, ConnectionPolicy, OutPort, PortSet, RoboportResult};
//!
//! struct RangeSensor {
//!     range: OutPort<RangeData>,
//! }
//!
//! impl Component for RangeSensor {
//!     fn on_tick(&mut self) -> RoboportResult<()> {
//!         self.range.write(RangeData::new(vec![1.0, 2.0, 3.0]))?;
//!         clog!(debug, "published scan");
//!         Ok(())
//!     }
//! }
//!
//! let manager = Manager::new(ManagerConfig::default());
//! manager.register_factory(
//!     "RangeSensor",
//!     factory_fn(|ports: &mut PortSet| {
//!         let range = ports.add_outport::<RangeData>("range")?;
//!         Ok(Box::new(RangeSensor { range }))
//!     }),
//! )?;
//!
//! manager.create_context("fast", TickPolicy::from_rate(20.0)?)?;
//! manager.create_instance("RangeSensor", "scanner", ComponentConfig::new())?.bring_up()?;
//! manager.attach("fast", "scanner")?;
//! manager.activate("scanner")?;
//! # let _ = ConnectionPolicy::default();
//! # Ok::<(), roboport_core::RoboportError>(())
//! ```

pub mod communication;
pub mod config;
pub mod core;
pub mod error;
pub mod manager;
pub mod scheduling;

pub use communication::{
    Connection, ConnectionId, ConnectionPolicy, InPort, OutPort, OverflowPolicy, PortRef, PortSet,
    ReadPolicy, RemoteBinding, RemoteRequest, RemoteResponse, TransportKind,
};
pub use config::DeploymentConfig;
pub use core::{Component, ComponentConfig, ComponentInstance, LifecycleState};
pub use error::{ErrorCode, RoboportError, RoboportResult};
pub use manager::{ComponentFactory, DaemonHealth, Manager, ManagerConfig};
pub use scheduling::{ExecutionContext, TickPolicy};

// clog macro is available at crate root via #[macro_export]

// Re-export the schema layer so components need only this crate
pub use roboport_types;
