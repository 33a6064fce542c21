//! # roboport
//!
//! Component-oriented robotics runtime.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use roboport::prelude::*;
//!
//! pub struct Navigator {
//!     scan: InPort<RangeData>,
//! }
//!
//! impl Component for Navigator {
//!     fn on_tick(&mut self) -> RoboportResult<()> {
//!         if let Some(scan) = self.scan.read()? {
//!             clog!(info, "closest obstacle at {:.2} m", scan.ranges.iter().cloned().fold(f64::MAX, f64::min));
//!         }
//!         Ok(())
//!     }
//! }
//! ```
//!
//! ## Features
//!
//! - **Typed ports** with explicit buffering and overflow policies
//! - **Lifecycle state machine** shared by every component
//! - **Execution contexts** ticking components at a fixed rate
//! - **Component manager** with factories, loadable modules and naming

// Re-export the runtime
pub use roboport_core::{self, *};

// Re-export the schema catalogue under a short name
pub use roboport_types as types;

// Re-export log so `clog!` works from crates depending only on roboport
pub use log;

/// Everything a component author usually needs
pub mod prelude {
    // Components
    pub use roboport_core::core::{Component, ComponentConfig, ComponentInstance, LifecycleState};

    // Ports
    pub use roboport_core::communication::{
        ConnectionPolicy, InPort, OutPort, OverflowPolicy, PortSet, ReadPolicy,
    };

    // Scheduling
    pub use roboport_core::scheduling::{ExecutionContext, TickPolicy};

    // Manager
    pub use roboport_core::manager::{factory_fn, ComponentFactory, Manager, ManagerConfig};

    // Records
    pub use roboport_types::{
        BumperArray, CameraImage, GpsData, RangeData, Schema, Time, TimedBoolean, TimedDouble,
        TimedDoubleSeq, TimedLong, TimedPose2D, TimedString, TimedVelocity2D,
    };

    // Errors
    pub use roboport_core::error::{RoboportError, RoboportResult};

    // Logging
    pub use roboport_core::clog;
}
