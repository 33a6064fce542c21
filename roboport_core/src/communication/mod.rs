//! # Communication layer for roboport
//!
//! Typed ports and the connections between them.
//!
//! - **Ports**: `OutPort<T>` publishes records, `InPort<T>` consumes them.
//!   A source fans out to any number of sinks; a sink reads from one source.
//! - **Connections**: one source to one sink, with a bounded buffer and an
//!   explicit [`ConnectionPolicy`] (capacity, overflow, read mode, transport).
//! - **Remote binding**: the call/response contract used when the sink lives
//!   in another process.
//!
//! ## Usage
//!
//! ```rust
//! use roboport_core::communication::{ConnectionPolicy, PortSet};
//! use roboport_core::roboport_types::TimedDouble;
//!
//! let mut odom = PortSet::new("odometry");
//! let mut ctrl = PortSet::new("controller");
//! let speed_out = odom.add_outport::<TimedDouble>("speed").unwrap();
//! let speed_in = ctrl.add_inport::<TimedDouble>("speed").unwrap();
//!
//! odom.get("speed").unwrap()
//!     .connect(&ctrl.get("speed").unwrap(), ConnectionPolicy::drop_oldest(4))
//!     .unwrap();
//!
//! speed_out.write(TimedDouble::new(0.5)).unwrap();
//! assert_eq!(speed_in.read().unwrap().map(|v| v.data), Some(0.5));
//! ```

pub mod buffer;
pub mod connection;
pub mod policy;
pub mod port;
pub mod remote;

pub use buffer::RecordBuffer;
pub use connection::{Connection, ConnectionId, ConnectionStats};
pub use policy::{ConnectionPolicy, OverflowPolicy, ReadPolicy, TransportKind};
pub use port::{
    ConnectionProfile, InPort, InPortCore, OutPort, OutPortCore, PortDirection, PortProfile,
    PortRef, PortSet,
};
pub use remote::{RemoteBinding, RemoteRequest, RemoteResponse};
