//! # roboport types - the record schema layer
//!
//! Leaf crate with no runtime dependencies. It defines:
//! - [`Time`] - the timestamp every record carries
//! - geometric primitives ([`geometry`])
//! - the schema catalogue ([`records`]) and its tagged union [`Record`]
//! - the [`Schema`] trait tying a concrete type to its [`SchemaId`]
//! - the wire [`codec`]
//!
//! ```rust
//! use roboport_types::{codec, RangeData, Schema};
//!
//! let scan = RangeData::new(vec![1.0, 2.0, 3.0]);
//! let bytes = codec::encode_typed(&scan).unwrap();
//! let back: RangeData = codec::decode_typed(&bytes).unwrap();
//! assert_eq!(back, scan);
//! assert_eq!(RangeData::SCHEMA.name, "RangeData");
//! ```

pub mod codec;
pub mod error;
pub mod geometry;
pub mod records;
pub mod schema;
pub mod time;

pub use error::{SchemaError, SchemaResult};
pub use records::*;
pub use schema::{Schema, SchemaId};
pub use time::Time;
