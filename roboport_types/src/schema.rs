//! Schema identity and the closed catalogue of record variants
//!
//! A record's shape is fully determined by its [`SchemaId`]. Producers and
//! consumers agree on it at connection time; the codec re-checks it on every
//! decode.

use crate::error::SchemaError;
use crate::time::Time;
use std::fmt;

/// Name + version of a record schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SchemaId {
    pub name: &'static str,
    pub version: u16,
}

impl SchemaId {
    pub const fn new(name: &'static str, version: u16) -> Self {
        Self { name, version }
    }

    /// True when both name and version agree
    pub fn is_compatible_with(&self, other: &SchemaId) -> bool {
        self == other
    }
}

impl fmt::Display for SchemaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} v{}", self.name, self.version)
    }
}

/// Implemented by every type in the schema catalogue.
///
/// Component code works with concrete types through typed ports; the
/// runtime moves [`crate::Record`] values around and converts at the edges.
pub trait Schema: Clone + Send + Sync + fmt::Debug + 'static {
    const SCHEMA: SchemaId;

    /// Producer-assigned timestamp carried in the record
    fn timestamp(&self) -> Time;

    fn into_record(self) -> crate::Record;

    fn from_record(record: crate::Record) -> Result<Self, SchemaError>;
}

/// Generates `RecordKind`, `Record` and the `Schema` impls from one list so
/// the tag set, the union and the codec dispatch can never drift apart.
macro_rules! schema_catalogue {
    ($( $(#[$meta:meta])* $variant:ident => ($name:literal, $version:literal) ),+ $(,)?) => {
        /// Closed set of schema tags, one per catalogue type
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum RecordKind {
            $( $variant ),+
        }

        impl RecordKind {
            pub const ALL: &'static [RecordKind] = &[ $( RecordKind::$variant ),+ ];

            pub fn schema(&self) -> $crate::schema::SchemaId {
                match self {
                    $( RecordKind::$variant => <$variant as $crate::schema::Schema>::SCHEMA ),+
                }
            }

            /// Look up a tag by its schema name
            pub fn from_name(name: &str) -> Option<Self> {
                Self::ALL.iter().copied().find(|k| k.schema().name == name)
            }
        }

        impl ::std::fmt::Display for RecordKind {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                write!(f, "{}", self.schema())
            }
        }

        /// A timestamped value of one catalogue schema
        #[derive(Debug, Clone, PartialEq)]
        pub enum Record {
            $( $(#[$meta])* $variant($variant) ),+
        }

        impl Record {
            pub fn kind(&self) -> RecordKind {
                match self {
                    $( Record::$variant(_) => RecordKind::$variant ),+
                }
            }

            pub fn schema(&self) -> $crate::schema::SchemaId {
                self.kind().schema()
            }

            pub fn timestamp(&self) -> $crate::time::Time {
                match self {
                    $( Record::$variant(r) => r.tm ),+
                }
            }

            pub(crate) fn encode_payload(&self, out: &mut Vec<u8>) -> ::bincode::Result<()> {
                use ::bincode::Options;
                match self {
                    $( Record::$variant(r) => $crate::codec::payload_options().serialize_into(out, r) ),+
                }
            }

            pub(crate) fn decode_payload(kind: RecordKind, bytes: &[u8]) -> ::bincode::Result<Record> {
                use ::bincode::Options;
                match kind {
                    $( RecordKind::$variant => $crate::codec::payload_options()
                        .with_limit(bytes.len() as u64)
                        .deserialize::<$variant>(bytes)
                        .map(Record::$variant) ),+
                }
            }
        }

        $(
            impl $crate::schema::Schema for $variant {
                const SCHEMA: $crate::schema::SchemaId = $crate::schema::SchemaId::new($name, $version);

                fn timestamp(&self) -> $crate::time::Time {
                    self.tm
                }

                fn into_record(self) -> Record {
                    Record::$variant(self)
                }

                fn from_record(record: Record) -> Result<Self, $crate::error::SchemaError> {
                    match record {
                        Record::$variant(r) => Ok(r),
                        other => Err($crate::error::SchemaError::WrongVariant {
                            expected: <Self as $crate::schema::Schema>::SCHEMA,
                            found: other.schema(),
                        }),
                    }
                }
            }

            impl From<$variant> for Record {
                fn from(r: $variant) -> Self {
                    Record::$variant(r)
                }
            }
        )+
    };
}

pub(crate) use schema_catalogue;
