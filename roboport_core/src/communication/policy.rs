//! Connection policies
//!
//! Nothing here assumes a default overflow behavior on the caller's behalf:
//! every connection carries an explicit [`ConnectionPolicy`], and the
//! `Default` impl is only a starting point for deployments that don't care.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default ring-buffer size for a connection
pub const DEFAULT_BUFFER_CAPACITY: usize = 8;

/// Default bound for a blocking write
pub const DEFAULT_BLOCK_TIMEOUT: Duration = Duration::from_millis(100);

/// What a full buffer does with a new record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Discard the oldest unread record and count a drop
    #[default]
    DropOldest,
    /// Discard the incoming record and count a drop
    DropNewest,
    /// Suspend the writer up to `block_timeout`, then fail with `Backpressure`
    Block,
}

/// How a sink reads when nothing is buffered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadPolicy {
    #[default]
    NonBlocking,
    Blocking {
        #[serde(with = "duration_ms")]
        timeout: Duration,
    },
}

/// How records reach the sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// Direct handoff into the sink's buffer
    #[default]
    InProcess,
    /// Encoded and relayed through a remote binding
    Remote,
}

/// Buffering and transport settings for one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionPolicy {
    pub buffer_capacity: usize,
    pub overflow: OverflowPolicy,
    #[serde(with = "duration_ms")]
    pub block_timeout: Duration,
    #[serde(with = "serde_yaml::with::singleton_map")]
    pub read: ReadPolicy,
    pub transport: TransportKind,
}

impl Default for ConnectionPolicy {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            overflow: OverflowPolicy::default(),
            block_timeout: DEFAULT_BLOCK_TIMEOUT,
            read: ReadPolicy::default(),
            transport: TransportKind::default(),
        }
    }
}

impl ConnectionPolicy {
    pub fn drop_oldest(capacity: usize) -> Self {
        Self {
            buffer_capacity: capacity,
            overflow: OverflowPolicy::DropOldest,
            ..Self::default()
        }
    }

    pub fn drop_newest(capacity: usize) -> Self {
        Self {
            buffer_capacity: capacity,
            overflow: OverflowPolicy::DropNewest,
            ..Self::default()
        }
    }

    pub fn blocking(capacity: usize, block_timeout: Duration) -> Self {
        Self {
            buffer_capacity: capacity,
            overflow: OverflowPolicy::Block,
            block_timeout,
            ..Self::default()
        }
    }

    pub fn with_read(mut self, read: ReadPolicy) -> Self {
        self.read = read;
        self
    }

    pub fn with_transport(mut self, transport: TransportKind) -> Self {
        self.transport = transport;
        self
    }

    /// Capacity actually used by the buffer (never zero)
    pub fn effective_capacity(&self) -> usize {
        self.buffer_capacity.max(1)
    }
}

/// Durations are written as integer milliseconds in deployment files
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
