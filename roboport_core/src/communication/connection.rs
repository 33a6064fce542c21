//! Connections between one source port and one sink port

use super::buffer::{PopOutcome, PushOutcome, RecordBuffer};
use super::policy::{ConnectionPolicy, TransportKind};
use super::port::{InPortCore, OutPortCore};
use super::remote::{RemoteBinding, RemoteRequest, RemoteResponse};
use crate::error::{ErrorCode, RoboportError, RoboportResult};
use roboport_types::{codec, Record, SchemaId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use uuid::Uuid;

/// Handle identifying an established connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Counters exposed to observability collaborators
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStats {
    /// Records accepted into the path
    pub delivered: u64,
    /// Records discarded by the overflow policy or by draining
    pub dropped: u64,
    /// Records read by the sink
    pub consumed: u64,
    /// Records buffered and not yet read
    pub pending: usize,
}

enum Transport {
    /// Sink-side buffer in this process
    Local(Arc<RecordBuffer>),
    /// Records are encoded and relayed to a connection owned by a peer
    Remote {
        binding: Arc<dyn RemoteBinding>,
        peer: ConnectionId,
        sent: AtomicU64,
    },
}

/// An established data path.
///
/// A connection holds weak references to its ports; ports hold strong
/// references to their connections. Dropping an instance's ports therefore
/// never keeps a peer alive.
pub struct Connection {
    id: ConnectionId,
    outport_name: String,
    inport_name: String,
    schema: SchemaId,
    policy: ConnectionPolicy,
    transport: Transport,
    active: AtomicBool,
    outport: Weak<OutPortCore>,
    inport: Weak<InPortCore>,
}

impl Connection {
    /// Wire `outport` to `inport` in this process.
    /// Schema and direction checks are done by the caller.
    pub(crate) fn establish_local(
        outport: &Arc<OutPortCore>,
        inport: &Arc<InPortCore>,
        policy: ConnectionPolicy,
    ) -> RoboportResult<Arc<Connection>> {
        let connection = Arc::new(Connection {
            id: ConnectionId::new(),
            outport_name: outport.name().to_string(),
            inport_name: inport.name().to_string(),
            schema: outport.schema(),
            policy,
            transport: Transport::Local(Arc::new(RecordBuffer::new(
                policy.effective_capacity(),
            ))),
            active: AtomicBool::new(true),
            outport: Arc::downgrade(outport),
            inport: Arc::downgrade(inport),
        });

        inport.attach(&connection)?;
        outport.attach(connection.clone());

        log::debug!(
            "Connected {} -> {} ({}, {:?})",
            connection.outport_name,
            connection.inport_name,
            connection.schema,
            policy.overflow
        );
        Ok(connection)
    }

    /// Sink half of a cross-process connection: the source lives in a peer
    /// and records arrive through [`Connection::deliver`].
    pub(crate) fn establish_remote_sink(
        source_name: &str,
        inport: &Arc<InPortCore>,
        policy: ConnectionPolicy,
    ) -> RoboportResult<Arc<Connection>> {
        let connection = Arc::new(Connection {
            id: ConnectionId::new(),
            outport_name: source_name.to_string(),
            inport_name: inport.name().to_string(),
            schema: inport.schema(),
            policy,
            transport: Transport::Local(Arc::new(RecordBuffer::new(
                policy.effective_capacity(),
            ))),
            active: AtomicBool::new(true),
            outport: Weak::new(),
            inport: Arc::downgrade(inport),
        });

        inport.attach(&connection)?;
        log::debug!(
            "Accepted remote source {} -> {}",
            source_name,
            connection.inport_name
        );
        Ok(connection)
    }

    /// Source half of a cross-process connection, relaying through `binding`
    /// to the peer connection `peer`.
    pub(crate) fn establish_remote_source(
        outport: &Arc<OutPortCore>,
        remote_inport: &str,
        binding: Arc<dyn RemoteBinding>,
        peer: ConnectionId,
        policy: ConnectionPolicy,
    ) -> Arc<Connection> {
        let connection = Arc::new(Connection {
            id: ConnectionId::new(),
            outport_name: outport.name().to_string(),
            inport_name: remote_inport.to_string(),
            schema: outport.schema(),
            policy: policy.with_transport(TransportKind::Remote),
            transport: Transport::Remote {
                binding,
                peer,
                sent: AtomicU64::new(0),
            },
            active: AtomicBool::new(true),
            outport: Arc::downgrade(outport),
            inport: Weak::new(),
        });

        outport.attach(connection.clone());
        log::debug!(
            "Connected {} -> remote {} (peer connection {})",
            connection.outport_name,
            remote_inport,
            peer
        );
        connection
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn outport_name(&self) -> &str {
        &self.outport_name
    }

    pub fn inport_name(&self) -> &str {
        &self.inport_name
    }

    pub fn schema(&self) -> SchemaId {
        self.schema
    }

    pub fn policy(&self) -> &ConnectionPolicy {
        &self.policy
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn is_remote(&self) -> bool {
        matches!(self.transport, Transport::Remote { .. })
    }

    /// Hand one record to the sink side.
    ///
    /// Inactive connections swallow records silently.
    pub fn deliver(&self, record: Record) -> RoboportResult<()> {
        if !self.is_active() {
            return Ok(());
        }

        match &self.transport {
            Transport::Local(buffer) => {
                match buffer.push(record, self.policy.overflow, self.policy.block_timeout) {
                    Ok(PushOutcome::DroppedOldest) | Ok(PushOutcome::DroppedNewest) => {
                        log::trace!("{} -> {}: buffer full, dropped", self.outport_name, self.inport_name);
                        Ok(())
                    }
                    Ok(_) => Ok(()),
                    Err(waited) => Err(RoboportError::Backpressure {
                        port: format!("{} -> {}", self.outport_name, self.inport_name),
                        waited,
                    }),
                }
            }
            Transport::Remote {
                binding,
                peer,
                sent,
            } => {
                let payload = codec::encode(&record)?;
                match binding.call(RemoteRequest::Deliver {
                    connection: *peer,
                    payload,
                }) {
                    Ok(RemoteResponse::Ack) => {
                        sent.fetch_add(1, Ordering::Relaxed);
                        Ok(())
                    }
                    Ok(other) => {
                        log::warn!(
                            "{} -> {}: unexpected reply to deliver: {:?}",
                            self.outport_name,
                            self.inport_name,
                            other
                        );
                        Ok(())
                    }
                    Err(e) => self.relay_failed(e),
                }
            }
        }
    }

    /// Only flow control reaches the writer. A peer that no longer knows
    /// the sink ends this connection; anything else drops the record.
    fn relay_failed(&self, err: RoboportError) -> RoboportResult<()> {
        match err.code() {
            ErrorCode::Backpressure => Err(err),
            ErrorCode::NotFound | ErrorCode::UnknownInstance => {
                log::warn!(
                    "{} -> {}: remote sink is gone ({}); disconnecting",
                    self.outport_name,
                    self.inport_name,
                    err
                );
                self.close_locally();
                Ok(())
            }
            _ => {
                log::warn!(
                    "{} -> {}: record not relayed: {}",
                    self.outport_name,
                    self.inport_name,
                    err
                );
                Ok(())
            }
        }
    }

    /// Sink-side read with no waiting
    pub(crate) fn take(&self) -> Option<Record> {
        self.buffer().and_then(|b| b.pop())
    }

    /// Sink-side read bounded by `timeout`; `Ok(None)` once disconnected
    pub(crate) fn take_timeout(&self, timeout: Duration) -> RoboportResult<Option<Record>> {
        let Some(buffer) = self.buffer() else {
            return Ok(None);
        };
        match buffer.pop_timeout(timeout) {
            PopOutcome::Record(record) => Ok(Some(record)),
            PopOutcome::Closed => Ok(None),
            PopOutcome::TimedOut(waited) => Err(RoboportError::Timeout {
                port: self.inport_name.clone(),
                waited,
            }),
        }
    }

    pub(crate) fn drain(&self) -> usize {
        self.buffer().map(|b| b.drain()).unwrap_or(0)
    }

    fn buffer(&self) -> Option<&RecordBuffer> {
        match &self.transport {
            Transport::Local(buffer) => Some(buffer),
            Transport::Remote { .. } => None,
        }
    }

    pub fn stats(&self) -> ConnectionStats {
        match &self.transport {
            Transport::Local(buffer) => ConnectionStats {
                delivered: buffer.delivered(),
                dropped: buffer.dropped(),
                consumed: buffer.consumed(),
                pending: buffer.len(),
            },
            Transport::Remote { sent, .. } => ConnectionStats {
                delivered: sent.load(Ordering::Relaxed),
                ..ConnectionStats::default()
            },
        }
    }

    /// Tear the connection down. Calling it again is a no-op.
    ///
    /// Blocked readers and writers are woken.
    pub fn disconnect(&self) {
        if !self.close_locally() {
            return;
        }

        if let Transport::Remote { binding, peer, .. } = &self.transport {
            if let Err(e) = binding.call(RemoteRequest::Disconnect { connection: *peer }) {
                log::warn!(
                    "Remote disconnect of {} -> {} failed: {}",
                    self.outport_name,
                    self.inport_name,
                    e
                );
            }
        }
    }

    /// Detach from both ports and close the buffer without telling a peer.
    /// Returns false if the connection was already down.
    fn close_locally(&self) -> bool {
        if !self.active.swap(false, Ordering::AcqRel) {
            return false;
        }

        if let Some(outport) = self.outport.upgrade() {
            outport.detach(self.id);
        }
        if let Some(inport) = self.inport.upgrade() {
            inport.detach(self.id);
        }
        if let Transport::Local(buffer) = &self.transport {
            buffer.close();
        }

        log::debug!("Disconnected {} -> {}", self.outport_name, self.inport_name);
        true
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("outport", &self.outport_name)
            .field("inport", &self.inport_name)
            .field("schema", &self.schema)
            .field("remote", &self.is_remote())
            .field("active", &self.is_active())
            .finish()
    }
}
