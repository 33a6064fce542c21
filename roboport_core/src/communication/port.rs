//! Typed data ports
//!
//! Ports are created by a component factory through [`PortSet`] and live as
//! long as the owning instance. Component code holds typed handles
//! ([`OutPort`], [`InPort`]); the manager wires ports by name through
//! untyped [`PortRef`]s.
//!
//! ```text
//!   OutPort<RangeData> ──┬── Connection(buffer) ──> InPort<RangeData>
//!                        └── Connection(remote) ──> peer process
//! ```

use super::connection::{Connection, ConnectionId, ConnectionStats};
use super::policy::{ConnectionPolicy, ReadPolicy};
use crate::error::{RoboportError, RoboportResult};
use parking_lot::{Mutex, RwLock};
use roboport_types::{Record, Schema, SchemaId};
use serde::Serialize;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

/// Which way records flow through a port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PortDirection {
    /// OutPort
    Source,
    /// InPort
    Sink,
}

impl PortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            PortDirection::Source => "source",
            PortDirection::Sink => "sink",
        }
    }
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn check_schema(record: &Record, port: &str, expected: SchemaId) -> RoboportResult<()> {
    let found = record.schema();
    if found != expected {
        return Err(RoboportError::invalid_input(format!(
            "'{}' carries {} but was given a {} record",
            port, expected, found
        )));
    }
    Ok(())
}

/// Instance part of a qualified `instance.port` name
fn owner_of(qualified: &str) -> &str {
    qualified.split_once('.').map_or(qualified, |(owner, _)| owner)
}

// ============================================================================
// Source side
// ============================================================================

/// Shared state of a source port
pub struct OutPortCore {
    name: String,
    schema: SchemaId,
    latest: Mutex<Option<Record>>,
    connections: RwLock<Vec<Arc<Connection>>>,
}

impl OutPortCore {
    fn new(name: String, schema: SchemaId) -> Self {
        Self {
            name,
            schema,
            latest: Mutex::new(None),
            connections: RwLock::new(Vec::new()),
        }
    }

    /// Qualified name, `instance.port`
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> SchemaId {
        self.schema
    }

    /// Store `record` as the latest value and forward it to every active
    /// connection.
    ///
    /// Never fails for lack of subscribers. Every connection is attempted
    /// even if one reports `Backpressure`; the first such error is returned.
    pub fn write(&self, record: Record) -> RoboportResult<()> {
        check_schema(&record, &self.name, self.schema)?;

        let targets: Vec<Arc<Connection>> = self.connections.read().clone();
        *self.latest.lock() = Some(record.clone());

        let mut first_error = None;
        for connection in targets {
            if let Err(e) = connection.deliver(record.clone()) {
                log::debug!("{}: delivery failed: {}", self.name, e);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub fn latest(&self) -> Option<Record> {
        self.latest.lock().clone()
    }

    pub fn connections(&self) -> Vec<Arc<Connection>> {
        self.connections.read().clone()
    }

    pub(crate) fn attach(&self, connection: Arc<Connection>) {
        self.connections.write().push(connection);
    }

    pub(crate) fn detach(&self, id: ConnectionId) {
        self.connections.write().retain(|c| c.id() != id);
    }
}

/// Typed handle to a source port
pub struct OutPort<T: Schema> {
    core: Arc<OutPortCore>,
    _marker: PhantomData<fn(T)>,
}

impl<T: Schema> Clone for OutPort<T> {
    fn clone(&self) -> Self {
        Self {
            core: self.core.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Schema> OutPort<T> {
    pub fn write(&self, value: T) -> RoboportResult<()> {
        self.core.write(value.into_record())
    }

    /// Latest value written, if any
    pub fn latest(&self) -> Option<T> {
        self.core.latest().and_then(|r| T::from_record(r).ok())
    }

    pub fn name(&self) -> &str {
        self.core.name()
    }

    pub fn subscriber_count(&self) -> usize {
        self.core.connections.read().len()
    }
}

impl<T: Schema> fmt::Debug for OutPort<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutPort")
            .field("name", &self.core.name)
            .field("schema", &self.core.schema)
            .finish()
    }
}

// ============================================================================
// Sink side
// ============================================================================

/// Shared state of a sink port
pub struct InPortCore {
    name: String,
    schema: SchemaId,
    connection: Mutex<Option<Arc<Connection>>>,
}

impl InPortCore {
    fn new(name: String, schema: SchemaId) -> Self {
        Self {
            name,
            schema,
            connection: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> SchemaId {
        self.schema
    }

    pub fn connection(&self) -> Option<Arc<Connection>> {
        self.connection.lock().clone()
    }

    /// Oldest unread record per the connection's read policy
    pub fn read(&self) -> RoboportResult<Option<Record>> {
        let Some(connection) = self.connection() else {
            return Ok(None);
        };
        match connection.policy().read {
            ReadPolicy::NonBlocking => Ok(connection.take()),
            ReadPolicy::Blocking { timeout } => connection.take_timeout(timeout),
        }
    }

    /// Oldest unread record, waiting at most `timeout` for one to arrive
    pub fn read_timeout(&self, timeout: Duration) -> RoboportResult<Option<Record>> {
        match self.connection() {
            Some(connection) => connection.take_timeout(timeout),
            None => Ok(None),
        }
    }

    pub fn pending(&self) -> usize {
        self.connection()
            .map(|c| c.stats().pending)
            .unwrap_or(0)
    }

    pub(crate) fn attach(&self, connection: &Arc<Connection>) -> RoboportResult<()> {
        let mut slot = self.connection.lock();
        if let Some(existing) = slot.as_ref() {
            return Err(RoboportError::AlreadyConnected {
                inport: self.name.clone(),
                outport: existing.outport_name().to_string(),
            });
        }
        *slot = Some(connection.clone());
        Ok(())
    }

    pub(crate) fn detach(&self, id: ConnectionId) {
        let mut slot = self.connection.lock();
        if slot.as_ref().map(|c| c.id()) == Some(id) {
            *slot = None;
        }
    }

    /// Discard buffered records, returning how many were dropped
    pub(crate) fn drain(&self) -> usize {
        self.connection().map(|c| c.drain()).unwrap_or(0)
    }
}

/// Typed handle to a sink port
pub struct InPort<T: Schema> {
    core: Arc<InPortCore>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Schema> Clone for InPort<T> {
    fn clone(&self) -> Self {
        Self {
            core: self.core.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Schema> InPort<T> {
    /// Oldest unread record, `None` when nothing is buffered.
    ///
    /// Under a blocking read policy this waits up to the policy's timeout
    /// and fails with `Timeout` if nothing arrives.
    pub fn read(&self) -> RoboportResult<Option<T>> {
        self.core.read()?.map(T::from_record).transpose().map_err(Into::into)
    }

    /// Like [`read`](Self::read) with a caller-supplied bound
    pub fn read_timeout(&self, timeout: Duration) -> RoboportResult<Option<T>> {
        self.core
            .read_timeout(timeout)?
            .map(T::from_record)
            .transpose()
            .map_err(Into::into)
    }

    /// Number of records waiting
    pub fn pending(&self) -> usize {
        self.core.pending()
    }

    /// True if at least one unread record is waiting
    pub fn is_new(&self) -> bool {
        self.pending() > 0
    }

    pub fn is_connected(&self) -> bool {
        self.core.connection().is_some()
    }

    pub fn name(&self) -> &str {
        self.core.name()
    }
}

impl<T: Schema> fmt::Debug for InPort<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InPort")
            .field("name", &self.core.name)
            .field("schema", &self.core.schema)
            .finish()
    }
}

// ============================================================================
// Untyped references
// ============================================================================

/// Untyped port reference used for wiring by name
#[derive(Clone)]
pub enum PortRef {
    Out(Arc<OutPortCore>),
    In(Arc<InPortCore>),
}

impl PortRef {
    pub fn name(&self) -> &str {
        match self {
            PortRef::Out(p) => p.name(),
            PortRef::In(p) => p.name(),
        }
    }

    pub fn schema(&self) -> SchemaId {
        match self {
            PortRef::Out(p) => p.schema(),
            PortRef::In(p) => p.schema(),
        }
    }

    pub fn direction(&self) -> PortDirection {
        match self {
            PortRef::Out(_) => PortDirection::Source,
            PortRef::In(_) => PortDirection::Sink,
        }
    }

    /// Connect this port to `other`.
    ///
    /// Either side may be the source. Schemas are checked first, then
    /// directions; a sink that already has a source is rejected, and so is
    /// a pair owned by one component. No connection exists after any failure.
    pub fn connect(&self, other: &PortRef, policy: ConnectionPolicy) -> RoboportResult<Arc<Connection>> {
        if self.schema() != other.schema() {
            let (out, inp) = match (self, other) {
                (PortRef::In(_), PortRef::Out(_)) => (other, self),
                _ => (self, other),
            };
            return Err(RoboportError::SchemaMismatch {
                outport: out.name().to_string(),
                outport_schema: out.schema(),
                inport: inp.name().to_string(),
                inport_schema: inp.schema(),
            });
        }

        match (self, other) {
            (PortRef::Out(out), PortRef::In(inp)) | (PortRef::In(inp), PortRef::Out(out)) => {
                if owner_of(out.name()) == owner_of(inp.name()) {
                    return Err(RoboportError::invalid_input(format!(
                        "'{}' and '{}' belong to the same component",
                        out.name(),
                        inp.name()
                    )));
                }
                Connection::establish_local(out, inp, policy)
            }
            _ => Err(RoboportError::DirectionMismatch {
                port_a: self.name().to_string(),
                port_b: other.name().to_string(),
                direction: self.direction().as_str(),
            }),
        }
    }

    /// Remove `connection`. Removing it twice is a no-op.
    pub fn disconnect(&self, connection: &Connection) {
        connection.disconnect();
    }

    /// Write an untyped record; fails if it is not of this port's schema
    pub fn write(&self, record: Record) -> RoboportResult<()> {
        match self {
            PortRef::Out(p) => p.write(record),
            PortRef::In(p) => Err(RoboportError::invalid_input(format!(
                "'{}' is a sink port and cannot be written",
                p.name()
            ))),
        }
    }

    /// Read an untyped record, waiting at most `timeout` when given
    pub fn read(&self, timeout: Option<Duration>) -> RoboportResult<Option<Record>> {
        match self {
            PortRef::In(p) => match timeout {
                Some(t) => p.read_timeout(t),
                None => p.read(),
            },
            PortRef::Out(p) => Err(RoboportError::invalid_input(format!(
                "'{}' is a source port and cannot be read",
                p.name()
            ))),
        }
    }

    pub fn connections(&self) -> Vec<Arc<Connection>> {
        match self {
            PortRef::Out(p) => p.connections(),
            PortRef::In(p) => p.connection().into_iter().collect(),
        }
    }

    pub fn profile(&self) -> PortProfile {
        PortProfile {
            name: self.name().to_string(),
            direction: self.direction(),
            schema: self.schema().to_string(),
            connections: self
                .connections()
                .iter()
                .map(|c| ConnectionProfile {
                    id: c.id(),
                    peer: match self {
                        PortRef::Out(_) => c.inport_name().to_string(),
                        PortRef::In(_) => c.outport_name().to_string(),
                    },
                    remote: c.is_remote(),
                    stats: c.stats(),
                })
                .collect(),
        }
    }
}

impl fmt::Debug for PortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}, {})", self.direction(), self.name(), self.schema())
    }
}

/// Snapshot of one port and its connections, for observability
#[derive(Debug, Clone, Serialize)]
pub struct PortProfile {
    pub name: String,
    pub direction: PortDirection,
    pub schema: String,
    pub connections: Vec<ConnectionProfile>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectionProfile {
    pub id: ConnectionId,
    /// Qualified name of the port at the other end
    pub peer: String,
    pub remote: bool,
    pub stats: ConnectionStats,
}

// ============================================================================
// Per-instance registry
// ============================================================================

/// The ports owned by one component instance, in creation order
pub struct PortSet {
    owner: String,
    ports: Vec<(String, PortRef)>,
}

impl PortSet {
    pub fn new(owner: &str) -> Self {
        Self {
            owner: owner.to_string(),
            ports: Vec::new(),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn add_outport<T: Schema>(&mut self, name: &str) -> RoboportResult<OutPort<T>> {
        let qualified = self.reserve(name)?;
        let core = Arc::new(OutPortCore::new(qualified, T::SCHEMA));
        self.ports.push((name.to_string(), PortRef::Out(core.clone())));
        Ok(OutPort {
            core,
            _marker: PhantomData,
        })
    }

    pub fn add_inport<T: Schema>(&mut self, name: &str) -> RoboportResult<InPort<T>> {
        let qualified = self.reserve(name)?;
        let core = Arc::new(InPortCore::new(qualified, T::SCHEMA));
        self.ports.push((name.to_string(), PortRef::In(core.clone())));
        Ok(InPort {
            core,
            _marker: PhantomData,
        })
    }

    fn reserve(&self, name: &str) -> RoboportResult<String> {
        if name.is_empty() || name.contains('.') {
            return Err(RoboportError::invalid_input(format!(
                "invalid port name '{}' on '{}'",
                name, self.owner
            )));
        }
        if self.get(name).is_some() {
            return Err(RoboportError::invalid_input(format!(
                "port '{}' already exists on '{}'",
                name, self.owner
            )));
        }
        Ok(format!("{}.{}", self.owner, name))
    }

    /// Port by local name
    pub fn get(&self, name: &str) -> Option<PortRef> {
        self.ports
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, p)| p.clone())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.ports.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &PortRef> {
        self.ports.iter().map(|(_, p)| p)
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    pub fn profiles(&self) -> Vec<PortProfile> {
        self.iter().map(PortRef::profile).collect()
    }

    /// Discard every record waiting on this instance's sinks
    pub fn drain_inputs(&self) -> usize {
        self.iter()
            .map(|p| match p {
                PortRef::In(core) => core.drain(),
                PortRef::Out(_) => 0,
            })
            .sum()
    }

    /// Tear down every connection touching this instance
    pub fn disconnect_all(&self) {
        for port in self.iter() {
            for connection in port.connections() {
                connection.disconnect();
            }
        }
    }
}

impl fmt::Debug for PortSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortSet")
            .field("owner", &self.owner)
            .field("ports", &self.ports.iter().map(|(_, p)| p).collect::<Vec<_>>())
            .finish()
    }
}
