//! Serving remote requests against a manager

use super::component_manager::Manager;
use crate::communication::{RemoteBinding, RemoteRequest, RemoteResponse};
use crate::error::{RoboportError, RoboportResult};
use roboport_types::codec;
use std::sync::{Arc, Weak};
use std::time::Duration;

/// Answers [`RemoteRequest`]s for one manager.
///
/// A transport collaborator decodes requests off the wire, hands them to
/// [`ManagerEndpoint::handle`] and sends the response back. Failures come
/// back as `RemoteResponse::Failed` carrying the error code.
#[derive(Clone)]
pub struct ManagerEndpoint {
    manager: Arc<Manager>,
}

impl ManagerEndpoint {
    pub fn new(manager: Arc<Manager>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &Arc<Manager> {
        &self.manager
    }

    pub fn handle(&self, request: RemoteRequest) -> RemoteResponse {
        let op = request.op_name();
        match self.dispatch(request) {
            Ok(response) => response,
            Err(e) => {
                log::debug!("Remote {} failed: {}", op, e);
                RemoteResponse::failed(&e)
            }
        }
    }

    fn dispatch(&self, request: RemoteRequest) -> RoboportResult<RemoteResponse> {
        let manager = &self.manager;
        match request {
            RemoteRequest::Activate { instance } => {
                let state = manager.activate(&instance)?;
                Ok(RemoteResponse::State { instance, state })
            }
            RemoteRequest::Deactivate { instance } => {
                let state = manager.deactivate(&instance)?;
                Ok(RemoteResponse::State { instance, state })
            }
            RemoteRequest::Reset { instance } => {
                let state = manager.reset(&instance)?;
                Ok(RemoteResponse::State { instance, state })
            }
            RemoteRequest::Destroy { instance } => {
                manager.destroy_instance(&instance)?;
                Ok(RemoteResponse::Ack)
            }
            RemoteRequest::Connect {
                source,
                inport,
                schema,
                version,
                policy,
            } => {
                let connection =
                    manager.accept_remote_source(&source, &inport, &schema, version, policy)?;
                Ok(RemoteResponse::Connected { connection })
            }
            RemoteRequest::Disconnect { connection } => {
                manager.disconnect(connection);
                Ok(RemoteResponse::Ack)
            }
            RemoteRequest::Write { outport, payload } => {
                let port = manager.port(&outport)?;
                let record = codec::decode(&payload, port.schema())?;
                port.write(record)?;
                Ok(RemoteResponse::Ack)
            }
            RemoteRequest::Read { inport, timeout_ms } => {
                let port = manager.port(&inport)?;
                let record = port.read(timeout_ms.map(Duration::from_millis))?;
                let payload = record.map(|r| codec::encode(&r)).transpose()?;
                Ok(RemoteResponse::Record { payload })
            }
            RemoteRequest::Deliver {
                connection,
                payload,
            } => {
                manager.deliver(connection, &payload)?;
                Ok(RemoteResponse::Ack)
            }
            RemoteRequest::Resolve { name } => Ok(RemoteResponse::Entry {
                entry: manager.naming().resolve(&name)?,
            }),
            RemoteRequest::List { prefix } => Ok(RemoteResponse::Entries {
                entries: manager.naming().list(&prefix),
            }),
        }
    }
}

/// In-process binding to another manager.
///
/// Requests and responses go through their JSON form, so everything a real
/// transport would have to carry is exercised. Holds the target weakly; a
/// dropped target fails calls with `NotFound`.
pub struct LoopbackBinding {
    target: Weak<Manager>,
    peer: String,
}

impl LoopbackBinding {
    pub fn new(target: &Arc<Manager>) -> Self {
        Self {
            peer: format!("loopback:{}", target.config().host_name),
            target: Arc::downgrade(target),
        }
    }
}

impl RemoteBinding for LoopbackBinding {
    fn peer(&self) -> &str {
        &self.peer
    }

    fn call(&self, request: RemoteRequest) -> RoboportResult<RemoteResponse> {
        let manager = self
            .target
            .upgrade()
            .ok_or_else(|| RoboportError::NotFound(format!("peer {}", self.peer)))?;

        let request: RemoteRequest = serde_json::from_slice(&serde_json::to_vec(&request)?)?;
        let response = ManagerEndpoint::new(manager).handle(request);
        let response: RemoteResponse = serde_json::from_slice(&serde_json::to_vec(&response)?)?;
        response.into_result()
    }
}
