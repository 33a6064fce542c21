//! Remote binding contract
//!
//! The transport that carries requests between processes is not part of the
//! runtime. Anything that can move a [`RemoteRequest`] to a peer and bring a
//! [`RemoteResponse`] back implements [`RemoteBinding`]. Requests and
//! responses are serde types; records travel inside them as codec bytes.

use super::connection::ConnectionId;
use super::policy::ConnectionPolicy;
use crate::core::lifecycle::LifecycleState;
use crate::error::{ErrorCode, RoboportError, RoboportResult};
use crate::manager::naming::NamingEntry;
use serde::{Deserialize, Serialize};

/// Operations a peer may invoke on this process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RemoteRequest {
    // lifecycle
    Activate { instance: String },
    Deactivate { instance: String },
    Reset { instance: String },
    Destroy { instance: String },

    // ports
    /// Attach a remote source to the local sink `inport`
    Connect {
        source: String,
        inport: String,
        schema: String,
        version: u16,
        policy: ConnectionPolicy,
    },
    Disconnect { connection: ConnectionId },
    /// Write an encoded record to the local source `outport`
    Write { outport: String, payload: Vec<u8> },
    /// Read from the local sink `inport`, waiting up to `timeout_ms`
    Read {
        inport: String,
        timeout_ms: Option<u64>,
    },
    /// Push an encoded record into connection `connection`
    Deliver {
        connection: ConnectionId,
        payload: Vec<u8>,
    },

    // directory
    Resolve { name: String },
    List { prefix: String },
}

impl RemoteRequest {
    pub fn op_name(&self) -> &'static str {
        match self {
            RemoteRequest::Activate { .. } => "activate",
            RemoteRequest::Deactivate { .. } => "deactivate",
            RemoteRequest::Reset { .. } => "reset",
            RemoteRequest::Destroy { .. } => "destroy",
            RemoteRequest::Connect { .. } => "connect",
            RemoteRequest::Disconnect { .. } => "disconnect",
            RemoteRequest::Write { .. } => "write",
            RemoteRequest::Read { .. } => "read",
            RemoteRequest::Deliver { .. } => "deliver",
            RemoteRequest::Resolve { .. } => "resolve",
            RemoteRequest::List { .. } => "list",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reply", rename_all = "snake_case")]
pub enum RemoteResponse {
    Ack,
    State {
        instance: String,
        state: LifecycleState,
    },
    Connected { connection: ConnectionId },
    /// `None` when nothing was buffered
    Record { payload: Option<Vec<u8>> },
    Entry { entry: NamingEntry },
    Entries { entries: Vec<NamingEntry> },
    Failed { code: ErrorCode, message: String },
}

impl RemoteResponse {
    pub fn failed(err: &RoboportError) -> Self {
        RemoteResponse::Failed {
            code: err.code(),
            message: err.to_string(),
        }
    }

    /// Turn a `Failed` reply back into an error
    pub fn into_result(self) -> RoboportResult<RemoteResponse> {
        match self {
            RemoteResponse::Failed { code, message } => Err(RoboportError::Remote { code, message }),
            other => Ok(other),
        }
    }
}

/// Call/response channel to a peer process
pub trait RemoteBinding: Send + Sync {
    /// Peer description for logs
    fn peer(&self) -> &str;

    /// Invoke `request` on the peer. A `Failed` reply comes back as
    /// `Err(RoboportError::Remote)`.
    fn call(&self, request: RemoteRequest) -> RoboportResult<RemoteResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_json_shape() {
        let request = RemoteRequest::Activate {
            instance: "scanner".into(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["op"], "activate");
        assert_eq!(json["instance"], "scanner");
    }

    #[test]
    fn test_connect_request_round_trips() {
        let request = RemoteRequest::Connect {
            source: "hostA/scanner.range".into(),
            inport: "nav.scan".into(),
            schema: "RangeData".into(),
            version: 1,
            policy: ConnectionPolicy::drop_newest(4),
        };
        let text = serde_json::to_string(&request).unwrap();
        let back: RemoteRequest = serde_json::from_str(&text).unwrap();
        assert_eq!(back, request);
        assert_eq!(back.op_name(), "connect");
    }

    #[test]
    fn test_failed_reply_becomes_error() {
        let err = RoboportError::Busy {
            instance: "nav".into(),
        };
        match RemoteResponse::failed(&err).into_result() {
            Err(RoboportError::Remote { code, message }) => {
                assert_eq!(code, ErrorCode::Busy);
                assert!(message.contains("nav"));
            }
            other => panic!("expected Remote error, got {:?}", other),
        }
    }
}
