//! Unified error handling for roboport
//!
//! Every fallible runtime operation returns [`RoboportResult`]. Variants carry
//! the instance, port and schema names an operator needs to diagnose the
//! failure without access to internal state.

use crate::core::lifecycle::LifecycleState;
use roboport_types::{SchemaError, SchemaId};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Main error type for roboport operations
#[derive(Debug, Error)]
pub enum RoboportError {
    // ---- port wiring ----
    /// The two ports carry different schemas
    #[error("Schema mismatch: '{outport}' is {outport_schema} but '{inport}' is {inport_schema}")]
    SchemaMismatch {
        outport: String,
        outport_schema: SchemaId,
        inport: String,
        inport_schema: SchemaId,
    },

    /// Both ports are sources or both are sinks
    #[error("Direction mismatch: '{port_a}' and '{port_b}' are both {direction}s")]
    DirectionMismatch {
        port_a: String,
        port_b: String,
        direction: &'static str,
    },

    /// The sink already reads from a source
    #[error("InPort '{inport}' is already connected to '{outport}'")]
    AlreadyConnected { inport: String, outport: String },

    // ---- registry ----
    #[error("Component type '{0}' is already registered")]
    DuplicateType(String),

    #[error("Component instance '{0}' already exists")]
    DuplicateInstance(String),

    #[error("Unknown component type '{0}'")]
    UnknownType(String),

    #[error("Unknown component instance '{0}'")]
    UnknownInstance(String),

    #[error("Not found: {0}")]
    NotFound(String),

    // ---- flow control ----
    /// A blocking write could not enqueue within its bound
    #[error("Backpressure on '{port}': buffer full for {waited:?}")]
    Backpressure { port: String, waited: Duration },

    /// A blocking read found nothing within its bound
    #[error("Timed out after {waited:?} waiting on '{port}'")]
    Timeout { port: String, waited: Duration },

    // ---- lifecycle ----
    /// A component callback returned an error or panicked
    #[error("Component '{instance}' failed in {callback}: {message}")]
    CallbackFailure {
        instance: String,
        callback: &'static str,
        message: String,
    },

    /// Another lifecycle transition is in flight for this instance
    #[error("Component '{instance}' is busy with another transition")]
    Busy { instance: String },

    #[error("Component '{instance}' cannot {request} while {state}")]
    InvalidTransition {
        instance: String,
        request: &'static str,
        state: LifecycleState,
    },

    // ---- execution contexts ----
    #[error("Component '{instance}' is already attached to execution context '{context}'")]
    AlreadyAttached { instance: String, context: String },

    #[error("Component '{instance}' is not attached to execution context '{context}'")]
    NotAttached { instance: String, context: String },

    // ---- records / modules / config ----
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Module '{module}' error: {message}")]
    Module { module: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A peer answered a remote request with a failure
    #[error("Remote {code:?}: {message}")]
    Remote { code: ErrorCode, message: String },

    /// Internal errors with source location for debugging.
    /// Use the `roboport_internal!()` macro to create these.
    #[error("Internal error: {message} (at {file}:{line})")]
    Internal {
        message: String,
        file: &'static str,
        line: u32,
    },
}

/// Error category carried across a remote binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    SchemaMismatch,
    DirectionMismatch,
    AlreadyConnected,
    DuplicateType,
    DuplicateInstance,
    UnknownType,
    UnknownInstance,
    NotFound,
    Backpressure,
    Timeout,
    CallbackFailure,
    Busy,
    InvalidTransition,
    AlreadyAttached,
    NotAttached,
    SchemaViolation,
    Module,
    Config,
    InvalidInput,
    Internal,
}

/// Create an internal error with automatic file/line capture.
///
/// ```rust,ignore
/// return Err(roboport_internal!("context thread vanished: {}", name));
/// ```
#[macro_export]
macro_rules! roboport_internal {
    ($($arg:tt)*) => {
        $crate::error::RoboportError::Internal {
            message: format!($($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// Convenience type alias for Results using RoboportError
pub type RoboportResult<T> = std::result::Result<T, RoboportError>;

/// Short alias
pub type Result<T> = RoboportResult<T>;

impl From<serde_json::Error> for RoboportError {
    fn from(err: serde_json::Error) -> Self {
        RoboportError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for RoboportError {
    fn from(err: serde_yaml::Error) -> Self {
        RoboportError::Config(format!("YAML error: {}", err))
    }
}

impl From<toml::de::Error> for RoboportError {
    fn from(err: toml::de::Error) -> Self {
        RoboportError::Config(format!("TOML parse error: {}", err))
    }
}

impl From<anyhow::Error> for RoboportError {
    fn from(err: anyhow::Error) -> Self {
        RoboportError::Internal {
            message: err.to_string(),
            file: file!(),
            line: line!(),
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for RoboportError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        RoboportError::Internal {
            message: "Lock poisoned".to_string(),
            file: file!(),
            line: line!(),
        }
    }
}

// Helper methods
impl RoboportError {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        RoboportError::Config(msg.into())
    }

    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        RoboportError::InvalidInput(msg.into())
    }

    pub fn module<S: Into<String>, T: Into<String>>(module: S, message: T) -> Self {
        RoboportError::Module {
            module: module.into(),
            message: message.into(),
        }
    }

    pub fn callback<S: Into<String>, T: ToString>(
        instance: S,
        callback: &'static str,
        message: T,
    ) -> Self {
        RoboportError::CallbackFailure {
            instance: instance.into(),
            callback,
            message: message.to_string(),
        }
    }

    /// Category of this error, as reported to remote callers
    pub fn code(&self) -> ErrorCode {
        match self {
            RoboportError::SchemaMismatch { .. } => ErrorCode::SchemaMismatch,
            RoboportError::DirectionMismatch { .. } => ErrorCode::DirectionMismatch,
            RoboportError::AlreadyConnected { .. } => ErrorCode::AlreadyConnected,
            RoboportError::DuplicateType(_) => ErrorCode::DuplicateType,
            RoboportError::DuplicateInstance(_) => ErrorCode::DuplicateInstance,
            RoboportError::UnknownType(_) => ErrorCode::UnknownType,
            RoboportError::UnknownInstance(_) => ErrorCode::UnknownInstance,
            RoboportError::NotFound(_) => ErrorCode::NotFound,
            RoboportError::Backpressure { .. } => ErrorCode::Backpressure,
            RoboportError::Timeout { .. } => ErrorCode::Timeout,
            RoboportError::CallbackFailure { .. } => ErrorCode::CallbackFailure,
            RoboportError::Busy { .. } => ErrorCode::Busy,
            RoboportError::InvalidTransition { .. } => ErrorCode::InvalidTransition,
            RoboportError::AlreadyAttached { .. } => ErrorCode::AlreadyAttached,
            RoboportError::NotAttached { .. } => ErrorCode::NotAttached,
            RoboportError::Schema(_) => ErrorCode::SchemaViolation,
            RoboportError::Module { .. } => ErrorCode::Module,
            RoboportError::Config(_) => ErrorCode::Config,
            RoboportError::InvalidInput(_) => ErrorCode::InvalidInput,
            RoboportError::Remote { code, .. } => *code,
            RoboportError::Serialization(_)
            | RoboportError::Io(_)
            | RoboportError::Internal { .. } => ErrorCode::Internal,
        }
    }

    /// Flow-control errors the caller can recover from by retrying
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.code(),
            ErrorCode::Backpressure | ErrorCode::Timeout | ErrorCode::Busy
        )
    }
}
