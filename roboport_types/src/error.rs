//! Errors raised by the record schema layer

use crate::schema::SchemaId;
use thiserror::Error;

/// Failure to match, encode or decode a record against its schema
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The wire header names a different schema than the one expected
    #[error("schema mismatch: expected {expected}, found {found} v{found_version}")]
    TypeMismatch {
        expected: SchemaId,
        found: String,
        found_version: u16,
    },

    /// Known schema name but incompatible version
    #[error("schema '{schema}' version mismatch: expected v{expected}, found v{found}")]
    VersionMismatch {
        schema: String,
        expected: u16,
        found: u16,
    },

    /// The wire header names a schema outside the catalogue
    #[error("unknown schema type '{0}'")]
    UnknownSchema(String),

    /// Malformed payload, truncated sequence, or out-of-range enumerator
    #[error("schema violation in {schema}: {reason}")]
    Violation { schema: String, reason: String },

    /// Payload could not be serialized
    #[error("failed to encode {schema}: {reason}")]
    Encode { schema: SchemaId, reason: String },

    /// A record of one schema was converted into the type of another
    #[error("record is {found}, expected {expected}")]
    WrongVariant { expected: SchemaId, found: SchemaId },
}

impl SchemaError {
    pub fn violation<S: Into<String>, R: ToString>(schema: S, reason: R) -> Self {
        SchemaError::Violation {
            schema: schema.into(),
            reason: reason.to_string(),
        }
    }
}

pub type SchemaResult<T> = std::result::Result<T, SchemaError>;
