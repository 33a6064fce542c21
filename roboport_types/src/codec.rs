//! Wire codec for records
//!
//! ```text
//! +--------+-----------------------------+-------------+----------------------+
//! | "RPR1" | schema name (u64 len + utf8)| version u16 | payload              |
//! +--------+-----------------------------+-------------+----------------------+
//! ```
//!
//! The payload is the record's fields in declaration order, encoded with
//! bincode using fixed-width little-endian integers. Sequences and strings
//! are prefixed with a u64 length, `Option` with a one-byte tag, and enums
//! with a u32 variant index. Trailing bytes after the payload are rejected.

use crate::error::{SchemaError, SchemaResult};
use crate::records::{Record, RecordKind};
use crate::schema::{Schema, SchemaId};
use bincode::Options;

/// Leading bytes of every encoded record
pub const WIRE_MAGIC: [u8; 4] = *b"RPR1";

/// Options used for payloads: fixint, little endian, no trailing bytes
pub(crate) fn payload_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
        .reject_trailing_bytes()
}

fn header_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
        .allow_trailing_bytes()
}

/// Decoded header of an encoded record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireHeader {
    pub schema: String,
    pub version: u16,
}

/// Encode a record with its schema header
pub fn encode(record: &Record) -> SchemaResult<Vec<u8>> {
    let schema = record.schema();
    let mut out = Vec::with_capacity(64);
    out.extend_from_slice(&WIRE_MAGIC);

    header_options()
        .serialize_into(&mut out, &(schema.name, schema.version))
        .map_err(|e| SchemaError::Encode {
            schema,
            reason: e.to_string(),
        })?;

    record
        .encode_payload(&mut out)
        .map_err(|e| SchemaError::Encode {
            schema,
            reason: e.to_string(),
        })?;

    Ok(out)
}

/// Encode a concrete catalogue value
pub fn encode_typed<T: Schema>(value: &T) -> SchemaResult<Vec<u8>> {
    encode(&value.clone().into_record())
}

/// Read the header and return it with the remaining payload bytes
pub fn read_header(bytes: &[u8]) -> SchemaResult<(WireHeader, &[u8])> {
    let rest = bytes
        .strip_prefix(&WIRE_MAGIC[..])
        .ok_or_else(|| SchemaError::violation("<header>", "missing wire magic"))?;

    // Length prefixes larger than the input fail before anything is allocated
    let mut cursor = rest;
    let (schema, version): (String, u16) = header_options()
        .with_limit(rest.len() as u64)
        .deserialize_from(&mut cursor)
        .map_err(|e| SchemaError::violation("<header>", e))?;

    Ok((WireHeader { schema, version }, cursor))
}

/// Decode a record that must be of schema `expected`.
///
/// Fails with [`SchemaError::TypeMismatch`] when the header names any other
/// schema or version, before the payload is looked at.
pub fn decode(bytes: &[u8], expected: SchemaId) -> SchemaResult<Record> {
    let (header, payload) = read_header(bytes)?;

    if header.schema != expected.name || header.version != expected.version {
        return Err(SchemaError::TypeMismatch {
            expected,
            found: header.schema,
            found_version: header.version,
        });
    }

    let kind = RecordKind::from_name(expected.name)
        .ok_or_else(|| SchemaError::UnknownSchema(expected.name.to_string()))?;

    decode_payload(kind, payload)
}

/// Decode a record of whatever catalogue schema the header names
pub fn decode_any(bytes: &[u8]) -> SchemaResult<Record> {
    let (header, payload) = read_header(bytes)?;

    let kind = RecordKind::from_name(&header.schema)
        .ok_or_else(|| SchemaError::UnknownSchema(header.schema.clone()))?;

    let expected = kind.schema();
    if header.version != expected.version {
        return Err(SchemaError::VersionMismatch {
            schema: header.schema,
            expected: expected.version,
            found: header.version,
        });
    }

    decode_payload(kind, payload)
}

/// Decode straight into a concrete catalogue type
pub fn decode_typed<T: Schema>(bytes: &[u8]) -> SchemaResult<T> {
    decode(bytes, T::SCHEMA).and_then(T::from_record)
}

fn decode_payload(kind: RecordKind, payload: &[u8]) -> SchemaResult<Record> {
    Record::decode_payload(kind, payload)
        .map_err(|e| SchemaError::violation(kind.schema().name, e))
}
