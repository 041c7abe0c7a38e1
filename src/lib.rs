//! # uperdsl: schema-driven ASN.1 Unaligned PER codec
//!
//! An ASN.1 schema (parsed from notation with a PEST grammar, or built in code) is resolved once
//! into a [`ResolvedSchema`]; a [`Codec`] then interprets it to turn Unaligned PER (ITU-T X.691)
//! bitstreams into [`Value`] trees and back.
//!
//! ## Layers
//!
//! | Module | Role |
//! |--------|------|
//! | [`bits`] | MSB-first [`BitCursor`] / [`BitSink`] |
//! | [`length`] | general length determinant with fragmentation |
//! | [`per`] | integers, enumerations, strings, open types |
//! | [`codec`] | SEQUENCE / CHOICE / SEQUENCE OF, extensions, message entry points |
//! | [`walk`] | extent and validation without building values |
//! | [`frame`] | several PDUs per buffer, failures isolated per PDU |
//! | [`dump`] | indented text rendering |
//!
//! ## Supported notation
//!
//! - `NULL`, `BOOLEAN`, `INTEGER (lo..hi)` with `MIN`/`MAX`, value references and `...`
//! - `ENUMERATED { a, b, ..., c }`
//! - `BIT STRING (SIZE(..))`, `OCTET STRING (SIZE(..))`, `OCTET STRING (CONTAINING T)`
//! - `SEQUENCE { .. }` with `OPTIONAL`, `DEFAULT`, `...` and `[[ ]]` groups
//! - `CHOICE { .. }` with `...`
//! - `SEQUENCE (SIZE(..)) OF T`, `SET OF T`, `ANY`
//!
//! ## Example
//!
//! ```
//! use uperdsl::{Codec, CodecConfig, ResolvedSchema, SequenceValue, Value};
//!
//! let schema = ResolvedSchema::from_source(
//!     "Demo DEFINITIONS AUTOMATIC TAGS ::= BEGIN
//!        Packet ::= SEQUENCE {
//!          kind INTEGER (0..7),
//!          note OCTET STRING (SIZE(0..15)) OPTIONAL,
//!          ...
//!        }
//!      END",
//! )
//! .unwrap();
//! let codec = Codec::new(schema, CodecConfig::default());
//!
//! let value = Value::Sequence(SequenceValue::new().with("kind", Value::Integer(5)));
//! let bytes = codec.encode_message("Packet", &value).unwrap();
//! // extension bit 0, presence bit 0, kind 101
//! assert_eq!(bytes, vec![0b0010_1000]);
//! let decoded = codec.decode_message("Packet", &bytes).unwrap();
//! assert_eq!(decoded.value, value);
//! assert_eq!(decoded.bits, 5);
//! ```

pub mod ast;
pub mod bits;
pub mod codec;
pub mod config;
pub mod dump;
pub mod error;
pub mod frame;
pub mod length;
pub mod parser;
pub mod per;
pub mod value;
pub mod walk;

pub use ast::{AsnType, ResolvedSchema, Schema};
pub use bits::{BitCursor, BitSink};
pub use codec::{Codec, Decoded, Warning};
pub use config::{CodecConfig, ConstraintPolicy};
pub use error::{CodecError, ErrorKind, SchemaError};
pub use frame::{decode_batch, decode_frame, encode_frame, FrameDecodeResult};
pub use parser::{parse, parse_file};
pub use value::{ChoiceValue, OpenValue, SequenceValue, Value};
pub use walk::{message_extent, validate_message};
