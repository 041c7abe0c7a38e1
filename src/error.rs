//! Error types for the PER codec and the schema front end.
//!
//! Every codec error that can be tied to a position in the bitstream carries the absolute bit
//! offset at which it was detected, so a caller can report "what went wrong, and where" for a
//! malformed PDU without any partially decoded value leaking out.

use thiserror::Error;

/// Coarse classification of [`CodecError`], mirroring the failure taxonomy callers act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Read or write past the end of the buffer.
    OutOfBounds,
    /// A length determinant or fragment sequence is inconsistent.
    MalformedLength,
    /// A value or size lies outside its declared bound.
    ConstraintViolation,
    /// The schema or registry does not describe what was asked for.
    Schema,
    /// The value handed to the encoder does not fit the schema.
    Value,
}

/// Errors raised while decoding or encoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("out of bounds at bit {offset}: needed {needed} bits, {available} available")]
    OutOfBounds {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("malformed length at bit {offset}: {reason}")]
    MalformedLength { offset: usize, reason: String },

    #[error("constraint violation at bit {offset}: {value} not in {}", range_text(.lower, .upper))]
    ConstraintViolation {
        offset: usize,
        value: i128,
        lower: Option<i64>,
        upper: Option<i64>,
    },

    #[error("invalid choice index {index} at bit {offset} ({alternatives} root alternatives)")]
    InvalidChoiceIndex {
        offset: usize,
        index: u64,
        alternatives: usize,
    },

    #[error("unknown type: {0}")]
    UnknownType(String),

    #[error("unknown field or alternative '{name}' at bit {offset}")]
    UnknownField { offset: usize, name: String },

    #[error("missing mandatory field '{name}' at bit {offset}")]
    MissingField { offset: usize, name: String },

    #[error("value at bit {offset} does not match {expected}")]
    ValueMismatch {
        offset: usize,
        expected: &'static str,
    },

    #[error("nesting deeper than {limit} at bit {offset}")]
    DepthExceeded { offset: usize, limit: usize },
}

impl CodecError {
    /// Bit offset at which the error was detected, when it is tied to a position.
    pub fn offset(&self) -> Option<usize> {
        match self {
            CodecError::OutOfBounds { offset, .. }
            | CodecError::MalformedLength { offset, .. }
            | CodecError::ConstraintViolation { offset, .. }
            | CodecError::InvalidChoiceIndex { offset, .. }
            | CodecError::UnknownField { offset, .. }
            | CodecError::MissingField { offset, .. }
            | CodecError::ValueMismatch { offset, .. }
            | CodecError::DepthExceeded { offset, .. } => Some(*offset),
            CodecError::UnknownType(_) => None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CodecError::OutOfBounds { .. } => ErrorKind::OutOfBounds,
            CodecError::MalformedLength { .. } => ErrorKind::MalformedLength,
            CodecError::ConstraintViolation { .. } | CodecError::InvalidChoiceIndex { .. } => {
                ErrorKind::ConstraintViolation
            }
            CodecError::UnknownType(_) | CodecError::DepthExceeded { .. } => ErrorKind::Schema,
            CodecError::UnknownField { .. }
            | CodecError::MissingField { .. }
            | CodecError::ValueMismatch { .. } => ErrorKind::Value,
        }
    }

    pub(crate) fn malformed(offset: usize, reason: impl Into<String>) -> Self {
        CodecError::MalformedLength {
            offset,
            reason: reason.into(),
        }
    }
}

/// Errors raised while parsing or resolving a schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("parse error: {0}")]
    Syntax(String),

    #[error("duplicate definition: {0}")]
    Duplicate(String),

    #[error("unresolved reference '{name}' in {context}")]
    Unresolved { name: String, context: String },

    #[error("invalid definition of {context}: {reason}")]
    Invalid { context: String, reason: String },

    #[error("I/O: {0}")]
    Io(String),
}

fn range_text(lower: &Option<i64>, upper: &Option<i64>) -> String {
    let lo = lower.map_or_else(|| "MIN".to_string(), |v| v.to_string());
    let hi = upper.map_or_else(|| "MAX".to_string(), |v| v.to_string());
    format!("{}..{}", lo, hi)
}
