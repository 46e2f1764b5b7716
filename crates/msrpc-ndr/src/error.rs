//! NDR error types

use std::fmt;
use thiserror::Error;

/// Default cap on the number of elements a single decoded array may hold.
pub const MAX_NDR_ARRAY_ELEMENTS: usize = 16 * 1024 * 1024;

/// Codec stage that raised an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Alignment,
    Primitive,
    Pointer,
    Array,
    Union,
    String,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Alignment => "alignment",
            Stage::Primitive => "primitive",
            Stage::Pointer => "pointer",
            Stage::Array => "array",
            Stage::Union => "union",
            Stage::String => "string",
        };
        f.write_str(name)
    }
}

/// NDR encoding/decoding errors
#[derive(Debug, Error)]
pub enum NdrError {
    /// Buffer exhausted in the middle of a value
    #[error("{stage}: unexpected end of buffer: needed {needed} bytes, have {have}")]
    UnexpectedEof { stage: Stage, needed: usize, have: usize },

    /// A declared length would read past the end of the buffer
    #[error("{stage}: declared length overflows buffer: needs {needed} bytes, have {have}")]
    BufferOverflow { stage: Stage, needed: u64, have: usize },

    /// Union selector with no matching arm
    #[error("union: unknown variant for selector {selector}")]
    UnknownVariant { selector: u32 },

    /// Caller-supplied length exceeds a static maximum
    #[error("{field} is out of range: {value} > {max}")]
    InvalidLength { field: &'static str, value: u64, max: u64 },

    /// Conformance/variance headers disagree or use an unsupported offset
    #[error("{stage}: length mismatch: max_count={max_count}, offset={offset}, actual_count={actual_count}")]
    LengthMismatch {
        stage: Stage,
        max_count: u64,
        offset: u64,
        actual_count: u64,
    },

    /// Invalid string contents
    #[error("string: invalid contents: {0}")]
    InvalidString(String),

    /// Referent id that cannot be bound
    #[error("pointer: invalid referent id {referent_id:#x}: {reason}")]
    InvalidPointer { referent_id: u64, reason: &'static str },

    /// Enum value that does not fit the wire representation
    #[error("invalid enum value: {0}")]
    InvalidEnumValue(u32),

    /// Decoded array larger than the configured cap
    #[error("array: allocation of {requested} elements exceeds limit {limit}")]
    AllocationLimitExceeded { requested: u64, limit: usize },
}

impl NdrError {
    /// The codec stage this error was raised in.
    pub fn stage(&self) -> Stage {
        match self {
            NdrError::UnexpectedEof { stage, .. }
            | NdrError::BufferOverflow { stage, .. }
            | NdrError::LengthMismatch { stage, .. } => *stage,
            NdrError::UnknownVariant { .. } | NdrError::InvalidEnumValue(_) => Stage::Union,
            NdrError::InvalidLength { .. } | NdrError::AllocationLimitExceeded { .. } => Stage::Array,
            NdrError::InvalidString(_) => Stage::String,
            NdrError::InvalidPointer { .. } => Stage::Pointer,
        }
    }

    /// Whether callers may skip this error and keep decoding.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, NdrError::UnknownVariant { .. })
    }
}

/// Result type for NDR operations
pub type Result<T> = std::result::Result<T, NdrError>;

/// Reject `value` when it exceeds a protocol-declared static maximum.
///
/// Used from `ndr_prepare` so that nothing is written for an out-of-range
/// field.
pub fn check_range(field: &'static str, value: u64, max: u64) -> Result<()> {
    if value > max {
        return Err(NdrError::InvalidLength { field, value, max });
    }
    Ok(())
}
