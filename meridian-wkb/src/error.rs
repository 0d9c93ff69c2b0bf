//! Error type for the binary geometry codec.

use thiserror::Error;

/// Errors produced while decoding a binary geometry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WkbError {
    /// The buffer ended before the declared content.
    #[error("buffer too short: {expected} more bytes expected, {remaining} remaining")]
    UnexpectedEnd {
        /// Bytes the current read needed.
        expected: usize,
        /// Bytes left in the buffer.
        remaining: usize,
    },

    /// The byte-order marker is not little-endian.
    #[error("unsupported byte order marker: {0:#04x}")]
    InvalidByteOrder(u8),

    /// The type code does not name a supported geometry kind.
    #[error("unknown geometry type code: {0:#010x}")]
    UnknownType(u32),

    /// A sub-geometry of a multi geometry has the wrong type code.
    #[error("sub-geometry type mismatch: expected {expected}, got {got}")]
    SubGeometryType {
        /// Base type code the container requires.
        expected: u32,
        /// Base type code found in the buffer.
        got: u32,
    },
}
