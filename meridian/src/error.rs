//! Error types of the engine.

use meridian_wkb::WkbError;
use thiserror::Error;

use crate::transform::TransformError;

/// Top level error type of the engine.
#[derive(Debug, Error)]
pub enum MeridianError {
    /// Feature geometry could not be decoded from its binary form.
    #[error("failed to decode feature geometry: {0}")]
    Decoding(#[from] WkbError),

    /// Coordinate transformation failed.
    #[error(transparent)]
    Transform(#[from] TransformError),

    /// The requested operation is not supported by the feature source.
    #[error("operation is not supported by the feature source")]
    Unsupported,
}
