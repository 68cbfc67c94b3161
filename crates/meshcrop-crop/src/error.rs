//! Error types for crop configuration.

use thiserror::Error;

/// Errors raised while configuring a crop.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CropError {
    /// Strategy name not recognised.
    #[error("unknown crop strategy '{0}' (expected centroid, all-vertices or any-vertex)")]
    UnknownStrategy(String),

    /// Crop-box field name not recognised.
    #[error("unknown crop box field '{0}'")]
    UnknownField(String),
}

/// Result type for crop configuration.
pub type Result<T> = std::result::Result<T, CropError>;
