//! Error types for the engine and widget.

use meshcrop_crop::CropError;
use meshcrop_io::{ExportError, ParseError, SourceError};
use thiserror::Error;

/// Errors surfaced by [`crate::ModelEngine`] and [`crate::CropWidget`].
#[derive(Error, Debug)]
pub enum EngineError {
    /// The source could not be read.
    #[error("failed to read model source: {0}")]
    Source(#[from] SourceError),

    /// The bytes could not be turned into a scene.
    #[error("failed to parse model: {0}")]
    Parse(#[from] ParseError),

    /// The scene could not be serialized.
    #[error("failed to export model: {0}")]
    Export(#[from] ExportError),

    /// Invalid crop parameters.
    #[error(transparent)]
    Crop(#[from] CropError),

    /// The widget has no engine yet.
    #[error("viewer is not initialized")]
    NotInitialized,

    /// Export requested with nothing loaded.
    #[error("no model loaded")]
    NoModelLoaded,

    /// Export requested before the current crop was applied.
    #[error("crop has not been applied since the last crop box or transform change")]
    CropNotApplied,

    /// A newer load was started before this one finished.
    #[error("load superseded by a newer request")]
    LoadSuperseded,

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
