//! Error types for model input and output.

use thiserror::Error;

use crate::format::ModelFormat;

/// Errors reading bytes from a model source.
#[derive(Error, Debug)]
pub enum SourceError {
    /// Network or host fetch failed.
    #[error("failed to fetch {url}: {reason}")]
    Fetch {
        /// URL that was requested.
        url: String,
        /// Host-provided failure description.
        reason: String,
    },

    /// Object URL was revoked or never created.
    #[error("object URL {0} is not registered")]
    UnknownObjectUrl(String),

    /// `data:` URL without a payload separator.
    #[error("malformed data URL: {0}")]
    MalformedDataUrl(String),

    /// `data:` URL payload is not valid base64.
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    /// No fetcher is available for remote URLs.
    #[error("cannot fetch {0}: no network access configured")]
    Offline(String),

    /// A relative reference inside a model whose URL cannot anchor it.
    #[error("cannot resolve {reference} relative to {base}")]
    UnresolvableReference {
        /// Reference as written in the model.
        reference: String,
        /// URL of the model that holds the reference.
        base: String,
    },
}

/// Errors turning bytes into a scene graph.
#[derive(Error, Debug)]
pub enum ParseError {
    /// glTF/GLB decoding or validation failed.
    #[error("glTF decode failed: {0}")]
    Gltf(#[from] gltf::Error),

    /// Nothing is registered for the detected format.
    #[error("no parser registered for {0} models")]
    NoParser(ModelFormat),

    /// A buffer stored outside the file was not supplied.
    #[error("external resource {0} was not provided")]
    MissingResource(String),

    /// A buffer is unreadable or shorter than declared.
    #[error("buffer {index}: {reason}")]
    Buffer {
        /// Buffer index in the document.
        index: usize,
        /// What is wrong with it.
        reason: String,
    },

    /// The file decoded but holds something this crate cannot represent.
    #[error("unsupported content: {0}")]
    Unsupported(String),
}

/// Errors serializing a scene graph.
#[derive(Error, Debug)]
pub enum ExportError {
    /// JSON chunk serialization failed.
    #[error("failed to serialize glTF JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// GLB lengths are 32-bit.
    #[error("GLB output exceeds 4 GiB")]
    TooLarge,
}
