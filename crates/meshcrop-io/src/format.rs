//! Model format detection.
//!
//! Detection is a fallback chain, first match wins:
//!
//! 1. filename or URL suffix (`.glb`, `.gltf`, `.fbx`, case-insensitive)
//! 2. declared MIME type, unless it is a generic one
//! 3. magic bytes in the first [`SNIFF_LEN`] bytes
//!
//! Anything else is [`ModelFormat::Unknown`], which callers route to the
//! glTF-family parser as a best guess.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How many leading bytes the sniffer looks at.
pub const SNIFF_LEN: usize = 64;

const GLB_MAGIC: &[u8] = b"glTF";
const FBX_MAGIC: &[u8] = b"Kaydara FBX Binary";

/// MIME types that say nothing about the content.
const GENERIC_MIME_TYPES: [&str; 3] = [
    "text/plain",
    "application/octet-stream",
    "binary/octet-stream",
];

/// Detected model container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelFormat {
    /// Binary glTF container.
    Glb,
    /// JSON glTF.
    Gltf,
    /// Autodesk FBX.
    Fbx,
    /// Nothing matched.
    Unknown,
}

impl ModelFormat {
    /// Lowercase tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Glb => "glb",
            Self::Gltf => "gltf",
            Self::Fbx => "fbx",
            Self::Unknown => "unknown",
        }
    }

    /// True for everything but [`ModelFormat::Unknown`].
    pub fn is_known(&self) -> bool {
        *self != Self::Unknown
    }
}

impl fmt::Display for ModelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Format from a filename or URL by exact suffix.
///
/// Anything after the extension, a query string included, defeats the
/// match: `model.glb?v=1` is unknown.
pub fn model_format_from_name(name: &str) -> ModelFormat {
    let lower = name.to_ascii_lowercase();
    if lower.ends_with(".glb") {
        ModelFormat::Glb
    } else if lower.ends_with(".gltf") {
        ModelFormat::Gltf
    } else if lower.ends_with(".fbx") {
        ModelFormat::Fbx
    } else {
        ModelFormat::Unknown
    }
}

/// Format from a declared MIME type.
///
/// Generic types are ignored. Any type mentioning `gltf` or `glb` maps to
/// [`ModelFormat::Glb`]; the glTF parser reads both containers.
pub fn model_format_from_mime(mime: &str) -> ModelFormat {
    let mime = mime.trim().to_ascii_lowercase();
    if mime.is_empty() || GENERIC_MIME_TYPES.contains(&mime.as_str()) {
        return ModelFormat::Unknown;
    }
    if mime.contains("fbx") {
        ModelFormat::Fbx
    } else if mime.contains("gltf") || mime.contains("glb") {
        ModelFormat::Glb
    } else {
        ModelFormat::Unknown
    }
}

/// Format from the leading bytes of the content.
pub fn sniff_model_format(bytes: &[u8]) -> ModelFormat {
    let head = &bytes[..bytes.len().min(SNIFF_LEN)];
    if head.starts_with(GLB_MAGIC) {
        return ModelFormat::Glb;
    }
    if head.starts_with(FBX_MAGIC) {
        return ModelFormat::Fbx;
    }
    match head.iter().find(|b| !b.is_ascii_whitespace()) {
        Some(b'{') => ModelFormat::Gltf,
        _ => ModelFormat::Unknown,
    }
}

/// Run the full detection chain over whatever is known about a source.
pub fn detect_model_format(
    name: Option<&str>,
    mime: Option<&str>,
    bytes: Option<&[u8]>,
) -> ModelFormat {
    [
        name.map(model_format_from_name),
        mime.map(model_format_from_mime),
        bytes.map(sniff_model_format),
    ]
    .into_iter()
    .flatten()
    .find(ModelFormat::is_known)
    .unwrap_or(ModelFormat::Unknown)
}
