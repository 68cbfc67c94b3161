#![warn(missing_docs)]

//! Model input and output for meshcrop.
//!
//! - [`format`]: filename, MIME and magic-byte format detection
//! - [`source`]: turning URLs, files and blobs into bytes plus a format
//! - [`parser`]: the parser capability and its per-format registry
//! - [`gltf_import`]: glTF 2.0 / GLB parser built on the `gltf` crate
//! - [`glb_export`]: binary glTF writer

pub mod error;
pub mod format;
pub mod glb_export;
pub mod gltf_import;
pub mod parser;
pub mod source;

pub use error::{ExportError, ParseError, SourceError};
pub use format::{
    detect_model_format, model_format_from_mime, model_format_from_name, sniff_model_format,
    ModelFormat,
};
pub use glb_export::{GlbExporter, MeshExporter};
pub use gltf_import::GltfParser;
pub use parser::{ByteProgress, ExternalResources, MeshParser, ParserRegistry};
pub use source::{
    decode_data_url, join_url, FetchedBytes, Fetcher, ModelSource, ObjectUrl, ObjectUrlStore,
    OfflineFetcher, ResolvedSource, SourceResolver, OBJECT_URL_PREFIX,
};
