//! Parser capability and per-format registry.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use meshcrop_scene::SceneNode;

use crate::error::ParseError;
use crate::format::ModelFormat;
use crate::gltf_import::GltfParser;

/// Byte-level parse progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteProgress {
    /// Bytes consumed so far.
    pub loaded: u64,
    /// Total bytes, when known.
    pub total: Option<u64>,
}

impl ByteProgress {
    /// Progress as a percentage in `0..=100`, when the total is known.
    pub fn percentage(&self) -> Option<f64> {
        match self.total {
            Some(0) => Some(100.0),
            Some(total) => Some((self.loaded as f64 / total as f64 * 100.0).clamp(0.0, 100.0)),
            None => None,
        }
    }
}

/// Contents of files a model refers to, keyed by the reference exactly as
/// written in the model.
pub type ExternalResources = HashMap<String, Rc<[u8]>>;

/// Converts model bytes into scene roots.
pub trait MeshParser {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Parse `bytes` into the top-level nodes of the model's scene.
    ///
    /// `progress` may be called any number of times.
    fn parse(
        &self,
        bytes: &[u8],
        progress: &mut dyn FnMut(ByteProgress),
    ) -> Result<Vec<SceneNode>, ParseError>;

    /// Relative references to other files that parsing `bytes` needs.
    fn external_references(&self, _bytes: &[u8]) -> Result<Vec<String>, ParseError> {
        Ok(Vec::new())
    }

    /// [`MeshParser::parse`] with the files named by
    /// [`MeshParser::external_references`] already read.
    fn parse_with_resources(
        &self,
        bytes: &[u8],
        _resources: &ExternalResources,
        progress: &mut dyn FnMut(ByteProgress),
    ) -> Result<Vec<SceneNode>, ParseError> {
        self.parse(bytes, progress)
    }
}

/// Maps detected formats to parsers.
///
/// [`ModelFormat::Unknown`] falls back to the parser registered for
/// [`ModelFormat::Gltf`]. The default registry handles GLB and glTF; FBX
/// needs a parser registered by the host.
#[derive(Clone)]
pub struct ParserRegistry {
    parsers: HashMap<ModelFormat, Rc<dyn MeshParser>>,
}

impl ParserRegistry {
    /// Registry with nothing registered.
    pub fn empty() -> Self {
        Self {
            parsers: HashMap::new(),
        }
    }

    /// Register `parser` for `format`, replacing any previous one.
    pub fn register(&mut self, format: ModelFormat, parser: Rc<dyn MeshParser>) {
        self.parsers.insert(format, parser);
    }

    /// Builder form of [`ParserRegistry::register`].
    pub fn with(mut self, format: ModelFormat, parser: Rc<dyn MeshParser>) -> Self {
        self.register(format, parser);
        self
    }

    /// Parser that will handle `format`, after the unknown-format fallback.
    pub fn parser_for(&self, format: ModelFormat) -> Option<&Rc<dyn MeshParser>> {
        let effective = match format {
            ModelFormat::Unknown => ModelFormat::Gltf,
            other => other,
        };
        self.parsers.get(&effective)
    }

    /// Parse `bytes` with the parser for `format`.
    pub fn parse(
        &self,
        format: ModelFormat,
        bytes: &[u8],
        progress: &mut dyn FnMut(ByteProgress),
    ) -> Result<Vec<SceneNode>, ParseError> {
        self.parse_with_resources(format, bytes, &ExternalResources::new(), progress)
    }

    /// Files outside `bytes` that the parser for `format` will ask for.
    /// Empty when no parser is registered.
    pub fn external_references(
        &self,
        format: ModelFormat,
        bytes: &[u8],
    ) -> Result<Vec<String>, ParseError> {
        match self.parser_for(format) {
            Some(parser) => parser.external_references(bytes),
            None => Ok(Vec::new()),
        }
    }

    /// Parse `bytes` with the parser for `format`, handing it `resources`.
    pub fn parse_with_resources(
        &self,
        format: ModelFormat,
        bytes: &[u8],
        resources: &ExternalResources,
        progress: &mut dyn FnMut(ByteProgress),
    ) -> Result<Vec<SceneNode>, ParseError> {
        let parser = self
            .parser_for(format)
            .ok_or(ParseError::NoParser(format))?;
        if format == ModelFormat::Unknown {
            tracing::warn!(parser = parser.name(), "format not detected, guessing glTF");
        }
        parser.parse_with_resources(bytes, resources, progress)
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        let gltf: Rc<dyn MeshParser> = Rc::new(GltfParser);
        Self::empty()
            .with(ModelFormat::Glb, Rc::clone(&gltf))
            .with(ModelFormat::Gltf, gltf)
    }
}

impl fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (format, parser) in &self.parsers {
            map.entry(format, &parser.name());
        }
        map.finish()
    }
}
