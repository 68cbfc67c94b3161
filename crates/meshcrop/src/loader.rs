//! Source-to-scene loading, independent of engine state.
//!
//! A [`ModelLoader`] is cheap to clone, so a host can run a load without
//! holding a borrow of the engine across the await.

use std::rc::Rc;

use meshcrop_io::{
    ExternalResources, Fetcher, ModelFormat, ModelSource, ParserRegistry, SourceResolver,
};
use meshcrop_scene::{GeometryDisposer, SceneNode};

use crate::error::Result;
use crate::observer::LoadProgress;

/// Scene parsed from a source, not yet installed in an engine.
#[derive(Debug)]
pub struct LoadedScene {
    /// Top-level nodes of the parsed scene.
    pub roots: Vec<SceneNode>,
    /// Format the bytes were detected as.
    pub format: ModelFormat,
    /// URL the bytes were read from (object URLs are already revoked).
    pub url: String,
}

impl LoadedScene {
    /// Release every geometry in the scene.
    pub fn dispose_with(self, disposer: &dyn GeometryDisposer) {
        for root in self.roots {
            root.dispose_with(disposer);
        }
    }
}

/// Resolves a source and parses it.
pub struct ModelLoader<F> {
    resolver: Rc<SourceResolver<F>>,
    parsers: Rc<ParserRegistry>,
}

impl<F> Clone for ModelLoader<F> {
    fn clone(&self) -> Self {
        Self {
            resolver: Rc::clone(&self.resolver),
            parsers: Rc::clone(&self.parsers),
        }
    }
}

impl<F: Fetcher> ModelLoader<F> {
    /// Loader with the default parser registry.
    pub fn new(resolver: SourceResolver<F>) -> Self {
        Self::with_parsers(resolver, ParserRegistry::default())
    }

    /// Loader with a custom parser registry.
    pub fn with_parsers(resolver: SourceResolver<F>, parsers: ParserRegistry) -> Self {
        Self {
            resolver: Rc::new(resolver),
            parsers: Rc::new(parsers),
        }
    }

    /// The source resolver.
    pub fn resolver(&self) -> &SourceResolver<F> {
        &self.resolver
    }

    /// The parser registry.
    pub fn parsers(&self) -> &ParserRegistry {
        &self.parsers
    }

    /// Resolve `source` and parse it.
    ///
    /// Any object URL minted for the source is revoked before returning,
    /// whether parsing succeeded or not.
    pub async fn load(
        &self,
        source: ModelSource,
        progress: &mut dyn FnMut(LoadProgress),
    ) -> Result<LoadedScene> {
        progress(LoadProgress {
            percentage: 0.0,
            bytes_loaded: 0,
            bytes_total: None,
            message: "resolving source".into(),
        });
        let resolved = self.resolver.resolve(source).await?;
        tracing::info!(url = %short_url(&resolved.url), format = %resolved.format, bytes = resolved.bytes.len(), "model source resolved");

        // Files stored next to the model (glTF `.bin` buffers) resolve
        // against the model's own URL.
        let mut resources = ExternalResources::new();
        for reference in self.parsers.external_references(resolved.format, &resolved.bytes)? {
            progress(LoadProgress {
                percentage: 0.0,
                bytes_loaded: 0,
                bytes_total: None,
                message: format!("fetching {reference}"),
            });
            let resource = self.resolver.resolve_reference(&resolved.url, &reference).await?;
            tracing::debug!(%reference, bytes = resource.bytes.len(), "external resource read");
            resources.insert(reference, resource.bytes);
        }

        let stage = format!("parsing {}", resolved.format);
        let roots = self.parsers.parse_with_resources(
            resolved.format,
            &resolved.bytes,
            &resources,
            &mut |p| {
                progress(LoadProgress {
                    percentage: p.percentage().unwrap_or(0.0),
                    bytes_loaded: p.loaded,
                    bytes_total: p.total,
                    message: stage.clone(),
                })
            },
        )?;

        let total = resolved.bytes.len() as u64;
        progress(LoadProgress {
            percentage: 100.0,
            bytes_loaded: total,
            bytes_total: Some(total),
            message: "parsed".into(),
        });
        Ok(LoadedScene {
            roots,
            format: resolved.format,
            url: resolved.url,
        })
    }
}

/// Keeps `data:` URLs out of logs.
pub(crate) fn short_url(url: &str) -> &str {
    if url.starts_with("data:") {
        url.split_once(',').map_or(url, |(meta, _)| meta)
    } else {
        url
    }
}
