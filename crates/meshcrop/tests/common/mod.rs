//! Fixtures shared by the engine integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use meshcrop::{EngineObserver, FetchedBytes, Fetcher, LoadProgress, LoadingState};
use meshcrop_io::{GlbExporter, MeshExporter, SourceError};
use meshcrop_scene::{Attribute, Geometry, GeometryDisposer, Mesh, SceneNode, POSITION};

/// `quads` unit quads along +X at z = 0, indexed, with a UV channel.
pub fn strip(quads: u32) -> Geometry {
    let mut positions = Vec::new();
    let mut uvs = Vec::new();
    for i in 0..=quads {
        for y in [0.0, 1.0] {
            positions.extend_from_slice(&[i as f32, y, 0.0]);
            uvs.extend_from_slice(&[i as f32 / quads as f32, y]);
        }
    }
    let mut indices = Vec::new();
    for i in 0..quads {
        let (a, b, c, d) = (2 * i, 2 * i + 1, 2 * i + 2, 2 * i + 3);
        indices.extend_from_slice(&[a, c, d, a, d, b]);
    }
    Geometry::new()
        .with_attribute(POSITION, Attribute::new(3, positions))
        .with_attribute("TEXCOORD_0", Attribute::new(2, uvs))
        .with_indices(indices)
}

/// GLB bytes for a strip of `quads` quads under a named root.
pub fn strip_glb(quads: u32) -> Vec<u8> {
    let root = SceneNode::group("scene").with_child(SceneNode::mesh("strip", Mesh::new(strip(quads))));
    GlbExporter::default().export(&root).unwrap()
}

/// Serves canned responses by URL.
#[derive(Default)]
pub struct MapFetcher {
    responses: HashMap<String, FetchedBytes>,
}

impl MapFetcher {
    pub fn with(mut self, url: &str, bytes: Vec<u8>, content_type: Option<&str>) -> Self {
        self.responses.insert(
            url.to_string(),
            FetchedBytes {
                bytes,
                content_type: content_type.map(str::to_string),
            },
        );
        self
    }
}

impl Fetcher for MapFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedBytes, SourceError> {
        self.responses
            .get(url)
            .cloned()
            .ok_or_else(|| SourceError::Fetch {
                url: url.to_string(),
                reason: "404 Not Found".into(),
            })
    }
}

/// Records every notification.
#[derive(Default)]
pub struct Recorder {
    pub states: RefCell<Vec<LoadingState>>,
    pub errors: RefCell<Vec<String>>,
    pub progress: RefCell<Vec<LoadProgress>>,
}

impl EngineObserver for Recorder {
    fn on_state_change(&self, state: LoadingState) {
        self.states.borrow_mut().push(state);
    }

    fn on_error(&self, message: &str) {
        self.errors.borrow_mut().push(message.to_string());
    }

    fn on_progress(&self, progress: &LoadProgress) {
        self.progress.borrow_mut().push(progress.clone());
    }
}

/// Counts disposed geometries.
#[derive(Default)]
pub struct CountingDisposer {
    pub disposed: RefCell<usize>,
}

impl GeometryDisposer for CountingDisposer {
    fn dispose(&self, _geometry: Geometry) {
        *self.disposed.borrow_mut() += 1;
    }
}

pub fn recorder() -> Rc<Recorder> {
    Rc::new(Recorder::default())
}
