//! Release of geometry resources.

use crate::Geometry;

/// Receives geometries that are no longer referenced by the scene.
///
/// Renderers that mirror geometry into GPU buffers implement this to free
/// them. The scene never keeps a discarded geometry around after handing
/// it over.
pub trait GeometryDisposer {
    /// Release everything backing `geometry`.
    fn dispose(&self, geometry: Geometry);
}

/// Disposer that simply drops the buffers.
#[derive(Debug, Default, Clone, Copy)]
pub struct DropDisposer;

impl GeometryDisposer for DropDisposer {
    fn dispose(&self, geometry: Geometry) {
        tracing::trace!(id = geometry.id().0, "dropping geometry");
        drop(geometry);
    }
}
