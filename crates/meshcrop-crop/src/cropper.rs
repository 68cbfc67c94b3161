//! Triangle-pruning cropper.
//!
//! Each triangle is tested in world space against the crop box and either
//! kept whole or dropped. Geometries that lose at least one triangle are
//! rebuilt with compacted vertex channels and swapped in place; the old
//! geometry goes to the caller's [`GeometryDisposer`].

use std::fmt;
use std::str::FromStr;

use meshcrop_math::{Point3, Transform};
use meshcrop_scene::{Geometry, GeometryDisposer, SceneTree};
use serde::{Deserialize, Serialize};

use crate::crop_box::CropBox;
use crate::error::CropError;

/// How a triangle is tested against the crop box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CropStrategy {
    /// Keep when the mean of the three vertices is inside.
    #[default]
    Centroid,
    /// Keep when all three vertices are inside.
    AllVertices,
    /// Keep when at least one vertex is inside.
    AnyVertex,
}

impl CropStrategy {
    /// Kebab-case name used in configuration and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Centroid => "centroid",
            Self::AllVertices => "all-vertices",
            Self::AnyVertex => "any-vertex",
        }
    }
}

impl fmt::Display for CropStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CropStrategy {
    type Err = CropError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "centroid" => Ok(Self::Centroid),
            "all-vertices" | "allvertices" | "all" => Ok(Self::AllVertices),
            "any-vertex" | "anyvertex" | "any" => Ok(Self::AnyVertex),
            _ => Err(CropError::UnknownStrategy(s.to_string())),
        }
    }
}

/// Crop parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CropOptions {
    /// Keep predicate.
    pub strategy: CropStrategy,
    /// Regenerate vertex normals on rebuilt geometries.
    pub recompute_normals: bool,
}

impl Default for CropOptions {
    fn default() -> Self {
        Self {
            strategy: CropStrategy::Centroid,
            recompute_normals: true,
        }
    }
}

/// Aggregate outcome of one crop call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CropResult {
    /// False only when there was nothing to crop (no model loaded).
    pub success: bool,
    /// Triangles discarded across all meshes.
    pub triangles_removed: usize,
    /// Triangles surviving across all meshes.
    pub triangles_kept: usize,
    /// Meshes that had a position channel.
    pub meshes_processed: usize,
}

impl CropResult {
    /// Result reported when no crop could run.
    pub fn not_applied() -> Self {
        Self::default()
    }
}

/// Outcome of cropping a single geometry.
#[derive(Debug)]
pub struct GeometryCrop {
    /// Triangles surviving.
    pub triangles_kept: usize,
    /// Triangles discarded.
    pub triangles_removed: usize,
    /// Replacement geometry; `None` when nothing was removed.
    pub rebuilt: Option<Geometry>,
}

/// Apply the keep predicate to one world-space triangle.
pub fn keep_triangle(strategy: CropStrategy, corners: &[Point3; 3], crop_box: &CropBox) -> bool {
    match strategy {
        CropStrategy::Centroid => {
            let [a, b, c] = corners;
            let centroid = Point3::new(
                (a.x + b.x + c.x) / 3.0,
                (a.y + b.y + c.y) / 3.0,
                (a.z + b.z + c.z) / 3.0,
            );
            crop_box.contains(&centroid)
        }
        CropStrategy::AllVertices => corners.iter().all(|p| crop_box.contains(p)),
        CropStrategy::AnyVertex => corners.iter().any(|p| crop_box.contains(p)),
    }
}

/// Crop one geometry whose vertices map to world space through `world`.
///
/// Returns `None` when the geometry has no position channel. Triangles
/// referencing vertices past the end of the position channel are dropped.
pub fn crop_geometry(
    geometry: &Geometry,
    world: &Transform,
    crop_box: &CropBox,
    options: &CropOptions,
) -> Option<GeometryCrop> {
    geometry.positions()?;

    let vertex_count = geometry.vertex_count();
    let triangle_count = geometry.triangle_count();
    let world_positions: Vec<Option<Point3>> = (0..vertex_count)
        .map(|i| geometry.position(i).map(|p| world.apply_point(&p)))
        .collect();

    let mut kept = Vec::with_capacity(triangle_count);
    let mut malformed = 0usize;
    for t in 0..triangle_count {
        let Some(tri) = geometry.triangle(t) else {
            continue;
        };
        let corner = |i: u32| world_positions.get(i as usize).copied().flatten();
        match (corner(tri[0]), corner(tri[1]), corner(tri[2])) {
            (Some(a), Some(b), Some(c)) => {
                if keep_triangle(options.strategy, &[a, b, c], crop_box) {
                    kept.push(tri);
                }
            }
            _ => malformed += 1,
        }
    }
    if malformed > 0 {
        tracing::warn!(
            geometry = geometry.id().0,
            malformed,
            "dropping triangles with out-of-range vertex indices"
        );
    }

    let triangles_kept = kept.len();
    let triangles_removed = triangle_count - triangles_kept;
    if triangles_removed == 0 {
        return Some(GeometryCrop {
            triangles_kept,
            triangles_removed,
            rebuilt: None,
        });
    }

    Some(GeometryCrop {
        triangles_kept,
        triangles_removed,
        rebuilt: Some(rebuild(geometry, &kept, vertex_count, options)),
    })
}

/// Build a geometry holding only `kept` triangles.
///
/// Vertices are renumbered in first-encounter order. Every channel is
/// gathered into that order, whatever its name or item size.
fn rebuild(
    geometry: &Geometry,
    kept: &[[u32; 3]],
    vertex_count: usize,
    options: &CropOptions,
) -> Geometry {
    let mut remap = vec![u32::MAX; vertex_count];
    let mut order: Vec<u32> = Vec::new();
    let mut indices = Vec::with_capacity(kept.len() * 3);

    for tri in kept {
        for &v in tri {
            let slot = &mut remap[v as usize];
            if *slot == u32::MAX {
                *slot = order.len() as u32;
                order.push(v);
            }
            indices.push(*slot);
        }
    }

    let mut rebuilt = Geometry::new();
    for (name, attribute) in geometry.attributes() {
        rebuilt.set_attribute(name, attribute.gather(&order));
    }
    if geometry.is_indexed() {
        rebuilt = rebuilt.with_indices(indices);
    }
    if options.recompute_normals {
        rebuilt.compute_vertex_normals();
    }
    rebuilt
}

/// Crop every mesh below `root` against `crop_box`.
///
/// World transforms are read from the tree as cached; the caller refreshes
/// them first. Replaced geometries are handed to `disposer`.
pub fn crop_scene<T: SceneTree>(
    root: &mut T,
    crop_box: &CropBox,
    options: &CropOptions,
    disposer: &dyn GeometryDisposer,
) -> CropResult {
    let mut result = CropResult {
        success: true,
        ..CropResult::default()
    };
    crop_node(root, crop_box, options, disposer, &mut result);
    tracing::debug!(
        kept = result.triangles_kept,
        removed = result.triangles_removed,
        meshes = result.meshes_processed,
        strategy = %options.strategy,
        "crop finished"
    );
    result
}

fn crop_node<T: SceneTree>(
    node: &mut T,
    crop_box: &CropBox,
    options: &CropOptions,
    disposer: &dyn GeometryDisposer,
    result: &mut CropResult,
) {
    let world = *node.world_transform();
    if let Some(geometry) = node.geometry_mut() {
        if let Some(outcome) = crop_geometry(geometry, &world, crop_box, options) {
            result.meshes_processed += 1;
            result.triangles_kept += outcome.triangles_kept;
            result.triangles_removed += outcome.triangles_removed;
            if let Some(rebuilt) = outcome.rebuilt {
                tracing::debug!(
                    old = geometry.id().0,
                    new = rebuilt.id().0,
                    kept = outcome.triangles_kept,
                    removed = outcome.triangles_removed,
                    "replacing cropped geometry"
                );
                let old = std::mem::replace(geometry, rebuilt);
                disposer.dispose(old);
            }
        } else {
            tracing::debug!(geometry = geometry.id().0, "skipping mesh without positions");
        }
    }
    for child in node.children_mut() {
        crop_node(child, crop_box, options, disposer, result);
    }
}
