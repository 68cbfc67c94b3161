//! Vertex attribute buffers and triangle geometry.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use meshcrop_math::{Point3, Vec3};

/// Channel name of vertex positions.
pub const POSITION: &str = "POSITION";

/// Channel name of vertex normals.
pub const NORMAL: &str = "NORMAL";

/// Global atomic counter for unique geometry IDs.
static NEXT_GEOMETRY_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a [`Geometry`] allocation.
///
/// Every constructed or cloned geometry gets a fresh id, so callers can tell
/// a rebuilt geometry from the one it replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GeometryId(pub u64);

impl GeometryId {
    fn next() -> Self {
        Self(NEXT_GEOMETRY_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// One vertex channel: `count * item_size` floats, item-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    item_size: usize,
    values: Vec<f32>,
}

impl Attribute {
    /// Create a channel with `item_size` components per vertex.
    ///
    /// An `item_size` of zero is treated as one.
    pub fn new(item_size: usize, values: Vec<f32>) -> Self {
        Self {
            item_size: item_size.max(1),
            values,
        }
    }

    /// Components per vertex (3 for positions, 2 for UVs, ...).
    pub fn item_size(&self) -> usize {
        self.item_size
    }

    /// Flat component array.
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Number of complete items in the channel.
    pub fn count(&self) -> usize {
        self.values.len() / self.item_size
    }

    /// Components of item `index`.
    pub fn item(&self, index: usize) -> Option<&[f32]> {
        let start = index.checked_mul(self.item_size)?;
        self.values.get(start..start + self.item_size)
    }

    /// Copy of this channel holding only the items listed in `order`, in that order.
    ///
    /// Indices past the end of the channel produce zeroed items so every
    /// gathered channel keeps the same item count.
    pub fn gather(&self, order: &[u32]) -> Attribute {
        let mut values = Vec::with_capacity(order.len() * self.item_size);
        for &index in order {
            match self.item(index as usize) {
                Some(item) => values.extend_from_slice(item),
                None => values.extend(std::iter::repeat(0.0).take(self.item_size)),
            }
        }
        Attribute::new(self.item_size, values)
    }
}

/// Triangle geometry: named vertex channels plus an optional index buffer.
///
/// Without indices, every three consecutive vertices form one triangle.
#[derive(Debug, PartialEq)]
pub struct Geometry {
    id: GeometryId,
    attributes: BTreeMap<String, Attribute>,
    indices: Option<Vec<u32>>,
}

impl Geometry {
    /// Create an empty geometry.
    pub fn new() -> Self {
        Self {
            id: GeometryId::next(),
            attributes: BTreeMap::new(),
            indices: None,
        }
    }

    /// Builder: add or replace a channel.
    pub fn with_attribute(mut self, name: impl Into<String>, attribute: Attribute) -> Self {
        self.set_attribute(name, attribute);
        self
    }

    /// Builder: set the index buffer.
    pub fn with_indices(mut self, indices: Vec<u32>) -> Self {
        self.indices = Some(indices);
        self
    }

    /// Identity of this allocation.
    pub fn id(&self) -> GeometryId {
        self.id
    }

    /// Look up a channel by name.
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    /// All channels, ordered by name.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &Attribute)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Add or replace a channel.
    pub fn set_attribute(&mut self, name: impl Into<String>, attribute: Attribute) {
        self.attributes.insert(name.into(), attribute);
    }

    /// Remove a channel.
    pub fn remove_attribute(&mut self, name: &str) -> Option<Attribute> {
        self.attributes.remove(name)
    }

    /// Triangle indices, if the geometry is indexed.
    pub fn indices(&self) -> Option<&[u32]> {
        self.indices.as_deref()
    }

    /// Whether the geometry has an index buffer.
    pub fn is_indexed(&self) -> bool {
        self.indices.is_some()
    }

    /// The position channel.
    pub fn positions(&self) -> Option<&Attribute> {
        self.attribute(POSITION)
    }

    /// Number of vertices (items in the position channel).
    pub fn vertex_count(&self) -> usize {
        self.positions().map_or(0, Attribute::count)
    }

    /// Number of triangles described by the index buffer or the vertex layout.
    pub fn triangle_count(&self) -> usize {
        match &self.indices {
            Some(indices) => indices.len() / 3,
            None => self.vertex_count() / 3,
        }
    }

    /// Vertex indices of triangle `triangle`.
    pub fn triangle(&self, triangle: usize) -> Option<[u32; 3]> {
        if triangle >= self.triangle_count() {
            return None;
        }
        match &self.indices {
            Some(indices) => {
                let i = triangle * 3;
                Some([indices[i], indices[i + 1], indices[i + 2]])
            }
            None => {
                let base = u32::try_from(triangle * 3).ok()?;
                Some([base, base + 1, base + 2])
            }
        }
    }

    /// Local-space position of vertex `index`. Missing components read as zero.
    pub fn position(&self, index: usize) -> Option<Point3> {
        let item = self.positions()?.item(index)?;
        let component = |i: usize| item.get(i).copied().map_or(0.0, f64::from);
        Some(Point3::new(component(0), component(1), component(2)))
    }

    /// Regenerate the `NORMAL` channel from the triangles.
    ///
    /// Face normals are accumulated unnormalized (area weighted) on every
    /// vertex they touch, then normalized. Vertices touched by no valid
    /// triangle get a zero normal.
    pub fn compute_vertex_normals(&mut self) {
        let vertex_count = self.vertex_count();
        let mut accum = vec![Vec3::zeros(); vertex_count];

        for t in 0..self.triangle_count() {
            let Some([a, b, c]) = self.triangle(t) else {
                continue;
            };
            let (Some(pa), Some(pb), Some(pc)) = (
                self.position(a as usize),
                self.position(b as usize),
                self.position(c as usize),
            ) else {
                continue;
            };
            let face = (pc - pb).cross(&(pa - pb));
            for v in [a, b, c] {
                accum[v as usize] += face;
            }
        }

        let mut values = Vec::with_capacity(vertex_count * 3);
        for n in accum {
            let len = n.norm();
            let n = if len > 0.0 { n / len } else { n };
            values.extend_from_slice(&[n.x as f32, n.y as f32, n.z as f32]);
        }
        self.set_attribute(NORMAL, Attribute::new(3, values));
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Geometry {
    fn clone(&self) -> Self {
        Self {
            id: GeometryId::next(),
            attributes: self.attributes.clone(),
            indices: self.indices.clone(),
        }
    }
}
