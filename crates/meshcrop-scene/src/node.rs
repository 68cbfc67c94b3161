//! Scene graph nodes.

use meshcrop_math::{Aabb3, Transform};

use crate::{Geometry, GeometryDisposer};

/// Surface appearance carried through import and export.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    /// Material name from the source file.
    pub name: Option<String>,
    /// Linear RGBA base colour.
    pub base_color: [f32; 4],
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: None,
            base_color: [1.0, 1.0, 1.0, 1.0],
        }
    }
}

/// A renderable triangle mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    /// Vertex and index buffers.
    pub geometry: Geometry,
    /// Optional surface appearance.
    pub material: Option<Material>,
}

impl Mesh {
    /// Mesh with no material.
    pub fn new(geometry: Geometry) -> Self {
        Self {
            geometry,
            material: None,
        }
    }
}

/// What a node is, decided once when the scene is built.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Pure transform node.
    Group,
    /// Renderable triangles.
    Mesh(Mesh),
    /// Anything else the source declared (lines, points, cameras, ...).
    Other,
}

/// A node in the scene hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    /// Name from the source file.
    pub name: Option<String>,
    /// Node payload.
    pub kind: NodeKind,
    /// Child nodes, in file order.
    pub children: Vec<SceneNode>,
    local: Transform,
    world: Transform,
}

impl SceneNode {
    fn with_kind(name: Option<String>, kind: NodeKind) -> Self {
        Self {
            name,
            kind,
            children: Vec::new(),
            local: Transform::identity(),
            world: Transform::identity(),
        }
    }

    /// Create a transform-only node.
    pub fn group(name: impl Into<String>) -> Self {
        Self::with_kind(Some(name.into()), NodeKind::Group)
    }

    /// Create a mesh node.
    pub fn mesh(name: impl Into<String>, mesh: Mesh) -> Self {
        Self::with_kind(Some(name.into()), NodeKind::Mesh(mesh))
    }

    /// Create a node of any kind with an optional name.
    pub fn new(name: Option<String>, kind: NodeKind) -> Self {
        Self::with_kind(name, kind)
    }

    /// Builder: set the local transform.
    pub fn with_transform(mut self, local: Transform) -> Self {
        self.local = local;
        self
    }

    /// Builder: append a child.
    pub fn with_child(mut self, child: SceneNode) -> Self {
        self.children.push(child);
        self
    }

    /// Transform relative to the parent.
    pub fn local_transform(&self) -> &Transform {
        &self.local
    }

    /// Replace the local transform. The cached world transforms are left
    /// stale until [`SceneNode::update_world_transforms`] runs.
    pub fn set_local_transform(&mut self, local: Transform) {
        self.local = local;
    }

    /// Cached transform from local to world space.
    pub fn world_transform(&self) -> &Transform {
        &self.world
    }

    /// Recompute cached world transforms for this subtree, treating this
    /// node as a scene root.
    pub fn update_world_transforms(&mut self) {
        self.update_world_transforms_from(&Transform::identity());
    }

    /// Recompute cached world transforms below a parent world transform.
    pub fn update_world_transforms_from(&mut self, parent: &Transform) {
        self.world = parent.then(&self.local);
        let world = self.world;
        for child in &mut self.children {
            child.update_world_transforms_from(&world);
        }
    }

    /// The geometry of a mesh node.
    pub fn geometry(&self) -> Option<&Geometry> {
        match &self.kind {
            NodeKind::Mesh(mesh) => Some(&mesh.geometry),
            _ => None,
        }
    }

    /// Visit every node in the subtree, depth-first, parents before children.
    pub fn visit(&self, f: &mut impl FnMut(&SceneNode)) {
        f(self);
        for child in &self.children {
            child.visit(f);
        }
    }

    /// Number of nodes in the subtree, including this one.
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        self.visit(&mut |_| count += 1);
        count
    }

    /// Number of mesh nodes in the subtree.
    pub fn mesh_count(&self) -> usize {
        let mut count = 0;
        self.visit(&mut |node| {
            if node.geometry().is_some() {
                count += 1;
            }
        });
        count
    }

    /// Total triangles over every mesh in the subtree.
    pub fn triangle_count(&self) -> usize {
        let mut count = 0;
        self.visit(&mut |node| {
            count += node.geometry().map_or(0, Geometry::triangle_count);
        });
        count
    }

    /// World-space bounds of every mesh vertex in the subtree.
    ///
    /// Uses the cached world transforms; refresh them first.
    pub fn world_bounds(&self) -> Aabb3 {
        let mut bounds = Aabb3::empty();
        self.visit(&mut |node| {
            let Some(geometry) = node.geometry() else {
                return;
            };
            for i in 0..geometry.vertex_count() {
                if let Some(p) = geometry.position(i) {
                    bounds.include_point(&node.world.apply_point(&p));
                }
            }
        });
        bounds
    }

    /// Tear down the subtree, handing every geometry to `disposer`.
    pub fn dispose_with(self, disposer: &dyn GeometryDisposer) {
        if let NodeKind::Mesh(mesh) = self.kind {
            disposer.dispose(mesh.geometry);
        }
        for child in self.children {
            child.dispose_with(disposer);
        }
    }
}

/// Borrowed view of a scene tree, as seen by geometry passes such as cropping.
///
/// Passes read cached world transforms and may swap mesh geometry in place;
/// they never restructure the tree.
pub trait SceneTree {
    /// Cached local-to-world transform.
    fn world_transform(&self) -> &Transform;

    /// Geometry of a renderable mesh, `None` for every other node kind.
    fn geometry_mut(&mut self) -> Option<&mut Geometry>;

    /// Direct children.
    fn children_mut(&mut self) -> &mut [Self]
    where
        Self: Sized;
}

impl SceneTree for SceneNode {
    fn world_transform(&self) -> &Transform {
        &self.world
    }

    fn geometry_mut(&mut self) -> Option<&mut Geometry> {
        match &mut self.kind {
            NodeKind::Mesh(mesh) => Some(&mut mesh.geometry),
            _ => None,
        }
    }

    fn children_mut(&mut self) -> &mut [Self] {
        &mut self.children
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Attribute, POSITION};
    use approx::assert_relative_eq;
    use meshcrop_math::Point3;
    use std::cell::Cell;

    fn triangle_mesh() -> Mesh {
        Mesh::new(Geometry::new().with_attribute(
            POSITION,
            Attribute::new(3, vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]),
        ))
    }

    #[test]
    fn test_world_transform_chain() {
        let mut root = SceneNode::group("root")
            .with_transform(Transform::translation(10.0, 0.0, 0.0))
            .with_child(
                SceneNode::group("scaled")
                    .with_transform(Transform::scale(2.0, 2.0, 2.0))
                    .with_child(SceneNode::mesh("tri", triangle_mesh())),
            );
        root.update_world_transforms();

        let leaf = &root.children[0].children[0];
        let p = leaf.world_transform().apply_point(&Point3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(p, Point3::new(12.0, 0.0, 0.0));

        let bounds = root.world_bounds();
        assert_relative_eq!(bounds.min, Point3::new(10.0, 0.0, 0.0));
        assert_relative_eq!(bounds.max, Point3::new(12.0, 2.0, 0.0));
    }

    #[test]
    fn test_counts() {
        let root = SceneNode::group("root")
            .with_child(SceneNode::mesh("a", triangle_mesh()))
            .with_child(SceneNode::new(None, NodeKind::Other))
            .with_child(SceneNode::group("g").with_child(SceneNode::mesh("b", triangle_mesh())));
        assert_eq!(root.node_count(), 5);
        assert_eq!(root.mesh_count(), 2);
        assert_eq!(root.triangle_count(), 2);
    }

    #[test]
    fn test_dispose_visits_every_geometry() {
        struct Counter(Cell<usize>);
        impl GeometryDisposer for Counter {
            fn dispose(&self, _geometry: Geometry) {
                self.0.set(self.0.get() + 1);
            }
        }

        let root = SceneNode::group("root")
            .with_child(SceneNode::mesh("a", triangle_mesh()))
            .with_child(SceneNode::group("g").with_child(SceneNode::mesh("b", triangle_mesh())));
        let counter = Counter(Cell::new(0));
        root.dispose_with(&counter);
        assert_eq!(counter.0.get(), 2);
    }
}
