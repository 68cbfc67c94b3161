#![warn(missing_docs)]

//! Scene graph for meshcrop.
//!
//! A loaded model is a tree of [`SceneNode`]s. Each node carries a local
//! transform, a cached world transform and a closed [`NodeKind`] tag decided
//! once by the parser adapter: `Group`, `Mesh` (owning a [`Geometry`]) or
//! `Other` (lines, points, cameras; never cropped).
//!
//! Geometry buffers are stored by channel name, generic over however many
//! channels a file declares.

mod dispose;
mod geometry;
mod node;

pub use dispose::{DropDisposer, GeometryDisposer};
pub use geometry::{Attribute, Geometry, GeometryId, NORMAL, POSITION};
pub use node::{Material, Mesh, NodeKind, SceneNode, SceneTree};

pub use meshcrop_math;
