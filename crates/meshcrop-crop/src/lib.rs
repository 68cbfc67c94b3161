#![warn(missing_docs)]

//! Cheap cropping for meshcrop.
//!
//! Triangles are wholly kept or wholly discarded against an axis-aligned
//! world-space [`CropBox`]; no geometry is synthesized at the boundary.
//!
//! # Example
//!
//! ```rust
//! use meshcrop_crop::{crop_scene, CropBox, CropOptions};
//! use meshcrop_scene::{Attribute, DropDisposer, Geometry, Mesh, SceneNode, POSITION};
//!
//! let geometry = Geometry::new().with_attribute(
//!     POSITION,
//!     Attribute::new(3, vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]),
//! );
//! let mut root = SceneNode::group("root").with_child(SceneNode::mesh("tri", Mesh::new(geometry)));
//! root.update_world_transforms();
//!
//! let crop_box = CropBox::new(-1.0, 2.0, -1.0, 2.0, -1.0, 1.0);
//! let result = crop_scene(&mut root, &crop_box, &CropOptions::default(), &DropDisposer);
//! assert_eq!(result.triangles_kept, 1);
//! ```

pub mod crop_box;
pub mod cropper;
pub mod error;

pub use crop_box::{is_point_in_crop_box, CropBox, CropBoxField};
pub use cropper::{
    crop_geometry, crop_scene, keep_triangle, CropOptions, CropResult, CropStrategy, GeometryCrop,
};
pub use error::{CropError, Result};
