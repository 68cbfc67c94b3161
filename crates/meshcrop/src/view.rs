//! Presentation state. Nothing here affects cropping or export.

use meshcrop_math::{Aabb3, Point3};
use serde::{Deserialize, Serialize};

use crate::color::Color;

/// Viewport toggles owned by the engine on behalf of the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewOptions {
    /// Draw the crop-box outline.
    pub show_crop_box: bool,
    /// Outline colour.
    pub crop_box_color: Color,
    /// Draw the ground grid.
    pub show_grid: bool,
    /// Draw the axis helper.
    pub show_axes: bool,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            show_crop_box: true,
            crop_box_color: Color::default(),
            show_grid: true,
            show_axes: false,
        }
    }
}

/// Camera framing derived from the model bounds. The model itself is
/// never moved to fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Framing {
    /// World-space bounds of the model as positioned.
    pub bounds: Aabb3,
    /// Orbit target: the bounds centre.
    pub target: Point3,
    /// Radius of the sphere enclosing the bounds.
    pub radius: f64,
}

impl Framing {
    /// Framing for `bounds`; empty bounds frame a unit sphere at the origin.
    pub fn from_bounds(bounds: &Aabb3) -> Self {
        if bounds.is_empty() {
            return Self {
                bounds: *bounds,
                target: Point3::origin(),
                radius: 1.0,
            };
        }
        Self {
            bounds: *bounds,
            target: bounds.center(),
            radius: (bounds.size().norm() / 2.0).max(f64::EPSILON),
        }
    }

    /// Camera distance that fits the bounding sphere in a vertical field of
    /// view of `fov_y` radians.
    pub fn camera_distance(&self, fov_y: f64) -> f64 {
        let half = (fov_y / 2.0).clamp(1e-3, std::f64::consts::FRAC_PI_2);
        self.radius / half.sin()
    }
}
