//! The crop volume and the point-membership predicate.

use std::str::FromStr;

use meshcrop_math::{Aabb3, Point3};
use serde::{Deserialize, Serialize};

use crate::error::CropError;

/// Axis-aligned crop volume in world-space units.
///
/// `min > max` on any axis is legal and describes an empty region: no
/// point is inside it. Boxes are values; edits produce new boxes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CropBox {
    /// Lower X bound.
    pub min_x: f64,
    /// Upper X bound.
    pub max_x: f64,
    /// Lower Y bound.
    pub min_y: f64,
    /// Upper Y bound.
    pub max_y: f64,
    /// Lower Z bound.
    pub min_z: f64,
    /// Upper Z bound.
    pub max_z: f64,
}

/// Names one of the six scalars of a [`CropBox`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CropBoxField {
    /// `min_x`
    MinX,
    /// `max_x`
    MaxX,
    /// `min_y`
    MinY,
    /// `max_y`
    MaxY,
    /// `min_z`
    MinZ,
    /// `max_z`
    MaxZ,
}

impl FromStr for CropBoxField {
    type Err = CropError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "").as_str() {
            "minx" => Ok(Self::MinX),
            "maxx" => Ok(Self::MaxX),
            "miny" => Ok(Self::MinY),
            "maxy" => Ok(Self::MaxY),
            "minz" => Ok(Self::MinZ),
            "maxz" => Ok(Self::MaxZ),
            _ => Err(CropError::UnknownField(s.to_string())),
        }
    }
}

impl CropBox {
    /// Create a box from per-axis bounds.
    pub fn new(min_x: f64, max_x: f64, min_y: f64, max_y: f64, min_z: f64, max_z: f64) -> Self {
        Self {
            min_x,
            max_x,
            min_y,
            max_y,
            min_z,
            max_z,
        }
    }

    /// Box with the same extent as `aabb`.
    pub fn from_aabb(aabb: &Aabb3) -> Self {
        Self::new(
            aabb.min.x, aabb.max.x, aabb.min.y, aabb.max.y, aabb.min.z, aabb.max.z,
        )
    }

    /// Box around `bounds` grown by `padding` on every face.
    ///
    /// Empty bounds yield a cube of half-size `padding` around the origin.
    pub fn fitted(bounds: &Aabb3, padding: f64) -> Self {
        let mut grown = if bounds.is_empty() {
            Aabb3::new(Point3::origin(), Point3::origin())
        } else {
            *bounds
        };
        grown.expand(padding);
        Self::from_aabb(&grown)
    }

    /// Whether `p` lies inside the closed box.
    pub fn contains(&self, p: &Point3) -> bool {
        is_point_in_crop_box(p.x, p.y, p.z, self)
    }

    /// True when `min > max` on at least one axis.
    pub fn is_inverted(&self) -> bool {
        self.min_x > self.max_x || self.min_y > self.max_y || self.min_z > self.max_z
    }

    /// Read one bound.
    pub fn field(&self, field: CropBoxField) -> f64 {
        match field {
            CropBoxField::MinX => self.min_x,
            CropBoxField::MaxX => self.max_x,
            CropBoxField::MinY => self.min_y,
            CropBoxField::MaxY => self.max_y,
            CropBoxField::MinZ => self.min_z,
            CropBoxField::MaxZ => self.max_z,
        }
    }

    /// Copy of this box with one bound replaced.
    pub fn with_field(&self, field: CropBoxField, value: f64) -> Self {
        let mut next = *self;
        match field {
            CropBoxField::MinX => next.min_x = value,
            CropBoxField::MaxX => next.max_x = value,
            CropBoxField::MinY => next.min_y = value,
            CropBoxField::MaxY => next.max_y = value,
            CropBoxField::MinZ => next.min_z = value,
            CropBoxField::MaxZ => next.max_z = value,
        }
        next
    }

    /// Midpoint of the box.
    pub fn center(&self) -> Point3 {
        Point3::new(
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
            (self.min_z + self.max_z) / 2.0,
        )
    }

    /// Edge lengths along each axis (negative on inverted axes).
    pub fn size(&self) -> [f64; 3] {
        [
            self.max_x - self.min_x,
            self.max_y - self.min_y,
            self.max_z - self.min_z,
        ]
    }
}

impl Default for CropBox {
    fn default() -> Self {
        Self::new(-1.0, 1.0, -1.0, 1.0, -1.0, 1.0)
    }
}

/// Closed-interval membership test on all three axes.
///
/// An inverted axis (`min > max`) matches nothing. A zero-width axis
/// matches exactly its single coordinate.
pub fn is_point_in_crop_box(x: f64, y: f64, z: f64, crop_box: &CropBox) -> bool {
    x >= crop_box.min_x
        && x <= crop_box.max_x
        && y >= crop_box.min_y
        && y <= crop_box.max_y
        && z >= crop_box.min_z
        && z <= crop_box.max_z
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit() -> CropBox {
        CropBox::new(-1.0, 1.0, -1.0, 1.0, -1.0, 1.0)
    }

    #[test]
    fn test_boundary_faces_are_inside() {
        let b = unit();
        for p in [
            (-1.0, 0.0, 0.0),
            (1.0, 0.0, 0.0),
            (0.0, -1.0, 0.0),
            (0.0, 1.0, 0.0),
            (0.0, 0.0, -1.0),
            (0.0, 0.0, 1.0),
        ] {
            assert!(is_point_in_crop_box(p.0, p.1, p.2, &b), "face point {p:?}");
        }
    }

    #[test]
    fn test_corners_are_inside() {
        let b = unit();
        for x in [-1.0, 1.0] {
            for y in [-1.0, 1.0] {
                for z in [-1.0, 1.0] {
                    assert!(is_point_in_crop_box(x, y, z, &b), "corner {x},{y},{z}");
                }
            }
        }
    }

    #[test]
    fn test_outside_points() {
        let b = unit();
        assert!(!is_point_in_crop_box(1.0001, 0.0, 0.0, &b));
        assert!(!is_point_in_crop_box(0.0, -1.5, 0.0, &b));
        assert!(!is_point_in_crop_box(0.0, 0.0, 2.0, &b));
    }

    #[test]
    fn test_inverted_box_contains_nothing() {
        let b = CropBox::new(1.0, -1.0, -1.0, 1.0, -1.0, 1.0);
        assert!(b.is_inverted());
        assert!(!is_point_in_crop_box(0.0, 0.0, 0.0, &b));
        assert!(!is_point_in_crop_box(1.0, 0.0, 0.0, &b));
        assert!(!is_point_in_crop_box(-1.0, 0.0, 0.0, &b));
    }

    #[test]
    fn test_zero_width_axis_matches_single_coordinate() {
        let b = CropBox::new(2.0, 2.0, -1.0, 1.0, -1.0, 1.0);
        assert!(is_point_in_crop_box(2.0, 0.0, 0.0, &b));
        assert!(!is_point_in_crop_box(2.0 + 1e-9, 0.0, 0.0, &b));
        assert!(!is_point_in_crop_box(2.0 - 1e-9, 0.0, 0.0, &b));
    }

    #[test]
    fn test_with_field_copies() {
        let b = unit();
        let edited = b.with_field(CropBoxField::MaxZ, 5.0);
        assert_eq!(b.max_z, 1.0);
        assert_eq!(edited.max_z, 5.0);
        assert_eq!(edited.field(CropBoxField::MinX), -1.0);
    }

    #[test]
    fn test_field_names_parse() {
        assert_eq!("minX".parse::<CropBoxField>(), Ok(CropBoxField::MinX));
        assert_eq!("max_z".parse::<CropBoxField>(), Ok(CropBoxField::MaxZ));
        assert!("depth".parse::<CropBoxField>().is_err());
    }

    #[test]
    fn test_fitted_pads_every_face() {
        let bounds = Aabb3::new(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 2.0, 3.0));
        let b = CropBox::fitted(&bounds, 0.1);
        assert_eq!(b, CropBox::new(-0.1, 1.1, -0.1, 2.1, -0.1, 3.1));
    }

    #[test]
    fn test_serde_uses_camel_case() {
        let json = serde_json::to_value(unit()).unwrap();
        assert_eq!(json["minX"], -1.0);
        assert_eq!(json["maxZ"], 1.0);
    }
}
