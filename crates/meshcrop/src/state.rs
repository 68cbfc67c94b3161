//! Engine state values.

use std::fmt;

use meshcrop_math::{Euler, Transform, Vec3};
use serde::{Deserialize, Serialize};

/// Load lifecycle of an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadingState {
    /// Nothing loaded, nothing in flight.
    #[default]
    Idle,
    /// A load is in flight.
    Loading,
    /// A model is installed.
    Loaded,
    /// The most recent load failed.
    Error,
}

impl LoadingState {
    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Loaded => "loaded",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LoadingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rigid placement of the model root. Rotation is always in radians.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelTransform {
    /// Translation in world units.
    pub position: Vec3,
    /// XYZ Euler angles in radians.
    pub rotation: Euler,
}

impl ModelTransform {
    /// Placement from a position and radian rotation.
    pub fn new(position: Vec3, rotation: Euler) -> Self {
        Self { position, rotation }
    }

    /// Placement from a position and rotation in degrees.
    pub fn from_degrees(position: Vec3, rotation_degrees: [f64; 3]) -> Self {
        let [x, y, z] = rotation_degrees;
        Self::new(position, Euler::from_degrees(x, y, z))
    }

    /// Affine matrix: translate after rotating.
    pub fn to_transform(&self) -> Transform {
        Transform::from_position_rotation(&self.position, &self.rotation)
    }
}

/// Identifies one `begin_load` call. Only the newest ticket may install.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoadTicket(pub(crate) u64);

impl LoadTicket {
    /// Sequence number, increasing per engine.
    pub fn sequence(&self) -> u64 {
        self.0
    }
}
