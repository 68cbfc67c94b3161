//! Engine configuration, loadable from TOML.

use std::path::Path;

use meshcrop_crop::{CropOptions, CropStrategy};
use serde::{Deserialize, Serialize};

use crate::color::{parse_color, DEFAULT_CROP_BOX_COLOR};
use crate::error::{EngineError, Result};
use crate::view::ViewOptions;

/// Padding, in world units, added to every face of the fitted crop box.
pub const DEFAULT_CROP_PADDING: f64 = 0.1;

/// Engine settings.
///
/// ```toml
/// crop_padding = 0.1
/// strategy = "centroid"
/// recompute_normals = true
///
/// [view]
/// show_crop_box = true
/// crop_box_color = "#ff8800"
/// show_grid = true
/// show_axes = false
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Padding around the fitted crop box.
    pub crop_padding: f64,
    /// Keep predicate used by `apply_crop`.
    pub strategy: CropStrategy,
    /// Regenerate normals on cropped geometry.
    pub recompute_normals: bool,
    /// Viewport toggles.
    pub view: ViewConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            crop_padding: DEFAULT_CROP_PADDING,
            strategy: CropStrategy::default(),
            recompute_normals: true,
            view: ViewConfig::default(),
        }
    }
}

/// Viewport toggles as written in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    /// Draw the crop-box outline.
    pub show_crop_box: bool,
    /// Any colour string `parse_color` accepts.
    pub crop_box_color: String,
    /// Draw the ground grid.
    pub show_grid: bool,
    /// Draw the axis helper.
    pub show_axes: bool,
}

impl Default for ViewConfig {
    fn default() -> Self {
        let view = ViewOptions::default();
        Self {
            show_crop_box: view.show_crop_box,
            crop_box_color: view.crop_box_color.to_string(),
            show_grid: view.show_grid,
            show_axes: view.show_axes,
        }
    }
}

impl EngineConfig {
    /// Parse and validate TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Reject settings the engine cannot honour.
    pub fn validate(&self) -> Result<()> {
        if !self.crop_padding.is_finite() || self.crop_padding < 0.0 {
            return Err(EngineError::Config(format!(
                "crop_padding must be a finite non-negative number, got {}",
                self.crop_padding
            )));
        }
        Ok(())
    }

    /// Crop options implied by this configuration.
    pub fn crop_options(&self) -> CropOptions {
        CropOptions {
            strategy: self.strategy,
            recompute_normals: self.recompute_normals,
        }
    }

    /// View options with the colour string normalised.
    pub fn view_options(&self) -> ViewOptions {
        ViewOptions {
            show_crop_box: self.view.show_crop_box,
            crop_box_color: parse_color(&self.view.crop_box_color, DEFAULT_CROP_BOX_COLOR),
            show_grid: self.view.show_grid,
            show_axes: self.view.show_axes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;

    #[test]
    fn test_defaults_from_empty_document() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.crop_padding, 0.1);
        assert_eq!(config.view_options(), ViewOptions::default());
    }

    #[test]
    fn test_full_document() {
        let config = EngineConfig::from_toml_str(
            r#"
            crop_padding = 0.5
            strategy = "any-vertex"
            recompute_normals = false

            [view]
            crop_box_color = "rgb(0, 128, 255)"
            show_axes = true
            "#,
        )
        .unwrap();
        assert_eq!(config.strategy, CropStrategy::AnyVertex);
        assert!(!config.crop_options().recompute_normals);
        let view = config.view_options();
        assert_eq!(view.crop_box_color, Color::rgb(0, 128, 255));
        assert!(view.show_axes);
        assert!(view.show_grid);
    }

    #[test]
    fn test_bad_values_are_config_errors() {
        assert!(matches!(
            EngineConfig::from_toml_str("strategy = \"middle\""),
            Err(EngineError::Config(_))
        ));
        assert!(matches!(
            EngineConfig::from_toml_str("crop_padding = -1.0"),
            Err(EngineError::Config(_))
        ));
    }

    #[test]
    fn test_unknown_colour_falls_back() {
        let config = EngineConfig::from_toml_str("[view]\ncrop_box_color = \"sparkly\"").unwrap();
        assert_eq!(config.view_options().crop_box_color, DEFAULT_CROP_BOX_COLOR);
    }
}
