//! Host-facing adapter around [`ModelEngine`].
//!
//! The widget adds what the engine leaves to its host: every call fails
//! with [`EngineError::NotInitialized`] until an engine is attached,
//! rotations cross the boundary in degrees, and export is refused unless
//! the current crop has been applied.

use meshcrop_crop::{CropBox, CropBoxField, CropOptions, CropResult};
use meshcrop_io::{Fetcher, ModelSource};
use meshcrop_math::Vec3;

use crate::engine::{LoadSummary, ModelEngine};
use crate::error::{EngineError, Result};
use crate::loader::{LoadedScene, ModelLoader};
use crate::state::{LoadTicket, LoadingState, ModelTransform};
use crate::view::ViewOptions;

/// Crop widget state as a UI binds to it.
pub struct CropWidget<F> {
    engine: Option<ModelEngine<F>>,
}

impl<F: Fetcher> Default for CropWidget<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Fetcher> CropWidget<F> {
    /// Widget with no engine attached yet.
    pub fn new() -> Self {
        Self { engine: None }
    }

    /// Widget around a ready engine.
    pub fn with_engine(engine: ModelEngine<F>) -> Self {
        Self {
            engine: Some(engine),
        }
    }

    /// Attach the engine once the viewport exists, replacing any previous one.
    pub fn initialize(&mut self, engine: ModelEngine<F>) {
        self.engine = Some(engine);
    }

    /// Whether an engine is attached.
    pub fn is_initialized(&self) -> bool {
        self.engine.is_some()
    }

    /// The attached engine.
    pub fn engine(&self) -> Result<&ModelEngine<F>> {
        self.engine.as_ref().ok_or(EngineError::NotInitialized)
    }

    /// The attached engine, mutably.
    pub fn engine_mut(&mut self) -> Result<&mut ModelEngine<F>> {
        self.engine.as_mut().ok_or(EngineError::NotInitialized)
    }

    /// Loading state; `Idle` before initialization.
    pub fn state(&self) -> LoadingState {
        self.engine
            .as_ref()
            .map_or(LoadingState::Idle, ModelEngine::state)
    }

    /// Load `source`, holding the widget for the duration.
    pub async fn load(&mut self, source: ModelSource) -> Result<LoadSummary> {
        self.engine_mut()?.load(source).await
    }

    /// First half of a split load; see [`ModelEngine::begin_load`].
    pub fn begin_load(&mut self) -> Result<(LoadTicket, ModelLoader<F>)> {
        let engine = self.engine_mut()?;
        Ok((engine.begin_load(), engine.loader()))
    }

    /// Second half of a split load; see [`ModelEngine::finish_load`].
    pub fn finish_load(
        &mut self,
        ticket: LoadTicket,
        loaded: Result<LoadedScene>,
    ) -> Result<LoadSummary> {
        self.engine_mut()?.finish_load(ticket, loaded)
    }

    /// Current crop box.
    pub fn crop_box(&self) -> Result<CropBox> {
        Ok(self.engine()?.crop_box())
    }

    /// Replace the crop box.
    pub fn set_crop_box(&mut self, crop_box: CropBox) -> Result<()> {
        self.engine_mut()?.update_crop_box(crop_box);
        Ok(())
    }

    /// Replace one face of the crop box, by field name (`minX`, `max_y`, ...).
    pub fn set_crop_box_field(&mut self, field: &str, value: f64) -> Result<()> {
        let field: CropBoxField = field.parse()?;
        self.engine_mut()?.set_crop_box_field(field, value);
        Ok(())
    }

    /// Position in world units.
    pub fn position(&self) -> Result<[f64; 3]> {
        let p = self.engine()?.transform().position;
        Ok([p.x, p.y, p.z])
    }

    /// Move the model.
    pub fn set_position(&mut self, position: [f64; 3]) -> Result<()> {
        let [x, y, z] = position;
        self.engine_mut()?.set_position(Vec3::new(x, y, z));
        Ok(())
    }

    /// Rotation in degrees.
    pub fn rotation_degrees(&self) -> Result<[f64; 3]> {
        Ok(self.engine()?.transform().rotation.to_degrees())
    }

    /// Rotate the model; angles in degrees.
    pub fn set_rotation_degrees(&mut self, degrees: [f64; 3]) -> Result<()> {
        let engine = self.engine_mut()?;
        let position = engine.transform().position;
        engine.set_transform(ModelTransform::from_degrees(position, degrees));
        Ok(())
    }

    /// Crop with the engine's options.
    pub fn apply_crop(&mut self) -> Result<CropResult> {
        Ok(self.engine_mut()?.apply_crop())
    }

    /// Crop with explicit options.
    pub fn apply_crop_with(&mut self, options: &CropOptions) -> Result<CropResult> {
        Ok(self.engine_mut()?.apply_crop_with(options))
    }

    /// Whether [`CropWidget::export`] would be allowed right now.
    pub fn can_export(&self) -> bool {
        self.engine
            .as_ref()
            .is_some_and(|e| e.has_model() && e.crop_valid())
    }

    /// Export the cropped model as GLB.
    ///
    /// Refused until the current crop box and transform have been applied
    /// with [`CropWidget::apply_crop`].
    pub fn export(&self) -> Result<Vec<u8>> {
        let engine = self.engine()?;
        if !engine.has_model() {
            return Err(EngineError::NoModelLoaded);
        }
        if !engine.crop_valid() {
            return Err(EngineError::CropNotApplied);
        }
        engine.export()
    }

    /// Viewport toggles.
    pub fn view(&self) -> Result<&ViewOptions> {
        Ok(self.engine()?.view())
    }

    /// Mutable viewport toggles.
    pub fn view_mut(&mut self) -> Result<&mut ViewOptions> {
        Ok(self.engine_mut()?.view_mut())
    }

    /// Release the model, keeping the engine attached.
    pub fn dispose(&mut self) -> Result<()> {
        self.engine_mut()?.dispose();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshcrop_io::OfflineFetcher;

    #[test]
    fn test_everything_fails_before_initialization() {
        let mut widget: CropWidget<OfflineFetcher> = CropWidget::new();
        assert!(!widget.is_initialized());
        assert!(matches!(widget.apply_crop(), Err(EngineError::NotInitialized)));
        assert!(matches!(widget.export(), Err(EngineError::NotInitialized)));
        assert!(matches!(
            widget.set_crop_box(CropBox::default()),
            Err(EngineError::NotInitialized)
        ));
        assert!(matches!(widget.rotation_degrees(), Err(EngineError::NotInitialized)));
        assert!(!widget.can_export());
        assert_eq!(widget.state(), LoadingState::Idle);
    }

    #[test]
    fn test_rotation_crosses_in_degrees() {
        let mut widget = CropWidget::with_engine(ModelEngine::new(OfflineFetcher));
        widget.set_rotation_degrees([0.0, 90.0, 180.0]).unwrap();
        let radians = widget.engine().unwrap().transform().rotation;
        assert!((radians.y - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
        let degrees = widget.rotation_degrees().unwrap();
        assert!((degrees[2] - 180.0).abs() < 1e-9);
    }

    #[test]
    fn test_bad_field_name() {
        let mut widget = CropWidget::with_engine(ModelEngine::new(OfflineFetcher));
        assert!(matches!(
            widget.set_crop_box_field("depth", 1.0),
            Err(EngineError::Crop(_))
        ));
        widget.set_crop_box_field("maxX", 4.0).unwrap();
        assert_eq!(widget.crop_box().unwrap().max_x, 4.0);
    }
}
