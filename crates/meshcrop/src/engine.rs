//! The crop/transform/export state machine.
//!
//! [`ModelEngine`] owns the loaded scene, the crop box, the model
//! transform and the crop-validity flag. Loads are split in two so that a
//! host can await the I/O without borrowing the engine:
//!
//! ```text
//! let ticket = engine.begin_load();          // -> Loading, old model disposed
//! let loaded = loader.load(source, ..).await; // no engine borrow held
//! engine.finish_load(ticket, loaded)?;       // -> Loaded | Error
//! ```
//!
//! Only the ticket from the newest `begin_load` may install a model; older
//! resolutions are disposed and reported as [`EngineError::LoadSuperseded`].

use std::rc::Rc;

use meshcrop_crop::{crop_scene, CropBox, CropBoxField, CropOptions, CropResult};
use meshcrop_io::{Fetcher, GlbExporter, MeshExporter, ModelFormat, ModelSource, SourceResolver};
use meshcrop_math::{Aabb3, Euler, Vec3};
use meshcrop_scene::{DropDisposer, GeometryDisposer, SceneNode};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::loader::{short_url, LoadedScene, ModelLoader};
use crate::observer::{EngineObserver, LoadProgress};
use crate::state::{LoadTicket, LoadingState, ModelTransform};
use crate::view::{Framing, ViewOptions};

/// Name of the wrapper node that carries the model transform.
pub const MODEL_ROOT_NAME: &str = "meshcrop-model";

/// An installed model.
#[derive(Debug)]
struct Model {
    root: SceneNode,
    format: ModelFormat,
    url: String,
}

/// Statistics about a freshly installed model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadSummary {
    /// Detected format.
    pub format: ModelFormat,
    /// Mesh nodes in the scene.
    pub meshes: usize,
    /// Triangles across all meshes.
    pub triangles: usize,
    /// World-space bounds as positioned.
    pub bounds: Aabb3,
    /// Crop box fitted to the bounds.
    pub crop_box: CropBox,
}

/// Load, transform, crop and export one model at a time.
pub struct ModelEngine<F> {
    loader: ModelLoader<F>,
    exporter: Box<dyn MeshExporter>,
    disposer: Rc<dyn GeometryDisposer>,
    observers: Vec<Rc<dyn EngineObserver>>,
    state: LoadingState,
    last_error: Option<String>,
    model: Option<Model>,
    crop_box: CropBox,
    transform: ModelTransform,
    crop_options: CropOptions,
    crop_padding: f64,
    crop_valid: bool,
    last_crop: Option<CropResult>,
    framing: Option<Framing>,
    view: ViewOptions,
    load_sequence: u64,
}

impl<F: Fetcher> ModelEngine<F> {
    /// Engine with default configuration, parsers, exporter and disposer.
    pub fn new(fetcher: F) -> Self {
        Self::with_loader(ModelLoader::new(SourceResolver::new(fetcher)))
    }

    /// Engine around an existing loader.
    pub fn with_loader(loader: ModelLoader<F>) -> Self {
        let config = EngineConfig::default();
        Self {
            loader,
            exporter: Box::new(GlbExporter::default()),
            disposer: Rc::new(DropDisposer),
            observers: Vec::new(),
            state: LoadingState::Idle,
            last_error: None,
            model: None,
            crop_box: CropBox::default(),
            transform: ModelTransform::default(),
            crop_options: config.crop_options(),
            crop_padding: config.crop_padding,
            crop_valid: false,
            last_crop: None,
            framing: None,
            view: config.view_options(),
            load_sequence: 0,
        }
    }

    /// Apply a validated configuration.
    pub fn with_config(mut self, config: &EngineConfig) -> Result<Self> {
        config.validate()?;
        self.crop_options = config.crop_options();
        self.crop_padding = config.crop_padding;
        self.view = config.view_options();
        Ok(self)
    }

    /// Replace the exporter.
    pub fn with_exporter(mut self, exporter: impl MeshExporter + 'static) -> Self {
        self.exporter = Box::new(exporter);
        self
    }

    /// Replace the disposer that receives discarded geometry.
    pub fn with_disposer(mut self, disposer: Rc<dyn GeometryDisposer>) -> Self {
        self.disposer = disposer;
        self
    }

    /// Register an observer.
    pub fn add_observer(&mut self, observer: Rc<dyn EngineObserver>) {
        self.observers.push(observer);
    }

    /// Clone of the loader, for running a load without borrowing the engine.
    pub fn loader(&self) -> ModelLoader<F> {
        self.loader.clone()
    }

    /// Current load lifecycle state.
    pub fn state(&self) -> LoadingState {
        self.state
    }

    /// Message of the most recent load failure, cleared by the next load.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Whether a model is installed.
    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    /// The installed scene. Its root is the wrapper carrying the transform.
    pub fn scene(&self) -> Option<&SceneNode> {
        self.model.as_ref().map(|m| &m.root)
    }

    /// Format of the installed model.
    pub fn model_format(&self) -> Option<ModelFormat> {
        self.model.as_ref().map(|m| m.format)
    }

    /// URL the installed model was read from.
    pub fn model_url(&self) -> Option<&str> {
        self.model.as_ref().map(|m| m.url.as_str())
    }

    /// Current crop box.
    pub fn crop_box(&self) -> CropBox {
        self.crop_box
    }

    /// Current model transform.
    pub fn transform(&self) -> ModelTransform {
        self.transform
    }

    /// Options used by [`ModelEngine::apply_crop`].
    pub fn crop_options(&self) -> CropOptions {
        self.crop_options
    }

    /// Change the default crop options. Does not touch crop validity.
    pub fn set_crop_options(&mut self, options: CropOptions) {
        self.crop_options = options;
    }

    /// True only between a crop application and the next crop-box,
    /// transform or model change.
    pub fn crop_valid(&self) -> bool {
        self.crop_valid
    }

    /// Result of the most recent crop call, including no-op calls.
    pub fn last_crop(&self) -> Option<CropResult> {
        self.last_crop
    }

    /// Camera framing computed at load time.
    pub fn framing(&self) -> Option<&Framing> {
        self.framing.as_ref()
    }

    /// Viewport toggles.
    pub fn view(&self) -> &ViewOptions {
        &self.view
    }

    /// Mutable viewport toggles.
    pub fn view_mut(&mut self) -> &mut ViewOptions {
        &mut self.view
    }

    /// Start a load: dispose the current model and enter `Loading`.
    pub fn begin_load(&mut self) -> LoadTicket {
        self.load_sequence += 1;
        self.discard_model();
        self.last_error = None;
        self.set_state(LoadingState::Loading);
        tracing::debug!(ticket = self.load_sequence, "load started");
        LoadTicket(self.load_sequence)
    }

    /// Whether `ticket` belongs to the newest load.
    pub fn is_current(&self, ticket: LoadTicket) -> bool {
        ticket.0 == self.load_sequence
    }

    /// Finish the load identified by `ticket`.
    ///
    /// On success the scene is wrapped in a root carrying the current
    /// transform, and the crop box is refitted to the model's world bounds.
    /// The model is never moved to fit.
    pub fn finish_load(
        &mut self,
        ticket: LoadTicket,
        loaded: Result<LoadedScene>,
    ) -> Result<LoadSummary> {
        if !self.is_current(ticket) {
            tracing::warn!(
                ticket = ticket.0,
                current = self.load_sequence,
                "ignoring superseded load"
            );
            if let Ok(scene) = loaded {
                scene.dispose_with(self.disposer.as_ref());
            }
            return Err(EngineError::LoadSuperseded);
        }

        let scene = match loaded {
            Ok(scene) => scene,
            Err(err) => {
                self.fail(&err);
                return Err(err);
            }
        };

        let mut root = SceneNode::group(MODEL_ROOT_NAME).with_transform(self.transform.to_transform());
        root.children = scene.roots;
        root.update_world_transforms();

        let bounds = root.world_bounds();
        self.crop_box = CropBox::fitted(&bounds, self.crop_padding);
        self.framing = Some(Framing::from_bounds(&bounds));
        self.crop_valid = false;
        self.last_crop = None;

        let summary = LoadSummary {
            format: scene.format,
            meshes: root.mesh_count(),
            triangles: root.triangle_count(),
            bounds,
            crop_box: self.crop_box,
        };
        tracing::info!(
            url = %short_url(&scene.url),
            format = %scene.format,
            meshes = summary.meshes,
            triangles = summary.triangles,
            "model loaded"
        );
        self.model = Some(Model {
            root,
            format: scene.format,
            url: scene.url,
        });
        self.set_state(LoadingState::Loaded);
        Ok(summary)
    }

    /// Resolve, parse and install `source` in one call.
    ///
    /// Holds the engine for the whole load; hosts that need to keep using
    /// the engine meanwhile call `begin_load`/`finish_load` around
    /// [`ModelLoader::load`] themselves.
    pub async fn load(&mut self, source: ModelSource) -> Result<LoadSummary> {
        let ticket = self.begin_load();
        let loader = self.loader();
        let observers = self.observers.clone();
        let loaded = loader
            .load(source, &mut |progress| notify_progress(&observers, &progress))
            .await;
        self.finish_load(ticket, loaded)
    }

    /// Replace the crop box.
    pub fn update_crop_box(&mut self, crop_box: CropBox) {
        self.crop_box = crop_box;
        self.invalidate_crop();
    }

    /// Replace one face of the crop box.
    pub fn set_crop_box_field(&mut self, field: CropBoxField, value: f64) {
        self.update_crop_box(self.crop_box.with_field(field, value));
    }

    /// Replace the model transform and apply it to the model root.
    pub fn set_transform(&mut self, transform: ModelTransform) {
        self.transform = transform;
        if let Some(model) = &mut self.model {
            model.root.set_local_transform(transform.to_transform());
        }
        self.invalidate_crop();
    }

    /// Replace only the position.
    pub fn set_position(&mut self, position: Vec3) {
        self.set_transform(ModelTransform {
            position,
            ..self.transform
        });
    }

    /// Replace only the rotation (radians).
    pub fn set_rotation(&mut self, rotation: Euler) {
        self.set_transform(ModelTransform {
            rotation,
            ..self.transform
        });
    }

    /// Crop with the engine's configured options.
    pub fn apply_crop(&mut self) -> CropResult {
        let options = self.crop_options;
        self.apply_crop_with(&options)
    }

    /// Crop the installed model against the current crop box.
    ///
    /// With no model this is a reported no-op (`success == false`).
    pub fn apply_crop_with(&mut self, options: &CropOptions) -> CropResult {
        let Some(model) = &mut self.model else {
            tracing::debug!("crop requested with no model loaded");
            let result = CropResult::not_applied();
            self.last_crop = Some(result);
            return result;
        };

        model.root.update_world_transforms();
        let result = crop_scene(&mut model.root, &self.crop_box, options, self.disposer.as_ref());
        tracing::info!(
            kept = result.triangles_kept,
            removed = result.triangles_removed,
            meshes = result.meshes_processed,
            "crop applied"
        );
        self.crop_valid = result.success;
        self.last_crop = Some(result);
        result
    }

    /// Serialize the model as currently transformed and cropped.
    ///
    /// Does not look at crop validity. Failures leave the loading state
    /// alone.
    pub fn export(&self) -> Result<Vec<u8>> {
        let result = match &self.model {
            Some(model) => self.exporter.export(&model.root).map_err(EngineError::from),
            None => Err(EngineError::NoModelLoaded),
        };
        if let Err(err) = &result {
            tracing::warn!(error = %err, "export failed");
            self.notify_error(&err.to_string());
        }
        result
    }

    /// Release the model and return to `Idle`. Any in-flight load is
    /// superseded.
    pub fn dispose(&mut self) {
        self.load_sequence += 1;
        self.discard_model();
        self.crop_box = CropBox::default();
        self.last_error = None;
        self.set_state(LoadingState::Idle);
    }

    fn discard_model(&mut self) {
        if let Some(model) = self.model.take() {
            tracing::debug!(url = %short_url(&model.url), "disposing model");
            model.root.dispose_with(self.disposer.as_ref());
        }
        self.framing = None;
        self.last_crop = None;
        self.crop_valid = false;
    }

    fn invalidate_crop(&mut self) {
        if self.crop_valid {
            tracing::debug!("crop invalidated");
        }
        self.crop_valid = false;
    }

    fn fail(&mut self, err: &EngineError) {
        let message = err.to_string();
        tracing::warn!(error = %message, "model load failed");
        self.last_error = Some(message.clone());
        self.set_state(LoadingState::Error);
        self.notify_error(&message);
    }

    fn set_state(&mut self, state: LoadingState) {
        if self.state == state {
            return;
        }
        self.state = state;
        for observer in &self.observers {
            observer.on_state_change(state);
        }
    }

    fn notify_error(&self, message: &str) {
        for observer in &self.observers {
            observer.on_error(message);
        }
    }
}

fn notify_progress(observers: &[Rc<dyn EngineObserver>], progress: &LoadProgress) {
    for observer in observers {
        observer.on_progress(progress);
    }
}

impl<F> Drop for ModelEngine<F> {
    fn drop(&mut self) {
        if let Some(model) = self.model.take() {
            model.root.dispose_with(self.disposer.as_ref());
        }
    }
}
