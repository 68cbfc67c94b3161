#![warn(missing_docs)]

//! meshcrop: load a 3D model, place it, crop it against a box and export
//! the result as GLB.
//!
//! [`ModelEngine`] is the state machine; [`CropWidget`] is the thin adapter
//! a UI binds to. Cropping is cheap: triangles are kept or dropped whole.
//!
//! # Example
//!
//! ```rust,no_run
//! use meshcrop::{CropBox, ModelEngine, ModelSource, OfflineFetcher};
//!
//! # async fn run(bytes: Vec<u8>) -> meshcrop::Result<()> {
//! let mut engine = ModelEngine::new(OfflineFetcher);
//! engine.load(ModelSource::file("chair.glb", bytes)).await?;
//! engine.update_crop_box(CropBox::new(-1.0, 1.0, 0.0, 2.0, -1.0, 1.0));
//! let result = engine.apply_crop();
//! println!("removed {} triangles", result.triangles_removed);
//! let glb = engine.export()?;
//! # let _ = glb;
//! # Ok(())
//! # }
//! ```

pub mod color;
pub mod config;
pub mod engine;
pub mod error;
pub mod loader;
pub mod observer;
pub mod state;
pub mod view;
pub mod widget;

pub use color::{parse_color, try_parse_color, Color, DEFAULT_CROP_BOX_COLOR};
pub use config::{EngineConfig, ViewConfig, DEFAULT_CROP_PADDING};
pub use engine::{LoadSummary, ModelEngine, MODEL_ROOT_NAME};
pub use error::{EngineError, Result};
pub use loader::{LoadedScene, ModelLoader};
pub use observer::{EngineObserver, LoadProgress};
pub use state::{LoadTicket, LoadingState, ModelTransform};
pub use view::{Framing, ViewOptions};
pub use widget::CropWidget;

pub use meshcrop_crop::{CropBox, CropBoxField, CropOptions, CropResult, CropStrategy};
pub use meshcrop_io::{
    FetchedBytes, Fetcher, ModelFormat, ModelSource, ObjectUrlStore, OfflineFetcher,
    SourceResolver,
};
pub use meshcrop_math::{Euler, Vec3};
