//! WASM bindings for the meshcrop crop widget.
//!
//! The JS host owns rendering; this side owns the scene, the crop box and
//! the crop/export state. Loads return promises and never hold the widget
//! borrowed across an await, so setters stay usable while a model loads.

use std::cell::RefCell;
use std::fmt::Display;
use std::rc::Rc;

use js_sys::{ArrayBuffer, Function, Promise, Reflect, Uint8Array};
use meshcrop::{
    parse_color, CropBox, CropOptions, CropStrategy, CropWidget, EngineConfig, EngineObserver,
    FetchedBytes, Fetcher, LoadProgress, LoadSummary, LoadingState, ModelEngine, ModelSource,
};
use meshcrop_io::{detect_model_format, SourceError};
use serde::Serialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::{future_to_promise, JsFuture};

/// Initialize panic hook for better error messages.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

fn js_error(err: impl Display) -> JsValue {
    JsError::new(&err.to_string()).into()
}

fn js_message(value: &JsValue) -> String {
    value
        .as_string()
        .or_else(|| {
            value
                .dyn_ref::<js_sys::Error>()
                .map(|e| String::from(e.message()))
        })
        .unwrap_or_else(|| format!("{value:?}"))
}

/// Fetches remote URLs through a host-supplied function.
///
/// The function takes the URL and returns (a promise of) one of:
/// a `Response`, a `Blob`, `{ bytes, contentType }`, or bare
/// `Uint8Array`/`ArrayBuffer` bytes. The first three carry a MIME type
/// into format detection.
#[derive(Clone, Default)]
pub struct JsFetcher {
    function: Rc<RefCell<Option<Function>>>,
}

impl Fetcher for JsFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedBytes, SourceError> {
        let function = self.function.borrow().clone();
        let Some(function) = function else {
            return Err(SourceError::Offline(url.to_string()));
        };
        let fail = |value: JsValue| SourceError::Fetch {
            url: url.to_string(),
            reason: js_message(&value),
        };
        let returned = function
            .call1(&JsValue::NULL, &JsValue::from_str(url))
            .map_err(fail)?;
        let body = JsFuture::from(Promise::resolve(&returned))
            .await
            .map_err(fail)?;
        read_body(&body).await.map_err(fail)
    }
}

async fn read_body(body: &JsValue) -> Result<FetchedBytes, JsValue> {
    if body.is_instance_of::<Uint8Array>() || body.is_instance_of::<ArrayBuffer>() {
        return Ok(FetchedBytes {
            bytes: Uint8Array::new(body).to_vec(),
            content_type: None,
        });
    }
    if !body.is_object() {
        return Err(JsValue::from_str(
            "fetch must resolve to a Response, a Blob, { bytes, contentType } or bytes",
        ));
    }

    // Response and Blob both expose arrayBuffer().
    let array_buffer = Reflect::get(body, &JsValue::from_str("arrayBuffer"))?;
    if let Some(read) = array_buffer.dyn_ref::<Function>() {
        if Reflect::get(body, &JsValue::from_str("ok"))? == JsValue::FALSE {
            let status = Reflect::get(body, &JsValue::from_str("status"))?;
            let status = status.as_f64().unwrap_or_default();
            return Err(JsValue::from_str(&format!("HTTP {status}")));
        }
        let content_type = pick_content_type(
            response_header(body, "content-type")?,
            string_property(body, "type")?,
        );
        let buffer = JsFuture::from(Promise::resolve(&read.call0(body)?)).await?;
        return Ok(FetchedBytes {
            bytes: Uint8Array::new(&buffer).to_vec(),
            content_type,
        });
    }

    let bytes = Reflect::get(body, &JsValue::from_str("bytes"))?;
    if !(bytes.is_instance_of::<Uint8Array>() || bytes.is_instance_of::<ArrayBuffer>()) {
        return Err(JsValue::from_str("fetch result has no `bytes` array"));
    }
    Ok(FetchedBytes {
        bytes: Uint8Array::new(&bytes).to_vec(),
        content_type: pick_content_type(string_property(body, "contentType")?, None),
    })
}

fn string_property(target: &JsValue, key: &str) -> Result<Option<String>, JsValue> {
    Ok(Reflect::get(target, &JsValue::from_str(key))?.as_string())
}

fn response_header(response: &JsValue, name: &str) -> Result<Option<String>, JsValue> {
    let headers = Reflect::get(response, &JsValue::from_str("headers"))?;
    if !headers.is_object() {
        return Ok(None);
    }
    let get = Reflect::get(&headers, &JsValue::from_str("get"))?;
    match get.dyn_ref::<Function>() {
        Some(get) => Ok(get.call1(&headers, &JsValue::from_str(name))?.as_string()),
        None => Ok(None),
    }
}

/// A `Content-Type` header wins over a `Blob.type`; blank values mean none.
fn pick_content_type(header: Option<String>, blob_type: Option<String>) -> Option<String> {
    [header, blob_type]
        .into_iter()
        .flatten()
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

#[derive(Default)]
struct Callbacks {
    state_change: Option<Function>,
    error: Option<Function>,
    progress: Option<Function>,
}

/// Forwards engine notifications to the registered JS callbacks.
struct JsObserver {
    callbacks: Rc<RefCell<Callbacks>>,
}

impl JsObserver {
    fn call(&self, pick: fn(&Callbacks) -> &Option<Function>, arg: &JsValue) {
        // Cloned out so a callback may replace itself.
        let function = pick(&self.callbacks.borrow()).clone();
        if let Some(function) = function {
            if let Err(err) = function.call1(&JsValue::NULL, arg) {
                tracing::warn!(error = %js_message(&err), "callback threw");
            }
        }
    }
}

impl EngineObserver for JsObserver {
    fn on_state_change(&self, state: LoadingState) {
        self.call(|c| &c.state_change, &JsValue::from_str(state.as_str()));
    }

    fn on_error(&self, message: &str) {
        self.call(|c| &c.error, &JsValue::from_str(message));
    }

    fn on_progress(&self, progress: &LoadProgress) {
        match serde_wasm_bindgen::to_value(progress) {
            Ok(value) => self.call(|c| &c.progress, &value),
            Err(err) => tracing::warn!(%err, "unserializable progress"),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsLoadSummary {
    format: String,
    meshes: usize,
    triangles: usize,
    bounds_min: Option<[f64; 3]>,
    bounds_max: Option<[f64; 3]>,
    crop_box: CropBox,
}

impl From<&LoadSummary> for JsLoadSummary {
    fn from(summary: &LoadSummary) -> Self {
        let b = &summary.bounds;
        let (bounds_min, bounds_max) = if b.is_empty() {
            (None, None)
        } else {
            (
                Some([b.min.x, b.min.y, b.min.z]),
                Some([b.max.x, b.max.y, b.max.z]),
            )
        };
        Self {
            format: summary.format.to_string(),
            meshes: summary.meshes,
            triangles: summary.triangles,
            bounds_min,
            bounds_max,
            crop_box: summary.crop_box,
        }
    }
}

#[derive(Serialize)]
struct JsFraming {
    target: [f64; 3],
    radius: f64,
    distance: f64,
}

/// The crop widget as seen from JS.
///
/// Callbacks run synchronously inside widget calls; calling back into the
/// widget from one of them throws instead of re-entering.
#[wasm_bindgen(js_name = CropWidget)]
pub struct WasmCropWidget {
    inner: Rc<RefCell<CropWidget<JsFetcher>>>,
    fetcher: JsFetcher,
    callbacks: Rc<RefCell<Callbacks>>,
}

#[wasm_bindgen(js_class = CropWidget)]
impl WasmCropWidget {
    /// Create a widget, optionally configured from TOML.
    #[wasm_bindgen(constructor)]
    pub fn new(config_toml: Option<String>) -> Result<WasmCropWidget, JsError> {
        let config = match config_toml {
            Some(text) => EngineConfig::from_toml_str(&text)?,
            None => EngineConfig::default(),
        };
        let fetcher = JsFetcher::default();
        let callbacks = Rc::new(RefCell::new(Callbacks::default()));
        let mut engine = ModelEngine::new(fetcher.clone()).with_config(&config)?;
        engine.add_observer(Rc::new(JsObserver {
            callbacks: Rc::clone(&callbacks),
        }));
        Ok(Self {
            inner: Rc::new(RefCell::new(CropWidget::with_engine(engine))),
            fetcher,
            callbacks,
        })
    }

    /// Set the function used to download remote URLs and host `blob:` URLs:
    /// `(url) => Promise<Response | Blob | { bytes, contentType } | Uint8Array | ArrayBuffer>`.
    /// Passing `fetch` itself works.
    #[wasm_bindgen(js_name = setFetch)]
    pub fn set_fetch(&self, fetch: Option<Function>) {
        *self.fetcher.function.borrow_mut() = fetch;
    }

    /// `(state: "idle" | "loading" | "loaded" | "error") => void`
    #[wasm_bindgen(js_name = setOnStateChange)]
    pub fn set_on_state_change(&self, callback: Option<Function>) {
        self.callbacks.borrow_mut().state_change = callback;
    }

    /// `(message: string) => void`
    #[wasm_bindgen(js_name = setOnError)]
    pub fn set_on_error(&self, callback: Option<Function>) {
        self.callbacks.borrow_mut().error = callback;
    }

    /// `({ percentage, bytesLoaded, bytesTotal, message }) => void`
    #[wasm_bindgen(js_name = setOnProgress)]
    pub fn set_on_progress(&self, callback: Option<Function>) {
        self.callbacks.borrow_mut().progress = callback;
    }

    /// Load a model from a URL (`http(s):`, `data:` or `blob:meshcrop/...`).
    #[wasm_bindgen(js_name = loadUrl)]
    pub fn load_url(&self, url: String) -> Promise {
        self.load(ModelSource::url(url))
    }

    /// Load a model from file contents.
    #[wasm_bindgen(js_name = loadBytes)]
    pub fn load_bytes(&self, name: String, bytes: Vec<u8>, mime: Option<String>) -> Promise {
        let mut source = ModelSource::file(name, bytes);
        if let Some(mime) = mime {
            source = source.with_mime(mime);
        }
        self.load(source)
    }

    /// `"idle" | "loading" | "loaded" | "error"`
    #[wasm_bindgen(getter)]
    pub fn state(&self) -> Result<String, JsError> {
        Ok(self.borrow()?.state().as_str().to_string())
    }

    /// Message of the most recent load failure.
    #[wasm_bindgen(getter, js_name = lastError)]
    pub fn last_error(&self) -> Result<Option<String>, JsError> {
        let widget = self.borrow()?;
        Ok(widget.engine()?.last_error().map(str::to_string))
    }

    /// `{ minX, maxX, minY, maxY, minZ, maxZ }`
    #[wasm_bindgen(js_name = cropBox)]
    pub fn crop_box(&self) -> Result<JsValue, JsError> {
        let crop_box = self.borrow()?.crop_box()?;
        Ok(serde_wasm_bindgen::to_value(&crop_box)?)
    }

    /// Replace the crop box from `{ minX, maxX, minY, maxY, minZ, maxZ }`.
    #[wasm_bindgen(js_name = setCropBox)]
    pub fn set_crop_box(&self, crop_box: JsValue) -> Result<(), JsError> {
        let crop_box: CropBox = serde_wasm_bindgen::from_value(crop_box)?;
        self.borrow_mut()?.set_crop_box(crop_box)?;
        Ok(())
    }

    /// Replace one face of the crop box (`"minX"`, `"maxZ"`, ...).
    #[wasm_bindgen(js_name = setCropBoxField)]
    pub fn set_crop_box_field(&self, field: &str, value: f64) -> Result<(), JsError> {
        self.borrow_mut()?.set_crop_box_field(field, value)?;
        Ok(())
    }

    /// `[x, y, z]`
    pub fn position(&self) -> Result<Vec<f64>, JsError> {
        Ok(self.borrow()?.position()?.to_vec())
    }

    /// Move the model to `(x, y, z)` in world units. Invalidates the last crop.
    #[wasm_bindgen(js_name = setPosition)]
    pub fn set_position(&self, x: f64, y: f64, z: f64) -> Result<(), JsError> {
        self.borrow_mut()?.set_position([x, y, z])?;
        Ok(())
    }

    /// `[x, y, z]` in degrees.
    pub fn rotation(&self) -> Result<Vec<f64>, JsError> {
        Ok(self.borrow()?.rotation_degrees()?.to_vec())
    }

    /// Rotate the model; angles in degrees.
    #[wasm_bindgen(js_name = setRotation)]
    pub fn set_rotation(&self, x: f64, y: f64, z: f64) -> Result<(), JsError> {
        self.borrow_mut()?.set_rotation_degrees([x, y, z])?;
        Ok(())
    }

    /// Crop with the configured options. Returns
    /// `{ success, trianglesRemoved, trianglesKept, meshesProcessed }`.
    #[wasm_bindgen(js_name = applyCrop)]
    pub fn apply_crop(&self) -> Result<JsValue, JsError> {
        let result = self.borrow_mut()?.apply_crop()?;
        Ok(serde_wasm_bindgen::to_value(&result)?)
    }

    /// Crop with `"centroid" | "all-vertices" | "any-vertex"`.
    #[wasm_bindgen(js_name = applyCropWith)]
    pub fn apply_crop_with(
        &self,
        strategy: &str,
        recompute_normals: bool,
    ) -> Result<JsValue, JsError> {
        let options = CropOptions {
            strategy: strategy.parse::<CropStrategy>()?,
            recompute_normals,
        };
        let result = self.borrow_mut()?.apply_crop_with(&options)?;
        Ok(serde_wasm_bindgen::to_value(&result)?)
    }

    /// Whether the last crop still matches the box and transform.
    #[wasm_bindgen(js_name = canExport)]
    pub fn can_export(&self) -> Result<bool, JsError> {
        Ok(self.borrow()?.can_export())
    }

    /// The cropped model as GLB bytes.
    #[wasm_bindgen(js_name = exportGlb)]
    pub fn export_glb(&self) -> Result<Vec<u8>, JsError> {
        Ok(self.borrow()?.export()?)
    }

    /// `{ target: [x, y, z], radius, distance }` for a camera with `fov_y_degrees`.
    pub fn framing(&self, fov_y_degrees: f64) -> Result<JsValue, JsError> {
        let widget = self.borrow()?;
        let Some(framing) = widget.engine()?.framing() else {
            return Ok(JsValue::NULL);
        };
        let t = framing.target;
        let js = JsFraming {
            target: [t.x, t.y, t.z],
            radius: framing.radius,
            distance: framing.camera_distance(fov_y_degrees.to_radians()),
        };
        Ok(serde_wasm_bindgen::to_value(&js)?)
    }

    /// `{ showCropBox, cropBoxColor, showGrid, showAxes }`
    #[wasm_bindgen(js_name = viewOptions)]
    pub fn view_options(&self) -> Result<JsValue, JsError> {
        let view = *self.borrow()?.view()?;
        Ok(serde_wasm_bindgen::to_value(&view)?)
    }

    /// Show or hide the crop box overlay.
    #[wasm_bindgen(js_name = setShowCropBox)]
    pub fn set_show_crop_box(&self, show: bool) -> Result<(), JsError> {
        self.borrow_mut()?.view_mut()?.show_crop_box = show;
        Ok(())
    }

    /// Show or hide the ground grid.
    #[wasm_bindgen(js_name = setShowGrid)]
    pub fn set_show_grid(&self, show: bool) -> Result<(), JsError> {
        self.borrow_mut()?.view_mut()?.show_grid = show;
        Ok(())
    }

    /// Show or hide the axes helper.
    #[wasm_bindgen(js_name = setShowAxes)]
    pub fn set_show_axes(&self, show: bool) -> Result<(), JsError> {
        self.borrow_mut()?.view_mut()?.show_axes = show;
        Ok(())
    }

    /// Set the outline colour from any CSS-like string; unparseable input
    /// keeps the current colour. Returns the colour in effect as `#rrggbb`.
    #[wasm_bindgen(js_name = setCropBoxColor)]
    pub fn set_crop_box_color(&self, color: &str) -> Result<String, JsError> {
        let mut widget = self.borrow_mut()?;
        let view = widget.view_mut()?;
        view.crop_box_color = parse_color(color, view.crop_box_color);
        Ok(view.crop_box_color.to_string())
    }

    /// Release the loaded model.
    pub fn dispose(&self) -> Result<(), JsError> {
        self.borrow_mut()?.dispose()?;
        Ok(())
    }
}

impl WasmCropWidget {
    fn borrow(&self) -> Result<std::cell::Ref<'_, CropWidget<JsFetcher>>, JsError> {
        self.inner
            .try_borrow()
            .map_err(|_| JsError::new("crop widget is busy"))
    }

    fn borrow_mut(&self) -> Result<std::cell::RefMut<'_, CropWidget<JsFetcher>>, JsError> {
        self.inner
            .try_borrow_mut()
            .map_err(|_| JsError::new("crop widget is busy"))
    }

    fn load(&self, source: ModelSource) -> Promise {
        let inner = Rc::clone(&self.inner);
        let observer = JsObserver {
            callbacks: Rc::clone(&self.callbacks),
        };
        future_to_promise(async move {
            let (ticket, loader) = inner
                .try_borrow_mut()
                .map_err(js_error)?
                .begin_load()
                .map_err(js_error)?;
            let loaded = loader
                .load(source, &mut |progress| observer.on_progress(&progress))
                .await;
            let summary = inner
                .try_borrow_mut()
                .map_err(js_error)?
                .finish_load(ticket, loaded)
                .map_err(js_error)?;
            serde_wasm_bindgen::to_value(&JsLoadSummary::from(&summary)).map_err(js_error)
        })
    }
}

/// Detect a model format from a file name, MIME type and leading bytes.
/// Returns `"glb" | "gltf" | "fbx" | "unknown"`.
#[wasm_bindgen(js_name = detectModelFormat)]
pub fn detect_format(name: Option<String>, mime: Option<String>, bytes: Option<Vec<u8>>) -> String {
    detect_model_format(name.as_deref(), mime.as_deref(), bytes.as_deref())
        .as_str()
        .to_string()
}

/// Normalize a colour string to `#rrggbb`, or `undefined` if unparseable.
#[wasm_bindgen(js_name = parseColor)]
pub fn parse_color_js(input: &str) -> Option<String> {
    meshcrop::try_parse_color(input).map(|c| c.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshcrop::ModelFormat;
    use meshcrop_math::{Aabb3, Point3};

    fn summary(bounds: Aabb3) -> LoadSummary {
        LoadSummary {
            format: ModelFormat::Glb,
            meshes: 2,
            triangles: 12,
            bounds,
            crop_box: CropBox::fitted(&bounds, 0.1),
        }
    }

    #[test]
    fn test_summary_fields_are_camel_case() {
        let bounds = Aabb3::new(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 2.0, 3.0));
        let json = serde_json::to_value(JsLoadSummary::from(&summary(bounds))).unwrap();
        assert_eq!(json["format"], "glb");
        assert_eq!(json["triangles"], 12);
        assert_eq!(json["boundsMax"][2], 3.0);
        assert_eq!(json["cropBox"]["minX"], -0.1);
    }

    #[test]
    fn test_content_type_prefers_header_and_skips_blanks() {
        let some = |s: &str| Some(s.to_string());
        assert_eq!(
            pick_content_type(some(" model/gltf-binary "), some("application/octet-stream")).as_deref(),
            Some("model/gltf-binary")
        );
        assert_eq!(
            pick_content_type(some(""), some("model/gltf+json")).as_deref(),
            Some("model/gltf+json")
        );
        assert_eq!(pick_content_type(None, some("  ")), None);
        assert_eq!(pick_content_type(None, None), None);
    }

    #[test]
    fn test_empty_bounds_are_omitted() {
        let json = serde_json::to_value(JsLoadSummary::from(&summary(Aabb3::empty()))).unwrap();
        assert!(json["boundsMin"].is_null());
        assert!(json["boundsMax"].is_null());
    }
}
