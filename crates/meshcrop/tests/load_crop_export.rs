mod common;

use base64::Engine as _;
use common::{strip_glb, MapFetcher};
use meshcrop::{
    CropBox, CropOptions, CropStrategy, EngineError, LoadingState, ModelEngine, ModelFormat, ModelSource,
    ModelTransform, OfflineFetcher, Vec3,
};
use meshcrop_io::{GltfParser, MeshParser};

fn reimported_triangles(glb: &[u8]) -> usize {
    GltfParser
        .parse(glb, &mut |_| {})
        .unwrap()
        .iter()
        .map(|root| root.triangle_count())
        .sum()
}

#[tokio::test]
async fn test_enclosing_crop_then_export_keeps_every_triangle() {
    let mut engine = ModelEngine::new(OfflineFetcher);
    let summary = engine
        .load(ModelSource::file("strip.glb", strip_glb(4)))
        .await
        .unwrap();
    assert_eq!(summary.format, ModelFormat::Glb);
    assert_eq!(summary.triangles, 8);

    // The fitted box encloses the model.
    let result = engine.apply_crop();
    assert!(result.success);
    assert_eq!(result.triangles_removed, 0);
    assert_eq!(result.triangles_kept, 8);

    let glb = engine.export().unwrap();
    assert_eq!(reimported_triangles(&glb), 8);
}

#[tokio::test]
async fn test_partial_crop_is_exported() {
    let mut engine = ModelEngine::new(OfflineFetcher);
    engine
        .load(ModelSource::file("strip.glb", strip_glb(4)))
        .await
        .unwrap();

    engine.update_crop_box(CropBox::new(-0.5, 2.2, -0.5, 1.5, -0.5, 0.5));
    let result = engine.apply_crop();
    assert_eq!((result.triangles_kept, result.triangles_removed), (4, 4));
    assert_eq!(result.meshes_processed, 1);

    let glb = engine.export().unwrap();
    assert_eq!(reimported_triangles(&glb), 4);
}

#[tokio::test]
async fn test_crop_sees_model_transform() {
    let mut engine = ModelEngine::new(OfflineFetcher);
    engine
        .load(ModelSource::file("strip.glb", strip_glb(4)))
        .await
        .unwrap();

    let crop_box = CropBox::new(-3.5, -1.5, -0.5, 1.5, -0.5, 0.5);
    let options = CropOptions {
        strategy: CropStrategy::AllVertices,
        recompute_normals: true,
    };

    // Untransformed, the strip spans x in [0, 4] and misses the box.
    engine.update_crop_box(crop_box);
    let result = engine.apply_crop_with(&CropOptions {
        strategy: CropStrategy::AnyVertex,
        ..options
    });
    assert_eq!(result.triangles_kept, 0);

    let mut engine = ModelEngine::new(OfflineFetcher);
    engine
        .load(ModelSource::file("strip.glb", strip_glb(4)))
        .await
        .unwrap();
    // Shifted by -3, its first quad spans x in [-3, -2].
    engine.set_transform(ModelTransform::new(Vec3::new(-3.0, 0.0, 0.0), Default::default()));
    engine.update_crop_box(crop_box);
    let result = engine.apply_crop_with(&options);
    assert_eq!((result.triangles_kept, result.triangles_removed), (2, 6));
}

#[tokio::test]
async fn test_fitted_box_follows_model_position() {
    let mut engine = ModelEngine::new(OfflineFetcher);
    engine.set_transform(ModelTransform::new(Vec3::new(10.0, 0.0, 0.0), Default::default()));
    let summary = engine
        .load(ModelSource::file("strip.glb", strip_glb(2)))
        .await
        .unwrap();

    let b = summary.crop_box;
    assert!((b.min_x - 9.9).abs() < 1e-9);
    assert!((b.max_x - 12.1).abs() < 1e-9);
    assert!((b.max_y - 1.1).abs() < 1e-9);
    // The model is not re-centred.
    assert_eq!(engine.transform().position, Vec3::new(10.0, 0.0, 0.0));
    let framing = engine.framing().unwrap();
    assert!((framing.target.x - 11.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_gltf_json_with_embedded_buffer_over_data_url() {
    let mut positions = Vec::new();
    for v in [0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0] {
        positions.extend_from_slice(&v.to_le_bytes());
    }
    let b64 = base64::engine::general_purpose::STANDARD;
    let gltf = serde_json::json!({
        "asset": { "version": "2.0" },
        "scenes": [{ "nodes": [0] }],
        "nodes": [{ "mesh": 0 }],
        "meshes": [{ "primitives": [{ "attributes": { "POSITION": 0 } }] }],
        "accessors": [{ "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
                        "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0] }],
        "bufferViews": [{ "buffer": 0, "byteLength": 36 }],
        "buffers": [{
            "byteLength": 36,
            "uri": format!("data:application/octet-stream;base64,{}", b64.encode(&positions))
        }]
    })
    .to_string();
    let url = format!("data:model/gltf+json;base64,{}", b64.encode(gltf.as_bytes()));

    let mut engine = ModelEngine::new(OfflineFetcher);
    let summary = engine.load(ModelSource::url(url)).await.unwrap();
    assert_eq!(summary.format, ModelFormat::Glb);
    assert_eq!(summary.triangles, 1);
    assert!(engine.model_url().unwrap().starts_with("data:"));
}

#[tokio::test]
async fn test_remote_model_and_fetch_failure() {
    let fetcher = MapFetcher::default().with(
        "https://models.test/strip?id=7",
        strip_glb(1),
        Some("application/octet-stream"),
    );
    let mut engine = ModelEngine::new(fetcher);

    // Neither the URL nor the MIME type says GLB; the magic bytes do.
    let summary = engine
        .load(ModelSource::url("https://models.test/strip?id=7"))
        .await
        .unwrap();
    assert_eq!(summary.format, ModelFormat::Glb);

    let err = engine
        .load(ModelSource::url("https://models.test/missing.glb"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Source(_)));
    assert_eq!(engine.state(), LoadingState::Error);
    assert!(!engine.has_model());
    assert!(engine.last_error().unwrap().contains("404"));
}

#[tokio::test]
async fn test_host_object_url_is_fetched() {
    let url = "blob:https://app.test/6f1c0b7e-5d6a-4c43-9a4e-2f0f3c1d8e11";
    let fetcher = MapFetcher::default().with(url, strip_glb(3), None);
    let mut engine = ModelEngine::new(fetcher);

    let summary = engine.load(ModelSource::url(url)).await.unwrap();
    assert_eq!(summary.format, ModelFormat::Glb);
    assert_eq!(summary.triangles, 6);
    assert_eq!(engine.model_url(), Some(url));
}

fn triangle_gltf_with_buffer(uri: &str) -> Vec<u8> {
    serde_json::json!({
        "asset": { "version": "2.0" },
        "scenes": [{ "nodes": [0] }],
        "nodes": [{ "mesh": 0 }],
        "meshes": [{ "primitives": [{ "attributes": { "POSITION": 0 } }] }],
        "accessors": [{ "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
                        "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0] }],
        "bufferViews": [{ "buffer": 0, "byteLength": 36 }],
        "buffers": [{ "byteLength": 36, "uri": uri }]
    })
    .to_string()
    .into_bytes()
}

#[tokio::test]
async fn test_gltf_buffers_resolve_next_to_the_model() {
    let mut bin = Vec::new();
    for v in [0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0] {
        bin.extend_from_slice(&v.to_le_bytes());
    }
    let fetcher = MapFetcher::default()
        .with("https://m.test/models/tri.gltf", triangle_gltf_with_buffer("tri.bin"), None)
        .with("https://m.test/models/tri.bin", bin, Some("application/octet-stream"))
        .with("https://m.test/models/lost.gltf", triangle_gltf_with_buffer("lost.bin"), None);
    let mut engine = ModelEngine::new(fetcher);

    let summary = engine
        .load(ModelSource::url("https://m.test/models/tri.gltf"))
        .await
        .unwrap();
    assert_eq!(summary.triangles, 1);

    let err = engine
        .load(ModelSource::url("https://m.test/models/lost.gltf"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("https://m.test/models/lost.bin"));

    // A picked file has no location to resolve `tri.bin` against.
    let err = engine
        .load(ModelSource::file("tri.gltf", triangle_gltf_with_buffer("tri.bin")))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Source(meshcrop_io::SourceError::UnresolvableReference { .. })
    ));
    assert!(engine.loader().resolver().object_urls().is_empty());
}

#[tokio::test]
async fn test_fbx_has_no_default_parser() {
    let mut engine = ModelEngine::new(OfflineFetcher);
    let err = engine
        .load(ModelSource::file("rig.fbx", b"Kaydara FBX Binary  \0".to_vec()))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Parse(_)));
    assert_eq!(engine.state(), LoadingState::Error);

    // The engine stays usable.
    engine
        .load(ModelSource::file("strip.glb", strip_glb(1)))
        .await
        .unwrap();
    assert_eq!(engine.state(), LoadingState::Loaded);
    assert!(engine.last_error().is_none());
}

#[tokio::test]
async fn test_object_urls_are_revoked_after_every_load() {
    let mut engine = ModelEngine::new(OfflineFetcher);
    engine
        .load(ModelSource::blob(strip_glb(1)))
        .await
        .unwrap();
    let _ = engine
        .load(ModelSource::blob(b"{ not json".to_vec()))
        .await
        .unwrap_err();
    assert!(engine.loader().resolver().object_urls().is_empty());
}
