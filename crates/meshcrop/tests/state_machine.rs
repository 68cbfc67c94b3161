mod common;

use std::rc::Rc;

use common::{recorder, strip_glb, CountingDisposer, MapFetcher};
use meshcrop::{
    CropBox, CropBoxField, CropWidget, EngineError, LoadingState, ModelEngine, ModelSource,
    ModelTransform, OfflineFetcher, Vec3,
};

#[tokio::test]
async fn test_crop_validity_transitions() {
    let mut engine = ModelEngine::new(OfflineFetcher);
    assert!(!engine.crop_valid());
    engine
        .load(ModelSource::file("strip.glb", strip_glb(2)))
        .await
        .unwrap();
    assert!(!engine.crop_valid());

    engine.apply_crop();
    assert!(engine.crop_valid());
    engine.update_crop_box(engine.crop_box());
    assert!(!engine.crop_valid());

    engine.apply_crop();
    assert!(engine.crop_valid());
    engine.set_transform(engine.transform());
    assert!(!engine.crop_valid());

    engine.apply_crop();
    engine.set_crop_box_field(CropBoxField::MaxX, 0.5);
    assert!(!engine.crop_valid());

    engine.apply_crop();
    engine
        .load(ModelSource::file("strip.glb", strip_glb(2)))
        .await
        .unwrap();
    assert!(!engine.crop_valid());
}

#[tokio::test]
async fn test_second_crop_removes_nothing() {
    let mut engine = ModelEngine::new(OfflineFetcher);
    engine
        .load(ModelSource::file("strip.glb", strip_glb(4)))
        .await
        .unwrap();
    engine.update_crop_box(CropBox::new(-0.5, 2.6, -0.5, 1.5, -0.5, 0.5));
    let first = engine.apply_crop();
    let second = engine.apply_crop();
    assert!(first.triangles_removed > 0);
    assert_eq!(second.triangles_removed, 0);
    assert_eq!(second.triangles_kept, first.triangles_kept);
    assert_eq!(engine.last_crop(), Some(second));
}

#[tokio::test]
async fn test_widget_gates_export_on_fresh_crop() {
    let mut widget = CropWidget::with_engine(ModelEngine::new(OfflineFetcher));
    assert!(matches!(widget.export(), Err(EngineError::NoModelLoaded)));

    widget
        .load(ModelSource::file("strip.glb", strip_glb(2)))
        .await
        .unwrap();
    assert!(!widget.can_export());
    assert!(matches!(widget.export(), Err(EngineError::CropNotApplied)));

    widget.apply_crop().unwrap();
    assert!(widget.can_export());
    assert!(!widget.export().unwrap().is_empty());

    widget.set_rotation_degrees([0.0, 0.0, 45.0]).unwrap();
    assert!(!widget.can_export());
    assert!(matches!(widget.export(), Err(EngineError::CropNotApplied)));

    // The engine itself does not gate.
    assert!(widget.engine().unwrap().export().is_ok());
}

#[tokio::test]
async fn test_latest_requested_load_wins() {
    let fetcher = MapFetcher::default()
        .with("https://m.test/small.glb", strip_glb(1), None)
        .with("https://m.test/large.glb", strip_glb(3), None);
    let disposer = Rc::new(CountingDisposer::default());
    let mut engine = ModelEngine::new(fetcher).with_disposer(disposer.clone());
    let observer = recorder();
    engine.add_observer(observer.clone());

    let first = engine.begin_load();
    let second = engine.begin_load();
    let loader = engine.loader();

    let large = loader
        .load(ModelSource::url("https://m.test/large.glb"), &mut |_| {})
        .await;
    let summary = engine.finish_load(second, large).unwrap();
    assert_eq!(summary.triangles, 6);

    // The older request resolves late and must not replace the model.
    let small = loader
        .load(ModelSource::url("https://m.test/small.glb"), &mut |_| {})
        .await;
    let err = engine.finish_load(first, small).unwrap_err();
    assert!(matches!(err, EngineError::LoadSuperseded));
    assert_eq!(*disposer.disposed.borrow(), 1);

    assert_eq!(engine.state(), LoadingState::Loaded);
    assert_eq!(engine.scene().unwrap().triangle_count(), 6);
    assert!(observer.errors.borrow().is_empty());
    assert_eq!(
        *observer.states.borrow(),
        vec![LoadingState::Loading, LoadingState::Loaded]
    );
}

#[tokio::test]
async fn test_stale_failure_is_ignored() {
    let mut engine = ModelEngine::new(MapFetcher::default().with(
        "https://m.test/ok.glb",
        strip_glb(1),
        None,
    ));
    let observer = recorder();
    engine.add_observer(observer.clone());

    let stale = engine.begin_load();
    let current = engine.begin_load();
    let loader = engine.loader();
    let ok = loader
        .load(ModelSource::url("https://m.test/ok.glb"), &mut |_| {})
        .await;
    engine.finish_load(current, ok).unwrap();

    let missing = loader
        .load(ModelSource::url("https://m.test/gone.glb"), &mut |_| {})
        .await;
    assert!(matches!(
        engine.finish_load(stale, missing),
        Err(EngineError::LoadSuperseded)
    ));
    assert_eq!(engine.state(), LoadingState::Loaded);
    assert!(observer.errors.borrow().is_empty());
}

#[tokio::test]
async fn test_observers_see_lifecycle() {
    let mut engine = ModelEngine::new(OfflineFetcher);
    let observer = recorder();
    engine.add_observer(observer.clone());

    engine
        .load(ModelSource::file("strip.glb", strip_glb(1)))
        .await
        .unwrap();
    let _ = engine
        .load(ModelSource::file("bad.glb", b"nope".to_vec()))
        .await
        .unwrap_err();
    assert!(matches!(engine.export(), Err(EngineError::NoModelLoaded)));
    engine.dispose();

    assert_eq!(
        *observer.states.borrow(),
        vec![
            LoadingState::Loading,
            LoadingState::Loaded,
            LoadingState::Loading,
            LoadingState::Error,
            LoadingState::Idle,
        ]
    );
    let errors = observer.errors.borrow();
    assert_eq!(errors.len(), 2);
    assert!(errors[0].starts_with("failed to parse model"));
    assert_eq!(errors[1], "no model loaded");

    let progress = observer.progress.borrow();
    assert_eq!(progress.first().unwrap().percentage, 0.0);
    assert!(progress.iter().any(|p| p.percentage == 100.0 && p.bytes_total.is_some()));
}

#[tokio::test]
async fn test_replaced_models_are_disposed() {
    let disposer = Rc::new(CountingDisposer::default());
    let mut engine = ModelEngine::new(OfflineFetcher).with_disposer(disposer.clone());
    engine
        .load(ModelSource::file("a.glb", strip_glb(1)))
        .await
        .unwrap();
    engine.set_transform(ModelTransform::new(Vec3::new(0.0, 5.0, 0.0), Default::default()));
    engine
        .load(ModelSource::file("b.glb", strip_glb(1)))
        .await
        .unwrap();
    assert_eq!(*disposer.disposed.borrow(), 1);

    // Cropping swaps the geometry and disposes the old one.
    engine.update_crop_box(CropBox::new(0.0, 0.5, 0.0, 10.0, -1.0, 1.0));
    engine.apply_crop();
    assert_eq!(*disposer.disposed.borrow(), 2);

    drop(engine);
    assert_eq!(*disposer.disposed.borrow(), 3);
}
