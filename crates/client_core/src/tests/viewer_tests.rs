use super::*;
use tokio::sync::broadcast::error::TryRecvError;

use crate::test_support::{entries, RecordingEngine};

const ETHANOL: &str = "@<TRIPOS>MOLECULE\nethanol\n";
const BENZENE: &str = "@<TRIPOS>MOLECULE\nbenzene\n";

fn lifecycle(engine: Option<Arc<RecordingEngine>>) -> ViewerLifecycle {
    ViewerLifecycle::new(
        SessionId(1),
        SurfaceId("sample-1-viewer".to_string()),
        ViewerOptions::default(),
        engine.map(|engine| engine as Arc<dyn RenderEngine>),
    )
}

fn drain(transitions: &mut broadcast::Receiver<ViewerState>) -> Vec<ViewerState> {
    let mut seen = Vec::new();
    loop {
        match transitions.try_recv() {
            Ok(state) => seen.push(state),
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return seen,
            Err(TryRecvError::Lagged(_)) => continue,
        }
    }
}

#[test]
fn starts_loading_without_engine_and_ready_with_one() {
    assert_eq!(lifecycle(None).state(), &ViewerState::EngineLoading);
    assert_eq!(
        lifecycle(Some(Arc::new(RecordingEngine::default()))).state(),
        &ViewerState::EngineReadyNoData
    );
}

#[test]
fn structure_arriving_before_engine_renders_once_engine_loads() {
    let engine = Arc::new(RecordingEngine::default());
    let mut viewer = lifecycle(None);
    let mut transitions = viewer.subscribe();

    viewer.set_structure(Some(StructureBlob::new(ETHANOL)));
    assert_eq!(viewer.state(), &ViewerState::EngineLoading);
    assert_eq!(engine.created(), 0);

    viewer.engine_ready(engine.clone());

    assert_eq!(
        drain(&mut transitions),
        vec![
            ViewerState::EngineReadyNoData,
            ViewerState::Initializing,
            ViewerState::Rendered,
        ]
    );
    assert!(viewer.has_instance());
    assert_eq!(
        entries(&engine.log),
        vec![
            "create#1:sample-1-viewer:300x200",
            "add_model:mol2#1",
            "set_style#1",
            "zoom_to#1",
            "render#1",
        ]
    );
}

#[test]
fn absent_structure_while_loading_stays_loading() {
    let mut viewer = lifecycle(None);
    viewer.set_structure(None);
    assert_eq!(viewer.state(), &ViewerState::EngineLoading);
    assert!(!viewer.has_instance());
}

#[test]
fn new_structure_clears_previous_instance_before_creating_next() {
    let engine = Arc::new(RecordingEngine::default());
    let mut viewer = lifecycle(Some(engine.clone()));

    viewer.set_structure(Some(StructureBlob::new(ETHANOL)));
    viewer.set_structure(Some(StructureBlob::new(BENZENE)));

    assert_eq!(viewer.state(), &ViewerState::Rendered);
    let log = entries(&engine.log);
    let cleared = log
        .iter()
        .position(|entry| entry == "clear#1")
        .expect("first instance cleared");
    let created = log
        .iter()
        .position(|entry| entry.starts_with("create#2"))
        .expect("second instance created");
    assert!(cleared < created);
    assert_eq!(engine.max_live(), 1);
    assert_eq!(engine.live(), 1);
}

#[test]
fn identical_structure_keeps_current_instance() {
    let engine = Arc::new(RecordingEngine::default());
    let mut viewer = lifecycle(Some(engine.clone()));
    viewer.set_structure(Some(StructureBlob::new(ETHANOL)));
    let mut transitions = viewer.subscribe();

    viewer.set_structure(Some(StructureBlob::new(ETHANOL)));

    assert!(drain(&mut transitions).is_empty());
    assert_eq!(engine.created(), 1);
    assert_eq!(viewer.state(), &ViewerState::Rendered);
}

#[test]
fn absent_structure_tears_down_and_returns_to_ready() {
    let engine = Arc::new(RecordingEngine::default());
    let mut viewer = lifecycle(Some(engine.clone()));
    viewer.set_structure(Some(StructureBlob::new(ETHANOL)));

    viewer.set_structure(None);

    assert_eq!(viewer.state(), &ViewerState::EngineReadyNoData);
    assert!(!viewer.has_instance());
    assert_eq!(engine.live(), 0);
    assert_eq!(entries(&engine.log).last().map(String::as_str), Some("clear#1"));
}

#[test]
fn failing_model_ends_in_failed_with_instance_released() {
    let engine = Arc::new(RecordingEngine::failing_models_containing("broken"));
    let mut viewer = lifecycle(Some(engine.clone()));

    viewer.set_structure(Some(StructureBlob::new("broken mol2")));

    match viewer.state() {
        ViewerState::Failed { reason } => {
            assert!(reason.contains("add_model"));
            assert!(reason.contains("unparseable model"));
        }
        other => panic!("unexpected state: {other:?}"),
    }
    assert!(!viewer.has_instance());
    assert_eq!(engine.live(), 0);

    viewer.set_structure(Some(StructureBlob::new(ETHANOL)));
    assert_eq!(viewer.state(), &ViewerState::Rendered);
    assert_eq!(engine.live(), 1);
}

#[test]
fn viewer_creation_failure_is_reported_inline() {
    let engine = Arc::new(RecordingEngine::failing_create());
    let mut viewer = lifecycle(Some(engine.clone()));
    let mut transitions = viewer.subscribe();

    viewer.set_structure(Some(StructureBlob::new(ETHANOL)));

    let seen = drain(&mut transitions);
    assert_eq!(seen.first(), Some(&ViewerState::Initializing));
    assert!(matches!(seen.last(), Some(ViewerState::Failed { reason }) if reason.contains("WebGL")));
    assert_eq!(engine.created(), 0);
}

#[test]
fn dropping_lifecycle_releases_live_instance() {
    let engine = Arc::new(RecordingEngine::default());
    let mut viewer = lifecycle(Some(engine.clone()));
    viewer.set_structure(Some(StructureBlob::new(ETHANOL)));
    assert_eq!(engine.live(), 1);

    drop(viewer);

    assert_eq!(engine.live(), 0);
}

#[test]
fn late_engine_ready_is_ignored_once_loaded() {
    let first = Arc::new(RecordingEngine::default());
    let second = Arc::new(RecordingEngine::default());
    let mut viewer = lifecycle(Some(first.clone()));

    viewer.engine_ready(second.clone());
    viewer.set_structure(Some(StructureBlob::new(ETHANOL)));

    assert_eq!(first.created(), 1);
    assert_eq!(second.created(), 0);
}
