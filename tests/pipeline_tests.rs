//! 流水线端到端测试: 脚本分类器 + 记录型跟踪器/存储/展示层

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use image::RgbImage;

use speedsign_rs::config::PipelineConfig;
use speedsign_rs::dashboard::Dashboard;
use speedsign_rs::detection::{Detection, NoopOverlay, Recognition, StoreWrite, Tracker};
use speedsign_rs::input::RawFrame;
use speedsign_rs::models::{Classifier, ClassifierError};
use speedsign_rs::pipeline::{FrameOutcome, Pipeline, PipelineParts};
use speedsign_rs::remote::StoreSink;
use speedsign_rs::speed::CurrentAddress;
use speedsign_rs::utils::Rect;

const EPS: f32 = 1e-3;

#[derive(Default)]
struct RecordingTracker {
    configuration: Option<(u32, u32, i32)>,
    results: Vec<(u64, Vec<Detection>)>,
}

impl Tracker for RecordingTracker {
    fn set_frame_configuration(&mut self, width: u32, height: u32, rotation: i32) {
        self.configuration = Some((width, height, rotation));
    }

    fn track_results(&mut self, detections: Vec<Detection>, token: u64) {
        self.results.push((token, detections));
    }

    fn draw(&self, _canvas: &mut RgbImage) {}
}

#[derive(Default)]
struct RecordingStore {
    writes: Mutex<Vec<StoreWrite>>,
}

impl StoreSink for RecordingStore {
    fn schedule(&self, write: StoreWrite) {
        self.writes.lock().unwrap().push(write);
    }
}

#[derive(Default)]
struct RecordingDashboard {
    history: Mutex<Vec<Vec<String>>>,
}

impl Dashboard for RecordingDashboard {
    fn show_history(&self, labels: &[String]) {
        self.history.lock().unwrap().push(labels.to_vec());
    }
}

/// 每次推理返回同一组结果
struct ScriptedClassifier {
    output: Result<Vec<Recognition>, String>,
}

impl Classifier for ScriptedClassifier {
    fn detect(&mut self, _crop: &RgbImage) -> Result<Vec<Recognition>, ClassifierError> {
        self.output.clone().map_err(ClassifierError::Inference)
    }

    fn set_num_threads(&mut self, _num_threads: usize) {}

    fn set_use_acceleration(&mut self, _enabled: bool) {}
}

/// 推理开始时通知, 然后阻塞直到收到放行信号
struct BlockingClassifier {
    started: Sender<()>,
    release: Receiver<()>,
}

impl Classifier for BlockingClassifier {
    fn detect(&mut self, _crop: &RgbImage) -> Result<Vec<Recognition>, ClassifierError> {
        let _ = self.started.send(());
        let _ = self.release.recv();
        Ok(Vec::new())
    }

    fn set_num_threads(&mut self, _num_threads: usize) {}

    fn set_use_acceleration(&mut self, _enabled: bool) {}
}

/// 第一次推理 panic, 之后正常返回空结果
#[derive(Default)]
struct PanicOnceClassifier {
    calls: usize,
}

impl Classifier for PanicOnceClassifier {
    fn detect(&mut self, _crop: &RgbImage) -> Result<Vec<Recognition>, ClassifierError> {
        self.calls += 1;
        if self.calls == 1 {
            panic!("classifier blew up");
        }
        Ok(Vec::new())
    }

    fn set_num_threads(&mut self, _num_threads: usize) {}

    fn set_use_acceleration(&mut self, _enabled: bool) {}
}

struct Harness {
    pipeline: Pipeline,
    tracker: Arc<Mutex<RecordingTracker>>,
    store: Arc<RecordingStore>,
    dashboard: Arc<RecordingDashboard>,
}

fn harness(classifier: Box<dyn Classifier>, address: &str) -> Harness {
    let tracker = Arc::new(Mutex::new(RecordingTracker::default()));
    let store = Arc::new(RecordingStore::default());
    let dashboard = Arc::new(RecordingDashboard::default());
    let parts = PipelineParts {
        classifier,
        tracker: tracker.clone(),
        overlay: Arc::new(NoopOverlay),
        store: store.clone(),
        dashboard: dashboard.clone(),
        address: CurrentAddress::with_value(address),
        preview: None,
    };
    let mut pipeline = Pipeline::new(&PipelineConfig::default(), parts).unwrap();
    pipeline.reconfigure(640, 480, 90).unwrap();
    Harness {
        pipeline,
        tracker,
        store,
        dashboard,
    }
}

fn frame() -> RawFrame {
    RawFrame::new(640, 480, vec![200; 640 * 480 * 4])
}

fn wait_until_idle(pipeline: &Pipeline) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while pipeline.is_busy() {
        assert!(Instant::now() < deadline, "scheduler never released");
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn sign_is_mapped_recorded_and_tracked() {
    let classifier = ScriptedClassifier {
        output: Ok(vec![Recognition::new(
            "100",
            0.9,
            Some(Rect::new(100.0, 100.0, 200.0, 200.0)),
        )]),
    };
    let h = harness(Box::new(classifier), "Main St");
    assert_eq!(h.tracker.lock().unwrap().configuration, Some((640, 480, 90)));

    let mut pipeline = h.pipeline;
    assert_eq!(pipeline.on_frame(&frame()).unwrap(), FrameOutcome::Dispatched(1));
    let stats = pipeline.shutdown().unwrap();
    assert_eq!(stats.token, 1);
    assert_eq!(stats.frame_size, (640, 480));
    assert_eq!(stats.crop_size, 512);
    assert_eq!(stats.detections, 1);

    let tracker = h.tracker.lock().unwrap();
    assert_eq!(tracker.results.len(), 1);
    let (token, detections) = &tracker.results[0];
    assert_eq!(*token, 1);
    assert_eq!(detections.len(), 1);
    let r = detections[0].location;
    assert_eq!(detections[0].label, "100");
    assert!((r.left - 125.0).abs() < EPS);
    assert!((r.top - 292.5).abs() < EPS);
    assert!((r.right - 250.0).abs() < EPS);
    assert!((r.bottom - 386.25).abs() < EPS);

    assert_eq!(
        *h.store.writes.lock().unwrap(),
        vec![StoreWrite {
            key: "Main St".into(),
            value: "100".into()
        }]
    );
    assert_eq!(
        *h.dashboard.history.lock().unwrap(),
        vec![vec!["100".to_string()]]
    );
}

#[test]
fn repeated_sign_is_written_once() {
    let classifier = ScriptedClassifier {
        output: Ok(vec![Recognition::new(
            "60",
            0.95,
            Some(Rect::new(10.0, 10.0, 60.0, 60.0)),
        )]),
    };
    let h = harness(Box::new(classifier), "Main St");
    let mut pipeline = h.pipeline;
    for _ in 0..3 {
        pipeline.on_frame(&frame()).unwrap();
        wait_until_idle(&pipeline);
    }
    pipeline.shutdown();

    assert_eq!(h.store.writes.lock().unwrap().len(), 1);
    assert_eq!(h.dashboard.history.lock().unwrap().len(), 1);
    assert_eq!(h.tracker.lock().unwrap().results.len(), 3);
}

#[test]
fn busy_detector_drops_frames() {
    let (started_tx, started_rx) = crossbeam_channel::unbounded();
    let (release_tx, release_rx) = crossbeam_channel::unbounded();
    let classifier = BlockingClassifier {
        started: started_tx,
        release: release_rx,
    };
    let h = harness(Box::new(classifier), "Main St");
    let mut pipeline = h.pipeline;

    assert_eq!(pipeline.on_frame(&frame()).unwrap(), FrameOutcome::Dispatched(1));
    started_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("classifier never started");

    // 检测进行中, 新帧被丢弃但仍计数
    assert_eq!(pipeline.on_frame(&frame()).unwrap(), FrameOutcome::Dropped);
    assert_eq!(pipeline.on_frame(&frame()).unwrap(), FrameOutcome::Dropped);
    assert_eq!(pipeline.frame_count(), 3);
    assert!(pipeline.is_busy());

    release_tx.send(()).unwrap();
    wait_until_idle(&pipeline);

    assert_eq!(pipeline.on_frame(&frame()).unwrap(), FrameOutcome::Dispatched(4));
    release_tx.send(()).unwrap();
    pipeline.shutdown();

    let tokens: Vec<u64> = h
        .tracker
        .lock()
        .unwrap()
        .results
        .iter()
        .map(|(t, _)| *t)
        .collect();
    assert_eq!(tokens, vec![1, 4]);
}

#[test]
fn classifier_failure_releases_scheduler() {
    let classifier = ScriptedClassifier {
        output: Err("model crashed".into()),
    };
    let h = harness(Box::new(classifier), "Main St");
    let mut pipeline = h.pipeline;

    assert_eq!(pipeline.on_frame(&frame()).unwrap(), FrameOutcome::Dispatched(1));
    wait_until_idle(&pipeline);
    assert_eq!(pipeline.on_frame(&frame()).unwrap(), FrameOutcome::Dispatched(2));
    pipeline.shutdown();

    let tracker = h.tracker.lock().unwrap();
    assert_eq!(tracker.results.len(), 2);
    assert!(tracker.results.iter().all(|(_, d)| d.is_empty()));
    assert!(h.store.writes.lock().unwrap().is_empty());
}

#[test]
fn classifier_panic_keeps_detector_alive() {
    let h = harness(Box::new(PanicOnceClassifier::default()), "Main St");
    let mut pipeline = h.pipeline;

    assert_eq!(pipeline.on_frame(&frame()).unwrap(), FrameOutcome::Dispatched(1));
    wait_until_idle(&pipeline);
    assert_eq!(pipeline.on_frame(&frame()).unwrap(), FrameOutcome::Dispatched(2));
    wait_until_idle(&pipeline);
    assert_eq!(pipeline.on_frame(&frame()).unwrap(), FrameOutcome::Dispatched(3));
    let stats = pipeline.shutdown().unwrap();
    assert_eq!(stats.token, 3);

    let tokens: Vec<u64> = h
        .tracker
        .lock()
        .unwrap()
        .results
        .iter()
        .map(|(t, _)| *t)
        .collect();
    assert_eq!(tokens, vec![1, 2, 3]);
}

#[test]
fn low_confidence_never_reaches_store() {
    let classifier = ScriptedClassifier {
        output: Ok(vec![
            Recognition::new("80", 0.5, Some(Rect::new(10.0, 10.0, 60.0, 60.0))),
            Recognition::new("80", 0.99, None),
        ]),
    };
    let h = harness(Box::new(classifier), "Main St");
    let mut pipeline = h.pipeline;
    pipeline.on_frame(&frame()).unwrap();
    pipeline.shutdown();

    assert!(h.store.writes.lock().unwrap().is_empty());
    assert!(h.dashboard.history.lock().unwrap().is_empty());
    assert_eq!(h.tracker.lock().unwrap().results[0].1.len(), 0);
}
