//! End-to-end runs of the frame loop with in-memory collaborators.

use poise_core::detector::DetectorError;
use poise_core::indices::{PoseLandmark, LEFT_EYE, MOUTH, RIGHT_EYE};
use poise_core::replay::{RecordedFrame, Recording};
use poise_core::{
    CaptureError, ConfigError, Display, FrameOrchestrator, FrameReport, FrameSource, LandmarkDetector,
    NormalizedLandmark, PipelineState, Projector, RenderError, RgbFrame, StopReason,
};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

const W: u32 = 200;
const H: u32 = 100;

/// Normalized landmark that projects (by truncation) to exactly `(px, py)`.
fn at(px: i32, py: i32) -> NormalizedLandmark {
    NormalizedLandmark::new((px as f32 + 0.5) / W as f32, (py as f32 + 0.5) / H as f32, 0.0)
}

fn frame(sequence: u32) -> RgbFrame {
    RgbFrame {
        data: vec![0; (W * H * 3) as usize],
        width: W,
        height: H,
        sequence,
    }
}

/// Open eyes (30px wide, 10px tall), a mouth, and brow above the eye.
fn open_face() -> Vec<NormalizedLandmark> {
    let mut lms = vec![at(100, 50); 478];
    let eye = |cx: i32| [(cx - 15, 40), (cx - 7, 35), (cx + 7, 35), (cx + 15, 40), (cx + 7, 45), (cx - 7, 45)];
    for (&idx, &(x, y)) in LEFT_EYE.iter().zip(eye(60).iter()) {
        lms[idx] = at(x, y);
    }
    for (&idx, &(x, y)) in RIGHT_EYE.iter().zip(eye(140).iter()) {
        lms[idx] = at(x, y);
    }
    let mouth = [
        (80, 75),
        (90, 70),
        (95, 72),
        (100, 72),
        (105, 72),
        (110, 70),
        (120, 75),
        (100, 78),
        (95, 78),
        (90, 80),
    ];
    for (&idx, &(x, y)) in MOUTH.iter().zip(mouth.iter()) {
        lms[idx] = at(x, y);
    }
    lms[159] = NormalizedLandmark::new(0.3, 0.35, 0.0);
    lms[105] = NormalizedLandmark::new(0.3, 0.25, 0.0);
    lms
}

fn upright_pose() -> Vec<NormalizedLandmark> {
    let mut lms = vec![NormalizedLandmark::default(); 33];
    lms[PoseLandmark::Nose.index()] = NormalizedLandmark::new(0.5, 0.3, 0.0);
    lms[PoseLandmark::LeftEye.index()] = NormalizedLandmark::new(0.55, 0.25, 0.0);
    lms[PoseLandmark::RightEye.index()] = NormalizedLandmark::new(0.45, 0.25, 0.0);
    // Subject's left shoulder appears on the image right.
    lms[PoseLandmark::LeftShoulder.index()] = NormalizedLandmark::new(0.75, 0.8, 0.0);
    lms[PoseLandmark::RightShoulder.index()] = NormalizedLandmark::new(0.25, 0.8, 0.0);
    lms
}

struct ScriptedSource {
    script: VecDeque<Result<Option<RgbFrame>, CaptureError>>,
    drops: Rc<Cell<u32>>,
}

impl ScriptedSource {
    fn frames(n: u32, drops: Rc<Cell<u32>>) -> Self {
        Self {
            script: (0..n).map(|i| Ok(Some(frame(i)))).collect(),
            drops,
        }
    }
}

impl FrameSource for ScriptedSource {
    fn next_frame(&mut self) -> Result<Option<RgbFrame>, CaptureError> {
        self.script.pop_front().unwrap_or(Ok(None))
    }
}

impl Drop for ScriptedSource {
    fn drop(&mut self) {
        self.drops.set(self.drops.get() + 1);
    }
}

struct FixedDetector {
    landmarks: Option<Vec<NormalizedLandmark>>,
    count: Option<usize>,
    drops: Rc<Cell<u32>>,
}

impl FixedDetector {
    fn new(landmarks: Option<Vec<NormalizedLandmark>>, drops: Rc<Cell<u32>>) -> Self {
        Self { landmarks, count: None, drops }
    }
}

impl LandmarkDetector for FixedDetector {
    fn detect(&mut self, _frame: &RgbFrame) -> Result<Option<Vec<NormalizedLandmark>>, DetectorError> {
        Ok(self.landmarks.clone())
    }

    fn landmark_count(&self) -> Option<usize> {
        self.count
    }
}

impl Drop for FixedDetector {
    fn drop(&mut self) {
        self.drops.set(self.drops.get() + 1);
    }
}

struct FailingDetector;

impl LandmarkDetector for FailingDetector {
    fn detect(&mut self, _frame: &RgbFrame) -> Result<Option<Vec<NormalizedLandmark>>, DetectorError> {
        Err(DetectorError::InferenceFailed("backend crashed".into()))
    }
}

#[derive(Default)]
struct RecordingDisplay {
    reports: Rc<RefCell<Vec<FrameReport>>>,
    quit_after: Option<usize>,
    fail_render: bool,
    drops: Rc<Cell<u32>>,
}

impl Display for RecordingDisplay {
    fn render(&mut self, _frame: &RgbFrame, report: &FrameReport) -> Result<(), RenderError> {
        if self.fail_render {
            return Err(RenderError("window closed".into()));
        }
        self.reports.borrow_mut().push(report.clone());
        Ok(())
    }

    fn poll_quit(&mut self) -> bool {
        self.quit_after.is_some_and(|n| self.reports.borrow().len() >= n)
    }
}

impl Drop for RecordingDisplay {
    fn drop(&mut self) {
        self.drops.set(self.drops.get() + 1);
    }
}

#[test]
fn open_eyes_yield_ear_near_one_third() {
    let drops = Rc::new(Cell::new(0));
    let display = RecordingDisplay::default();
    let reports = Rc::clone(&display.reports);

    let orchestrator = FrameOrchestrator::new(
        ScriptedSource::frames(1, drops.clone()),
        FixedDetector::new(Some(open_face()), drops.clone()),
        FixedDetector::new(Some(upright_pose()), drops.clone()),
        display,
        Projector::default(),
    )
    .unwrap();
    let summary = orchestrator.run();
    assert_eq!(summary.frames_processed, 1);

    let reports = reports.borrow();
    let m = reports[0].metrics;
    assert!((m.ear.unwrap() - 1.0 / 3.0).abs() < 1e-6, "ear = {:?}", m.ear);
    assert_eq!(m.left_ear, m.right_ear);
    // |p2-p8| = 6, |p3-p7| = 6, |p4-p6| = sqrt(225+9), width 40
    let expected_mar = (6.0 + 6.0 + 234f32.sqrt()) / 80.0;
    assert!((m.mar.unwrap() - expected_mar).abs() < 1e-6);
    assert!((m.eyebrow_raise.unwrap() - 0.1).abs() < 1e-5);
    assert!(m.pose_detected);

    let lines: Vec<_> = reports[0].overlay.text_lines().collect();
    assert_eq!(lines[0], "EAR: 0.33");
    assert_eq!(lines.len(), 6);
}

#[test]
fn collapsed_eyes_are_degenerate_not_fatal() {
    let mut face = open_face();
    for &idx in LEFT_EYE.iter().chain(RIGHT_EYE.iter()) {
        face[idx] = at(60, 40);
    }
    let drops = Rc::new(Cell::new(0));
    let display = RecordingDisplay::default();
    let reports = Rc::clone(&display.reports);

    let summary = FrameOrchestrator::new(
        ScriptedSource::frames(2, drops.clone()),
        FixedDetector::new(Some(face), drops.clone()),
        FixedDetector::new(None, drops.clone()),
        display,
        Projector::default(),
    )
    .unwrap()
    .run();

    assert_eq!(summary.frames_processed, 2);
    assert_eq!(summary.stop_reason, StopReason::EndOfStream);
    let m = reports.borrow()[1].metrics;
    assert_eq!(m.ear, None);
    assert_eq!(m.left_ear, None);
    // Other face metrics still computed.
    assert!(m.mar.is_some());
    assert!(m.eyebrow_raise.is_some());
}

#[test]
fn pose_without_face_still_estimates_head_pose() {
    let drops = Rc::new(Cell::new(0));
    let display = RecordingDisplay::default();
    let reports = Rc::clone(&display.reports);

    FrameOrchestrator::new(
        ScriptedSource::frames(1, drops.clone()),
        FixedDetector::new(None, drops.clone()),
        FixedDetector::new(Some(upright_pose()), drops.clone()),
        display,
        Projector::default(),
    )
    .unwrap()
    .run();

    let reports = reports.borrow();
    let m = reports[0].metrics;
    assert_eq!((m.ear, m.mar, m.eyebrow_raise), (None, None, None));
    assert!(m.pose_detected);
    // Shoulder vector points image-left: 180° - 180° = 0.
    assert!(m.roll.abs() < 1e-4, "roll = {}", m.roll);
    // Nose at y=30, shoulders at y=80 in a 100px frame: -50/100*90.
    assert!((m.pitch + 45.0).abs() < 1e-3, "pitch = {}", m.pitch);
    assert!(m.yaw.is_finite());

    let lines: Vec<_> = reports[0].overlay.text_lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("Pitch:"));
}

#[test]
fn no_pose_reports_neutral_sentinel() {
    let drops = Rc::new(Cell::new(0));
    let display = RecordingDisplay::default();
    let reports = Rc::clone(&display.reports);

    FrameOrchestrator::new(
        ScriptedSource::frames(1, drops.clone()),
        FixedDetector::new(Some(open_face()), drops.clone()),
        FixedDetector::new(None, drops.clone()),
        display,
        Projector::default(),
    )
    .unwrap()
    .run();

    let m = reports.borrow()[0].metrics;
    assert!(!m.pose_detected);
    assert_eq!((m.pitch, m.yaw, m.roll), (0.0, 0.0, 0.0));
}

#[test]
fn capture_failure_on_third_read_stops_after_two_frames() {
    let drops = Rc::new(Cell::new(0));
    let source = ScriptedSource {
        script: VecDeque::from([
            Ok(Some(frame(0))),
            Ok(Some(frame(1))),
            Err(CaptureError("device unplugged".into())),
            Ok(Some(frame(3))),
        ]),
        drops: drops.clone(),
    };
    let mut display = RecordingDisplay::default();
    display.drops = drops.clone();
    let reports = Rc::clone(&display.reports);

    let mut orchestrator = FrameOrchestrator::new(
        source,
        FixedDetector::new(Some(open_face()), drops.clone()),
        FixedDetector::new(Some(upright_pose()), drops.clone()),
        display,
        Projector::default(),
    )
    .unwrap();

    assert_eq!(orchestrator.state(), PipelineState::Running);
    assert_eq!(orchestrator.step(), PipelineState::Running);
    assert_eq!(orchestrator.step(), PipelineState::Running);
    assert_eq!(orchestrator.step(), PipelineState::Stopped);
    // Stopped is terminal.
    assert_eq!(orchestrator.step(), PipelineState::Stopped);
    assert_eq!(orchestrator.frames_processed(), 2);
    assert_eq!(
        orchestrator.stop_reason(),
        Some(&StopReason::CaptureFailed("capture failed: device unplugged".into()))
    );
    assert_eq!(drops.get(), 0);

    let summary = orchestrator.run();
    assert_eq!(summary.frames_processed, 2);
    assert_eq!(
        summary.stop_reason,
        StopReason::CaptureFailed("capture failed: device unplugged".into())
    );
    assert_eq!(reports.borrow().len(), 2);
    // Source, both detectors and display, each released once.
    assert_eq!(drops.get(), 4);
}

#[test]
fn quit_request_stops_after_current_frame() {
    let drops = Rc::new(Cell::new(0));
    let mut display = RecordingDisplay::default();
    display.quit_after = Some(3);

    let summary = FrameOrchestrator::new(
        ScriptedSource::frames(10, drops.clone()),
        FixedDetector::new(None, drops.clone()),
        FixedDetector::new(None, drops.clone()),
        display,
        Projector::default(),
    )
    .unwrap()
    .run();

    assert_eq!(summary.frames_processed, 3);
    assert_eq!(summary.stop_reason, StopReason::QuitRequested);
    assert_eq!(drops.get(), 3);
}

#[test]
fn render_failure_is_fatal() {
    let drops = Rc::new(Cell::new(0));
    let mut display = RecordingDisplay::default();
    display.fail_render = true;

    let summary = FrameOrchestrator::new(
        ScriptedSource::frames(5, drops.clone()),
        FixedDetector::new(None, drops.clone()),
        FixedDetector::new(None, drops.clone()),
        display,
        Projector::default(),
    )
    .unwrap()
    .run();

    assert_eq!(summary.frames_processed, 1);
    assert!(matches!(summary.stop_reason, StopReason::RenderFailed(_)));
}

#[test]
fn detector_errors_count_as_absent() {
    let drops = Rc::new(Cell::new(0));
    let display = RecordingDisplay::default();
    let reports = Rc::clone(&display.reports);

    let summary = FrameOrchestrator::new(
        ScriptedSource::frames(2, drops.clone()),
        FailingDetector,
        FailingDetector,
        display,
        Projector::default(),
    )
    .unwrap()
    .run();

    assert_eq!(summary.frames_processed, 2);
    let m = reports.borrow()[0].metrics;
    assert_eq!(m.ear, None);
    assert!(!m.pose_detected);
}

#[test]
fn short_face_landmarks_skip_face_metrics_only() {
    let drops = Rc::new(Cell::new(0));
    let display = RecordingDisplay::default();
    let reports = Rc::clone(&display.reports);

    FrameOrchestrator::new(
        ScriptedSource::frames(1, drops.clone()),
        FixedDetector::new(Some(open_face()[..200].to_vec()), drops.clone()),
        FixedDetector::new(Some(upright_pose()), drops.clone()),
        display,
        Projector::default(),
    )
    .unwrap()
    .run();

    let m = reports.borrow()[0].metrics;
    assert_eq!((m.ear, m.mar, m.eyebrow_raise), (None, None, None));
    assert!(m.pose_detected);
}

#[test]
fn undersized_detector_is_rejected_at_startup() {
    let drops = Rc::new(Cell::new(0));
    let mut face = FixedDetector::new(None, drops.clone());
    face.count = Some(300);

    let result = FrameOrchestrator::new(
        ScriptedSource::frames(1, drops.clone()),
        face,
        FixedDetector::new(None, drops.clone()),
        RecordingDisplay::default(),
        Projector::default(),
    );
    assert!(matches!(
        result.err(),
        Some(ConfigError::DetectorTooSmall { detector: "face", available: 300, .. })
    ));
}

#[test]
fn replayed_recording_is_deterministic() {
    let recording = Recording::new(vec![
        RecordedFrame { width: W, height: H, face: Some(open_face()), pose: Some(upright_pose()) },
        RecordedFrame { width: W, height: H, face: None, pose: Some(upright_pose()) },
        RecordedFrame { width: W, height: H, face: Some(open_face()), pose: None },
    ]);

    let run = || {
        let display = RecordingDisplay::default();
        let reports = Rc::clone(&display.reports);
        let summary = FrameOrchestrator::new(
            recording.source(),
            recording.face_detector(),
            recording.pose_detector(),
            display,
            Projector::default(),
        )
        .unwrap()
        .run();
        assert_eq!(summary.frames_processed, 3);
        let out = reports.borrow().clone();
        out
    };

    let first = run();
    let second = run();
    assert_eq!(first, second);
    assert!(first[0].metrics.ear.is_some() && first[0].metrics.pose_detected);
    assert!(first[1].metrics.ear.is_none() && first[1].metrics.pose_detected);
    assert!(first[2].metrics.ear.is_some() && !first[2].metrics.pose_detected);
}
