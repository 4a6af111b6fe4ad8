//! Per-frame orchestration: capture, detect, compute, render.
//!
//! The orchestrator owns its collaborators for the whole run and drops
//! them exactly once when [`FrameOrchestrator::run`] returns. Nothing is
//! carried from one frame to the next.

use crate::detector::LandmarkDetector;
use crate::head_pose::{self, PosePoints};
use crate::indices::{required_pose_landmarks, IndexTables};
use crate::metrics::{self, MetricError};
use crate::overlay::Overlay;
use crate::projection::{landmark_at, ProjectionError, Projector};
use crate::types::{ConfigError, FrameDimensions, FrameMetrics, NormalizedLandmark, PixelPoint, RgbFrame};
use thiserror::Error;

#[derive(Error, Debug)]
#[error("capture failed: {0}")]
pub struct CaptureError(pub String);

#[derive(Error, Debug)]
#[error("render failed: {0}")]
pub struct RenderError(pub String);

/// Produces frames. `Ok(None)` is end of stream.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Option<RgbFrame>, CaptureError>;
}

/// Presents each processed frame and reports user quit requests.
pub trait Display {
    fn render(&mut self, frame: &RgbFrame, report: &FrameReport) -> Result<(), RenderError>;

    /// Polled once after every rendered frame.
    fn poll_quit(&mut self) -> bool;
}

/// Everything computed for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub sequence: u32,
    pub metrics: FrameMetrics,
    pub overlay: Overlay,
}

/// Face metrics and the points behind them, for one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FaceAnalysis {
    pub left_ear: Option<f32>,
    pub right_ear: Option<f32>,
    pub mar: Option<f32>,
    pub eyebrow_raise: Option<f32>,
    pub eye_points: Vec<PixelPoint>,
    pub mouth_points: Vec<PixelPoint>,
}

impl FaceAnalysis {
    pub fn ear(&self) -> Option<f32> {
        metrics::combine_eyes(self.left_ear, self.right_ear)
    }
}

/// Project the face index tables and compute EAR, MAR and eyebrow raise.
///
/// A missing landmark fails the whole analysis; degenerate geometry only
/// blanks the affected metric.
pub fn analyze_face(
    landmarks: &[NormalizedLandmark],
    dims: FrameDimensions,
    tables: &IndexTables,
    projector: &Projector,
) -> Result<FaceAnalysis, ProjectionError> {
    let left = projector.project(landmarks, dims, tables.left_eye.indices())?;
    let right = projector.project(landmarks, dims, tables.right_eye.indices())?;
    let mouth = projector.project(landmarks, dims, tables.mouth.indices())?;

    let brow = tables.eyebrow.indices();
    let eye_center = landmark_at(landmarks, brow[0])?;
    let brow_center = landmark_at(landmarks, brow[1])?;

    let left_ear = recoverable(metrics::eye_aspect_ratio(&left));
    let right_ear = recoverable(metrics::eye_aspect_ratio(&right));
    let mar = recoverable(metrics::mouth_aspect_ratio(&mouth));
    let eyebrow_raise = metrics::eyebrow_raise(eye_center, brow_center, dims.height());

    let mut eye_points = left;
    eye_points.extend(right);

    Ok(FaceAnalysis {
        left_ear,
        right_ear,
        mar,
        eyebrow_raise: Some(eyebrow_raise),
        eye_points,
        mouth_points: mouth,
    })
}

fn recoverable(result: Result<f32, MetricError>) -> Option<f32> {
    match result {
        Ok(v) => Some(v),
        Err(err) => {
            tracing::warn!(error = %err, "metric suppressed for this frame");
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Running,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    EndOfStream,
    CaptureFailed(String),
    QuitRequested,
    RenderFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub frames_processed: u64,
    pub stop_reason: StopReason,
}

/// Sequential frame loop over owned capture, detector and display handles.
pub struct FrameOrchestrator<S, F, P, D> {
    source: S,
    face_detector: F,
    pose_detector: P,
    display: D,
    tables: IndexTables,
    projector: Projector,
    state: PipelineState,
    stop_reason: Option<StopReason>,
    frames_processed: u64,
}

impl<S, F, P, D> FrameOrchestrator<S, F, P, D>
where
    S: FrameSource,
    F: LandmarkDetector,
    P: LandmarkDetector,
    D: Display,
{
    /// Validate the index tables against the detectors and enter `Running`.
    pub fn new(
        source: S,
        face_detector: F,
        pose_detector: P,
        display: D,
        projector: Projector,
    ) -> Result<Self, ConfigError> {
        let tables = IndexTables::face_mesh()?;

        check_capacity("face", face_detector.landmark_count(), tables.required_face_landmarks())?;
        check_capacity("pose", pose_detector.landmark_count(), required_pose_landmarks())?;

        Ok(Self {
            source,
            face_detector,
            pose_detector,
            display,
            tables,
            projector,
            state: PipelineState::Running,
            stop_reason: None,
            frames_processed: 0,
        })
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    pub fn stop_reason(&self) -> Option<&StopReason> {
        self.stop_reason.as_ref()
    }

    /// Run detection and all metrics for one frame.
    pub fn process_frame(&mut self, frame: &RgbFrame, dims: FrameDimensions) -> FrameReport {
        let mut metrics = FrameMetrics::default();
        let mut face = FaceAnalysis::default();

        if let Some(landmarks) = detect(&mut self.face_detector, frame, "face") {
            match analyze_face(&landmarks, dims, &self.tables, &self.projector) {
                Ok(analysis) => face = analysis,
                Err(err) => {
                    tracing::warn!(seq = frame.sequence, error = %err, "face metrics skipped");
                }
            }
        }
        metrics.left_ear = face.left_ear;
        metrics.right_ear = face.right_ear;
        metrics.ear = face.ear();
        metrics.mar = face.mar;
        metrics.eyebrow_raise = face.eyebrow_raise;

        let pose_points = detect(&mut self.pose_detector, frame, "pose").and_then(|landmarks| {
            PosePoints::from_landmarks(&landmarks, dims)
                .map_err(|err| {
                    tracing::warn!(seq = frame.sequence, error = %err, "head pose skipped");
                })
                .ok()
        });
        let pose = head_pose::estimate(pose_points.as_ref(), dims.height());
        metrics.pitch = pose.pitch;
        metrics.yaw = pose.yaw;
        metrics.roll = pose.roll;
        metrics.pose_detected = pose_points.is_some();

        tracing::debug!(
            seq = frame.sequence,
            ear = ?metrics.ear,
            mar = ?metrics.mar,
            eyebrow_raise = ?metrics.eyebrow_raise,
            pitch = metrics.pitch,
            yaw = metrics.yaw,
            roll = metrics.roll,
            "frame metrics"
        );

        let overlay = Overlay::build(&metrics, &face.eye_points, &face.mouth_points);
        FrameReport {
            sequence: frame.sequence,
            metrics,
            overlay,
        }
    }

    /// Acquire, process and render one frame, then poll for quit.
    pub fn step(&mut self) -> PipelineState {
        if self.state == PipelineState::Stopped {
            return PipelineState::Stopped;
        }

        let frame = match self.source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => return self.stop(StopReason::EndOfStream),
            Err(err) => return self.stop(StopReason::CaptureFailed(err.to_string())),
        };
        let dims = match frame.dimensions() {
            Ok(dims) => dims,
            Err(err) => return self.stop(StopReason::CaptureFailed(err.to_string())),
        };

        let report = self.process_frame(&frame, dims);
        self.frames_processed += 1;

        if let Err(err) = self.display.render(&frame, &report) {
            return self.stop(StopReason::RenderFailed(err.to_string()));
        }
        if self.display.poll_quit() {
            return self.stop(StopReason::QuitRequested);
        }
        PipelineState::Running
    }

    /// Loop until `Stopped`, then release every collaborator.
    pub fn run(mut self) -> RunSummary {
        if self.state == PipelineState::Running {
            tracing::info!("pipeline started");
        }
        while self.step() == PipelineState::Running {}

        let summary = RunSummary {
            frames_processed: self.frames_processed,
            stop_reason: self.stop_reason.clone().unwrap_or(StopReason::EndOfStream),
        };
        tracing::info!(
            frames = summary.frames_processed,
            reason = ?summary.stop_reason,
            "pipeline stopped; releasing capture, detectors and display"
        );
        summary
    }

    fn stop(&mut self, reason: StopReason) -> PipelineState {
        match &reason {
            StopReason::CaptureFailed(msg) | StopReason::RenderFailed(msg) => {
                tracing::error!(reason = %msg, "stopping pipeline");
            }
            StopReason::EndOfStream | StopReason::QuitRequested => {
                tracing::info!(?reason, "stopping pipeline");
            }
        }
        self.state = PipelineState::Stopped;
        self.stop_reason = Some(reason);
        PipelineState::Stopped
    }
}

fn check_capacity(
    detector: &'static str,
    available: Option<usize>,
    required: usize,
) -> Result<(), ConfigError> {
    match available {
        Some(available) if available < required => Err(ConfigError::DetectorTooSmall {
            detector,
            available,
            required,
        }),
        _ => Ok(()),
    }
}

/// Run a detector, folding failures into "nothing detected" for this frame.
fn detect<D: LandmarkDetector>(
    detector: &mut D,
    frame: &RgbFrame,
    kind: &'static str,
) -> Option<Vec<NormalizedLandmark>> {
    match detector.detect(frame) {
        Ok(found) => found,
        Err(err) => {
            tracing::warn!(seq = frame.sequence, detector = kind, error = %err, "detection failed");
            None
        }
    }
}
