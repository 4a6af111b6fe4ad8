//! poise-core — per-frame behavioral metrics from facial and body landmarks.
//!
//! Projects detector landmarks into pixel space, computes eye and mouth
//! aspect ratios, eyebrow raise and an approximate head pose, and drives
//! the capture → detect → compute → render loop.

pub mod detector;
pub mod head_pose;
pub mod indices;
pub mod metrics;
pub mod overlay;
pub mod pipeline;
pub mod projection;
pub mod replay;
pub mod types;

pub use detector::{DetectorError, LandmarkDetector, LandmarkModel, OnnxLandmarker};
pub use head_pose::HeadPose;
pub use overlay::{Overlay, OverlayElement};
pub use pipeline::{
    CaptureError, Display, FrameOrchestrator, FrameReport, FrameSource, PipelineState, RenderError,
    RunSummary, StopReason,
};
pub use projection::{Projector, Rounding};
pub use types::{ConfigError, FrameDimensions, FrameMetrics, NormalizedLandmark, PixelPoint, RgbFrame};
