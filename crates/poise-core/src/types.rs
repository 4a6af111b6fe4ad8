use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A landmark position as emitted by a detector, relative to the frame.
///
/// `x` and `y` are fractions of the frame width and height. `z` is carried
/// through from the detector but not used by any metric.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NormalizedLandmark {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: f32,
}

impl NormalizedLandmark {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Pixel extent of a source frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameDimensions {
    width: u32,
    height: u32,
}

impl FrameDimensions {
    /// Both extents must be non-zero.
    pub fn new(width: u32, height: u32) -> Result<Self, ConfigError> {
        if width == 0 || height == 0 {
            return Err(ConfigError::InvalidDimensions { width, height });
        }
        Ok(Self { width, height })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

/// Integer pixel coordinate, frame-local.
///
/// Only produced by projection; see [`crate::projection::Projector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PixelPoint {
    x: i32,
    y: i32,
}

impl PixelPoint {
    pub(crate) fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn x(&self) -> i32 {
        self.x
    }

    pub fn y(&self) -> i32 {
        self.y
    }

    /// Euclidean distance to another point of the same frame.
    pub fn distance(&self, other: &PixelPoint) -> f32 {
        let dx = f64::from(self.x) - f64::from(other.x);
        let dy = f64::from(self.y) - f64::from(other.y);
        dx.hypot(dy) as f32
    }
}

/// A captured RGB8 frame (3 bytes per pixel, row-major).
#[derive(Clone)]
pub struct RgbFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub sequence: u32,
}

impl RgbFrame {
    /// Frame extent, or an error for a zero-sized frame.
    pub fn dimensions(&self) -> Result<FrameDimensions, ConfigError> {
        FrameDimensions::new(self.width, self.height)
    }
}

impl std::fmt::Debug for RgbFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RgbFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("sequence", &self.sequence)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Per-frame output of the pipeline.
///
/// Face metrics are `None` when they could not be computed for this frame
/// (no face, too few landmarks, degenerate geometry). Head pose angles are
/// in degrees and are the `0.0` sentinel when `pose_detected` is false.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct FrameMetrics {
    pub ear: Option<f32>,
    pub left_ear: Option<f32>,
    pub right_ear: Option<f32>,
    pub mar: Option<f32>,
    pub eyebrow_raise: Option<f32>,
    pub pitch: f32,
    pub yaw: f32,
    pub roll: f32,
    pub pose_detected: bool,
}

/// Startup-time configuration problems. Never raised per frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("index set `{name}` has {actual} indices, metric consumes exactly {expected}")]
    IndexSetLength {
        name: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("invalid frame dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("{detector} detector yields {available} landmarks, index tables need {required}")]
    DetectorTooSmall {
        detector: &'static str,
        available: usize,
        required: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimensions_reject_zero() {
        assert!(FrameDimensions::new(0, 480).is_err());
        assert!(FrameDimensions::new(640, 0).is_err());
        let dims = FrameDimensions::new(640, 480).unwrap();
        assert_eq!((dims.width(), dims.height()), (640, 480));
    }

    #[test]
    fn test_pixel_distance() {
        let a = PixelPoint::new(0, 0);
        let b = PixelPoint::new(3, 4);
        assert!((a.distance(&b) - 5.0).abs() < 1e-6);
        assert_eq!(a.distance(&a), 0.0);
    }

    #[test]
    fn test_pixel_distance_extreme_coordinates() {
        let a = PixelPoint::new(i32::MAX, i32::MIN);
        let b = PixelPoint::new(i32::MIN, i32::MIN);
        assert_eq!(a.distance(&b), 4_294_967_295.0_f64 as f32);
        assert_eq!(b.distance(&a), a.distance(&b));
    }

    #[test]
    fn test_landmark_z_defaults_when_missing() {
        let lm: NormalizedLandmark = serde_json::from_str(r#"{"x":0.25,"y":0.5}"#).unwrap();
        assert_eq!(lm, NormalizedLandmark::new(0.25, 0.5, 0.0));
    }
}
