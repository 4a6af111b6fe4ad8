//! Eye aspect ratio, mouth aspect ratio and eyebrow raise.
//!
//! All three are closed-form ratios over one frame's points. EAR and MAR
//! take pixel points in the positional order of the index tables in
//! [`crate::indices`].

use crate::indices::{EYE_POINTS, MOUTH_POINTS};
use crate::types::{NormalizedLandmark, PixelPoint};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetricError {
    #[error("{metric} needs exactly {expected} points, got {actual}")]
    PointCount {
        metric: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("{metric} reference distance is zero")]
    DegenerateGeometry { metric: &'static str },
}

fn check_len(metric: &'static str, points: &[PixelPoint], expected: usize) -> Result<(), MetricError> {
    if points.len() != expected {
        return Err(MetricError::PointCount {
            metric,
            expected,
            actual: points.len(),
        });
    }
    Ok(())
}

/// Eye aspect ratio: `(|p1-p5| + |p2-p4|) / (2 |p0-p3|)`.
///
/// Near zero for a closed eye. A zero corner-to-corner distance is
/// reported as [`MetricError::DegenerateGeometry`].
pub fn eye_aspect_ratio(points: &[PixelPoint]) -> Result<f32, MetricError> {
    check_len("EAR", points, EYE_POINTS)?;
    let width = points[0].distance(&points[3]);
    if width == 0.0 {
        return Err(MetricError::DegenerateGeometry { metric: "EAR" });
    }
    let a = points[1].distance(&points[5]);
    let b = points[2].distance(&points[4]);
    Ok((a + b) / (2.0 * width))
}

/// Mouth aspect ratio: `(|p2-p8| + |p3-p7| + |p4-p6|) / (2 |p0-p6|)`.
pub fn mouth_aspect_ratio(points: &[PixelPoint]) -> Result<f32, MetricError> {
    check_len("MAR", points, MOUTH_POINTS)?;
    let width = points[0].distance(&points[6]);
    if width == 0.0 {
        return Err(MetricError::DegenerateGeometry { metric: "MAR" });
    }
    let a = points[2].distance(&points[8]);
    let b = points[3].distance(&points[7]);
    let c = points[4].distance(&points[6]);
    Ok((a + b + c) / (2.0 * width))
}

/// Vertical eye-to-brow separation as a fraction of frame height.
///
/// Positive when the brow sits above the eye (image y grows downward).
/// Works on the unrounded landmark positions.
pub fn eyebrow_raise(eye: &NormalizedLandmark, brow: &NormalizedLandmark, frame_height: u32) -> f32 {
    let h = frame_height as f32;
    let eye_y = eye.y * h;
    let brow_y = brow.y * h;
    (eye_y - brow_y) / h
}

/// Mean of the eyes that produced a value.
pub fn combine_eyes(left: Option<f32>, right: Option<f32>) -> Option<f32> {
    match (left, right) {
        (Some(l), Some(r)) => Some((l + r) / 2.0),
        (Some(v), None) | (None, Some(v)) => Some(v),
        (None, None) => None,
    }
}
