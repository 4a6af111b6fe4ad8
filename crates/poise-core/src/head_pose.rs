//! Approximate head pose from five body-pose landmarks.
//!
//! This is a heuristic, not a 3-D pose solve. Each angle is an independent
//! 2-D projection:
//!
//! - roll: shoulder line angle minus 180°, wrapped to [-180, 180]
//! - yaw: nose-to-left-eye angle minus 90°; only meaningful for a roughly
//!   frontal subject
//! - pitch: nose height relative to the shoulder midpoint, over frame
//!   height, times 90
//!
//! The three mix reference frames (shoulder line, eye line, frame height)
//! and are kept that way for compatibility with the established output.

use crate::indices::PoseLandmark;
use crate::projection::{landmark_at, ProjectionError};
use crate::types::{FrameDimensions, NormalizedLandmark};
use serde::Serialize;

const PITCH_SCALE_DEG: f32 = 90.0;

/// Head orientation in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct HeadPose {
    pub pitch: f32,
    pub yaw: f32,
    pub roll: f32,
}

impl HeadPose {
    /// Returned when no pose was detected. Means "no estimate", not "facing forward".
    pub const NEUTRAL: HeadPose = HeadPose {
        pitch: 0.0,
        yaw: 0.0,
        roll: 0.0,
    };
}

/// The pose subset in (unrounded) pixel space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PosePoints {
    pub left_shoulder: (f32, f32),
    pub right_shoulder: (f32, f32),
    pub nose: (f32, f32),
    pub left_eye: (f32, f32),
    pub right_eye: (f32, f32),
}

impl PosePoints {
    /// Scale the named pose landmarks into pixel space.
    pub fn from_landmarks(
        landmarks: &[NormalizedLandmark],
        dims: FrameDimensions,
    ) -> Result<Self, ProjectionError> {
        let w = dims.width() as f32;
        let h = dims.height() as f32;
        let at = |l: PoseLandmark| -> Result<(f32, f32), ProjectionError> {
            let lm = landmark_at(landmarks, l.index())?;
            Ok((lm.x * w, lm.y * h))
        };
        Ok(Self {
            left_shoulder: at(PoseLandmark::LeftShoulder)?,
            right_shoulder: at(PoseLandmark::RightShoulder)?,
            nose: at(PoseLandmark::Nose)?,
            left_eye: at(PoseLandmark::LeftEye)?,
            right_eye: at(PoseLandmark::RightEye)?,
        })
    }
}

/// Wrap an angle in degrees into [-180, 180].
pub fn wrap_degrees(deg: f32) -> f32 {
    let mut a = deg % 360.0;
    if a > 180.0 {
        a -= 360.0;
    } else if a < -180.0 {
        a += 360.0;
    }
    a
}

fn angle_deg(from: (f32, f32), to: (f32, f32)) -> f32 {
    (to.1 - from.1).atan2(to.0 - from.0).to_degrees()
}

/// Estimate head pose, or [`HeadPose::NEUTRAL`] when `points` is `None`.
pub fn estimate(points: Option<&PosePoints>, frame_height: u32) -> HeadPose {
    let Some(p) = points else {
        return HeadPose::NEUTRAL;
    };

    let roll = wrap_degrees(angle_deg(p.left_shoulder, p.right_shoulder) - 180.0);
    let yaw = angle_deg(p.nose, p.left_eye) - 90.0;

    let shoulder_mid_y = (p.left_shoulder.1 + p.right_shoulder.1) / 2.0;
    let pitch = (p.nose.1 - shoulder_mid_y) / frame_height as f32 * PITCH_SCALE_DEG;

    HeadPose { pitch, yaw, roll }
}
