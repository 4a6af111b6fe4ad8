//! Fixed landmark index tables for the MediaPipe face mesh and pose models.
//!
//! The numbering is tied to the detector's output ordering and must not be
//! edited. Order inside each eye and mouth set is positional: the metric
//! formulas consume points by slot, not by landmark id.

use crate::types::ConfigError;

/// Left eye: outer corner, two upper-lid points, inner corner, two lower-lid points.
pub const LEFT_EYE: [usize; 6] = [33, 160, 158, 133, 153, 144];
/// Right eye, mirrored ordering of [`LEFT_EYE`].
pub const RIGHT_EYE: [usize; 6] = [362, 385, 387, 263, 373, 380];
/// Ten mouth points consumed positionally by MAR.
pub const MOUTH: [usize; 10] = [61, 81, 311, 291, 308, 324, 78, 95, 88, 178];
/// Approximate centre of the upper left eyelid.
pub const LEFT_EYE_CENTER: usize = 159;
/// Approximate centre of the left eyebrow.
pub const LEFT_BROW_CENTER: usize = 105;

/// Points consumed by the eye aspect ratio.
pub const EYE_POINTS: usize = 6;
/// Points consumed by the mouth aspect ratio.
pub const MOUTH_POINTS: usize = 10;

/// Named MediaPipe pose landmarks used by head pose estimation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoseLandmark {
    Nose,
    LeftEye,
    RightEye,
    LeftShoulder,
    RightShoulder,
}

impl PoseLandmark {
    pub const ALL: [PoseLandmark; 5] = [
        PoseLandmark::LeftShoulder,
        PoseLandmark::RightShoulder,
        PoseLandmark::Nose,
        PoseLandmark::LeftEye,
        PoseLandmark::RightEye,
    ];

    /// Position in the pose model's landmark array.
    pub fn index(self) -> usize {
        match self {
            PoseLandmark::Nose => 0,
            PoseLandmark::LeftEye => 2,
            PoseLandmark::RightEye => 5,
            PoseLandmark::LeftShoulder => 11,
            PoseLandmark::RightShoulder => 12,
        }
    }
}

/// An ordered selection of landmark indices bound to the metric that consumes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LandmarkIndexSet {
    indices: Vec<usize>,
}

impl LandmarkIndexSet {
    /// Build a set, rejecting any length other than `expected`.
    pub fn new(
        name: &'static str,
        indices: &[usize],
        expected: usize,
    ) -> Result<Self, ConfigError> {
        if indices.len() != expected {
            return Err(ConfigError::IndexSetLength {
                name,
                expected,
                actual: indices.len(),
            });
        }
        Ok(Self {
            indices: indices.to_vec(),
        })
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn max_index(&self) -> usize {
        self.indices.iter().copied().max().unwrap_or(0)
    }
}

/// The complete, validated set of face index tables used per frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexTables {
    pub left_eye: LandmarkIndexSet,
    pub right_eye: LandmarkIndexSet,
    pub mouth: LandmarkIndexSet,
    /// (eye centre, brow centre).
    pub eyebrow: LandmarkIndexSet,
}

impl IndexTables {
    /// The face mesh tables above, validated.
    pub fn face_mesh() -> Result<Self, ConfigError> {
        Ok(Self {
            left_eye: LandmarkIndexSet::new("left_eye", &LEFT_EYE, EYE_POINTS)?,
            right_eye: LandmarkIndexSet::new("right_eye", &RIGHT_EYE, EYE_POINTS)?,
            mouth: LandmarkIndexSet::new("mouth", &MOUTH, MOUTH_POINTS)?,
            eyebrow: LandmarkIndexSet::new("eyebrow", &[LEFT_EYE_CENTER, LEFT_BROW_CENTER], 2)?,
        })
    }

    /// Minimum number of landmarks a face detector must yield.
    pub fn required_face_landmarks(&self) -> usize {
        [&self.left_eye, &self.right_eye, &self.mouth, &self.eyebrow]
            .iter()
            .map(|s| s.max_index())
            .max()
            .unwrap_or(0)
            + 1
    }
}

/// Minimum number of landmarks a pose detector must yield.
pub fn required_pose_landmarks() -> usize {
    PoseLandmark::ALL
        .iter()
        .map(|l| l.index())
        .max()
        .unwrap_or(0)
        + 1
}
