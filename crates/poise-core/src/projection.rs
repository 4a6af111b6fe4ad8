//! Normalized landmark space to integer pixel coordinates.

use crate::types::{FrameDimensions, NormalizedLandmark, PixelPoint};
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProjectionError {
    #[error("landmark index {index} out of range: detector returned {len} landmarks")]
    IndexOutOfRange { index: usize, len: usize },
}

/// How a scaled coordinate becomes an integer pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Rounding {
    /// Truncate toward zero.
    #[default]
    Truncate,
    /// Round half to even.
    HalfEven,
}

impl Rounding {
    /// Scaled coordinates are computed in f64 so that a product just below
    /// an integer is not rounded up onto it before truncation.
    fn apply(self, v: f64) -> i32 {
        match self {
            Rounding::Truncate => v.trunc() as i32,
            Rounding::HalfEven => v.round_ties_even() as i32,
        }
    }
}

impl std::str::FromStr for Rounding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "truncate" => Ok(Rounding::Truncate),
            "half-even" => Ok(Rounding::HalfEven),
            other => Err(format!("unknown rounding policy `{other}` (truncate, half-even)")),
        }
    }
}

/// Stateless projector. One rounding policy per run.
#[derive(Debug, Clone, Copy, Default)]
pub struct Projector {
    rounding: Rounding,
}

impl Projector {
    pub fn new(rounding: Rounding) -> Self {
        Self { rounding }
    }

    /// Project one landmark into pixel space.
    pub fn point(&self, landmark: &NormalizedLandmark, dims: FrameDimensions) -> PixelPoint {
        PixelPoint::new(
            self.rounding.apply(f64::from(landmark.x) * f64::from(dims.width())),
            self.rounding.apply(f64::from(landmark.y) * f64::from(dims.height())),
        )
    }

    /// Project the landmarks selected by `indices`, preserving their order.
    ///
    /// Fails on the first index not present in `landmarks`.
    pub fn project(
        &self,
        landmarks: &[NormalizedLandmark],
        dims: FrameDimensions,
        indices: &[usize],
    ) -> Result<Vec<PixelPoint>, ProjectionError> {
        indices
            .iter()
            .map(|&index| {
                landmarks
                    .get(index)
                    .map(|lm| self.point(lm, dims))
                    .ok_or(ProjectionError::IndexOutOfRange {
                        index,
                        len: landmarks.len(),
                    })
            })
            .collect()
    }
}

/// Look up a landmark without projecting it.
pub fn landmark_at(
    landmarks: &[NormalizedLandmark],
    index: usize,
) -> Result<&NormalizedLandmark, ProjectionError> {
    landmarks.get(index).ok_or(ProjectionError::IndexOutOfRange {
        index,
        len: landmarks.len(),
    })
}
