//! Landmark recordings: re-run the pipeline without a camera or model.
//!
//! A recording is JSON lines, one object per frame:
//!
//! ```text
//! {"width":640,"height":480,"face":[{"x":0.41,"y":0.38,"z":-0.01}, ...],"pose":null}
//! ```
//!
//! `face` and `pose` may be omitted or `null` when nothing was detected.
//! Replayed frames carry dimensions and a sequence number but no pixels.

use crate::detector::{DetectorError, LandmarkDetector};
use crate::pipeline::{CaptureError, FrameSource};
use crate::types::{NormalizedLandmark, RgbFrame};
use serde::{Deserialize, Serialize};
use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: {source}")]
    Parse {
        line: usize,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedFrame {
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub face: Option<Vec<NormalizedLandmark>>,
    #[serde(default)]
    pub pose: Option<Vec<NormalizedLandmark>>,
}

/// Parsed recording, shared between the replay source and detectors.
#[derive(Debug, Clone)]
pub struct Recording {
    frames: Arc<Vec<RecordedFrame>>,
}

impl Recording {
    pub fn new(frames: Vec<RecordedFrame>) -> Self {
        Self {
            frames: Arc::new(frames),
        }
    }

    pub fn open(path: &Path) -> Result<Self, ReplayError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    /// Parse JSON lines, skipping blank lines.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, ReplayError> {
        let mut frames = Vec::new();
        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let frame = serde_json::from_str(&line).map_err(|source| ReplayError::Parse {
                line: i + 1,
                source,
            })?;
            frames.push(frame);
        }
        tracing::debug!(frames = frames.len(), "recording loaded");
        Ok(Self::new(frames))
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn source(&self) -> ReplaySource {
        ReplaySource {
            frames: Arc::clone(&self.frames),
            next: 0,
        }
    }

    pub fn face_detector(&self) -> ReplayDetector {
        ReplayDetector {
            frames: Arc::clone(&self.frames),
            track: Track::Face,
        }
    }

    pub fn pose_detector(&self) -> ReplayDetector {
        ReplayDetector {
            frames: Arc::clone(&self.frames),
            track: Track::Pose,
        }
    }
}

/// Yields one pixel-less frame per recorded line, then end of stream.
pub struct ReplaySource {
    frames: Arc<Vec<RecordedFrame>>,
    next: usize,
}

impl FrameSource for ReplaySource {
    fn next_frame(&mut self) -> Result<Option<RgbFrame>, CaptureError> {
        let Some(recorded) = self.frames.get(self.next) else {
            return Ok(None);
        };
        let sequence = u32::try_from(self.next)
            .map_err(|_| CaptureError(format!("recording frame {} exceeds u32 sequence", self.next)))?;
        self.next += 1;
        Ok(Some(RgbFrame {
            data: Vec::new(),
            width: recorded.width,
            height: recorded.height,
            sequence,
        }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Track {
    Face,
    Pose,
}

/// Returns the recorded landmarks for the frame's sequence number.
pub struct ReplayDetector {
    frames: Arc<Vec<RecordedFrame>>,
    track: Track,
}

impl LandmarkDetector for ReplayDetector {
    fn detect(&mut self, frame: &RgbFrame) -> Result<Option<Vec<NormalizedLandmark>>, DetectorError> {
        let recorded = self.frames.get(frame.sequence as usize).ok_or_else(|| {
            DetectorError::InvalidFrame(format!("no recorded frame {}", frame.sequence))
        })?;
        Ok(match self.track {
            Track::Face => recorded.face.clone(),
            Track::Pose => recorded.pose.clone(),
        })
    }
}
