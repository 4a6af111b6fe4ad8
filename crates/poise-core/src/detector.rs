//! Landmark detector capability and an ONNX Runtime backend.
//!
//! The pipeline only sees [`LandmarkDetector`]; any backend that turns a
//! frame into normalized landmarks can be plugged in.

use crate::types::{NormalizedLandmark, RgbFrame};
use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const PRESENCE_THRESHOLD: f32 = 0.5;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("model file not found: {0} — place the landmark model in the model directory")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Anything that can find one subject's landmarks in a frame.
///
/// `Ok(None)` means no subject in this frame; that is not an error.
pub trait LandmarkDetector {
    fn detect(&mut self, frame: &RgbFrame) -> Result<Option<Vec<NormalizedLandmark>>, DetectorError>;

    /// Number of landmarks per detection, when known ahead of time.
    fn landmark_count(&self) -> Option<usize> {
        None
    }
}

/// Input tensor memory layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TensorLayout {
    Nchw,
    Nhwc,
}

/// Shape of a single-subject landmark regression model.
///
/// Output 0 holds `landmark_count * values_per_landmark` floats with x/y in
/// input pixels. Output 1, when present, is a presence logit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LandmarkModel {
    pub input_size: u32,
    pub layout: TensorLayout,
    pub landmark_count: usize,
    pub values_per_landmark: usize,
}

impl LandmarkModel {
    /// MediaPipe face mesh: 192×192 input, 468 landmarks of (x, y, z).
    pub const FACE_MESH: LandmarkModel = LandmarkModel {
        input_size: 192,
        layout: TensorLayout::Nhwc,
        landmark_count: 468,
        values_per_landmark: 3,
    };

    /// MediaPipe pose: 256×256 input, 39 landmarks of (x, y, z, visibility, presence).
    pub const POSE: LandmarkModel = LandmarkModel {
        input_size: 256,
        layout: TensorLayout::Nhwc,
        landmark_count: 39,
        values_per_landmark: 5,
    };
}

/// Full-frame landmark regression via ONNX Runtime.
///
/// The whole frame is stretched to the square model input, so model
/// coordinates divided by the input size are already frame-normalized.
///
/// Experimental: MediaPipe landmark models are trained on a face or person
/// crop, and there is no crop stage here. Landmarks are only usable when the
/// subject fills most of the frame.
pub struct OnnxLandmarker {
    session: Session,
    model: LandmarkModel,
    has_presence: bool,
}

impl OnnxLandmarker {
    /// Load a landmark model from `model_path`.
    pub fn load(model_path: &str, model: LandmarkModel) -> Result<Self, DetectorError> {
        if !Path::new(model_path).exists() {
            return Err(DetectorError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        let output_names: Vec<String> = session.outputs().iter().map(|o| o.name().to_string()).collect();

        tracing::info!(
            path = model_path,
            inputs = ?session.inputs().iter().map(|i| i.name()).collect::<Vec<_>>(),
            outputs = ?output_names,
            landmarks = model.landmark_count,
            "loaded landmark model"
        );

        if output_names.is_empty() {
            return Err(DetectorError::InferenceFailed(
                "landmark model has no outputs".into(),
            ));
        }

        Ok(Self {
            session,
            model,
            has_presence: output_names.len() > 1,
        })
    }

    fn preprocess(&self, frame: &RgbFrame) -> Result<Array4<f32>, DetectorError> {
        let expected = frame.width as usize * frame.height as usize * 3;
        if frame.data.len() < expected {
            return Err(DetectorError::InvalidFrame(format!(
                "RGB buffer too short: expected {expected}, got {}",
                frame.data.len()
            )));
        }
        let image = RgbImage::from_raw(frame.width, frame.height, frame.data[..expected].to_vec())
            .ok_or_else(|| DetectorError::InvalidFrame("cannot wrap RGB buffer".into()))?;

        let size = self.model.input_size;
        let resized = imageops::resize(&image, size, size, FilterType::Triangle);
        Ok(to_tensor(&resized, self.model.layout))
    }
}

impl LandmarkDetector for OnnxLandmarker {
    fn detect(&mut self, frame: &RgbFrame) -> Result<Option<Vec<NormalizedLandmark>>, DetectorError> {
        let input = self.preprocess(frame)?;
        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        if self.has_presence {
            let (_, presence) = outputs[1]
                .try_extract_tensor::<f32>()
                .map_err(|e| DetectorError::InferenceFailed(format!("presence: {e}")))?;
            let score = presence.first().copied().map(sigmoid).unwrap_or(0.0);
            if score < PRESENCE_THRESHOLD {
                tracing::trace!(score, "no subject present");
                return Ok(None);
            }
        }

        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectorError::InferenceFailed(format!("landmarks: {e}")))?;

        decode_landmarks(raw, &self.model).map(Some)
    }

    fn landmark_count(&self) -> Option<usize> {
        Some(self.model.landmark_count)
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Pack an RGB image into a [0, 1] float tensor.
fn to_tensor(image: &RgbImage, layout: TensorLayout) -> Array4<f32> {
    let (w, h) = (image.width() as usize, image.height() as usize);
    let mut tensor = match layout {
        TensorLayout::Nchw => Array4::<f32>::zeros((1, 3, h, w)),
        TensorLayout::Nhwc => Array4::<f32>::zeros((1, h, w, 3)),
    };
    for (x, y, px) in image.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        for c in 0..3 {
            let v = px.0[c] as f32 / 255.0;
            match layout {
                TensorLayout::Nchw => tensor[[0, c, y, x]] = v,
                TensorLayout::Nhwc => tensor[[0, y, x, c]] = v,
            }
        }
    }
    tensor
}

/// Convert raw model output (input-pixel units) to normalized landmarks.
fn decode_landmarks(raw: &[f32], model: &LandmarkModel) -> Result<Vec<NormalizedLandmark>, DetectorError> {
    let stride = model.values_per_landmark;
    let needed = model.landmark_count * stride;
    if stride < 2 || raw.len() < needed {
        return Err(DetectorError::InferenceFailed(format!(
            "landmark output has {} values, expected {needed}",
            raw.len()
        )));
    }
    let size = model.input_size as f32;
    Ok(raw[..needed]
        .chunks_exact(stride)
        .map(|v| NormalizedLandmark {
            x: v[0] / size,
            y: v[1] / size,
            z: if stride > 2 { v[2] / size } else { 0.0 },
        })
        .collect())
}
