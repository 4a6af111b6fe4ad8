use anyhow::{Context, Result};
use poise_core::Rounding;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// CLI configuration: optional TOML file, then `POISE_*` environment overrides.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// Requested capture width; the driver may negotiate another.
    pub capture_width: u32,
    /// Requested capture height.
    pub capture_height: u32,
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    /// Face mesh model file name, relative to `model_dir`.
    pub face_model: String,
    /// Pose landmark model file name, relative to `model_dir`.
    pub pose_model: String,
    /// Pixel rounding policy for landmark projection.
    pub rounding: Rounding,
    /// Number of warmup frames to discard at startup (camera AGC/AE stabilization).
    pub warmup_frames: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            camera_device: "/dev/video0".to_string(),
            capture_width: 640,
            capture_height: 480,
            model_dir: PathBuf::from("models"),
            face_model: "face_landmark.onnx".to_string(),
            pose_model: "pose_landmark_full.onnx".to_string(),
            rounding: Rounding::Truncate,
            warmup_frames: 4,
        }
    }
}

impl Config {
    /// Load `path` (if given), then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let base = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        base.with_env(|key| std::env::var(key).ok())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Apply `POISE_*` overrides looked up through `var`.
    fn with_env(mut self, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(v) = var("POISE_CAMERA_DEVICE") {
            self.camera_device = v;
        }
        if let Some(v) = var("POISE_MODEL_DIR") {
            self.model_dir = PathBuf::from(v);
        }
        if let Some(v) = var("POISE_FACE_MODEL") {
            self.face_model = v;
        }
        if let Some(v) = var("POISE_POSE_MODEL") {
            self.pose_model = v;
        }
        if let Some(v) = var("POISE_ROUNDING") {
            self.rounding = v.parse().map_err(anyhow::Error::msg)?;
        }
        self.capture_width = env_parse(&var, "POISE_CAPTURE_WIDTH", self.capture_width);
        self.capture_height = env_parse(&var, "POISE_CAPTURE_HEIGHT", self.capture_height);
        self.warmup_frames = env_parse(&var, "POISE_WARMUP_FRAMES", self.warmup_frames);
        Ok(self)
    }

    /// Path to the face mesh model.
    pub fn face_model_path(&self) -> String {
        self.model_dir
            .join(&self.face_model)
            .to_string_lossy()
            .into_owned()
    }

    /// Path to the pose landmark model.
    pub fn pose_model_path(&self) -> String {
        self.model_dir
            .join(&self.pose_model)
            .to_string_lossy()
            .into_owned()
    }
}

fn env_parse<T: std::str::FromStr>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    var(key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
