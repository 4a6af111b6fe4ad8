//! poise-hw — Camera capture for the metrics pipeline.
//!
//! Provides V4L2-based camera access producing RGB frames.

pub mod camera;
pub mod frame;

pub use camera::{Camera, CameraError, DeviceInfo, PixelFormat};
