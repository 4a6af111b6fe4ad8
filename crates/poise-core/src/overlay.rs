//! Overlay instructions handed to the display with each frame.

use crate::types::{FrameMetrics, PixelPoint};
use serde::Serialize;

/// RGB colour.
pub type Color = [u8; 3];

pub const EYE_COLOR: Color = [0, 255, 0];
pub const MOUTH_COLOR: Color = [0, 0, 255];
pub const BROW_COLOR: Color = [255, 128, 0];
pub const POSE_COLOR: Color = [0, 255, 255];

const MARKER_RADIUS: u32 = 2;
const TEXT_X: i32 = 30;
const LINE_HEIGHT: i32 = 30;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OverlayElement {
    Marker {
        x: i32,
        y: i32,
        radius: u32,
        color: Color,
    },
    Text {
        text: String,
        x: i32,
        y: i32,
        color: Color,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Overlay {
    pub elements: Vec<OverlayElement>,
}

impl Overlay {
    /// Build the overlay for one frame.
    ///
    /// Every metric owns a fixed text line, so a suppressed metric leaves
    /// its line empty instead of shifting the others.
    pub fn build(metrics: &FrameMetrics, eye_points: &[PixelPoint], mouth_points: &[PixelPoint]) -> Self {
        let mut elements = Vec::with_capacity(eye_points.len() + mouth_points.len() + 6);

        let markers = |points: &[PixelPoint], color: Color| {
            points
                .iter()
                .map(move |p| OverlayElement::Marker {
                    x: p.x(),
                    y: p.y(),
                    radius: MARKER_RADIUS,
                    color,
                })
                .collect::<Vec<_>>()
        };
        elements.extend(markers(eye_points, EYE_COLOR));
        elements.extend(markers(mouth_points, MOUTH_COLOR));

        let lines: [(Option<String>, Color); 6] = [
            (metrics.ear.map(|v| format!("EAR: {v:.2}")), EYE_COLOR),
            (metrics.mar.map(|v| format!("MAR: {v:.2}")), MOUTH_COLOR),
            (metrics.eyebrow_raise.map(|v| format!("Eyebrow Raise: {v:.3}")), BROW_COLOR),
            (metrics.pose_detected.then(|| format!("Pitch: {:.1}", metrics.pitch)), POSE_COLOR),
            (metrics.pose_detected.then(|| format!("Yaw: {:.1}", metrics.yaw)), POSE_COLOR),
            (metrics.pose_detected.then(|| format!("Roll: {:.1}", metrics.roll)), POSE_COLOR),
        ];
        for (slot, (text, color)) in lines.into_iter().enumerate() {
            if let Some(text) = text {
                elements.push(OverlayElement::Text {
                    text,
                    x: TEXT_X,
                    y: LINE_HEIGHT * (slot as i32 + 1),
                    color,
                });
            }
        }

        Self { elements }
    }

    /// Text lines in display order.
    pub fn text_lines(&self) -> impl Iterator<Item = &str> {
        self.elements.iter().filter_map(|e| match e {
            OverlayElement::Text { text, .. } => Some(text.as_str()),
            OverlayElement::Marker { .. } => None,
        })
    }
}
