// SPDX-License-Identifier: MIT OR Apache-2.0
//! Bounding-box samples.

use serde::{Deserialize, Serialize};

/// Origin of a tracked sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TrackingSource {
    /// Hand-placed by an annotator
    #[default]
    Manual,
    /// Produced by a detector/tracker
    Detected,
    /// Brought in through the import pipeline
    Imported,
}

/// A single spatial sample of a tracked object.
///
/// Only samples with `is_keyframe = true` are ever stored on a sequence;
/// everything else is derived by the interpolation engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    /// Left edge (pixel or normalized units)
    pub x: f32,
    /// Top edge
    pub y: f32,
    /// Box width
    pub width: f32,
    /// Box height
    pub height: f32,
    /// Frame this sample belongs to
    pub frame_number: u32,
    /// Whether this sample is an authoritative keyframe
    #[serde(default)]
    pub is_keyframe: bool,
    /// Detector confidence in 0..=1, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    /// Free-form per-box metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl BoundingBox {
    /// Create a keyframe sample at the given frame
    pub fn keyframe(frame_number: u32, x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            frame_number,
            is_keyframe: true,
            confidence: None,
            metadata: None,
        }
    }

    /// Set the confidence score
    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Attach metadata
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Box center point
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Whether the geometry is usable: finite coordinates, non-negative size
    pub fn has_valid_geometry(&self) -> bool {
        self.x.is_finite()
            && self.y.is_finite()
            && self.width.is_finite()
            && self.height.is_finite()
            && self.width >= 0.0
            && self.height >= 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyframe_constructor_marks_keyframe() {
        let b = BoundingBox::keyframe(12, 1.0, 2.0, 3.0, 4.0);
        assert!(b.is_keyframe);
        assert_eq!(b.frame_number, 12);
        assert_eq!(b.center(), (2.5, 4.0));
    }

    #[test]
    fn geometry_validation() {
        assert!(BoundingBox::keyframe(0, 0.0, 0.0, 10.0, 10.0).has_valid_geometry());
        assert!(!BoundingBox::keyframe(0, 0.0, 0.0, -1.0, 10.0).has_valid_geometry());
        assert!(!BoundingBox::keyframe(0, f32::NAN, 0.0, 1.0, 1.0).has_valid_geometry());
    }

    #[test]
    fn wire_names_are_camel_case() {
        let b = BoundingBox::keyframe(3, 0.0, 0.0, 1.0, 1.0).with_confidence(0.5);
        let json = serde_json::to_value(&b).unwrap();
        assert_eq!(json["frameNumber"], 3);
        assert_eq!(json["isKeyframe"], true);
        assert_eq!(json["confidence"], 0.5);
    }
}
