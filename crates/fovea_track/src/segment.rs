// SPDX-License-Identifier: MIT OR Apache-2.0
//! Interpolation segments and easing curves.

use serde::{Deserialize, Serialize};

/// Interpolation curve between two consecutive keyframes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum InterpolationType {
    /// Direct lerp
    #[default]
    Linear,
    /// Cubic ease-in
    EaseIn,
    /// Cubic ease-out
    EaseOut,
    /// Cubic ease-in-out
    EaseInOut,
    /// Cubic bezier with per-segment control points
    Bezier,
    /// Hold the starting keyframe until the end frame
    Step,
}

impl InterpolationType {
    /// Display name for UI labels
    pub fn name(&self) -> &'static str {
        match self {
            Self::Linear => "Linear",
            Self::EaseIn => "Ease In",
            Self::EaseOut => "Ease Out",
            Self::EaseInOut => "Ease In/Out",
            Self::Bezier => "Bezier",
            Self::Step => "Step",
        }
    }
}

/// Interpolation rule spanning the frames between two consecutive keyframes.
///
/// Segments on a sequence exactly partition the keyframe span: segment `i`
/// covers `[keyframe[i].frame_number, keyframe[i+1].frame_number]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterpolationSegment {
    /// First frame covered (a keyframe's frame)
    pub start_frame: u32,
    /// Last frame covered (the next keyframe's frame)
    pub end_frame: u32,
    /// Curve applied over this span
    #[serde(rename = "type")]
    pub ty: InterpolationType,
    /// Bezier control points, `[[x1, y1], [x2, y2]]`. Absent for
    /// non-bezier curves; a bezier segment without control points falls
    /// back to linear.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_points: Option<[[f32; 2]; 2]>,
}

impl InterpolationSegment {
    /// Create a segment over `[start_frame, end_frame]`
    pub fn new(start_frame: u32, end_frame: u32, ty: InterpolationType) -> Self {
        Self {
            start_frame,
            end_frame,
            ty,
            control_points: None,
        }
    }

    /// Set bezier control points
    pub fn with_control_points(mut self, p1: [f32; 2], p2: [f32; 2]) -> Self {
        self.control_points = Some([p1, p2]);
        self
    }

    /// Whether `frame` falls inside this segment (inclusive bounds)
    pub fn contains(&self, frame: u32) -> bool {
        frame >= self.start_frame && frame <= self.end_frame
    }

    /// Number of frames spanned
    pub fn span(&self) -> u32 {
        self.end_frame - self.start_frame
    }

    /// Remap a normalized position `t` in 0..=1 through this segment's curve.
    ///
    /// `Step` is handled by the sampler (it holds a value rather than
    /// remapping `t`); here it maps to 0 so accidental callers still get the
    /// starting keyframe.
    pub fn remap(&self, t: f32) -> f32 {
        match self.ty {
            InterpolationType::Linear => t,
            InterpolationType::EaseIn => Easing::ease_in(t),
            InterpolationType::EaseOut => Easing::ease_out(t),
            InterpolationType::EaseInOut => Easing::ease_in_out(t),
            InterpolationType::Bezier => match self.control_points {
                Some([p1, p2]) => Easing::cubic_bezier(p1[1], p2[1], t),
                None => t,
            },
            InterpolationType::Step => 0.0,
        }
    }
}

/// Easing utilities
pub struct Easing;

impl Easing {
    /// Linear interpolation between two floats
    pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
        a + (b - a) * t
    }

    /// Cubic ease-in
    pub fn ease_in(t: f32) -> f32 {
        t * t * t
    }

    /// Cubic ease-out
    pub fn ease_out(t: f32) -> f32 {
        let u = 1.0 - t;
        1.0 - u * u * u
    }

    /// Cubic ease-in-out
    pub fn ease_in_out(t: f32) -> f32 {
        if t < 0.5 {
            4.0 * t * t * t
        } else {
            let u = -2.0 * t + 2.0;
            1.0 - u * u * u / 2.0
        }
    }

    /// Cubic bezier through (0, 0) and (1, 1) with interior ordinates
    /// `y1`, `y2`, evaluated at parameter `t`
    pub fn cubic_bezier(y1: f32, y2: f32, t: f32) -> f32 {
        let t2 = t * t;
        let t3 = t2 * t;
        let mt = 1.0 - t;
        let mt2 = mt * mt;

        3.0 * y1 * mt2 * t + 3.0 * y2 * mt * t2 + t3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn easing_endpoints_are_exact() {
        for f in [
            Easing::ease_in as fn(f32) -> f32,
            Easing::ease_out,
            Easing::ease_in_out,
        ] {
            assert_eq!(f(0.0), 0.0);
            assert_eq!(f(1.0), 1.0);
        }
        assert_eq!(Easing::cubic_bezier(0.3, 0.7, 0.0), 0.0);
        assert_eq!(Easing::cubic_bezier(0.3, 0.7, 1.0), 1.0);
    }

    #[test]
    fn ease_in_out_is_symmetric() {
        let lo = Easing::ease_in_out(0.25);
        let hi = Easing::ease_in_out(0.75);
        assert!((lo + hi - 1.0).abs() < 1e-6);
        assert!((Easing::ease_in_out(0.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn bezier_segment_without_control_points_is_linear() {
        let seg = InterpolationSegment::new(0, 10, InterpolationType::Bezier);
        assert_eq!(seg.remap(0.3), 0.3);

        let seg = seg.with_control_points([0.42, 0.0], [0.58, 1.0]);
        assert!(seg.remap(0.3) < 0.3);
    }

    #[test]
    fn wire_names_are_kebab_case() {
        let seg = InterpolationSegment::new(0, 10, InterpolationType::EaseInOut);
        let json = serde_json::to_value(&seg).unwrap();
        assert_eq!(json["type"], "ease-in-out");
        assert_eq!(json["startFrame"], 0);
        assert_eq!(json["endFrame"], 10);
    }
}
