// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-frame sampling of bounding-box sequences.
//!
//! Pure functions only: `(sequence, frame)` in, interpolated box or `None`
//! out. Frames outside the track's lifespan or hidden by visibility ranges
//! are normal queries that yield `None`, never errors.

use crate::bbox::BoundingBox;
use crate::segment::{Easing, InterpolationType};
use crate::sequence::BoundingBoxSequence;
use crate::visibility::visible_at;

/// Sample the sequence at `frame`.
///
/// Exact keyframes are returned verbatim so curve evaluation never drifts
/// at segment endpoints. Between keyframes the containing segment's curve
/// remaps the normalized position before lerping each box field.
pub fn sample(sequence: &BoundingBoxSequence, frame: u32) -> Option<BoundingBox> {
    let (first, last) = sequence.frame_span()?;
    if frame < first || frame > last {
        return None;
    }
    if !visible_at(&sequence.visibility_ranges, frame) {
        return None;
    }

    if let Some(kf) = sequence.keyframe_at(frame) {
        return Some(kf.clone());
    }

    let segment = sequence.segment_containing(frame)?;
    let start = sequence.keyframe_at(segment.start_frame)?;

    if segment.ty == InterpolationType::Step {
        // Hold the starting keyframe until the end frame.
        let mut held = start.clone();
        held.frame_number = frame;
        held.is_keyframe = false;
        return Some(held);
    }

    let end = sequence.keyframe_at(segment.end_frame)?;
    let t = (frame - segment.start_frame) as f32 / segment.span() as f32;
    let t = segment.remap(t);

    let confidence = match (start.confidence, end.confidence) {
        (Some(a), Some(b)) => Some(Easing::lerp(a, b, t)),
        _ => None,
    };

    Some(BoundingBox {
        x: Easing::lerp(start.x, end.x, t),
        y: Easing::lerp(start.y, end.y, t),
        width: Easing::lerp(start.width, end.width, t),
        height: Easing::lerp(start.height, end.height, t),
        frame_number: frame,
        is_keyframe: false,
        confidence,
        metadata: None,
    })
}

/// Whether two frame spans intersect (inclusive bounds)
pub fn spans_overlap(a: (u32, u32), b: (u32, u32)) -> bool {
    a.0 <= b.1 && b.0 <= a.1
}

/// Intersection of two frame spans, if any
pub fn overlap_range(a: (u32, u32), b: (u32, u32)) -> Option<(u32, u32)> {
    spans_overlap(a, b).then(|| (a.0.max(b.0), a.1.min(b.1)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bbox::TrackingSource;
    use crate::segment::InterpolationType;
    use crate::visibility::VisibilityRange;

    fn demo_sequence() -> BoundingBoxSequence {
        // Keyframes at [0, 120, 240, 360], segment types
        // [ease-in-out, linear, ease-out].
        let mut seq = BoundingBoxSequence::new("T1", TrackingSource::Manual);
        seq.add_keyframe(BoundingBox::keyframe(0, 0.0, 0.0, 10.0, 10.0))
            .unwrap();
        seq.add_keyframe(BoundingBox::keyframe(120, 100.0, 50.0, 20.0, 20.0))
            .unwrap();
        seq.add_keyframe(BoundingBox::keyframe(240, 200.0, 100.0, 30.0, 30.0))
            .unwrap();
        seq.add_keyframe(BoundingBox::keyframe(360, 300.0, 150.0, 40.0, 40.0))
            .unwrap();
        seq.set_segment_type(0, InterpolationType::EaseInOut, None)
            .unwrap();
        seq.set_segment_type(240, InterpolationType::EaseOut, None)
            .unwrap();
        seq
    }

    #[test]
    fn keyframes_are_returned_verbatim() {
        let seq = demo_sequence();
        for frame in [0, 120, 240, 360] {
            let sampled = sample(&seq, frame).unwrap();
            assert_eq!(&sampled, seq.keyframe_at(frame).unwrap());
            assert!(sampled.is_keyframe);
        }
    }

    #[test]
    fn midpoint_is_strictly_between_neighboring_keyframes() {
        let seq = demo_sequence();
        let mid = sample(&seq, 60).unwrap();
        assert!(!mid.is_keyframe);
        assert!(mid.x > 0.0 && mid.x < 100.0);
        assert!(mid.y > 0.0 && mid.y < 50.0);
        assert!(mid.width > 10.0 && mid.width < 20.0);
        // Ease-in-out at the exact midpoint matches linear.
        assert!((mid.x - 50.0).abs() < 1e-3);
    }

    #[test]
    fn linear_segment_lerps_directly() {
        let seq = demo_sequence();
        let b = sample(&seq, 180).unwrap();
        assert!((b.x - 150.0).abs() < 1e-3);
        assert!((b.y - 75.0).abs() < 1e-3);
    }

    #[test]
    fn ease_out_front_loads_motion() {
        let seq = demo_sequence();
        let b = sample(&seq, 270).unwrap();
        // Quarter of the way in time, more than a quarter of the way in space.
        assert!(b.x > 225.0);
    }

    #[test]
    fn out_of_span_is_none_not_error() {
        let seq = demo_sequence();
        assert!(sample(&seq, 361).is_none());

        let mut late = BoundingBoxSequence::new("T2", TrackingSource::Manual);
        late.add_keyframe(BoundingBox::keyframe(100, 0.0, 0.0, 1.0, 1.0))
            .unwrap();
        assert!(sample(&late, 99).is_none());
        assert!(sample(&late, 100).is_some());

        let empty = BoundingBoxSequence::new("T3", TrackingSource::Manual);
        assert!(sample(&empty, 0).is_none());
    }

    #[test]
    fn step_holds_start_until_end_frame() {
        let mut seq = demo_sequence();
        seq.set_segment_type(120, InterpolationType::Step, None)
            .unwrap();
        let held = sample(&seq, 239).unwrap();
        assert_eq!(held.x, 100.0);
        assert_eq!(held.frame_number, 239);
        assert!(!held.is_keyframe);
        // The end frame itself is the next keyframe.
        assert_eq!(sample(&seq, 240).unwrap().x, 200.0);
    }

    #[test]
    fn bezier_without_control_points_falls_back_to_linear() {
        let mut seq = demo_sequence();
        seq.set_segment_type(120, InterpolationType::Bezier, None)
            .unwrap();
        let b = sample(&seq, 180).unwrap();
        assert!((b.x - 150.0).abs() < 1e-3);

        seq.set_segment_type(
            120,
            InterpolationType::Bezier,
            Some([[0.6, 0.05], [0.9, 0.2]]),
        )
        .unwrap();
        let slow = sample(&seq, 180).unwrap();
        assert!(slow.x < 150.0);
    }

    #[test]
    fn visibility_gates_sampling() {
        let mut seq = demo_sequence();
        seq.visibility_ranges = vec![
            VisibilityRange::visible(0, 100),
            VisibilityRange::hidden(101, 200),
        ];
        assert!(sample(&seq, 50).is_some());
        assert!(sample(&seq, 150).is_none()); // hidden range
        assert!(sample(&seq, 300).is_none()); // outside every range
        // Even exact keyframes are gated.
        assert!(sample(&seq, 240).is_none());
        assert!(sample(&seq, 0).is_some());
    }

    #[test]
    fn confidence_lerps_only_when_both_ends_have_it() {
        let mut seq = BoundingBoxSequence::new("T4", TrackingSource::Detected);
        seq.add_keyframe(BoundingBox::keyframe(0, 0.0, 0.0, 1.0, 1.0).with_confidence(0.2))
            .unwrap();
        seq.add_keyframe(BoundingBox::keyframe(10, 10.0, 0.0, 1.0, 1.0).with_confidence(0.8))
            .unwrap();
        let mid = sample(&seq, 5).unwrap();
        assert!((mid.confidence.unwrap() - 0.5).abs() < 1e-6);

        seq.replace_keyframe(BoundingBox::keyframe(10, 10.0, 0.0, 1.0, 1.0))
            .unwrap();
        assert!(sample(&seq, 5).unwrap().confidence.is_none());
    }

    #[test]
    fn span_overlap_helpers() {
        assert!(spans_overlap((0, 100), (50, 150)));
        assert!(!spans_overlap((0, 100), (101, 150)));
        assert_eq!(overlap_range((0, 100), (50, 150)), Some((50, 100)));
        assert_eq!(overlap_range((0, 10), (20, 30)), None);
    }
}
