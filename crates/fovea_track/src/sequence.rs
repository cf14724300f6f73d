// SPDX-License-Identifier: MIT OR Apache-2.0
//! Bounding-box sequences: the aggregate root of a track.

use crate::bbox::{BoundingBox, TrackingSource};
use crate::segment::{InterpolationSegment, InterpolationType};
use crate::visibility::{validate_ranges, VisibilityRange};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Sequence mutation errors
#[derive(Debug, Error)]
pub enum SequenceError {
    /// A keyframe already exists at this frame; call sites must replace
    /// explicitly instead of overwriting
    #[error("keyframe already exists at frame {frame}")]
    DuplicateKeyframe {
        /// Offending frame number
        frame: u32,
    },

    /// No keyframe at the requested frame
    #[error("no keyframe at frame {frame}")]
    KeyframeNotFound {
        /// Requested frame number
        frame: u32,
    },

    /// No interpolation segment starts at the requested frame
    #[error("no segment starting at frame {start_frame}")]
    SegmentNotFound {
        /// Requested segment start
        start_frame: u32,
    },

    /// Bounding box geometry is unusable
    #[error("invalid bounding box: {0}")]
    InvalidBox(String),

    /// A structural invariant does not hold
    #[error("sequence invariant violated: {0}")]
    InvariantViolation(String),
}

/// A keyframed bounding-box track.
///
/// `boxes` holds keyframes only, sorted by frame number with unique frames.
/// `interpolation_segments` exactly partition the keyframe span.
/// The three count fields are caches; every mutator recomputes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBoxSequence {
    /// Keyframe samples, sorted by frame number
    pub boxes: Vec<BoundingBox>,
    /// Interpolation rules between consecutive keyframes
    #[serde(default)]
    pub interpolation_segments: Vec<InterpolationSegment>,
    /// Visibility/occlusion ranges
    #[serde(default)]
    pub visibility_ranges: Vec<VisibilityRange>,
    /// Identity of the tracked object across frames
    pub track_id: String,
    /// Where the track came from
    #[serde(default)]
    pub tracking_source: TrackingSource,
    /// Overall tracker confidence, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_confidence: Option<f32>,
    /// Cached: frames spanned by the track (last - first + 1)
    #[serde(default)]
    pub total_frames: u32,
    /// Cached: number of keyframes
    #[serde(default)]
    pub keyframe_count: u32,
    /// Cached: frames inside the span that are derived, not keyed
    #[serde(default)]
    pub interpolated_frame_count: u32,
}

impl BoundingBoxSequence {
    /// Create an empty sequence
    pub fn new(track_id: impl Into<String>, tracking_source: TrackingSource) -> Self {
        Self {
            boxes: Vec::new(),
            interpolation_segments: Vec::new(),
            visibility_ranges: Vec::new(),
            track_id: track_id.into(),
            tracking_source,
            tracking_confidence: None,
            total_frames: 0,
            keyframe_count: 0,
            interpolated_frame_count: 0,
        }
    }

    /// Generate a fresh track id
    pub fn generated_track_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// First and last keyframe frame numbers
    pub fn frame_span(&self) -> Option<(u32, u32)> {
        match (self.boxes.first(), self.boxes.last()) {
            (Some(first), Some(last)) => Some((first.frame_number, last.frame_number)),
            _ => None,
        }
    }

    /// Keyframe at an exact frame, if any
    pub fn keyframe_at(&self, frame: u32) -> Option<&BoundingBox> {
        self.boxes
            .binary_search_by_key(&frame, |b| b.frame_number)
            .ok()
            .map(|i| &self.boxes[i])
    }

    /// Segment containing `frame`, if any
    pub fn segment_containing(&self, frame: u32) -> Option<&InterpolationSegment> {
        let idx = self
            .interpolation_segments
            .partition_point(|s| s.start_frame <= frame);
        if idx == 0 {
            return None;
        }
        let seg = &self.interpolation_segments[idx - 1];
        seg.contains(frame).then_some(seg)
    }

    /// Insert a keyframe in frame order.
    ///
    /// Fails on invalid geometry or if a keyframe already occupies the
    /// frame. The segment touching the insertion point is split so segments
    /// continue to partition the keyframe span; segments created at either
    /// end of the track default to linear.
    pub fn add_keyframe(&mut self, mut keyframe: BoundingBox) -> Result<(), SequenceError> {
        if !keyframe.has_valid_geometry() {
            return Err(SequenceError::InvalidBox(format!(
                "non-finite or negative geometry at frame {}",
                keyframe.frame_number
            )));
        }
        keyframe.is_keyframe = true;

        let frame = keyframe.frame_number;
        let pos = match self.boxes.binary_search_by_key(&frame, |b| b.frame_number) {
            Ok(_) => return Err(SequenceError::DuplicateKeyframe { frame }),
            Err(pos) => pos,
        };
        self.boxes.insert(pos, keyframe);

        let n = self.boxes.len();
        if n >= 2 {
            if pos == 0 {
                self.interpolation_segments.insert(
                    0,
                    InterpolationSegment::new(
                        frame,
                        self.boxes[1].frame_number,
                        InterpolationType::Linear,
                    ),
                );
            } else if pos == n - 1 {
                self.interpolation_segments.push(InterpolationSegment::new(
                    self.boxes[n - 2].frame_number,
                    frame,
                    InterpolationType::Linear,
                ));
            } else {
                let prev = self.boxes[pos - 1].frame_number;
                let next = self.boxes[pos + 1].frame_number;
                match self
                    .interpolation_segments
                    .iter()
                    .position(|s| s.start_frame == prev && s.end_frame == next)
                {
                    Some(i) => {
                        let old = self.interpolation_segments.remove(i);
                        let mut left = InterpolationSegment::new(prev, frame, old.ty);
                        left.control_points = old.control_points;
                        let mut right = InterpolationSegment::new(frame, next, old.ty);
                        right.control_points = old.control_points;
                        self.interpolation_segments.insert(i, right);
                        self.interpolation_segments.insert(i, left);
                    }
                    // Segment list no longer partitions; repair it.
                    None => self.rebuild_segments(),
                }
            }
        }

        self.recompute_derived();
        Ok(())
    }

    /// Remove the keyframe at `frame`.
    ///
    /// The two segments bordering the removed keyframe merge into one
    /// spanning the remaining neighbors; the earlier segment's type wins.
    pub fn remove_keyframe(&mut self, frame: u32) -> Result<BoundingBox, SequenceError> {
        let pos = self
            .boxes
            .binary_search_by_key(&frame, |b| b.frame_number)
            .map_err(|_| SequenceError::KeyframeNotFound { frame })?;
        let removed = self.boxes.remove(pos);

        if self.boxes.len() < 2 {
            self.interpolation_segments.clear();
        } else if pos == 0 {
            self.interpolation_segments
                .retain(|s| s.start_frame != frame);
        } else if pos == self.boxes.len() {
            self.interpolation_segments.retain(|s| s.end_frame != frame);
        } else {
            let merge_at = self
                .interpolation_segments
                .iter()
                .position(|s| s.end_frame == frame);
            match merge_at {
                Some(i) if i + 1 < self.interpolation_segments.len() => {
                    let right = self.interpolation_segments.remove(i + 1);
                    let left = &mut self.interpolation_segments[i];
                    left.end_frame = right.end_frame;
                }
                _ => self.rebuild_segments(),
            }
        }

        self.recompute_derived();
        Ok(removed)
    }

    /// Overwrite the keyframe at an existing frame, keeping segments intact.
    /// This is the explicit escape hatch for call sites that intend to
    /// replace rather than insert.
    pub fn replace_keyframe(&mut self, mut keyframe: BoundingBox) -> Result<(), SequenceError> {
        if !keyframe.has_valid_geometry() {
            return Err(SequenceError::InvalidBox(format!(
                "non-finite or negative geometry at frame {}",
                keyframe.frame_number
            )));
        }
        keyframe.is_keyframe = true;
        let frame = keyframe.frame_number;
        let pos = self
            .boxes
            .binary_search_by_key(&frame, |b| b.frame_number)
            .map_err(|_| SequenceError::KeyframeNotFound { frame })?;
        self.boxes[pos] = keyframe;
        self.recompute_derived();
        Ok(())
    }

    /// Move a keyframe to a new frame, preserving its geometry
    pub fn move_keyframe(&mut self, frame: u32, new_frame: u32) -> Result<(), SequenceError> {
        if frame == new_frame {
            return Ok(());
        }
        if self.keyframe_at(new_frame).is_some() {
            return Err(SequenceError::DuplicateKeyframe { frame: new_frame });
        }
        let mut moved = self.remove_keyframe(frame)?;
        moved.frame_number = new_frame;
        self.add_keyframe(moved)
    }

    /// Retype the segment starting at `start_frame`
    pub fn set_segment_type(
        &mut self,
        start_frame: u32,
        ty: InterpolationType,
        control_points: Option<[[f32; 2]; 2]>,
    ) -> Result<(), SequenceError> {
        let seg = self
            .interpolation_segments
            .iter_mut()
            .find(|s| s.start_frame == start_frame)
            .ok_or(SequenceError::SegmentNotFound { start_frame })?;
        seg.ty = ty;
        seg.control_points = control_points;
        Ok(())
    }

    /// Merge keyframes from another source into this sequence. Frames
    /// already keyed here are kept as-is. Returns how many were added.
    pub fn merge_keyframes(&mut self, incoming: &[BoundingBox]) -> usize {
        let mut added = 0;
        for b in incoming {
            if self.add_keyframe(b.clone()).is_ok() {
                added += 1;
            }
        }
        added
    }

    /// Drop every keyframe inside `[start, end]` and rebuild segments.
    /// Returns how many keyframes were removed.
    pub fn remove_keyframes_in(&mut self, start: u32, end: u32) -> usize {
        let before = self.boxes.len();
        self.boxes
            .retain(|b| b.frame_number < start || b.frame_number > end);
        self.rebuild_segments();
        self.recompute_derived();
        before - self.boxes.len()
    }

    /// Restore the structural invariants after untrusted input.
    ///
    /// Deserialized sequences may arrive with unsorted or duplicated
    /// keyframes, a missing or non-partitioning segment list and stale
    /// cached counts; this sorts and dedups the keyframes (first
    /// occurrence wins), rebuilds the segment partition and refreshes
    /// the counts.
    pub fn normalize(&mut self) {
        self.boxes.sort_by_key(|b| b.frame_number);
        self.boxes.dedup_by_key(|b| b.frame_number);
        self.rebuild_segments();
        self.recompute_derived();
    }

    /// Rebuild segments from consecutive keyframe pairs, preserving any
    /// existing segment whose endpoints survived and defaulting the rest
    /// to linear.
    pub fn rebuild_segments(&mut self) {
        let old = std::mem::take(&mut self.interpolation_segments);
        self.interpolation_segments = self
            .boxes
            .windows(2)
            .map(|pair| {
                let (start, end) = (pair[0].frame_number, pair[1].frame_number);
                old.iter()
                    .find(|s| s.start_frame == start && s.end_frame == end)
                    .cloned()
                    .unwrap_or_else(|| {
                        InterpolationSegment::new(start, end, InterpolationType::Linear)
                    })
            })
            .collect();
    }

    /// Recalculate the cached derived counts. Every structural mutator
    /// calls this; external callers only need it after direct field edits.
    pub fn recompute_derived(&mut self) {
        self.keyframe_count = self.boxes.len() as u32;
        self.total_frames = match self.frame_span() {
            Some((first, last)) => last - first + 1,
            None => 0,
        };
        self.interpolated_frame_count = self.total_frames.saturating_sub(self.keyframe_count);
    }

    /// Check every structural invariant without mutating anything.
    pub fn validate(&self) -> Result<(), SequenceError> {
        for pair in self.boxes.windows(2) {
            if pair[0].frame_number >= pair[1].frame_number {
                return Err(SequenceError::InvariantViolation(format!(
                    "keyframes unsorted or duplicated around frame {}",
                    pair[1].frame_number
                )));
            }
        }
        for b in &self.boxes {
            if !b.is_keyframe {
                return Err(SequenceError::InvariantViolation(format!(
                    "stored box at frame {} is not a keyframe",
                    b.frame_number
                )));
            }
            if !b.has_valid_geometry() {
                return Err(SequenceError::InvariantViolation(format!(
                    "invalid geometry at frame {}",
                    b.frame_number
                )));
            }
        }

        let expected = self.boxes.len().saturating_sub(1);
        if self.interpolation_segments.len() != expected {
            return Err(SequenceError::InvariantViolation(format!(
                "{} segments for {} keyframes",
                self.interpolation_segments.len(),
                self.boxes.len()
            )));
        }
        for (i, pair) in self.boxes.windows(2).enumerate() {
            let seg = &self.interpolation_segments[i];
            if seg.start_frame != pair[0].frame_number || seg.end_frame != pair[1].frame_number {
                return Err(SequenceError::InvariantViolation(format!(
                    "segment [{}, {}] does not match keyframes [{}, {}]",
                    seg.start_frame, seg.end_frame, pair[0].frame_number, pair[1].frame_number
                )));
            }
        }

        validate_ranges(&self.visibility_ranges).map_err(SequenceError::InvariantViolation)?;

        let mut fresh = self.clone();
        fresh.recompute_derived();
        if fresh.keyframe_count != self.keyframe_count
            || fresh.total_frames != self.total_frames
            || fresh.interpolated_frame_count != self.interpolated_frame_count
        {
            return Err(SequenceError::InvariantViolation(
                "cached derived counts are stale".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq_with_frames(frames: &[u32]) -> BoundingBoxSequence {
        let mut seq = BoundingBoxSequence::new("T1", TrackingSource::Manual);
        for &f in frames {
            seq.add_keyframe(BoundingBox::keyframe(f, f as f32, 0.0, 10.0, 10.0))
                .unwrap();
        }
        seq
    }

    #[test]
    fn segments_partition_after_ordered_and_unordered_inserts() {
        let seq = seq_with_frames(&[0, 120, 240, 360]);
        assert_eq!(seq.interpolation_segments.len(), 3);
        seq.validate().unwrap();

        // Out-of-order insertion must end in the same structure.
        let shuffled = seq_with_frames(&[240, 0, 360, 120]);
        shuffled.validate().unwrap();
        assert_eq!(
            shuffled
                .interpolation_segments
                .iter()
                .map(|s| (s.start_frame, s.end_frame))
                .collect::<Vec<_>>(),
            vec![(0, 120), (120, 240), (240, 360)]
        );
    }

    #[test]
    fn middle_insert_splits_segment_and_inherits_type() {
        let mut seq = seq_with_frames(&[0, 100]);
        seq.set_segment_type(0, InterpolationType::EaseInOut, None)
            .unwrap();

        seq.add_keyframe(BoundingBox::keyframe(50, 5.0, 5.0, 10.0, 10.0))
            .unwrap();
        seq.validate().unwrap();
        assert_eq!(seq.interpolation_segments.len(), 2);
        assert_eq!(seq.interpolation_segments[0].ty, InterpolationType::EaseInOut);
        assert_eq!(seq.interpolation_segments[1].ty, InterpolationType::EaseInOut);
    }

    #[test]
    fn normalize_repairs_a_raw_deserialized_sequence() {
        // The wire shape: boxes only, unsorted, one duplicate, no
        // segments, no cached counts.
        let mut seq = BoundingBoxSequence::new("T1", TrackingSource::Imported);
        seq.boxes.push(BoundingBox::keyframe(30, 30.0, 0.0, 10.0, 10.0));
        seq.boxes.push(BoundingBox::keyframe(0, 0.0, 0.0, 10.0, 10.0));
        seq.boxes.push(BoundingBox::keyframe(30, 99.0, 0.0, 10.0, 10.0));
        assert!(seq.validate().is_err());

        seq.normalize();
        seq.validate().unwrap();
        let frames: Vec<u32> = seq.boxes.iter().map(|b| b.frame_number).collect();
        assert_eq!(frames, vec![0, 30]);
        // First occurrence wins on a duplicated frame.
        assert_eq!(seq.keyframe_at(30).unwrap().x, 30.0);
        assert_eq!(seq.interpolation_segments.len(), 1);
        assert_eq!(seq.keyframe_count, 2);
        assert_eq!(seq.total_frames, 31);
        assert_eq!(seq.interpolated_frame_count, 29);
    }

    #[test]
    fn duplicate_frame_is_rejected_not_overwritten() {
        let mut seq = seq_with_frames(&[0, 100]);
        let err = seq
            .add_keyframe(BoundingBox::keyframe(100, 9.0, 9.0, 1.0, 1.0))
            .unwrap_err();
        assert!(matches!(err, SequenceError::DuplicateKeyframe { frame: 100 }));
        // Original geometry untouched.
        assert_eq!(seq.keyframe_at(100).unwrap().x, 100.0);

        seq.replace_keyframe(BoundingBox::keyframe(100, 9.0, 9.0, 1.0, 1.0))
            .unwrap();
        assert_eq!(seq.keyframe_at(100).unwrap().x, 9.0);
    }

    #[test]
    fn invalid_geometry_is_rejected() {
        let mut seq = BoundingBoxSequence::new("T1", TrackingSource::Manual);
        let err = seq
            .add_keyframe(BoundingBox::keyframe(0, 0.0, 0.0, -5.0, 1.0))
            .unwrap_err();
        assert!(matches!(err, SequenceError::InvalidBox(_)));
    }

    #[test]
    fn remove_middle_keyframe_merges_with_earlier_type() {
        let mut seq = seq_with_frames(&[0, 120, 240]);
        seq.set_segment_type(0, InterpolationType::EaseIn, None).unwrap();
        seq.set_segment_type(120, InterpolationType::Step, None).unwrap();

        let n_before = seq.keyframe_count;
        seq.remove_keyframe(120).unwrap();
        seq.validate().unwrap();

        assert_eq!(seq.keyframe_count, n_before - 1);
        assert_eq!(seq.interpolation_segments.len(), 1);
        let merged = &seq.interpolation_segments[0];
        assert_eq!((merged.start_frame, merged.end_frame), (0, 240));
        // Earlier segment's type wins.
        assert_eq!(merged.ty, InterpolationType::EaseIn);
    }

    #[test]
    fn remove_endpoints_drops_border_segments() {
        let mut seq = seq_with_frames(&[0, 120, 240]);
        seq.remove_keyframe(0).unwrap();
        seq.validate().unwrap();
        assert_eq!(seq.frame_span(), Some((120, 240)));

        seq.remove_keyframe(240).unwrap();
        seq.validate().unwrap();
        assert!(seq.interpolation_segments.is_empty());

        let err = seq.remove_keyframe(999).unwrap_err();
        assert!(matches!(err, SequenceError::KeyframeNotFound { frame: 999 }));
    }

    #[test]
    fn derived_counts_track_mutations() {
        let mut seq = seq_with_frames(&[10, 40]);
        assert_eq!(seq.keyframe_count, 2);
        assert_eq!(seq.total_frames, 31);
        assert_eq!(seq.interpolated_frame_count, 29);

        seq.remove_keyframe(40).unwrap();
        assert_eq!(seq.keyframe_count, 1);
        assert_eq!(seq.total_frames, 1);
        assert_eq!(seq.interpolated_frame_count, 0);
    }

    #[test]
    fn stale_counts_fail_validation() {
        let mut seq = seq_with_frames(&[0, 10]);
        seq.total_frames = 999;
        assert!(matches!(
            seq.validate(),
            Err(SequenceError::InvariantViolation(_))
        ));
    }

    #[test]
    fn move_keyframe_preserves_geometry() {
        let mut seq = seq_with_frames(&[0, 100, 200]);
        seq.move_keyframe(100, 150).unwrap();
        seq.validate().unwrap();
        assert!(seq.keyframe_at(100).is_none());
        assert_eq!(seq.keyframe_at(150).unwrap().x, 100.0);

        let err = seq.move_keyframe(150, 200).unwrap_err();
        assert!(matches!(err, SequenceError::DuplicateKeyframe { frame: 200 }));
    }

    #[test]
    fn remove_keyframes_in_range_rebuilds_segments() {
        let mut seq = seq_with_frames(&[0, 50, 100, 150]);
        let removed = seq.remove_keyframes_in(40, 110);
        assert_eq!(removed, 2);
        seq.validate().unwrap();
        assert_eq!(seq.frame_span(), Some((0, 150)));
        assert_eq!(seq.interpolation_segments.len(), 1);
    }
}
