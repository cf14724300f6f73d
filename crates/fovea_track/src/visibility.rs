// SPDX-License-Identifier: MIT OR Apache-2.0
//! Visibility ranges for occlusion handling.

use serde::{Deserialize, Serialize};

/// A span of frames over which the tracked object is (in)visible.
///
/// Ranges on a sequence are sorted by `start_frame` and never overlap.
/// Gaps between ranges represent occlusion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibilityRange {
    /// First frame of the range (inclusive)
    pub start_frame: u32,
    /// Last frame of the range (inclusive)
    pub end_frame: u32,
    /// Whether the object is visible over this range
    pub visible: bool,
}

impl VisibilityRange {
    /// Create a visible range
    pub fn visible(start_frame: u32, end_frame: u32) -> Self {
        Self {
            start_frame,
            end_frame,
            visible: true,
        }
    }

    /// Create a hidden range
    pub fn hidden(start_frame: u32, end_frame: u32) -> Self {
        Self {
            start_frame,
            end_frame,
            visible: false,
        }
    }

    /// Whether `frame` falls inside this range (inclusive bounds)
    pub fn contains(&self, frame: u32) -> bool {
        frame >= self.start_frame && frame <= self.end_frame
    }
}

/// Resolve visibility for a frame against a range list.
///
/// With no declared ranges the object is visible over its whole span.
/// With at least one range, frames outside every declared range are
/// implicitly not visible.
pub fn visible_at(ranges: &[VisibilityRange], frame: u32) -> bool {
    if ranges.is_empty() {
        return true;
    }
    ranges
        .iter()
        .find(|r| r.contains(frame))
        .is_some_and(|r| r.visible)
}

/// Check that ranges are sorted by start frame, well-formed and
/// non-overlapping. Returns the first problem found.
pub fn validate_ranges(ranges: &[VisibilityRange]) -> Result<(), String> {
    for r in ranges {
        if r.start_frame > r.end_frame {
            return Err(format!(
                "visibility range [{}, {}] is inverted",
                r.start_frame, r.end_frame
            ));
        }
    }
    for pair in ranges.windows(2) {
        if pair[1].start_frame <= pair[0].end_frame {
            return Err(format!(
                "visibility ranges [{}, {}] and [{}, {}] overlap or are unsorted",
                pair[0].start_frame, pair[0].end_frame, pair[1].start_frame, pair[1].end_frame
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_ranges_mean_visible() {
        assert!(visible_at(&[], 0));
        assert!(visible_at(&[], 10_000));
    }

    #[test]
    fn gaps_and_hidden_ranges_are_not_visible() {
        let ranges = [
            VisibilityRange::visible(0, 10),
            VisibilityRange::hidden(11, 20),
            VisibilityRange::visible(30, 40),
        ];
        assert!(visible_at(&ranges, 5));
        assert!(!visible_at(&ranges, 15));
        assert!(!visible_at(&ranges, 25)); // gap
        assert!(visible_at(&ranges, 30));
        assert!(!visible_at(&ranges, 41));
    }

    #[test]
    fn validation_rejects_overlap_and_disorder() {
        let ok = [
            VisibilityRange::visible(0, 10),
            VisibilityRange::visible(11, 20),
        ];
        assert!(validate_ranges(&ok).is_ok());

        let overlapping = [
            VisibilityRange::visible(0, 10),
            VisibilityRange::visible(10, 20),
        ];
        assert!(validate_ranges(&overlapping).is_err());

        let inverted = [VisibilityRange::visible(10, 5)];
        assert!(validate_ranges(&inverted).is_err());
    }
}
