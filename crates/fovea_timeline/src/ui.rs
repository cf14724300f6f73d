// SPDX-License-Identifier: MIT OR Apache-2.0
//! Timeline rendering and coordinate mapping.
//!
//! Features:
//! - Frame ruler with zoom-adaptive ticks
//! - Keyframe markers with selection highlight
//! - Motion path sampled from the interpolation engine
//! - Playhead
//! - Pixel/frame mapping and keyframe hit-testing

use egui::{Color32, Pos2, Rect, Stroke};
use fovea_track::{interp, BoundingBoxSequence};
use std::collections::HashSet;

const RULER_HEIGHT: f32 = 24.0;
const LABEL_GUTTER_WIDTH: f32 = 48.0;
const KEYFRAME_SIZE: f32 = 10.0;
const PLAYHEAD_WIDTH: f32 = 2.0;
const MOTION_PATH_STRIDE: f32 = 4.0;
const MIN_ZOOM: f32 = 0.05;
const MAX_ZOOM: f32 = 40.0;

/// Keyframe selection for one editing session.
///
/// Scoped to the session context and passed to the renderer explicitly,
/// never held in process-wide state.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// Frame numbers of selected keyframes
    pub keyframes: HashSet<u32>,
}

/// Drag gesture in progress
#[derive(Debug, Clone, Default)]
pub enum DragOperation {
    /// Not dragging
    #[default]
    None,
    /// Dragging the playhead (seek)
    Playhead,
    /// Dragging keyframes
    Keyframes {
        /// Frame where the drag started
        start_frame: u32,
        /// Original frames of all dragged keyframes
        original_frames: Vec<u32>,
    },
    /// Panning the strip
    Pan {
        /// Scroll offset when the pan started
        start_scroll: f32,
    },
}

/// View state for the timeline strip: zoom, scroll and path scaling.
///
/// Holds no annotation data. `zoom` is pixels per frame; `scroll_offset`
/// is the leftmost visible frame (fractional while panning).
#[derive(Debug, Clone)]
pub struct TimelineView {
    /// Horizontal zoom (pixels per frame)
    pub zoom: f32,
    /// Scroll offset (in frames)
    pub scroll_offset: f32,
    /// Vertical scale for the motion path
    pub path_scale: f32,
    /// Vertical offset for the motion path
    pub path_offset: f32,
    /// Current drag operation
    pub drag_op: DragOperation,
}

impl TimelineView {
    /// Create a view at 1 px/frame, scrolled to frame 0
    pub fn new() -> Self {
        Self {
            zoom: 1.0,
            scroll_offset: 0.0,
            path_scale: 100.0,
            path_offset: 0.0,
            drag_op: DragOperation::None,
        }
    }

    /// Convert a frame number to an x position
    pub fn frame_to_x(&self, frame: u32) -> f32 {
        (frame as f32 - self.scroll_offset) * self.zoom + LABEL_GUTTER_WIDTH
    }

    /// Convert an x position back to the nearest frame number.
    ///
    /// Exact inverse of [`Self::frame_to_x`] for in-viewport frames.
    pub fn x_to_frame(&self, x: f32) -> u32 {
        let frame = (x - LABEL_GUTTER_WIDTH) / self.zoom + self.scroll_offset;
        frame.round().max(0.0) as u32
    }

    /// Zoom in one step
    pub fn zoom_in(&mut self) {
        self.zoom = (self.zoom * 1.25).min(MAX_ZOOM);
    }

    /// Zoom out one step
    pub fn zoom_out(&mut self) {
        self.zoom = (self.zoom * 0.8).max(MIN_ZOOM);
    }

    /// Set the scroll offset, clamped at frame 0
    pub fn set_scroll(&mut self, offset: f32) {
        self.scroll_offset = offset.max(0.0);
    }

    /// First and last frame visible inside `rect`
    pub fn visible_frame_range(&self, rect: Rect) -> (u32, u32) {
        let first = self.scroll_offset.max(0.0) as u32;
        let span = ((rect.width() - LABEL_GUTTER_WIDTH).max(0.0) / self.zoom) as u32;
        (first, first.saturating_add(span))
    }

    /// Nearest keyframe within `tolerance_px` of `x`, or `None`.
    ///
    /// Distinguishes "seek" clicks from "drag keyframe" gestures.
    pub fn keyframe_at_x(
        &self,
        sequence: &BoundingBoxSequence,
        x: f32,
        tolerance_px: f32,
    ) -> Option<u32> {
        sequence
            .boxes
            .iter()
            .map(|b| (b.frame_number, (self.frame_to_x(b.frame_number) - x).abs()))
            .filter(|(_, d)| *d <= tolerance_px)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(frame, _)| frame)
    }

    /// Paint the full strip: ruler, keyframes, motion path, playhead.
    ///
    /// Writes to the painter only; reads the sequence, mutates nothing.
    pub fn render(
        &self,
        painter: &egui::Painter,
        rect: Rect,
        sequence: &BoundingBoxSequence,
        current_frame: u32,
        selection: &Selection,
    ) {
        painter.rect_filled(rect, 0.0, Color32::from_gray(30));

        let ruler_rect = Rect::from_min_max(
            rect.min,
            Pos2::new(rect.max.x, rect.min.y + RULER_HEIGHT),
        );
        let strip_rect = Rect::from_min_max(Pos2::new(rect.min.x, ruler_rect.max.y), rect.max);

        self.render_ruler(painter, ruler_rect);
        self.render_motion_path(painter, strip_rect, sequence);
        self.render_keyframes(painter, strip_rect, sequence, selection);
        self.render_playhead(painter, rect, current_frame);
    }

    /// Paint the frame ruler
    fn render_ruler(&self, painter: &egui::Painter, rect: Rect) {
        painter.rect_filled(rect, 0.0, Color32::from_gray(40));

        let tick_interval: u32 = if self.zoom >= 20.0 {
            1
        } else if self.zoom >= 8.0 {
            5
        } else if self.zoom >= 2.0 {
            15
        } else if self.zoom >= 0.5 {
            60
        } else {
            300
        };
        let major_interval = tick_interval * 5;

        let (first, last) = self.visible_frame_range(rect);
        let mut frame = first - first % tick_interval;

        while frame <= last {
            let x = self.frame_to_x(frame);
            if x >= LABEL_GUTTER_WIDTH && x <= rect.max.x {
                let is_major = frame % major_interval == 0;
                let tick_height = if is_major { 10.0 } else { 5.0 };
                let tick_color = if is_major {
                    Color32::from_gray(180)
                } else {
                    Color32::from_gray(100)
                };

                painter.line_segment(
                    [
                        Pos2::new(x, rect.max.y - tick_height),
                        Pos2::new(x, rect.max.y),
                    ],
                    Stroke::new(1.0, tick_color),
                );

                if is_major {
                    painter.text(
                        Pos2::new(x + 2.0, rect.min.y + 2.0),
                        egui::Align2::LEFT_TOP,
                        format!("{frame}"),
                        egui::FontId::monospace(10.0),
                        Color32::from_gray(180),
                    );
                }
            }
            frame += tick_interval;
        }
    }

    /// Paint one diamond per keyframe
    fn render_keyframes(
        &self,
        painter: &egui::Painter,
        rect: Rect,
        sequence: &BoundingBoxSequence,
        selection: &Selection,
    ) {
        let center_y = rect.center().y;

        for keyframe in &sequence.boxes {
            let x = self.frame_to_x(keyframe.frame_number);
            if x < rect.min.x || x > rect.max.x {
                continue;
            }

            let is_selected = selection.keyframes.contains(&keyframe.frame_number);
            let half_size = KEYFRAME_SIZE / 2.0;
            let diamond = vec![
                Pos2::new(x, center_y - half_size),
                Pos2::new(x + half_size, center_y),
                Pos2::new(x, center_y + half_size),
                Pos2::new(x - half_size, center_y),
            ];

            let fill_color = if is_selected {
                Color32::from_rgb(255, 200, 100)
            } else {
                Color32::from_rgb(100, 150, 255)
            };
            let stroke = if is_selected {
                Stroke::new(2.0, Color32::WHITE)
            } else {
                Stroke::new(1.0, Color32::from_gray(80))
            };

            painter.add(egui::Shape::convex_polygon(diamond, fill_color, stroke));
        }
    }

    /// Paint the motion path by sampling the interpolation engine at a
    /// fixed pixel stride
    fn render_motion_path(
        &self,
        painter: &egui::Painter,
        rect: Rect,
        sequence: &BoundingBoxSequence,
    ) {
        let Some((first, last)) = sequence.frame_span() else {
            return;
        };
        let center_y = rect.center().y;

        let mut points = Vec::new();
        let mut x = self.frame_to_x(first).max(rect.min.x + LABEL_GUTTER_WIDTH);
        let end_x = self.frame_to_x(last).min(rect.max.x);

        while x <= end_x {
            let frame = self.x_to_frame(x);
            if let Some(sampled) = interp::sample(sequence, frame.clamp(first, last)) {
                let (_, cy) = sampled.center();
                let y = center_y - (cy - self.path_offset) * self.path_scale / 100.0;
                points.push(Pos2::new(x, y.clamp(rect.min.y, rect.max.y)));
            } else if points.len() >= 2 {
                // Visibility gap: flush the polyline and start a new run.
                painter.add(egui::Shape::line(
                    std::mem::take(&mut points),
                    Stroke::new(2.0, Color32::from_rgb(100, 150, 255)),
                ));
            } else {
                points.clear();
            }
            x += MOTION_PATH_STRIDE;
        }

        if points.len() >= 2 {
            painter.add(egui::Shape::line(
                points,
                Stroke::new(2.0, Color32::from_rgb(100, 150, 255)),
            ));
        }
    }

    /// Paint the playhead line
    fn render_playhead(&self, painter: &egui::Painter, rect: Rect, current_frame: u32) {
        let x = self.frame_to_x(current_frame);
        if x >= LABEL_GUTTER_WIDTH && x <= rect.max.x {
            painter.line_segment(
                [Pos2::new(x, rect.min.y), Pos2::new(x, rect.max.y)],
                Stroke::new(PLAYHEAD_WIDTH, Color32::from_rgb(255, 100, 100)),
            );
        }
    }
}

impl Default for TimelineView {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fovea_track::{BoundingBox, TrackingSource};

    fn seq_with_frames(frames: &[u32]) -> BoundingBoxSequence {
        let mut seq = BoundingBoxSequence::new("T1", TrackingSource::Manual);
        for &f in frames {
            seq.add_keyframe(BoundingBox::keyframe(f, f as f32, 0.0, 10.0, 10.0))
                .unwrap();
        }
        seq
    }

    #[test]
    fn frame_37_round_trips_at_unit_zoom() {
        let view = TimelineView::new();
        assert_eq!(view.x_to_frame(view.frame_to_x(37)), 37);
    }

    #[test]
    fn round_trip_holds_across_zoom_and_scroll() {
        let mut view = TimelineView::new();
        for zoom in [0.25, 1.0, 2.5, 7.0, 33.0] {
            view.zoom = zoom;
            for scroll in [0.0, 10.0, 123.5] {
                view.scroll_offset = scroll;
                for frame in [0u32, 1, 37, 500, 10_000] {
                    assert_eq!(
                        view.x_to_frame(view.frame_to_x(frame)),
                        frame,
                        "zoom={zoom} scroll={scroll} frame={frame}"
                    );
                }
            }
        }
    }

    #[test]
    fn x_to_frame_clamps_below_zero() {
        let view = TimelineView::new();
        assert_eq!(view.x_to_frame(-500.0), 0);
    }

    #[test]
    fn zoom_steps_stay_clamped() {
        let mut view = TimelineView::new();
        for _ in 0..100 {
            view.zoom_out();
        }
        assert!(view.zoom >= MIN_ZOOM);
        for _ in 0..100 {
            view.zoom_in();
        }
        assert!(view.zoom <= MAX_ZOOM);

        view.set_scroll(-20.0);
        assert_eq!(view.scroll_offset, 0.0);
    }

    #[test]
    fn hit_test_finds_nearest_keyframe_within_tolerance() {
        let seq = seq_with_frames(&[0, 100, 200]);
        let mut view = TimelineView::new();
        view.zoom = 2.0;

        let x_near_100 = view.frame_to_x(100) + 3.0;
        assert_eq!(view.keyframe_at_x(&seq, x_near_100, 5.0), Some(100));

        // Between two keyframes, outside tolerance of both.
        let x_mid = view.frame_to_x(150);
        assert_eq!(view.keyframe_at_x(&seq, x_mid, 5.0), None);

        // Closer of two candidates wins.
        let seq_dense = seq_with_frames(&[100, 104]);
        let x = view.frame_to_x(101);
        assert_eq!(view.keyframe_at_x(&seq_dense, x, 20.0), Some(100));
    }

    #[test]
    fn visible_range_follows_scroll() {
        let mut view = TimelineView::new();
        view.zoom = 2.0;
        view.set_scroll(60.0);
        let rect = Rect::from_min_size(Pos2::ZERO, egui::Vec2::new(248.0, 100.0));
        let (first, last) = view.visible_frame_range(rect);
        assert_eq!(first, 60);
        assert_eq!(last, 160);
    }
}
