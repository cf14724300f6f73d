// SPDX-License-Identifier: MIT OR Apache-2.0
//! Timeline strip for FOVEA.
//!
//! This crate paints a bounding-box sequence onto an egui drawing surface:
//! - Frame ruler with zoom-adaptive tick spacing
//! - One diamond marker per keyframe
//! - Motion path sampled from the interpolation engine
//! - Playhead at the current frame
//!
//! The renderer is stateless with respect to domain data: all annotation
//! state lives in the sequence, and per-session view state (zoom, scroll,
//! selection) travels in an explicit [`TimelineView`]/[`Selection`] pair
//! supplied by the caller.

pub mod ui;

pub use ui::{DragOperation, Selection, TimelineView};
