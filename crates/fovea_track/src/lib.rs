// SPDX-License-Identifier: MIT OR Apache-2.0
//! Bounding-box track model for FOVEA.
//!
//! This crate provides the spatial annotation core:
//! - Keyframed bounding-box sequences with interpolation segments
//! - Per-frame sampling with easing curves and visibility gating
//! - Annotation, persona ontology and world object records
//!
//! ## Architecture
//!
//! The model is built on:
//! - Keyframe-only storage (non-keyframe boxes are always derived)
//! - Segments that exactly partition the keyframe span
//! - Derived counts recomputed by every mutator
//! - Id-string references resolved externally, never embedded

pub mod annotation;
pub mod bbox;
pub mod interp;
pub mod segment;
pub mod sequence;
pub mod visibility;

pub use annotation::{
    Annotation, AnnotationKind, InstanceRecord, OntologyType, PersonaOntology, TimeInstance,
    WorldObject,
};
pub use bbox::{BoundingBox, TrackingSource};
pub use interp::{overlap_range, sample, spans_overlap};
pub use segment::{Easing, InterpolationSegment, InterpolationType};
pub use sequence::{BoundingBoxSequence, SequenceError};
pub use visibility::{visible_at, VisibilityRange};
