// SPDX-License-Identifier: MIT OR Apache-2.0
//! Conflicts detected during import preview, and the resolution policies
//! that decide what happens to them.

use fovea_track::InterpolationType;
use serde::{Deserialize, Serialize};

/// Category of an import conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictKind {
    /// Incoming annotation's sequence id matches one already present
    DuplicateSequence,
    /// Incoming sequence's frame span intersects an existing sequence's
    /// span for the same track target
    OverlappingFrames,
    /// Incoming and existing segments cover the same frame range but
    /// disagree on interpolation type
    InterpolationConflict,
    /// A referenced persona/type/object exists neither in persisted state
    /// nor in the import batch
    MissingDependency,
    /// Incoming persona id collides with an existing persona
    DuplicatePersona,
    /// Incoming world-object id collides with an existing object
    DuplicateObject,
    /// Generic id collision
    IdConflict,
}

impl ConflictKind {
    /// Wire/display name
    pub fn name(&self) -> &'static str {
        match self {
            Self::DuplicateSequence => "duplicate-sequence",
            Self::OverlappingFrames => "overlapping-frames",
            Self::InterpolationConflict => "interpolation-conflict",
            Self::MissingDependency => "missing-dependency",
            Self::DuplicatePersona => "duplicate-persona",
            Self::DuplicateObject => "duplicate-object",
            Self::IdConflict => "id-conflict",
        }
    }
}

/// One detected inconsistency between incoming data and existing state.
///
/// Conflicts are transient: they exist between preview and apply and never
/// persist beyond the import operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    /// Conflict category
    pub kind: ConflictKind,
    /// Id of the record (or missing reference) the conflict is about
    pub original_id: String,
    /// Source line number in the import file, for diagnostics
    pub line: usize,
    /// Frame range involved, if the conflict is frame-scoped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_range: Option<(u32, u32)>,
    /// Incoming interpolation type, for interpolation conflicts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interpolation: Option<InterpolationType>,
    /// Human-readable description
    pub details: String,
}

/// How to resolve a duplicate-sequence conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicateSequenceResolution {
    /// Keep the existing annotation, drop the incoming one
    #[default]
    Skip,
    /// Overwrite the existing annotation with the incoming one
    Replace,
    /// Merge incoming keyframes into the existing sequence; existing
    /// keyframes win on frame collisions
    MergeKeyframes,
    /// Import under a freshly generated id and track id
    CreateNew,
}

/// How to resolve an overlapping-frames conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum OverlapResolution {
    /// Trim the incoming sequence to the frames outside the overlap
    SplitRanges,
    /// Fold incoming keyframes into the existing sequence
    ExtendRange,
    /// Remove existing keyframes inside the incoming span, then import
    ReplaceOverlap,
    /// Treat the conflict as a failure
    #[default]
    FailImport,
}

/// How to resolve an interpolation-type disagreement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum InterpolationResolution {
    /// The imported segment type wins
    UseImported,
    /// The existing segment type wins
    #[default]
    UseExisting,
    /// Treat the conflict as a failure
    FailImport,
}

/// How to resolve a missing dependency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum MissingDependencyResolution {
    /// Drop the dependent record with a warning
    #[default]
    SkipItem,
    /// Create a placeholder for the missing reference, then import
    CreatePlaceholder,
    /// Treat the conflict as a failure
    FailImport,
}

/// How to resolve generic duplicate ids (personas, objects, plain ids)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicateResolution {
    /// Keep the existing record, drop the incoming one
    #[default]
    Skip,
    /// Overwrite the existing record, keeping the id
    PreserveId,
    /// Import under a freshly suffixed id; references from the same batch
    /// are remapped
    Rename,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_serialize_kebab_case() {
        let json = serde_json::to_value(ConflictKind::OverlappingFrames).unwrap();
        assert_eq!(json, "overlapping-frames");
        assert_eq!(ConflictKind::MissingDependency.name(), "missing-dependency");
    }

    #[test]
    fn defaults_match_the_documented_policy() {
        assert_eq!(
            DuplicateSequenceResolution::default(),
            DuplicateSequenceResolution::Skip
        );
        assert_eq!(OverlapResolution::default(), OverlapResolution::FailImport);
        assert_eq!(
            InterpolationResolution::default(),
            InterpolationResolution::UseExisting
        );
        assert_eq!(
            MissingDependencyResolution::default(),
            MissingDependencyResolution::SkipItem
        );
        assert_eq!(DuplicateResolution::default(), DuplicateResolution::Skip);
    }
}
