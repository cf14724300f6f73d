// SPDX-License-Identifier: MIT OR Apache-2.0
//! Caller-supplied import configuration.

use crate::conflict::{
    DuplicateResolution, DuplicateSequenceResolution, InterpolationResolution,
    MissingDependencyResolution, OverlapResolution,
};
use serde::{Deserialize, Serialize};

/// Resolution policy, one strategy per conflict category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionPolicy {
    /// Strategy for duplicate-sequence conflicts
    #[serde(default)]
    pub duplicate_sequence: DuplicateSequenceResolution,
    /// Strategy for overlapping-frames conflicts
    #[serde(default)]
    pub overlapping_frames: OverlapResolution,
    /// Strategy for interpolation-type disagreements
    #[serde(default)]
    pub interpolation_conflict: InterpolationResolution,
    /// Strategy for missing dependencies
    #[serde(default)]
    pub missing_dependency: MissingDependencyResolution,
    /// Strategy for generic duplicate ids
    #[serde(default)]
    pub duplicates: DuplicateResolution,
}

/// Which record classes the import touches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportScope {
    /// Import persona ontologies
    pub ontologies: bool,
    /// Import world objects
    pub objects: bool,
    /// Import annotations
    pub annotations: bool,
}

impl Default for ImportScope {
    fn default() -> Self {
        Self {
            ontologies: true,
            objects: true,
            annotations: true,
        }
    }
}

/// Parse/validation behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ValidationOptions {
    /// Fail the whole import on the first malformed line instead of
    /// recording a warning
    #[serde(default)]
    pub strict_mode: bool,
}

/// Transaction behavior for the apply phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionOptions {
    /// Atomic: any unresolved failure rolls back every mutation of the
    /// operation. Non-atomic: offending records are skipped and reported,
    /// the rest commit.
    pub atomic: bool,
}

impl Default for TransactionOptions {
    fn default() -> Self {
        Self { atomic: true }
    }
}

/// Complete import configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ImportOptions {
    /// Per-conflict-category resolution strategies
    #[serde(default)]
    pub resolutions: ResolutionPolicy,
    /// Record classes to import
    #[serde(default)]
    pub scope: ImportScope,
    /// Parse/validation flags
    #[serde(default)]
    pub validation: ValidationOptions,
    /// Transaction behavior
    #[serde(default)]
    pub transaction: TransactionOptions,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_atomic_full_scope_lenient() {
        let opts = ImportOptions::default();
        assert!(opts.transaction.atomic);
        assert!(opts.scope.ontologies && opts.scope.objects && opts.scope.annotations);
        assert!(!opts.validation.strict_mode);
    }

    #[test]
    fn options_deserialize_from_partial_json() {
        let opts: ImportOptions = serde_json::from_str(
            r#"{
                "resolutions": {"duplicateSequence": "merge-keyframes"},
                "transaction": {"atomic": false}
            }"#,
        )
        .unwrap();
        assert_eq!(
            opts.resolutions.duplicate_sequence,
            DuplicateSequenceResolution::MergeKeyframes
        );
        assert_eq!(
            opts.resolutions.overlapping_frames,
            OverlapResolution::FailImport
        );
        assert!(!opts.transaction.atomic);
    }
}
