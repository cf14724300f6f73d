// SPDX-License-Identifier: MIT OR Apache-2.0
//! The import reconciliation engine.
//!
//! One import operation moves through
//! `Idle → Parsing → Previewing → [AwaitingResolution] → Applying →
//! {Committed | RolledBack | Failed}`. Preview is pure and repeatable;
//! apply re-detects conflicts against live state, resolves them under the
//! caller's policy and stages mutations in dependency order (personas and
//! world objects before the annotations that reference them).

use crate::conflict::{
    Conflict, ConflictKind, DuplicateResolution, DuplicateSequenceResolution,
    InterpolationResolution, MissingDependencyResolution, OverlapResolution,
};
use crate::options::ImportOptions;
use crate::record::{ImportError, LineIssue, ParsedBatch, ParsedRecord, RecordPayload};
use crate::store::{AnnotationStore, Mutation, MutationBatch};
use fovea_track::{
    interp, Annotation, AnnotationKind, InterpolationType, OntologyType, PersonaOntology,
    WorldObject,
};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Where an import operation currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ImportPhase {
    /// No operation in flight
    #[default]
    Idle,
    /// Decoding the JSON Lines stream
    Parsing,
    /// Computing counts and conflicts, read-only
    Previewing,
    /// Conflicts found; waiting for a resolution policy
    AwaitingResolution,
    /// Resolving and staging mutations
    Applying,
    /// All mutations written
    Committed,
    /// Atomic operation aborted; no mutations written
    RolledBack,
    /// Operation failed outright (strict parse error, backend failure)
    Failed,
}

/// Cooperative cancellation flag, checked between record-level steps
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create an un-cancelled token
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.inner.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.inner.load(Ordering::Relaxed)
    }
}

/// Aggregate counts over a parsed batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportCounts {
    /// Annotation records
    pub annotations: usize,
    /// Keyframes across every bounding-box sequence
    pub keyframes: usize,
    /// Persona ontology records
    pub personas: usize,
    /// World objects (entity records plus collection items)
    pub entities: usize,
    /// Event instances (event records plus collection items)
    pub events: usize,
    /// Sequences with exactly one keyframe
    pub single_keyframe_sequences: usize,
}

/// Result of the preview phase: counts plus the full conflict list
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportPreview {
    /// Aggregate counts
    pub counts: ImportCounts,
    /// Detected conflicts, in file order
    pub conflicts: Vec<Conflict>,
}

/// Imported/skipped/failed tally for one record category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CategoryCounts {
    /// Records written to the store
    pub imported: usize,
    /// Records dropped without error (policy skip, out of scope, ...)
    pub skipped: usize,
    /// Records that failed
    pub failed: usize,
}

/// Final report of an apply phase. Always returned, never a bare error,
/// so callers can render a diagnostic summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    /// Whether every in-scope record applied cleanly
    pub success: bool,
    /// Terminal phase: committed, rolled-back or failed
    pub phase: ImportPhase,
    /// Persona ontology tally
    pub personas: CategoryCounts,
    /// World object tally
    pub objects: CategoryCounts,
    /// Annotation tally
    pub annotations: CategoryCounts,
    /// Records with no persistence target (events, times, relations,
    /// video/metadata pass-through)
    pub others: CategoryCounts,
    /// Per-record errors with source line numbers
    pub errors: Vec<LineIssue>,
    /// Non-fatal notices (malformed lines, skipped items, cancellation)
    pub warnings: Vec<LineIssue>,
}

/// Drives one import operation end to end
#[derive(Debug, Default)]
pub struct ImportEngine {
    options: ImportOptions,
    phase: ImportPhase,
    cancel: CancelToken,
}

enum Outcome {
    Imported(Vec<Mutation>),
    Skipped(Option<String>),
    Failed(String),
}

impl ImportEngine {
    /// Create an engine with the given options
    pub fn new(options: ImportOptions) -> Self {
        Self {
            options,
            phase: ImportPhase::Idle,
            cancel: CancelToken::new(),
        }
    }

    /// Current phase
    pub fn phase(&self) -> ImportPhase {
        self.phase
    }

    /// Token for best-effort cancellation between records
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Decode the import stream.
    ///
    /// Under `validation.strict_mode` the first malformed line fails the
    /// whole operation; otherwise malformed lines become warnings.
    pub fn parse<R: BufRead>(&mut self, reader: R) -> Result<ParsedBatch, ImportError> {
        self.phase = ImportPhase::Parsing;
        match crate::record::parse_lines(reader, self.options.validation.strict_mode) {
            Ok(batch) => {
                tracing::info!(
                    records = batch.records.len(),
                    warnings = batch.warnings.len(),
                    "parsed import stream"
                );
                Ok(batch)
            }
            Err(err) => {
                self.phase = ImportPhase::Failed;
                Err(err)
            }
        }
    }

    /// Compute counts and conflicts without mutating anything.
    ///
    /// Idempotent: identical input against identical state yields an
    /// identical preview, however often it runs.
    pub fn preview<S: AnnotationStore>(&mut self, batch: &ParsedBatch, store: &S) -> ImportPreview {
        self.phase = ImportPhase::Previewing;
        let counts = count_batch(batch);
        let conflicts = detect_conflicts(batch, store, &self.options);
        tracing::info!(
            annotations = counts.annotations,
            conflicts = conflicts.len(),
            "import preview complete"
        );
        if !conflicts.is_empty() {
            self.phase = ImportPhase::AwaitingResolution;
        }
        ImportPreview { counts, conflicts }
    }

    /// Resolve conflicts under the configured policy and write the batch.
    ///
    /// Conflicts are re-detected here against live state, so a preview
    /// taken earlier may be stale without corrupting anything. Atomic mode
    /// stages every mutation and commits once at the end; any unresolved
    /// failure rolls the whole operation back with the store untouched.
    pub fn apply<S: AnnotationStore>(
        &mut self,
        batch: &ParsedBatch,
        store: &mut S,
    ) -> ImportResult {
        self.phase = ImportPhase::Applying;
        let atomic = self.options.transaction.atomic;
        tracing::info!(records = batch.records.len(), atomic, "applying import");

        let conflicts = detect_conflicts(batch, store, &self.options);
        let mut by_line: HashMap<usize, Vec<Conflict>> = HashMap::new();
        for c in conflicts {
            by_line.entry(c.line).or_default().push(c);
        }

        let mut result = ImportResult {
            success: true,
            phase: ImportPhase::Applying,
            personas: CategoryCounts::default(),
            objects: CategoryCounts::default(),
            annotations: CategoryCounts::default(),
            others: CategoryCounts::default(),
            errors: Vec::new(),
            warnings: batch.warnings.clone(),
        };

        // Dependency order: personas, then world objects, then everything
        // else, annotations last.
        let mut ordered: Vec<&ParsedRecord> = batch.records.iter().collect();
        ordered.sort_by_key(|r| (class_rank(&r.payload), r.line));

        let mut ctx = ApplyContext {
            staged: MutationBatch::new(),
            persona_renames: HashMap::new(),
            object_renames: HashMap::new(),
            ontology_overlay: HashMap::new(),
            placeholders: HashSet::new(),
        };
        let mut cancelled = false;

        for record in ordered {
            if !cancelled && self.cancel.is_cancelled() {
                cancelled = true;
                result.warnings.push(LineIssue {
                    line: record.line,
                    message: "import cancelled; remaining records skipped".to_string(),
                });
                if atomic {
                    tracing::warn!("atomic import cancelled; rolling back");
                    self.phase = ImportPhase::RolledBack;
                    return rolled_back(result);
                }
            }
            let counts = category_for(&record.payload, &mut result);
            if cancelled {
                counts.skipped += 1;
                continue;
            }

            let empty = Vec::new();
            let line_conflicts = by_line.get(&record.line).unwrap_or(&empty);
            let outcome = self.resolve_record(record, line_conflicts, store, &mut ctx);

            match outcome {
                Outcome::Imported(mutations) => {
                    let counts = category_for(&record.payload, &mut result);
                    counts.imported += 1;
                    if atomic {
                        for m in mutations {
                            ctx.staged.push(m);
                        }
                    } else if let Err(err) = store.apply(MutationBatch { mutations }) {
                        counts.imported -= 1;
                        counts.failed += 1;
                        result.errors.push(LineIssue {
                            line: record.line,
                            message: err.to_string(),
                        });
                    }
                }
                Outcome::Skipped(reason) => {
                    let counts = category_for(&record.payload, &mut result);
                    counts.skipped += 1;
                    if let Some(message) = reason {
                        tracing::debug!(line = record.line, %message, "record skipped");
                        result.warnings.push(LineIssue {
                            line: record.line,
                            message,
                        });
                    }
                }
                Outcome::Failed(message) => {
                    let counts = category_for(&record.payload, &mut result);
                    counts.failed += 1;
                    result.errors.push(LineIssue {
                        line: record.line,
                        message,
                    });
                    if atomic {
                        tracing::warn!(line = record.line, "atomic import failed; rolling back");
                        self.phase = ImportPhase::RolledBack;
                        return rolled_back(result);
                    }
                }
            }
        }

        if atomic {
            match store.apply(std::mem::take(&mut ctx.staged)) {
                Ok(()) => {
                    self.phase = ImportPhase::Committed;
                }
                Err(err) => {
                    self.phase = ImportPhase::RolledBack;
                    result.errors.push(LineIssue {
                        line: 0,
                        message: err.to_string(),
                    });
                    return rolled_back(result);
                }
            }
        } else {
            self.phase = ImportPhase::Committed;
        }

        result.success = result.errors.is_empty();
        result.phase = self.phase;
        tracing::info!(
            imported = result.annotations.imported,
            skipped = result.annotations.skipped,
            failed = result.annotations.failed,
            "import committed"
        );
        result
    }

    fn resolve_record<S: AnnotationStore>(
        &self,
        record: &ParsedRecord,
        conflicts: &[Conflict],
        store: &S,
        ctx: &mut ApplyContext,
    ) -> Outcome {
        match &record.payload {
            RecordPayload::Ontology(o) => {
                if !self.options.scope.ontologies {
                    return Outcome::Skipped(None);
                }
                self.resolve_ontology(o.clone(), conflicts, ctx)
            }
            RecordPayload::Entity(w) => {
                if !self.options.scope.objects {
                    return Outcome::Skipped(None);
                }
                self.resolve_object(w.clone(), conflicts, ctx)
            }
            RecordPayload::EntityCollection(coll) => {
                if !self.options.scope.objects {
                    return Outcome::Skipped(None);
                }
                // A collection imports as the sum of its items; an item
                // hitting a skip policy drops silently, like a lone entity.
                let mut mutations = Vec::new();
                for item in &coll.items {
                    match self.resolve_object(item.clone(), conflicts, ctx) {
                        Outcome::Imported(ms) => mutations.extend(ms),
                        Outcome::Skipped(_) => {}
                        failed @ Outcome::Failed(_) => return failed,
                    }
                }
                if mutations.is_empty() {
                    Outcome::Skipped(None)
                } else {
                    Outcome::Imported(mutations)
                }
            }
            RecordPayload::Annotation(a) => {
                if !self.options.scope.annotations {
                    return Outcome::Skipped(None);
                }
                self.resolve_annotation(a.clone(), record.line, conflicts, store, ctx)
            }
            // No persistence target in this store; counted, not written.
            RecordPayload::Event(_)
            | RecordPayload::Time(_)
            | RecordPayload::Relation(_)
            | RecordPayload::EventCollection(_)
            | RecordPayload::TimeCollection(_)
            | RecordPayload::Video(_)
            | RecordPayload::Metadata(_) => Outcome::Skipped(None),
        }
    }

    fn resolve_ontology(
        &self,
        mut ontology: PersonaOntology,
        conflicts: &[Conflict],
        ctx: &mut ApplyContext,
    ) -> Outcome {
        let duplicate = conflicts.iter().any(|c| {
            c.kind == ConflictKind::DuplicatePersona && c.original_id == ontology.id
        });
        if duplicate {
            match self.options.resolutions.duplicates {
                DuplicateResolution::Skip => return Outcome::Skipped(None),
                DuplicateResolution::PreserveId => {}
                DuplicateResolution::Rename => {
                    let renamed = suffixed_id(&ontology.id);
                    ctx.persona_renames
                        .insert(ontology.id.clone(), renamed.clone());
                    ontology.id = renamed;
                }
            }
        }
        ctx.ontology_overlay
            .insert(ontology.id.clone(), ontology.clone());
        Outcome::Imported(vec![Mutation::PutOntology(ontology)])
    }

    fn resolve_object(
        &self,
        mut object: WorldObject,
        conflicts: &[Conflict],
        ctx: &mut ApplyContext,
    ) -> Outcome {
        if let Some(persona) = &object.persona_id {
            if let Some(renamed) = ctx.persona_renames.get(persona) {
                object.persona_id = Some(renamed.clone());
            }
        }
        let duplicate = conflicts
            .iter()
            .any(|c| c.kind == ConflictKind::DuplicateObject && c.original_id == object.id);
        if duplicate {
            match self.options.resolutions.duplicates {
                DuplicateResolution::Skip => return Outcome::Skipped(None),
                DuplicateResolution::PreserveId => {}
                DuplicateResolution::Rename => {
                    let renamed = suffixed_id(&object.id);
                    ctx.object_renames.insert(object.id.clone(), renamed.clone());
                    object.id = renamed;
                }
            }
        }
        Outcome::Imported(vec![Mutation::PutWorldObject(object)])
    }

    fn resolve_annotation<S: AnnotationStore>(
        &self,
        mut annotation: Annotation,
        line: usize,
        conflicts: &[Conflict],
        store: &S,
        ctx: &mut ApplyContext,
    ) -> Outcome {
        if let Some(renamed) = ctx.persona_renames.get(&annotation.persona_id) {
            annotation.persona_id = renamed.clone();
        }
        if let Some(object) = &annotation.object_id {
            if let Some(renamed) = ctx.object_renames.get(object) {
                annotation.object_id = Some(renamed.clone());
            }
        }

        let mut mutations = Vec::new();
        let policy = &self.options.resolutions;

        // Missing dependencies first: nothing else matters if the record
        // cannot resolve its references.
        let missing: Vec<&Conflict> = conflicts
            .iter()
            .filter(|c| c.kind == ConflictKind::MissingDependency)
            .collect();
        if !missing.is_empty() {
            match policy.missing_dependency {
                MissingDependencyResolution::SkipItem => {
                    let ids: Vec<&str> =
                        missing.iter().map(|c| c.original_id.as_str()).collect();
                    return Outcome::Skipped(Some(format!(
                        "skipped annotation {}: unresolved reference(s) {}",
                        annotation.id,
                        ids.join(", ")
                    )));
                }
                MissingDependencyResolution::FailImport => {
                    return Outcome::Failed(format!(
                        "annotation {} has unresolved references",
                        annotation.id
                    ));
                }
                MissingDependencyResolution::CreatePlaceholder => {
                    for conflict in &missing {
                        self.stage_placeholder(&annotation, conflict, store, ctx, &mut mutations);
                    }
                }
            }
        }

        let id_conflict = conflicts.iter().any(|c| {
            c.kind == ConflictKind::IdConflict && c.original_id == annotation.id
        });
        if id_conflict {
            match policy.duplicates {
                DuplicateResolution::Skip => return Outcome::Skipped(None),
                DuplicateResolution::PreserveId => {}
                DuplicateResolution::Rename => annotation.id = suffixed_id(&annotation.id),
            }
        }

        if conflicts
            .iter()
            .any(|c| c.kind == ConflictKind::DuplicateSequence)
        {
            match policy.duplicate_sequence {
                DuplicateSequenceResolution::Skip => return Outcome::Skipped(None),
                DuplicateSequenceResolution::Replace => {}
                DuplicateSequenceResolution::MergeKeyframes => {
                    if let Some(existing) = store.annotation(&annotation.id) {
                        let mut merged = existing.clone();
                        if let (Some(target), Some(incoming)) = (
                            merged.bounding_box_sequence.as_mut(),
                            annotation.bounding_box_sequence.as_ref(),
                        ) {
                            target.merge_keyframes(&incoming.boxes);
                        }
                        annotation = merged;
                    }
                }
                DuplicateSequenceResolution::CreateNew => {
                    annotation.id = Uuid::new_v4().to_string();
                    if let Some(seq) = annotation.bounding_box_sequence.as_mut() {
                        seq.track_id = Uuid::new_v4().to_string();
                    }
                }
            }
        }

        let overlaps: Vec<&Conflict> = conflicts
            .iter()
            .filter(|c| c.kind == ConflictKind::OverlappingFrames)
            .collect();
        if !overlaps.is_empty() {
            match policy.overlapping_frames {
                OverlapResolution::FailImport => {
                    return Outcome::Failed(format!(
                        "annotation {} overlaps an existing sequence for track {}",
                        annotation.id,
                        annotation.track_id().unwrap_or("?")
                    ));
                }
                OverlapResolution::SplitRanges => {
                    if let Some(seq) = annotation.bounding_box_sequence.as_mut() {
                        for conflict in &overlaps {
                            if let Some((start, end)) = conflict.frame_range {
                                seq.remove_keyframes_in(start, end);
                            }
                        }
                        if seq.boxes.is_empty() {
                            return Outcome::Skipped(Some(format!(
                                "annotation {} empty after range split",
                                annotation.id
                            )));
                        }
                    }
                }
                OverlapResolution::ExtendRange => {
                    // The counterpart may be persisted state or an earlier
                    // record of this batch still sitting in the staging
                    // area.
                    if let Some(target) = overlap_target(store, &annotation) {
                        let mut extended = target.clone();
                        if let (Some(seq), Some(incoming)) = (
                            extended.bounding_box_sequence.as_mut(),
                            annotation.bounding_box_sequence.as_ref(),
                        ) {
                            seq.merge_keyframes(&incoming.boxes);
                        }
                        mutations.push(Mutation::PutAnnotation(extended));
                        return Outcome::Imported(mutations);
                    } else if let Some(staged) = ctx.staged_overlap_target_mut(&annotation) {
                        if let (Some(seq), Some(incoming)) = (
                            staged.bounding_box_sequence.as_mut(),
                            annotation.bounding_box_sequence.as_ref(),
                        ) {
                            seq.merge_keyframes(&incoming.boxes);
                        }
                        return Outcome::Imported(mutations);
                    }
                }
                OverlapResolution::ReplaceOverlap => {
                    if let Some(span) = annotation.frame_span() {
                        if let Some(target) = overlap_target(store, &annotation) {
                            let mut trimmed = target.clone();
                            if let Some(seq) = trimmed.bounding_box_sequence.as_mut() {
                                seq.remove_keyframes_in(span.0, span.1);
                            }
                            mutations.push(Mutation::PutAnnotation(trimmed));
                        } else if let Some(staged) = ctx.staged_overlap_target_mut(&annotation)
                        {
                            if let Some(seq) = staged.bounding_box_sequence.as_mut() {
                                seq.remove_keyframes_in(span.0, span.1);
                            }
                        }
                    }
                }
            }
        }

        let interpolation: Vec<&Conflict> = conflicts
            .iter()
            .filter(|c| c.kind == ConflictKind::InterpolationConflict)
            .collect();
        if !interpolation.is_empty() {
            match policy.interpolation_conflict {
                InterpolationResolution::FailImport => {
                    return Outcome::Failed(format!(
                        "annotation {} disagrees with existing interpolation types",
                        annotation.id
                    ));
                }
                InterpolationResolution::UseExisting => {
                    for conflict in &interpolation {
                        let Some(range) = conflict.frame_range else {
                            continue;
                        };
                        if let Some((ty, cps)) = existing_segment_type(store, &annotation, range) {
                            if let Some(seq) = annotation.bounding_box_sequence.as_mut() {
                                let _ = seq.set_segment_type(range.0, ty, cps);
                            }
                        }
                    }
                }
                InterpolationResolution::UseImported => {
                    for conflict in &interpolation {
                        let (Some(range), Some(ty)) =
                            (conflict.frame_range, conflict.interpolation)
                        else {
                            continue;
                        };
                        if let Some(owner) = segment_owner(store, &annotation, range) {
                            let mut updated = owner.clone();
                            if let Some(seq) = updated.bounding_box_sequence.as_mut() {
                                let _ = seq.set_segment_type(range.0, ty, None);
                            }
                            mutations.push(Mutation::PutAnnotation(updated));
                        }
                    }
                }
            }
        }

        // Wire sequences are untrusted: segments and cached counts are
        // optional on the wire and may be absent or stale.
        if let Some(seq) = annotation.bounding_box_sequence.as_mut() {
            seq.normalize();
        }

        tracing::debug!(line, id = %annotation.id, "annotation staged");
        mutations.push(Mutation::PutAnnotation(annotation));
        Outcome::Imported(mutations)
    }

    /// Stage a placeholder for one missing reference so dependent records
    /// can apply. Placeholders for the same id are staged once.
    fn stage_placeholder<S: AnnotationStore>(
        &self,
        annotation: &Annotation,
        conflict: &Conflict,
        store: &S,
        ctx: &mut ApplyContext,
        mutations: &mut Vec<Mutation>,
    ) {
        let missing_id = conflict.original_id.clone();
        if !ctx.placeholders.insert(missing_id.clone()) {
            return;
        }

        if missing_id == annotation.persona_id {
            let placeholder = PersonaOntology {
                id: missing_id.clone(),
                name: format!("Placeholder persona {missing_id}"),
                ..PersonaOntology::default()
            };
            ctx.ontology_overlay
                .insert(missing_id.clone(), placeholder.clone());
            mutations.push(Mutation::PutOntology(placeholder));
        } else if annotation.type_id.as_deref() == Some(missing_id.as_str()) {
            // Missing ontology type: append a placeholder type to the
            // owning persona (staged copy preferred over persisted).
            let mut owner = ctx
                .ontology_overlay
                .get(&annotation.persona_id)
                .cloned()
                .or_else(|| store.persona_ontology(&annotation.persona_id).cloned())
                .unwrap_or_else(|| PersonaOntology {
                    id: annotation.persona_id.clone(),
                    name: format!("Placeholder persona {}", annotation.persona_id),
                    ..PersonaOntology::default()
                });
            let placeholder =
                OntologyType::new(missing_id.clone(), format!("Placeholder {missing_id}"));
            match annotation.type_category.as_deref() {
                Some("event") => owner.events.push(placeholder),
                Some("role") => owner.roles.push(placeholder),
                Some("relation") => owner.relations.push(placeholder),
                _ => owner.entities.push(placeholder),
            }
            ctx.ontology_overlay.insert(owner.id.clone(), owner.clone());
            mutations.push(Mutation::PutOntology(owner));
        } else if annotation.object_id.as_deref() == Some(missing_id.as_str()) {
            mutations.push(Mutation::PutWorldObject(WorldObject {
                id: missing_id.clone(),
                name: format!("Placeholder object {missing_id}"),
                persona_id: Some(annotation.persona_id.clone()),
            }));
        }
    }
}

struct ApplyContext {
    staged: MutationBatch,
    persona_renames: HashMap<String, String>,
    object_renames: HashMap<String, String>,
    ontology_overlay: HashMap<String, PersonaOntology>,
    placeholders: HashSet<String>,
}

impl ApplyContext {
    /// Staged annotation from an earlier record of the same batch whose
    /// sequence overlaps `annotation` on the same video and track
    fn staged_overlap_target_mut(&mut self, annotation: &Annotation) -> Option<&mut Annotation> {
        let span = annotation.frame_span()?;
        let track = annotation.track_id()?.to_string();
        self.staged.mutations.iter_mut().find_map(|m| match m {
            Mutation::PutAnnotation(a)
                if a.id != annotation.id
                    && a.video_id == annotation.video_id
                    && a.track_id() == Some(track.as_str())
                    && a.frame_span()
                        .is_some_and(|espan| interp::spans_overlap(span, espan)) =>
            {
                Some(a)
            }
            _ => None,
        })
    }
}

fn rolled_back(mut result: ImportResult) -> ImportResult {
    // Nothing was written; imported/skipped tallies would be misleading.
    let failed_personas = result.personas.failed;
    let failed_objects = result.objects.failed;
    let failed_annotations = result.annotations.failed;
    let failed_others = result.others.failed;
    result.personas = CategoryCounts {
        failed: failed_personas,
        ..CategoryCounts::default()
    };
    result.objects = CategoryCounts {
        failed: failed_objects,
        ..CategoryCounts::default()
    };
    result.annotations = CategoryCounts {
        failed: failed_annotations,
        ..CategoryCounts::default()
    };
    result.others = CategoryCounts {
        failed: failed_others,
        ..CategoryCounts::default()
    };
    result.success = false;
    result.phase = ImportPhase::RolledBack;
    result
}

fn suffixed_id(id: &str) -> String {
    let suffix = Uuid::new_v4().to_string();
    format!("{id}-{}", &suffix[..8])
}

fn class_rank(payload: &RecordPayload) -> u8 {
    match payload {
        RecordPayload::Ontology(_) => 0,
        RecordPayload::Entity(_) | RecordPayload::EntityCollection(_) => 1,
        RecordPayload::Annotation(_) => 3,
        _ => 2,
    }
}

fn category_for<'r>(payload: &RecordPayload, result: &'r mut ImportResult) -> &'r mut CategoryCounts {
    match payload {
        RecordPayload::Ontology(_) => &mut result.personas,
        RecordPayload::Entity(_) | RecordPayload::EntityCollection(_) => &mut result.objects,
        RecordPayload::Annotation(_) => &mut result.annotations,
        _ => &mut result.others,
    }
}

/// Count a parsed batch. Pure; shared by preview and reporting.
pub fn count_batch(batch: &ParsedBatch) -> ImportCounts {
    let mut counts = ImportCounts::default();
    for record in &batch.records {
        match &record.payload {
            RecordPayload::Annotation(a) => {
                counts.annotations += 1;
                if let Some(seq) = &a.bounding_box_sequence {
                    counts.keyframes += seq.boxes.iter().filter(|b| b.is_keyframe).count();
                    if seq.boxes.len() == 1 {
                        counts.single_keyframe_sequences += 1;
                    }
                }
            }
            RecordPayload::Ontology(_) => counts.personas += 1,
            RecordPayload::Entity(_) => counts.entities += 1,
            RecordPayload::EntityCollection(c) => counts.entities += c.items.len(),
            RecordPayload::Event(_) => counts.events += 1,
            RecordPayload::EventCollection(c) => counts.events += c.items.len(),
            _ => {}
        }
    }
    counts
}

/// Detect every conflict between a batch and the store's current state.
///
/// Pure and deterministic: conflicts come out in file order. Referential
/// integrity is checked against the union of persisted state and the batch
/// itself.
pub fn detect_conflicts<S: AnnotationStore>(
    batch: &ParsedBatch,
    store: &S,
    options: &ImportOptions,
) -> Vec<Conflict> {
    let scope = options.scope;
    let mut conflicts = Vec::new();

    // Ids declared anywhere in the batch, for referential checks.
    let mut batch_personas: HashSet<&str> = HashSet::new();
    let mut batch_type_ids: HashSet<&str> = HashSet::new();
    let mut batch_objects: HashSet<&str> = HashSet::new();
    for record in &batch.records {
        match &record.payload {
            RecordPayload::Ontology(o) if scope.ontologies => {
                batch_personas.insert(&o.id);
                for t in o
                    .entities
                    .iter()
                    .chain(&o.events)
                    .chain(&o.roles)
                    .chain(&o.relations)
                {
                    batch_type_ids.insert(&t.id);
                }
            }
            RecordPayload::Entity(w) if scope.objects => {
                batch_objects.insert(&w.id);
            }
            RecordPayload::EntityCollection(c) if scope.objects => {
                for item in &c.items {
                    batch_objects.insert(&item.id);
                }
            }
            _ => {}
        }
    }

    let mut seen_personas: HashSet<&str> = HashSet::new();
    let mut seen_objects: HashSet<String> = HashSet::new();
    let mut seen_generic: HashSet<&str> = HashSet::new();
    let mut seen_annotations: HashSet<String> = HashSet::new();
    let mut earlier_spatial: Vec<&Annotation> = Vec::new();

    for record in &batch.records {
        let line = record.line;
        match &record.payload {
            RecordPayload::Ontology(o) if scope.ontologies => {
                let in_batch = !seen_personas.insert(&o.id);
                if in_batch || store.persona_ontology(&o.id).is_some() {
                    conflicts.push(Conflict {
                        kind: ConflictKind::DuplicatePersona,
                        original_id: o.id.clone(),
                        line,
                        frame_range: None,
                        interpolation: None,
                        details: format!("persona {} already exists", o.id),
                    });
                }
            }
            RecordPayload::Entity(w) if scope.objects => {
                push_object_conflict(&mut conflicts, &mut seen_objects, store, w, line);
            }
            RecordPayload::EntityCollection(coll) if scope.objects => {
                for item in &coll.items {
                    push_object_conflict(&mut conflicts, &mut seen_objects, store, item, line);
                }
            }
            RecordPayload::Event(r) | RecordPayload::Time(r) | RecordPayload::Relation(r) => {
                if !seen_generic.insert(&r.id) {
                    conflicts.push(Conflict {
                        kind: ConflictKind::IdConflict,
                        original_id: r.id.clone(),
                        line,
                        frame_range: None,
                        interpolation: None,
                        details: format!("id {} duplicated within import file", r.id),
                    });
                }
            }
            RecordPayload::Annotation(a) if scope.annotations => {
                detect_annotation_conflicts(
                    &mut conflicts,
                    a,
                    line,
                    store,
                    &batch_personas,
                    &batch_type_ids,
                    &batch_objects,
                    &mut seen_annotations,
                    &earlier_spatial,
                );
                if a.frame_span().is_some() {
                    earlier_spatial.push(a);
                }
            }
            _ => {}
        }
    }

    conflicts
}

fn push_object_conflict<S: AnnotationStore>(
    conflicts: &mut Vec<Conflict>,
    seen: &mut HashSet<String>,
    store: &S,
    object: &WorldObject,
    line: usize,
) {
    let in_batch = !seen.insert(object.id.clone());
    if in_batch || store.world_object(&object.id).is_some() {
        conflicts.push(Conflict {
            kind: ConflictKind::DuplicateObject,
            original_id: object.id.clone(),
            line,
            frame_range: None,
            interpolation: None,
            details: format!("world object {} already exists", object.id),
        });
    }
}

#[allow(clippy::too_many_arguments)]
fn detect_annotation_conflicts<S: AnnotationStore>(
    conflicts: &mut Vec<Conflict>,
    a: &Annotation,
    line: usize,
    store: &S,
    batch_personas: &HashSet<&str>,
    batch_type_ids: &HashSet<&str>,
    batch_objects: &HashSet<&str>,
    seen_annotations: &mut HashSet<String>,
    earlier_spatial: &[&Annotation],
) {
    if !seen_annotations.insert(a.id.clone()) {
        conflicts.push(Conflict {
            kind: ConflictKind::IdConflict,
            original_id: a.id.clone(),
            line,
            frame_range: None,
            interpolation: None,
            details: format!("annotation id {} duplicated within import file", a.id),
        });
    } else if let Some(existing) = store.annotation(&a.id) {
        if a.bounding_box_sequence.is_some() {
            conflicts.push(Conflict {
                kind: ConflictKind::DuplicateSequence,
                original_id: a.id.clone(),
                line,
                frame_range: a.frame_span(),
                interpolation: None,
                details: format!(
                    "sequence id {} matches existing annotation for video {}",
                    a.id, existing.video_id
                ),
            });
        } else {
            conflicts.push(Conflict {
                kind: ConflictKind::IdConflict,
                original_id: a.id.clone(),
                line,
                frame_range: None,
                interpolation: None,
                details: format!("annotation id {} already exists", a.id),
            });
        }
    }

    if let (Some(span), Some(track)) = (a.frame_span(), a.track_id()) {
        let store_candidates = store.annotations_for_video(&a.video_id);
        let same_track = store_candidates
            .iter()
            .copied()
            .filter(|e| e.id != a.id && e.track_id() == Some(track));
        let batch_same_track = earlier_spatial
            .iter()
            .copied()
            .filter(|e| e.id != a.id && e.video_id == a.video_id && e.track_id() == Some(track));

        for existing in same_track.chain(batch_same_track) {
            let Some(espan) = existing.frame_span() else {
                continue;
            };
            if let Some(overlap) = interp::overlap_range(span, espan) {
                conflicts.push(Conflict {
                    kind: ConflictKind::OverlappingFrames,
                    original_id: a.id.clone(),
                    line,
                    frame_range: Some(overlap),
                    interpolation: None,
                    details: format!(
                        "frames [{}, {}] overlap annotation {} on track {}",
                        overlap.0, overlap.1, existing.id, track
                    ),
                });
            }
        }
    }

    // Interpolation disagreement against the same sequence id or the same
    // track: identical frame range, different curve type.
    if let Some(seq) = &a.bounding_box_sequence {
        let mut candidates: Vec<&Annotation> = Vec::new();
        if let Some(existing) = store.annotation(&a.id) {
            candidates.push(existing);
        }
        if let Some(track) = a.track_id() {
            candidates.extend(
                store
                    .annotations_for_video(&a.video_id)
                    .into_iter()
                    .filter(|e| e.id != a.id && e.track_id() == Some(track)),
            );
        }
        for candidate in candidates {
            let Some(existing_seq) = &candidate.bounding_box_sequence else {
                continue;
            };
            for seg in &seq.interpolation_segments {
                let clash = existing_seq.interpolation_segments.iter().find(|e| {
                    e.start_frame == seg.start_frame
                        && e.end_frame == seg.end_frame
                        && e.ty != seg.ty
                });
                if let Some(existing_seg) = clash {
                    conflicts.push(Conflict {
                        kind: ConflictKind::InterpolationConflict,
                        original_id: a.id.clone(),
                        line,
                        frame_range: Some((seg.start_frame, seg.end_frame)),
                        interpolation: Some(seg.ty),
                        details: format!(
                            "segment [{}, {}]: imported {} vs existing {}",
                            seg.start_frame,
                            seg.end_frame,
                            seg.ty.name(),
                            existing_seg.ty.name()
                        ),
                    });
                }
            }
        }
    }

    // Referential integrity against store state plus the batch itself.
    let persona_known = store.persona_ontology(&a.persona_id).is_some()
        || batch_personas.contains(a.persona_id.as_str());
    if !persona_known {
        conflicts.push(Conflict {
            kind: ConflictKind::MissingDependency,
            original_id: a.persona_id.clone(),
            line,
            frame_range: None,
            interpolation: None,
            details: format!("annotation {} references unknown persona {}", a.id, a.persona_id),
        });
    }
    if a.annotation_type == AnnotationKind::Type {
        if let Some(type_id) = &a.type_id {
            let known = batch_type_ids.contains(type_id.as_str())
                || store
                    .persona_ontologies()
                    .iter()
                    .any(|o| o.type_by_id(type_id).is_some());
            if !known {
                conflicts.push(Conflict {
                    kind: ConflictKind::MissingDependency,
                    original_id: type_id.clone(),
                    line,
                    frame_range: None,
                    interpolation: None,
                    details: format!("annotation {} references unknown type {type_id}", a.id),
                });
            }
        }
    }
    if a.annotation_type == AnnotationKind::Object {
        if let Some(object_id) = &a.object_id {
            let known = store.world_object(object_id).is_some()
                || batch_objects.contains(object_id.as_str());
            if !known {
                conflicts.push(Conflict {
                    kind: ConflictKind::MissingDependency,
                    original_id: object_id.clone(),
                    line,
                    frame_range: None,
                    interpolation: None,
                    details: format!("annotation {} references unknown object {object_id}", a.id),
                });
            }
        }
    }
}

fn overlap_target<'s, S: AnnotationStore>(
    store: &'s S,
    annotation: &Annotation,
) -> Option<&'s Annotation> {
    let span = annotation.frame_span()?;
    let track = annotation.track_id()?;
    store
        .annotations_for_video(&annotation.video_id)
        .into_iter()
        .find(|e| {
            e.id != annotation.id
                && e.track_id() == Some(track)
                && e.frame_span()
                    .is_some_and(|espan| interp::spans_overlap(span, espan))
        })
}

fn existing_segment_type<S: AnnotationStore>(
    store: &S,
    annotation: &Annotation,
    range: (u32, u32),
) -> Option<(InterpolationType, Option<[[f32; 2]; 2]>)> {
    segment_owner(store, annotation, range).and_then(|owner| {
        let seq = owner.bounding_box_sequence.as_ref()?;
        seq.interpolation_segments
            .iter()
            .find(|s| s.start_frame == range.0 && s.end_frame == range.1)
            .map(|s| (s.ty, s.control_points))
    })
}

fn segment_owner<'s, S: AnnotationStore>(
    store: &'s S,
    annotation: &Annotation,
    range: (u32, u32),
) -> Option<&'s Annotation> {
    let mut candidates: Vec<&Annotation> = Vec::new();
    if let Some(existing) = store.annotation(&annotation.id) {
        candidates.push(existing);
    }
    if let Some(track) = annotation.track_id() {
        candidates.extend(
            store
                .annotations_for_video(&annotation.video_id)
                .into_iter()
                .filter(|e| e.id != annotation.id && e.track_id() == Some(track)),
        );
    }
    candidates.into_iter().find(|c| {
        c.bounding_box_sequence.as_ref().is_some_and(|seq| {
            seq.interpolation_segments
                .iter()
                .any(|s| s.start_frame == range.0 && s.end_frame == range.1)
        })
    })
}
