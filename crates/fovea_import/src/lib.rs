// SPDX-License-Identifier: MIT OR Apache-2.0
//! Import reconciliation for annotation data.
//!
//! Takes a JSON Lines export, previews what it would change, detects
//! conflicts against existing state and applies the batch under a
//! per-conflict-category resolution policy, atomically by default.
//!
//! The usual flow:
//!
//! ```no_run
//! use fovea_import::{AnnotationStore, ImportEngine, ImportOptions, MemoryStore};
//! use std::io::BufReader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let file = std::fs::File::open("export.jsonl")?;
//! let mut store = MemoryStore::new();
//! let mut engine = ImportEngine::new(ImportOptions::default());
//!
//! let batch = engine.parse(BufReader::new(file))?;
//! let preview = engine.preview(&batch, &store);
//! println!("{} conflict(s)", preview.conflicts.len());
//!
//! let result = engine.apply(&batch, &mut store);
//! println!("imported {} annotation(s)", result.annotations.imported);
//! # Ok(())
//! # }
//! ```

pub mod conflict;
pub mod engine;
pub mod options;
pub mod record;
pub mod store;

pub use conflict::{
    Conflict, ConflictKind, DuplicateResolution, DuplicateSequenceResolution,
    InterpolationResolution, MissingDependencyResolution, OverlapResolution,
};
pub use engine::{
    count_batch, detect_conflicts, CancelToken, CategoryCounts, ImportCounts, ImportEngine,
    ImportPhase, ImportPreview, ImportResult,
};
pub use options::{
    ImportOptions, ImportScope, ResolutionPolicy, TransactionOptions, ValidationOptions,
};
pub use record::{
    parse_lines, ImportError, InstanceCollection, LineIssue, ObjectCollection, ParsedBatch,
    ParsedRecord, RecordPayload,
};
pub use store::{AnnotationStore, MemoryStore, Mutation, MutationBatch, StoreError};
