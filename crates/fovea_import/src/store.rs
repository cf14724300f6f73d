// SPDX-License-Identifier: MIT OR Apache-2.0
//! Storage collaborator for the import engine.
//!
//! The engine never talks to storage directly; it stages [`Mutation`]s and
//! hands them to an [`AnnotationStore`] in batches. Atomic imports stage a
//! single batch and apply it only after every record resolved cleanly, so
//! the store never observes partial writes.

use fovea_track::{Annotation, PersonaOntology, WorldObject};
use indexmap::IndexMap;
use thiserror::Error;

/// Storage backend errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend rejected or failed a batch
    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// One write against persisted state
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Insert or overwrite a persona ontology
    PutOntology(PersonaOntology),
    /// Insert or overwrite a world object
    PutWorldObject(WorldObject),
    /// Insert or overwrite an annotation
    PutAnnotation(Annotation),
    /// Delete an annotation by id
    DeleteAnnotation(String),
}

/// An ordered set of mutations applied as a unit
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MutationBatch {
    /// Mutations in application order
    pub mutations: Vec<Mutation>,
}

impl MutationBatch {
    /// Create an empty batch
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a mutation
    pub fn push(&mut self, mutation: Mutation) {
        self.mutations.push(mutation);
    }

    /// Number of staged mutations
    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    /// Whether the batch is empty
    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }
}

/// Read/write access to the persisted annotation graph.
///
/// Reads are used by conflict detection; writes go through [`Self::apply`]
/// only.
pub trait AnnotationStore {
    /// Look up a persona ontology by id
    fn persona_ontology(&self, id: &str) -> Option<&PersonaOntology>;

    /// All persona ontologies, in stable order
    fn persona_ontologies(&self) -> Vec<&PersonaOntology>;

    /// Look up a world object by id
    fn world_object(&self, id: &str) -> Option<&WorldObject>;

    /// All world objects, in stable order
    fn world_objects(&self) -> Vec<&WorldObject>;

    /// Look up an annotation by id
    fn annotation(&self, id: &str) -> Option<&Annotation>;

    /// Annotations belonging to one video, in stable order
    fn annotations_for_video(&self, video_id: &str) -> Vec<&Annotation>;

    /// Apply a batch of mutations as a unit
    fn apply(&mut self, batch: MutationBatch) -> Result<(), StoreError>;
}

/// In-memory store for tests, demos and previews.
///
/// `IndexMap` keeps iteration order insertion-stable, which the
/// idempotent-preview property relies on.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryStore {
    ontologies: IndexMap<String, PersonaOntology>,
    objects: IndexMap<String, WorldObject>,
    annotations: IndexMap<String, Annotation>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a persona ontology
    pub fn insert_ontology(&mut self, ontology: PersonaOntology) {
        self.ontologies.insert(ontology.id.clone(), ontology);
    }

    /// Seed a world object
    pub fn insert_object(&mut self, object: WorldObject) {
        self.objects.insert(object.id.clone(), object);
    }

    /// Seed an annotation
    pub fn insert_annotation(&mut self, annotation: Annotation) {
        self.annotations.insert(annotation.id.clone(), annotation);
    }

    /// Number of stored annotations
    pub fn annotation_count(&self) -> usize {
        self.annotations.len()
    }

    /// Number of stored persona ontologies
    pub fn ontology_count(&self) -> usize {
        self.ontologies.len()
    }

    /// Number of stored world objects
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }
}

impl AnnotationStore for MemoryStore {
    fn persona_ontology(&self, id: &str) -> Option<&PersonaOntology> {
        self.ontologies.get(id)
    }

    fn persona_ontologies(&self) -> Vec<&PersonaOntology> {
        self.ontologies.values().collect()
    }

    fn world_object(&self, id: &str) -> Option<&WorldObject> {
        self.objects.get(id)
    }

    fn world_objects(&self) -> Vec<&WorldObject> {
        self.objects.values().collect()
    }

    fn annotation(&self, id: &str) -> Option<&Annotation> {
        self.annotations.get(id)
    }

    fn annotations_for_video(&self, video_id: &str) -> Vec<&Annotation> {
        self.annotations
            .values()
            .filter(|a| a.video_id == video_id)
            .collect()
    }

    fn apply(&mut self, batch: MutationBatch) -> Result<(), StoreError> {
        for mutation in batch.mutations {
            match mutation {
                Mutation::PutOntology(o) => {
                    self.ontologies.insert(o.id.clone(), o);
                }
                Mutation::PutWorldObject(w) => {
                    self.objects.insert(w.id.clone(), w);
                }
                Mutation::PutAnnotation(a) => {
                    self.annotations.insert(a.id.clone(), a);
                }
                Mutation::DeleteAnnotation(id) => {
                    self.annotations.shift_remove(&id);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fovea_track::{Annotation, AnnotationKind};

    fn annotation(id: &str, video: &str) -> Annotation {
        Annotation {
            id: id.into(),
            video_id: video.into(),
            annotation_type: AnnotationKind::Object,
            persona_id: "P1".into(),
            type_category: None,
            type_id: None,
            object_id: None,
            bounding_box_sequence: None,
            time_instance: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn batch_apply_and_video_lookup() {
        let mut store = MemoryStore::new();
        let mut batch = MutationBatch::new();
        batch.push(Mutation::PutAnnotation(annotation("A1", "V1")));
        batch.push(Mutation::PutAnnotation(annotation("A2", "V2")));
        batch.push(Mutation::PutAnnotation(annotation("A3", "V1")));
        store.apply(batch).unwrap();

        assert_eq!(store.annotation_count(), 3);
        let v1: Vec<_> = store
            .annotations_for_video("V1")
            .iter()
            .map(|a| a.id.clone())
            .collect();
        assert_eq!(v1, vec!["A1", "A3"]);

        let mut batch = MutationBatch::new();
        batch.push(Mutation::DeleteAnnotation("A1".into()));
        store.apply(batch).unwrap();
        assert!(store.annotation("A1").is_none());
    }
}
