// SPDX-License-Identifier: MIT OR Apache-2.0
//! Annotations and the records they reference.
//!
//! Cross-record references (persona, ontology type, world object) are plain
//! id strings resolved through an external lookup at read time. Embedding
//! live references would create ownership cycles across the
//! persona/ontology/object/annotation graph; unresolved ids surface as
//! missing-dependency conflicts at import time instead.

use crate::sequence::BoundingBoxSequence;
use serde::{Deserialize, Serialize};

/// What an annotation points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationKind {
    /// References a type in a persona ontology
    Type,
    /// References a world object (entity instance)
    Object,
}

/// A temporal anchor for non-spatial annotations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeInstance {
    /// First frame (inclusive)
    pub start_frame: u32,
    /// Last frame, if the instance is a span rather than a point
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_frame: Option<u32>,
}

/// A user-visible annotation on a video.
///
/// A spatial annotation exclusively owns one [`BoundingBoxSequence`];
/// a non-spatial one carries a single [`TimeInstance`]. The sequence has no
/// existence outside its annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    /// Annotation id (string, preserved across import/export)
    pub id: String,
    /// Video this annotation belongs to
    pub video_id: String,
    /// Type- or object-annotation
    pub annotation_type: AnnotationKind,
    /// Persona whose ontology frames this annotation
    pub persona_id: String,
    /// Ontology category (`entity`, `event`, ...) for type-annotations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_category: Option<String>,
    /// Ontology type id for type-annotations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_id: Option<String>,
    /// World object id for object-annotations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
    /// Spatial track, if this is a spatial annotation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounding_box_sequence: Option<BoundingBoxSequence>,
    /// Temporal anchor, if this is a non-spatial annotation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_instance: Option<TimeInstance>,
    /// Creation stamp, preserved verbatim from the source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Last-update stamp, preserved verbatim from the source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl Annotation {
    /// Frame span of the owned sequence, if spatial and non-empty
    pub fn frame_span(&self) -> Option<(u32, u32)> {
        self.bounding_box_sequence.as_ref()?.frame_span()
    }

    /// Track id of the owned sequence, if spatial
    pub fn track_id(&self) -> Option<&str> {
        self.bounding_box_sequence
            .as_ref()
            .map(|s| s.track_id.as_str())
    }
}

/// A named type inside a persona ontology
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OntologyType {
    /// Type id, unique within the ontology
    pub id: String,
    /// Display name
    pub name: String,
    /// Gloss/definition text; may reference other types by id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gloss: Option<String>,
}

impl OntologyType {
    /// Create a type with no gloss
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            gloss: None,
        }
    }
}

/// One persona's type system: entities, events, roles and relations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PersonaOntology {
    /// Persona id
    pub id: String,
    /// Persona display name
    pub name: String,
    /// Entity types
    #[serde(default)]
    pub entities: Vec<OntologyType>,
    /// Event types
    #[serde(default)]
    pub events: Vec<OntologyType>,
    /// Role types
    #[serde(default)]
    pub roles: Vec<OntologyType>,
    /// Relation types
    #[serde(default)]
    pub relations: Vec<OntologyType>,
}

impl PersonaOntology {
    /// Look up a type by id across every category
    pub fn type_by_id(&self, type_id: &str) -> Option<&OntologyType> {
        self.entities
            .iter()
            .chain(&self.events)
            .chain(&self.roles)
            .chain(&self.relations)
            .find(|t| t.id == type_id)
    }
}

/// A persistent world object (entity instance) annotations can point at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldObject {
    /// Object id
    pub id: String,
    /// Display name
    pub name: String,
    /// Persona the object was created under, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona_id: Option<String>,
}

/// A generic instance record (event, time or relation line in an import
/// file): an id plus loosely-typed references
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceRecord {
    /// Record id
    pub id: String,
    /// Display name, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Owning persona, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona_id: Option<String>,
    /// Ontology type, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn annotation_round_trips_the_wire_shape() {
        let json = serde_json::json!({
            "id": "A1",
            "videoId": "V1",
            "annotationType": "type",
            "personaId": "P1",
            "typeCategory": "entity",
            "typeId": "ET1",
            "boundingBoxSequence": {
                "boxes": [
                    {"x": 0.0, "y": 0.0, "width": 10.0, "height": 10.0,
                     "frameNumber": 0, "isKeyframe": true},
                    {"x": 5.0, "y": 5.0, "width": 10.0, "height": 10.0,
                     "frameNumber": 30, "isKeyframe": true}
                ],
                "interpolationSegments": [
                    {"startFrame": 0, "endFrame": 30, "type": "linear"}
                ],
                "visibilityRanges": [],
                "trackId": "T1",
                "trackingSource": "manual",
                "totalFrames": 31,
                "keyframeCount": 2,
                "interpolatedFrameCount": 29
            },
            "createdAt": "2024-01-01T00:00:00Z"
        });

        let ann: Annotation = serde_json::from_value(json).unwrap();
        assert_eq!(ann.annotation_type, AnnotationKind::Type);
        assert_eq!(ann.frame_span(), Some((0, 30)));
        assert_eq!(ann.track_id(), Some("T1"));
        ann.bounding_box_sequence.as_ref().unwrap().validate().unwrap();

        let back = serde_json::to_value(&ann).unwrap();
        assert_eq!(back["videoId"], "V1");
        assert_eq!(back["boundingBoxSequence"]["trackId"], "T1");
    }

    #[test]
    fn ontology_type_lookup_spans_categories() {
        let mut persona = PersonaOntology {
            id: "P1".into(),
            name: "Analyst".into(),
            ..Default::default()
        };
        persona.entities.push(OntologyType::new("ET1", "Vehicle"));
        persona.events.push(OntologyType::new("EV1", "Departure"));

        assert_eq!(persona.type_by_id("EV1").unwrap().name, "Departure");
        assert!(persona.type_by_id("missing").is_none());
    }
}
