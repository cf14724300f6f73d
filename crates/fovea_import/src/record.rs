// SPDX-License-Identifier: MIT OR Apache-2.0
//! JSON Lines decoding.
//!
//! One `{type, data}` object per line. Malformed lines become warnings by
//! default and fatal errors under strict mode; blank lines are skipped.

use fovea_track::{Annotation, InstanceRecord, PersonaOntology, WorldObject};
use serde::{Deserialize, Serialize};
use std::io::BufRead;
use thiserror::Error;

/// Fatal import errors. Per-record problems are reported through
/// [`crate::engine::ImportResult`], never through this type.
#[derive(Debug, Error)]
pub enum ImportError {
    /// A line failed to decode under strict mode
    #[error("malformed line {line}: {message}")]
    MalformedLine {
        /// Source line number (1-based)
        line: usize,
        /// Decoder message
        message: String,
    },

    /// The underlying stream failed
    #[error("failed to read import stream")]
    Io(#[from] std::io::Error),
}

/// A collection of world objects
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ObjectCollection {
    /// Collection id, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Member objects
    #[serde(default)]
    pub items: Vec<WorldObject>,
}

/// A collection of generic instance records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct InstanceCollection {
    /// Collection id, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Member records
    #[serde(default)]
    pub items: Vec<InstanceRecord>,
}

/// One decoded import line
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum RecordPayload {
    /// A persona's type system
    Ontology(PersonaOntology),
    /// A world object (entity instance)
    Entity(WorldObject),
    /// An event instance
    Event(InstanceRecord),
    /// A time instance
    Time(InstanceRecord),
    /// A batch of world objects
    EntityCollection(ObjectCollection),
    /// A batch of event instances
    EventCollection(InstanceCollection),
    /// A batch of time instances
    TimeCollection(InstanceCollection),
    /// A relation between records
    Relation(InstanceRecord),
    /// An annotation, possibly with a bounding-box sequence
    Annotation(Annotation),
    /// Video metadata, passed through untouched
    Video(serde_json::Value),
    /// File-level metadata, passed through untouched
    Metadata(serde_json::Value),
}

impl RecordPayload {
    /// Wire name of the record type
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Ontology(_) => "ontology",
            Self::Entity(_) => "entity",
            Self::Event(_) => "event",
            Self::Time(_) => "time",
            Self::EntityCollection(_) => "entityCollection",
            Self::EventCollection(_) => "eventCollection",
            Self::TimeCollection(_) => "timeCollection",
            Self::Relation(_) => "relation",
            Self::Annotation(_) => "annotation",
            Self::Video(_) => "video",
            Self::Metadata(_) => "metadata",
        }
    }
}

/// A non-fatal problem tied to a source line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineIssue {
    /// Source line number (1-based)
    pub line: usize,
    /// What went wrong
    pub message: String,
}

/// A decoded record with its source line
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRecord {
    /// Source line number (1-based)
    pub line: usize,
    /// Decoded payload
    pub payload: RecordPayload,
}

/// Everything the parse phase produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedBatch {
    /// Decoded records, in file order
    pub records: Vec<ParsedRecord>,
    /// Malformed-line warnings (empty under strict mode)
    pub warnings: Vec<LineIssue>,
}

/// Decode a JSON Lines stream.
///
/// Each line decodes independently; with `strict` unset a bad line becomes
/// a warning and parsing continues.
pub fn parse_lines<R: BufRead>(reader: R, strict: bool) -> Result<ParsedBatch, ImportError> {
    let mut batch = ParsedBatch::default();

    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let text = line?;
        if text.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<RecordPayload>(&text) {
            Ok(payload) => batch.records.push(ParsedRecord {
                line: line_no,
                payload,
            }),
            Err(err) => {
                if strict {
                    return Err(ImportError::MalformedLine {
                        line: line_no,
                        message: err.to_string(),
                    });
                }
                tracing::warn!(line = line_no, %err, "skipping malformed import line");
                batch.warnings.push(LineIssue {
                    line: line_no,
                    message: format!("malformed line: {err}"),
                });
            }
        }
    }

    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const GOOD: &str = concat!(
        r#"{"type":"ontology","data":{"id":"P1","name":"Analyst"}}"#,
        "\n",
        r#"{"type":"entity","data":{"id":"O1","name":"Car 1","personaId":"P1"}}"#,
        "\n",
        "\n",
        r#"{"type":"metadata","data":{"exportedBy":"fovea"}}"#,
        "\n",
    );

    #[test]
    fn parses_records_with_line_numbers() {
        let batch = parse_lines(Cursor::new(GOOD), false).unwrap();
        assert_eq!(batch.records.len(), 3);
        assert!(batch.warnings.is_empty());
        assert_eq!(batch.records[0].line, 1);
        assert_eq!(batch.records[0].payload.kind_name(), "ontology");
        assert_eq!(batch.records[2].line, 4); // blank line skipped, numbering kept
    }

    #[test]
    fn malformed_line_is_a_warning_by_default() {
        let input = format!("{GOOD}not json at all\n");
        let batch = parse_lines(Cursor::new(input), false).unwrap();
        assert_eq!(batch.records.len(), 3);
        assert_eq!(batch.warnings.len(), 1);
        assert_eq!(batch.warnings[0].line, 5);
    }

    #[test]
    fn strict_mode_fails_on_first_malformed_line() {
        let input = format!("{GOOD}{{\"type\":\"unknown-kind\",\"data\":{{}}}}\n");
        let err = parse_lines(Cursor::new(input), true).unwrap_err();
        match err {
            ImportError::MalformedLine { line, .. } => assert_eq!(line, 5),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn annotation_lines_decode_the_full_record_shape() {
        let line = r#"{"type":"annotation","data":{
            "id":"A1","videoId":"V1","annotationType":"object",
            "personaId":"P1","objectId":"O1",
            "boundingBoxSequence":{
                "boxes":[{"x":1,"y":2,"width":3,"height":4,
                          "frameNumber":0,"isKeyframe":true}],
                "trackId":"T1"}}}"#
            .replace('\n', " ");
        let batch = parse_lines(Cursor::new(line), true).unwrap();
        let RecordPayload::Annotation(ann) = &batch.records[0].payload else {
            panic!("expected annotation");
        };
        assert_eq!(ann.object_id.as_deref(), Some("O1"));
        assert_eq!(ann.frame_span(), Some((0, 0)));
    }

    #[test]
    fn collections_decode_their_items() {
        let line = r#"{"type":"entityCollection","data":{"id":"C1","items":[
            {"id":"O1","name":"Car 1"},{"id":"O2","name":"Car 2"}]}}"#
            .replace('\n', " ");
        let batch = parse_lines(Cursor::new(line), true).unwrap();
        let RecordPayload::EntityCollection(coll) = &batch.records[0].payload else {
            panic!("expected entityCollection");
        };
        assert_eq!(coll.items.len(), 2);
    }
}
