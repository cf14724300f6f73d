// SPDX-License-Identifier: MIT OR Apache-2.0
//! Parse, preview and apply a small in-memory export, printing the report.
//!
//! Run with `cargo run -p fovea_import --example import_report`.

use fovea_import::{ImportEngine, ImportOptions, MemoryStore};
use std::io::Cursor;

const EXPORT: &str = concat!(
    r#"{"type":"ontology","data":{"id":"P1","name":"Traffic analyst","entities":[{"id":"ET1","name":"Vehicle"}]}}"#,
    "\n",
    r#"{"type":"entity","data":{"id":"O1","name":"Car 1","personaId":"P1"}}"#,
    "\n",
    r#"{"type":"annotation","data":{"id":"A1","videoId":"V1","annotationType":"object","personaId":"P1","objectId":"O1","boundingBoxSequence":{"trackId":"T1","boxes":[{"x":10,"y":20,"width":40,"height":30,"frameNumber":0,"isKeyframe":true},{"x":90,"y":25,"width":40,"height":30,"frameNumber":120,"isKeyframe":true}],"interpolationSegments":[{"startFrame":0,"endFrame":120,"type":"ease-in-out"}]}}}"#,
    "\n",
);

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let mut store = MemoryStore::new();
    let mut engine = ImportEngine::new(ImportOptions::default());

    let batch = engine.parse(Cursor::new(EXPORT))?;
    let preview = engine.preview(&batch, &store);
    println!("preview: {}", serde_json::to_string_pretty(&preview)?);

    let result = engine.apply(&batch, &mut store);
    println!("result: {}", serde_json::to_string_pretty(&result)?);
    println!(
        "store now holds {} ontology(ies), {} object(s), {} annotation(s)",
        store.ontology_count(),
        store.object_count(),
        store.annotation_count()
    );
    Ok(())
}
