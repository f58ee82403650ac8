// Copyright 2025 Cowboy AI, LLC.

//! # Persistence Layer
//!
//! Documents are saved as one JSON snapshot: every entity of the arena with
//! its uid, symbol, payload, endpoint uids and functor tables. Loading
//! resolves the uids in a second pass, repairs what it can, and rebuilds
//! the observers that are never written to disk.
//!
//! Command history is not persisted; a loaded document starts with an
//! empty undo stack.

pub mod repository;
pub mod snapshot;

pub use repository::{DocumentRepository, InMemoryRepository, JsonFileRepository};
pub use snapshot::{DocumentSnapshot, FORMAT_VERSION};

use std::path::Path;

use crate::config::EditorConfig;
use crate::document::Document;
use crate::errors::DiagramResult;

/// Serialize `doc` to pretty-printed JSON
pub fn save_to_string(doc: &Document) -> DiagramResult<String> {
    Ok(serde_json::to_string_pretty(&doc.snapshot())?)
}

/// Rebuild a document from JSON produced by [`save_to_string`]
pub fn load_from_str(json: &str, config: &EditorConfig) -> DiagramResult<Document> {
    let snapshot: DocumentSnapshot = serde_json::from_str(json)?;
    Document::from_snapshot(snapshot, config)
}

/// Write `doc` to a JSON file
pub fn save(doc: &Document, path: impl AsRef<Path>) -> DiagramResult<()> {
    JsonFileRepository::new(path.as_ref()).save(doc)
}

/// Read a document from a JSON file
pub fn load(path: impl AsRef<Path>, config: &EditorConfig) -> DiagramResult<Document> {
    JsonFileRepository::new(path.as_ref()).load(config)
}
