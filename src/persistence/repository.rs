// Copyright 2025 Cowboy AI, LLC.

//! Storage backends for document snapshots

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::EditorConfig;
use crate::document::Document;
use crate::errors::{DiagramError, DiagramResult};

/// Somewhere a document can be saved to and loaded from
pub trait DocumentRepository {
    /// Store the document, replacing what was there
    fn save(&mut self, doc: &Document) -> DiagramResult<()>;

    /// Rebuild the stored document
    fn load(&self, config: &EditorConfig) -> DiagramResult<Document>;

    /// True if a document has been stored
    fn exists(&self) -> bool;
}

/// One JSON file on disk
#[derive(Debug, Clone)]
pub struct JsonFileRepository {
    path: PathBuf,
}

impl JsonFileRepository {
    /// Repository backed by `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The backing file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DocumentRepository for JsonFileRepository {
    fn save(&mut self, doc: &Document) -> DiagramResult<()> {
        let json = super::save_to_string(doc)?;
        std::fs::write(&self.path, json)?;
        info!(path = %self.path.display(), entities = doc.len(), "document saved");
        Ok(())
    }

    fn load(&self, config: &EditorConfig) -> DiagramResult<Document> {
        let json = std::fs::read_to_string(&self.path)?;
        let doc = super::load_from_str(&json, config)?;
        info!(path = %self.path.display(), entities = doc.len(), "document loaded");
        Ok(doc)
    }

    fn exists(&self) -> bool {
        self.path.exists()
    }
}

/// Keeps the latest snapshot as a JSON string in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    json: Option<String>,
}

impl InMemoryRepository {
    /// An empty repository
    pub fn new() -> Self {
        Self::default()
    }

    /// The stored JSON, if any
    pub fn contents(&self) -> Option<&str> {
        self.json.as_deref()
    }
}

impl DocumentRepository for InMemoryRepository {
    fn save(&mut self, doc: &Document) -> DiagramResult<()> {
        self.json = Some(super::save_to_string(doc)?);
        debug!(entities = doc.len(), "document stored in memory");
        Ok(())
    }

    fn load(&self, config: &EditorConfig) -> DiagramResult<Document> {
        let json = self
            .json
            .as_deref()
            .ok_or_else(|| DiagramError::SerializationError("no document stored".to_string()))?;
        super::load_from_str(json, config)
    }

    fn exists(&self) -> bool {
        self.json.is_some()
    }
}
