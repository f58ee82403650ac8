// Copyright 2025 Cowboy AI, LLC.

//! Editor configuration
//!
//! Settings are plain serde data with defaults for every field, so a
//! configuration file only has to name what it changes.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::errors::{DiagramError, DiagramResult};

/// How a functor whose label contains a `.` names its images
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageNaming {
    /// `F.G` applied to `x` gives `F(x)`: the first segment is applied, the rest dropped
    #[default]
    FirstSegmentPrefix,
    /// `F.G` applied to `x` gives `FxG`: the first `.` is a placeholder for the label
    Placeholder,
}

/// Editor-wide settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EditorConfig {
    /// Maximum number of undo steps kept; 0 keeps everything
    pub undo_limit: usize,
    /// Whether new functors mirror positions and arrow shapes onto their images
    pub reflect_graphics: bool,
    /// Naming rule for multi-segment functor labels
    pub image_naming: ImageNaming,
    /// Label given to new objects
    pub default_object_symbol: String,
    /// Label given to new morphisms
    pub default_morphism_symbol: String,
    /// Label given to new diagrams
    pub default_diagram_symbol: String,
    /// Label given to new functors
    pub default_functor_symbol: String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            undo_limit: 0,
            reflect_graphics: true,
            image_naming: ImageNaming::default(),
            default_object_symbol: "x".to_string(),
            default_morphism_symbol: "f".to_string(),
            default_diagram_symbol: "C".to_string(),
            default_functor_symbol: "F".to_string(),
        }
    }
}

impl EditorConfig {
    /// Parse a JSON configuration; missing fields take their defaults
    pub fn from_json_str(json: &str) -> DiagramResult<Self> {
        serde_json::from_str(json).map_err(|e| DiagramError::ConfigError(e.to_string()))
    }

    /// Read a JSON configuration file
    pub fn load(path: impl AsRef<Path>) -> DiagramResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&text)?;
        info!(path = %path.display(), "loaded editor configuration");
        Ok(config)
    }

    /// Builder-style undo limit
    pub fn with_undo_limit(mut self, limit: usize) -> Self {
        self.undo_limit = limit;
        self
    }

    /// Builder-style naming rule
    pub fn with_image_naming(mut self, naming: ImageNaming) -> Self {
        self.image_naming = naming;
        self
    }
}
