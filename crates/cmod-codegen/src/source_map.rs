//! Source mapping: generated C declaration → description-file location.
//!
//! Each entry ties a static object or a globals entry of the unit to the
//! span it was declared at, so a C compiler error in the generated file can
//! be traced back to the description. Only bindings and objects that carry
//! an origin appear in the map.

use cmod_types::Span;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceMap {
    pub entries: Vec<SourceMapEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceMapEntry {
    /// C identifier for objects, symbol text for globals entries.
    pub name: String,
    pub kind: DeclKind,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeclKind {
    Tuple,
    Dict,
    Float,
    /// An entry of the module globals table.
    Global,
}

impl SourceMap {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, name: impl Into<String>, kind: DeclKind, span: Span) {
        self.entries.push(SourceMapEntry {
            name: name.into(),
            kind,
            span,
        });
    }

    pub fn find(&self, name: &str) -> Option<&SourceMapEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn from_json(data: &str) -> Option<Self> {
        serde_json::from_str(data).ok()
    }
}
