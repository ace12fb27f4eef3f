//! Machine-readable header for bundles built in metadata mode
//!
//! The header is a single Lua comment on the first line of the bundle, so the
//! file stays loadable by any Lua interpreter. It records where each module's
//! source landed, which lets a runtime error at `bundle.lua:120` be traced back
//! to the module and line it came from.

use serde::{Deserialize, Serialize};

/// Prefix of the first bundle line when metadata is enabled
pub const METADATA_PREFIX: &str = "-- bundlua-metadata: ";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleMetadata {
    /// Version of bundlua that produced the bundle
    pub version: String,
    pub entry: String,
    /// In load order
    pub modules: Vec<ModuleMetadata>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleMetadata {
    pub name: String,
    pub path: String,
    /// Hex SHA-256 of the module source
    pub hash: String,
    /// 1-based bundle line holding the module's first source line
    pub start_line: usize,
    pub line_count: usize,
}

impl ModuleMetadata {
    /// Whether a 1-based bundle line falls inside this module's source
    pub fn contains_line(&self, line: usize) -> bool {
        line >= self.start_line && line < self.start_line + self.line_count
    }
}

/// A line inside one bundled module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourcePosition<'a> {
    pub module: &'a str,
    pub path: &'a str,
    /// 1-based line within the module source
    pub line: usize,
}

impl BundleMetadata {
    pub fn new(entry: impl Into<String>) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            entry: entry.into(),
            modules: Vec::new(),
        }
    }

    /// The comment line written at the top of the bundle, without a newline
    pub fn header_line(&self) -> serde_json::Result<String> {
        Ok(format!("{METADATA_PREFIX}{}", serde_json::to_string(self)?))
    }

    /// Parse the header of a bundle. Returns `Ok(None)` when the bundle has no header.
    pub fn from_bundle(bundle: &str) -> serde_json::Result<Option<Self>> {
        let first_line = bundle.lines().next().unwrap_or_default();
        match first_line.strip_prefix(METADATA_PREFIX) {
            Some(json) => serde_json::from_str(json).map(Some),
            None => Ok(None),
        }
    }

    /// Map a 1-based bundle line to the module line it was copied from
    pub fn locate(&self, bundle_line: usize) -> Option<SourcePosition<'_>> {
        self.modules
            .iter()
            .find(|module| module.contains_line(bundle_line))
            .map(|module| SourcePosition {
                module: &module.name,
                path: &module.path,
                line: bundle_line - module.start_line + 1,
            })
    }

    pub fn module(&self, name: &str) -> Option<&ModuleMetadata> {
        self.modules.iter().find(|module| module.name == name)
    }
}
