//! Module registry for tracking module information during bundling
//!
//! The ModuleRegistry is the single source of truth for module identity
//! throughout the bundling process. It maintains mappings between module IDs,
//! canonical names, and file paths.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use indexmap::IndexMap;
use rustc_hash::FxHasher;
use sha2::{Digest, Sha256};

use crate::{
    bundle_graph::ModuleId,
    error::{BundleError, BundleResult},
};

/// Type alias for FxHasher-based IndexMap
type FxIndexMap<K, V> = IndexMap<K, V, std::hash::BuildHasherDefault<FxHasher>>;

/// Complete information about a module needed during bundling
#[derive(Debug, Clone)]
pub struct ModuleInfo {
    /// Unique identifier, also the module's first-discovery ordinal
    pub id: ModuleId,
    /// Canonical module name (e.g., "net.http")
    pub canonical_name: String,
    /// Resolved file path on disk
    pub resolved_path: PathBuf,
    /// Path relative to the search root it was found under
    pub display_path: String,
    /// Shared reference to the source code, line endings normalized
    pub source: Arc<String>,
    /// SHA-256 hash of the source content (hex-encoded)
    pub content_hash: String,
}

impl ModuleInfo {
    pub fn new(
        id: ModuleId,
        canonical_name: String,
        resolved_path: PathBuf,
        display_path: String,
        source: String,
    ) -> Self {
        let content_hash = compute_content_hash(&source);
        Self {
            id,
            canonical_name,
            resolved_path,
            display_path,
            source: Arc::new(source),
            content_hash,
        }
    }

    /// Position of this module in first-discovery order
    pub fn ordinal(&self) -> usize {
        self.id.as_u32() as usize
    }
}

/// Outcome of registering a module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// First time this file was seen
    New(ModuleId),
    /// The file is already registered, possibly under another name
    Existing(ModuleId),
}

/// Central registry for module information
#[derive(Debug, Clone, Default)]
pub struct ModuleRegistry {
    /// Map from ModuleId to complete module information
    modules: FxIndexMap<ModuleId, ModuleInfo>,
    /// Map from canonical name to ModuleId for fast lookups
    name_to_id: FxIndexMap<String, ModuleId>,
    /// Map from resolved path to ModuleId for fast lookups
    path_to_id: FxIndexMap<PathBuf, ModuleId>,
}

impl ModuleRegistry {
    /// Create a new empty module registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Id the next registered module will receive
    pub fn next_id(&self) -> ModuleId {
        ModuleId::new(self.modules.len() as u32)
    }

    /// Look up a module by canonical name or path without registering anything
    pub fn find(&self, canonical_name: &str, path: &Path) -> BundleResult<Option<ModuleId>> {
        if let Some(&id) = self.name_to_id.get(canonical_name) {
            let existing = &self.modules[&id];
            if existing.resolved_path != path {
                return Err(BundleError::CanonicalNameConflict {
                    name: canonical_name.to_string(),
                    first: existing.resolved_path.clone(),
                    second: path.to_path_buf(),
                });
            }
            return Ok(Some(id));
        }
        Ok(self.path_to_id.get(path).copied())
    }

    /// Add a module to the registry
    pub fn add_module(&mut self, info: ModuleInfo) -> BundleResult<Registration> {
        if let Some(existing) = self.find(&info.canonical_name, &info.resolved_path)? {
            log::debug!(
                "Module '{}' at {} already registered as {:?}",
                info.canonical_name,
                info.resolved_path.display(),
                existing
            );
            return Ok(Registration::Existing(existing));
        }

        let id = info.id;
        debug_assert_eq!(id, self.next_id(), "module ids must be sequential");
        self.name_to_id.insert(info.canonical_name.clone(), id);
        self.path_to_id.insert(info.resolved_path.clone(), id);
        self.modules.insert(id, info);
        Ok(Registration::New(id))
    }

    pub fn get(&self, id: ModuleId) -> Option<&ModuleInfo> {
        self.modules.get(&id)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&ModuleInfo> {
        self.name_to_id.get(name).and_then(|id| self.modules.get(id))
    }

    /// Modules in registration (first-discovery) order
    pub fn iter(&self) -> impl Iterator<Item = &ModuleInfo> {
        self.modules.values()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

/// Hex-encoded SHA-256 of a module's source
pub fn compute_content_hash(source: &str) -> String {
    format!("{:x}", Sha256::digest(source.as_bytes()))
}
