//! BundleGraph: the set of modules reachable from an entry file
//!
//! Holds the module registry together with the two orders the bundler needs:
//! - discovery order: pre-order depth-first, which is also the `ModuleId` order
//! - load order: post-order depth-first, each module after its literal subtree
//!
//! Module-level edges live in a petgraph `DiGraph` so cycles can be reported.
//! Cycles are legal; the emitted runtime loads lazily.

use indexmap::IndexMap;
use log::debug;
use petgraph::{
    algo::tarjan_scc,
    graph::{DiGraph, NodeIndex},
};
use rustc_hash::FxHashMap;

use crate::{
    error::BundleResult,
    module_registry::{ModuleInfo, ModuleRegistry, Registration},
    visitors::DynamicReference,
};

/// Unique identifier for a module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(u32);

impl ModuleId {
    pub const ENTRY: Self = Self(0);

    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the underlying u32 value of the ModuleId
    #[inline]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct BundleGraph {
    registry: ModuleRegistry,
    /// Edges go from dependency TO dependent
    graph: DiGraph<ModuleId, ()>,
    node_indices: FxHashMap<ModuleId, NodeIndex>,
    load_order: Vec<ModuleId>,
    /// Reference text -> canonical name, only where the two differ
    aliases: IndexMap<String, String>,
    dynamic_references: Vec<DynamicReference>,
}

impl BundleGraph {
    /// Create a graph rooted at the entry module
    pub fn new(entry: ModuleInfo) -> BundleResult<Self> {
        let mut graph = Self {
            registry: ModuleRegistry::new(),
            graph: DiGraph::new(),
            node_indices: FxHashMap::default(),
            load_order: Vec::new(),
            aliases: IndexMap::new(),
            dynamic_references: Vec::new(),
        };
        graph.add_module(entry)?;
        Ok(graph)
    }

    pub(crate) fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    /// Register a module and give it a node
    pub(crate) fn add_module(&mut self, info: ModuleInfo) -> BundleResult<Registration> {
        let registration = self.registry.add_module(info)?;
        if let Registration::New(id) = registration {
            let node = self.graph.add_node(id);
            self.node_indices.insert(id, node);
        }
        Ok(registration)
    }

    /// Record that `from` requires `to`
    pub(crate) fn add_module_dependency(&mut self, from: ModuleId, to: ModuleId) {
        if let (Some(&from_idx), Some(&to_idx)) =
            (self.node_indices.get(&from), self.node_indices.get(&to))
            && !self.graph.contains_edge(to_idx, from_idx)
        {
            self.graph.add_edge(to_idx, from_idx, ());
        }
    }

    /// Append a module whose subtree is complete
    pub(crate) fn mark_loaded(&mut self, id: ModuleId) {
        debug_assert!(!self.load_order.contains(&id), "module finished twice");
        self.load_order.push(id);
    }

    /// Remember that `reference` names the module `canonical_name`
    pub(crate) fn add_alias(&mut self, reference: &str, canonical_name: &str) {
        if reference != canonical_name && !self.aliases.contains_key(reference) {
            debug!("Aliasing require('{reference}') to '{canonical_name}'");
            self.aliases
                .insert(reference.to_string(), canonical_name.to_string());
        }
    }

    pub(crate) fn record_dynamic_reference(&mut self, reference: DynamicReference) {
        self.dynamic_references.push(reference);
    }

    pub fn entry(&self) -> &ModuleInfo {
        self.module(ModuleId::ENTRY)
    }

    pub fn entry_name(&self) -> &str {
        &self.entry().canonical_name
    }

    /// Ids only come from this graph's own registry
    pub(crate) fn module(&self, id: ModuleId) -> &ModuleInfo {
        self.registry
            .get(id)
            .unwrap_or_else(|| panic!("module {id:?} is not registered"))
    }

    pub fn get_module_by_name(&self, name: &str) -> Option<&ModuleInfo> {
        self.registry.get_by_name(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.registry.get_by_name(name).is_some()
    }

    /// Modules in first-discovery (pre-order) order
    pub fn discovery_order(&self) -> impl Iterator<Item = &ModuleInfo> {
        self.registry.iter()
    }

    /// Modules in load (post-order) order: dependencies before dependents
    pub fn load_order(&self) -> impl Iterator<Item = &ModuleInfo> {
        self.load_order.iter().map(|&id| self.module(id))
    }

    /// Canonical names in load order
    pub fn module_names(&self) -> Vec<&str> {
        self.load_order()
            .map(|module| module.canonical_name.as_str())
            .collect()
    }

    pub fn aliases(&self) -> &IndexMap<String, String> {
        &self.aliases
    }

    pub fn dynamic_references(&self) -> &[DynamicReference] {
        &self.dynamic_references
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Modules that `id` requires, in first-discovery order
    pub fn get_dependencies(&self, id: ModuleId) -> Vec<ModuleId> {
        let Some(&node_idx) = self.node_indices.get(&id) else {
            return vec![];
        };
        // Since edges go from dependency to dependent, incoming edges are dependencies
        let mut dependencies: Vec<ModuleId> = self
            .graph
            .neighbors_directed(node_idx, petgraph::Direction::Incoming)
            .map(|idx| self.graph[idx])
            .collect();
        dependencies.sort_unstable();
        dependencies
    }

    /// Groups of modules that require each other, each sorted by discovery order
    pub fn cycles(&self) -> Vec<Vec<&str>> {
        let mut components: Vec<Vec<ModuleId>> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1
                    || component
                        .first()
                        .is_some_and(|&node| self.graph.contains_edge(node, node))
            })
            .map(|component| {
                let mut ids: Vec<ModuleId> =
                    component.into_iter().map(|idx| self.graph[idx]).collect();
                ids.sort_unstable();
                ids
            })
            .collect();
        components.sort();

        components
            .into_iter()
            .map(|ids| {
                ids.into_iter()
                    .map(|id| self.module(id).canonical_name.as_str())
                    .collect()
            })
            .collect()
    }
}
