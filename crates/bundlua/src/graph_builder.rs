/// Graph builder that walks `require` calls from an entry file
/// This module bridges the resolver, the require discovery pass, and the BundleGraph
use std::{fmt, path::Path};

use indexmap::IndexSet;
use log::{debug, trace};

use crate::{
    bundle_graph::{BundleGraph, ModuleId},
    error::{BundleError, BundleResult},
    lexer::SourceLocation,
    module_registry::ModuleInfo,
    resolver::{ModuleResolver, ResolvedModule},
    util::read_source,
    visitors::{DynamicReference, RequireReference, discover_requires},
};

type DynamicReferenceHandler<'a> = Box<dyn FnMut(&DynamicReference) + 'a>;

/// A module whose references are still being followed
struct Frame {
    id: ModuleId,
    references: std::vec::IntoIter<RequireReference>,
}

/// Builds a BundleGraph by depth-first traversal of literal requires
pub struct GraphBuilder<'a> {
    resolver: ModuleResolver,
    /// Module names left to the host `require` at runtime
    ignored_modules: IndexSet<String>,
    on_dynamic_reference: Option<DynamicReferenceHandler<'a>>,
}

impl fmt::Debug for GraphBuilder<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphBuilder")
            .field("resolver", &self.resolver)
            .field("ignored_modules", &self.ignored_modules)
            .field("has_handler", &self.on_dynamic_reference.is_some())
            .finish()
    }
}

impl<'a> GraphBuilder<'a> {
    pub fn new(resolver: ModuleResolver) -> Self {
        Self {
            resolver,
            ignored_modules: IndexSet::new(),
            on_dynamic_reference: None,
        }
    }

    pub fn with_ignored_modules<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignored_modules.extend(names.into_iter().map(Into::into));
        self
    }

    /// Called once per dynamic `require`, as it is found
    pub fn on_dynamic_reference(mut self, handler: impl FnMut(&DynamicReference) + 'a) -> Self {
        self.on_dynamic_reference = Some(Box::new(handler));
        self
    }

    /// Walk every module reachable through literal requires from `entry_file`
    pub fn walk(&mut self, entry_file: &Path) -> BundleResult<BundleGraph> {
        if !entry_file.is_file() {
            return Err(BundleError::EntryNotFound {
                path: entry_file.to_path_buf(),
            });
        }

        let entry = self.resolver.describe_file(entry_file);
        debug!(
            "Walking from entry '{}' ({})",
            entry.canonical_name,
            entry.path.display()
        );
        let (info, references) = load_module(ModuleId::ENTRY, entry)?;
        let mut graph = BundleGraph::new(info)?;
        let mut stack = vec![Frame {
            id: ModuleId::ENTRY,
            references: references.into_iter(),
        }];

        loop {
            let (current, next_reference) = match stack.last_mut() {
                Some(frame) => (frame.id, frame.references.next()),
                None => break,
            };

            match next_reference {
                None => {
                    stack.pop();
                    graph.mark_loaded(current);
                }
                Some(RequireReference::Dynamic { location }) => {
                    self.report_dynamic(&mut graph, current, location);
                }
                Some(RequireReference::Literal { name, location }) => {
                    if self.ignored_modules.contains(&name) {
                        debug!("Leaving ignored module '{name}' to the runtime");
                        continue;
                    }
                    if let Some(frame) = self.visit(&mut graph, current, &name, location)? {
                        stack.push(frame);
                    }
                }
            }
        }

        let cycles = graph.cycles();
        for cycle in &cycles {
            debug!("Circular requires between: {}", cycle.join(", "));
        }
        debug!(
            "Discovered {} module(s), {} dynamic reference(s)",
            graph.len(),
            graph.dynamic_references().len()
        );
        Ok(graph)
    }

    /// Follow one literal reference. Returns a frame when the module is new.
    fn visit(
        &mut self,
        graph: &mut BundleGraph,
        current: ModuleId,
        name: &str,
        location: SourceLocation,
    ) -> BundleResult<Option<Frame>> {
        let resolved = self.resolver.resolve(name).map_err(|err| match err {
            BundleError::ModuleNotFound { attempted, .. } => BundleError::UnresolvedModule {
                module: name.to_string(),
                referenced_from: graph.module(current).canonical_name.clone(),
                location,
                attempted,
            },
            other => other,
        })?;

        if let Some(existing) = graph
            .registry()
            .find(&resolved.canonical_name, &resolved.path)?
        {
            trace!("'{name}' already visited as {existing:?}");
            let canonical_name = graph.module(existing).canonical_name.clone();
            graph.add_alias(name, &canonical_name);
            graph.add_module_dependency(current, existing);
            return Ok(None);
        }

        let id = graph.registry().next_id();
        let (info, references) = load_module(id, resolved)?;
        graph.add_alias(name, &info.canonical_name);
        graph.add_module(info)?;
        graph.add_module_dependency(current, id);

        Ok(Some(Frame {
            id,
            references: references.into_iter(),
        }))
    }

    fn report_dynamic(
        &mut self,
        graph: &mut BundleGraph,
        current: ModuleId,
        location: Option<SourceLocation>,
    ) {
        let reference = DynamicReference {
            module: graph.module(current).canonical_name.clone(),
            location,
        };
        debug!("{reference}");
        if let Some(handler) = self.on_dynamic_reference.as_mut() {
            handler(&reference);
        }
        graph.record_dynamic_reference(reference);
    }
}

/// Read and scan a module
fn load_module(
    id: ModuleId,
    resolved: ResolvedModule,
) -> BundleResult<(ModuleInfo, Vec<RequireReference>)> {
    let source = read_source(&resolved.path)?;
    let references = discover_requires(&resolved.canonical_name, &source)?;
    let info = ModuleInfo::new(
        id,
        resolved.canonical_name,
        resolved.path,
        resolved.display_path,
        source,
    );
    Ok((info, references))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use anyhow::Result;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;
    use crate::search_path::SearchPath;

    fn write(root: &Path, name: &str, content: &str) -> Result<()> {
        let path = root.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    fn walk(root: &Path, entry: &str) -> BundleResult<BundleGraph> {
        let resolver = ModuleResolver::new(SearchPath::for_directory(root));
        GraphBuilder::new(resolver).walk(&root.join(entry))
    }

    fn discovered(graph: &BundleGraph) -> Vec<&str> {
        graph
            .discovery_order()
            .map(|m| m.canonical_name.as_str())
            .collect()
    }

    #[test]
    fn test_depth_first_orders() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();
        write(root, "main.lua", "require('a')\nrequire('d')")?;
        write(root, "a.lua", "require('b')\nrequire('c')")?;
        write(root, "b.lua", "return 'b'")?;
        write(root, "c.lua", "require('b')\nreturn 'c'")?;
        write(root, "d.lua", "return 'd'")?;

        let graph = walk(root, "main.lua")?;
        assert_eq!(discovered(&graph), vec!["main", "a", "b", "c", "d"]);
        assert_eq!(graph.module_names(), vec!["b", "c", "a", "d", "main"]);
        Ok(())
    }

    #[test]
    fn test_missing_entry() {
        let err = walk(Path::new("/no/such/dir"), "main.lua").expect_err("no entry");
        assert!(matches!(err, BundleError::EntryNotFound { .. }));
    }

    #[test]
    fn test_unresolved_literal_is_fatal() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();
        write(root, "main.lua", "local x = 1\nlocal m = require('missing')")?;

        let err = walk(root, "main.lua").expect_err("missing module");
        match err {
            BundleError::UnresolvedModule {
                module,
                referenced_from,
                location,
                attempted,
            } => {
                assert_eq!(module, "missing");
                assert_eq!(referenced_from, "main");
                assert_eq!(location, SourceLocation::new(2, 18));
                assert_eq!(attempted.len(), 2);
            }
            other => panic!("unexpected error: {other}"),
        }
        Ok(())
    }

    #[test]
    fn test_dynamic_references_are_reported_not_followed() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();
        write(root, "main.lua", "local name = 'x'\nrequire(name)\nrequire(name)")?;
        write(root, "x.lua", "return 1")?;

        let mut reported = Vec::new();
        let resolver = ModuleResolver::new(SearchPath::for_directory(root));
        let graph = GraphBuilder::new(resolver)
            .on_dynamic_reference(|reference| reported.push(reference.to_string()))
            .walk(&root.join("main.lua"))?;

        assert_eq!(graph.len(), 1);
        assert!(!graph.contains("x"));
        assert_eq!(graph.dynamic_references().len(), 2);
        assert_eq!(
            reported,
            vec![
                "Non-literal require found in 'main' at 2:8",
                "Non-literal require found in 'main' at 3:8",
            ]
        );
        Ok(())
    }

    #[test]
    fn test_dedup_by_canonical_name_with_aliases() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();
        write(root, "main.lua", "require('lib.util')\nrequire('lib/util')")?;
        write(root, "lib/util.lua", "return {}")?;
        write(root, "lib/init.lua", "return require('lib.util')")?;

        let graph = walk(root, "main.lua")?;
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.aliases().get("lib/util").map(String::as_str), Some("lib.util"));
        Ok(())
    }

    #[test]
    fn test_package_init_and_init_suffix_share_module() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();
        write(root, "main.lua", "require('pkg')\nrequire('pkg.init')")?;
        write(root, "pkg/init.lua", "return {}")?;

        let graph = walk(root, "main.lua")?;
        assert_eq!(discovered(&graph), vec!["main", "pkg"]);
        assert_eq!(graph.aliases().get("pkg.init").map(String::as_str), Some("pkg"));
        Ok(())
    }

    #[test]
    fn test_cycles_are_tolerated() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();
        write(root, "main.lua", "require('a')")?;
        write(root, "a.lua", "require('b')")?;
        write(root, "b.lua", "require('a')\nrequire('main')")?;

        let graph = walk(root, "main.lua")?;
        assert_eq!(graph.module_names(), vec!["b", "a", "main"]);
        assert_eq!(graph.cycles(), vec![vec!["main", "a", "b"]]);
        Ok(())
    }

    #[test]
    fn test_ignored_modules_are_not_resolved() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();
        write(root, "main.lua", "local socket = require('socket')")?;

        let resolver = ModuleResolver::new(SearchPath::for_directory(root));
        let graph = GraphBuilder::new(resolver)
            .with_ignored_modules(["socket"])
            .walk(&root.join("main.lua"))?;
        assert_eq!(graph.len(), 1);
        Ok(())
    }

    #[test]
    fn test_syntax_error_in_dependency() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();
        write(root, "main.lua", "require('bad')")?;
        write(root, "bad.lua", "local s = [[never closed")?;

        let err = walk(root, "main.lua").expect_err("syntax error");
        assert_eq!(err.module_name(), Some("bad"));
        Ok(())
    }
}
