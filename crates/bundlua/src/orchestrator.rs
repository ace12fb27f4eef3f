use std::{
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use log::{debug, info, warn};
use rustc_hash::FxHashMap;
use tempfile::NamedTempFile;

use crate::{
    bundle_graph::BundleGraph,
    code_generator::{BundleOutput, EmitOptions},
    config::{Config, TargetConfig},
    error::{BundleError, BundleResult},
    graph_builder::GraphBuilder,
    output::{OutputLocation, ensure_parent_dir},
    resolver::ModuleResolver,
    search_path::SearchPath,
    visitors::DynamicReference,
};

/// Outcome of building one target
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub target: String,
    pub output_path: PathBuf,
    /// Canonical names in load order
    pub modules: Vec<String>,
    pub dynamic_references: Vec<DynamicReference>,
    pub cycles: Vec<Vec<String>>,
    pub bytes_written: usize,
}

/// A rendered bundle that has not been written anywhere
#[derive(Debug)]
pub struct RenderedBundle {
    pub graph: BundleGraph,
    pub text: String,
}

#[derive(Debug)]
pub struct BundleOrchestrator {
    config: Config,
    /// Overrides `LUA_PATH` when the lua_path option is on
    lua_path_override: Option<String>,
}

impl BundleOrchestrator {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            lua_path_override: None,
        }
    }

    #[must_use]
    pub fn with_lua_path_override(mut self, lua_path: Option<String>) -> Self {
        self.lua_path_override = lua_path;
        self
    }

    /// Build the named targets, or all of them, stopping at the first failure.
    /// Output paths are checked for collisions before anything is built.
    pub fn bundle_targets(&self, names: &[String]) -> Result<Vec<BuildReport>> {
        let targets = self.config.select_targets(names)?;
        let output_paths = self.plan_outputs(&targets)?;
        targets
            .into_iter()
            .zip(output_paths)
            .map(|(target, output_path)| self.bundle_target_to(target, output_path))
            .collect()
    }

    /// Output path of every target, in order.
    ///
    /// When several targets have no explicit output, each is named after the
    /// target instead of sharing the title file's name.
    pub fn plan_outputs(&self, targets: &[&TargetConfig]) -> Result<Vec<PathBuf>> {
        let name_after_target = targets.iter().filter(|t| t.output.is_none()).count() > 1;
        let mut claimed: FxHashMap<PathBuf, &str> = FxHashMap::default();
        let mut output_paths = Vec::with_capacity(targets.len());

        for target in targets {
            let mut location = self.output_location(target);
            if name_after_target {
                location = location
                    .with_title_file(None)
                    .with_default_name(format!("{}.lua", target.name));
            }
            let output_path = location.resolve();
            if let Some(other) = claimed.insert(output_path.clone(), &target.name) {
                bail!(
                    "targets '{other}' and '{}' would both write {}",
                    target.name,
                    output_path.display()
                );
            }
            output_paths.push(output_path);
        }
        Ok(output_paths)
    }

    /// Build one target and write it to its output location
    pub fn bundle_target(&self, target: &TargetConfig) -> Result<BuildReport> {
        let output_path = self.output_location(target).resolve();
        self.bundle_target_to(target, output_path)
    }

    fn bundle_target_to(&self, target: &TargetConfig, output_path: PathBuf) -> Result<BuildReport> {
        let rendered = self
            .render_target(target)
            .with_context(|| format!("failed to bundle target '{}'", target.name))?;

        write_bundle_atomically(&output_path, &rendered.text)?;
        info!(
            "{} bundle created as {}",
            target.name,
            output_path.display()
        );

        let graph = &rendered.graph;
        Ok(BuildReport {
            target: target.name.clone(),
            output_path,
            modules: graph
                .module_names()
                .into_iter()
                .map(ToString::to_string)
                .collect(),
            dynamic_references: graph.dynamic_references().to_vec(),
            cycles: graph
                .cycles()
                .into_iter()
                .map(|cycle| cycle.into_iter().map(ToString::to_string).collect())
                .collect(),
            bytes_written: rendered.text.len(),
        })
    }

    /// Walk and emit a target without touching the output location
    pub fn render_target(&self, target: &TargetConfig) -> BundleResult<RenderedBundle> {
        let search_path = self.search_path_for(target)?;
        debug!(
            "Bundling '{}' from {} with {} template(s)",
            target.name,
            target.entry.display(),
            search_path.len()
        );
        for template in search_path.templates() {
            debug!("  search path: {template}");
        }

        let resolver = if self.config.lua_path {
            ModuleResolver::new_with_lua_path(search_path, self.lua_path_override.as_deref())?
        } else {
            ModuleResolver::new(search_path)
        };

        let graph = GraphBuilder::new(resolver)
            .with_ignored_modules(self.config.ignored_modules.iter().cloned())
            .on_dynamic_reference(|reference| warn!("{reference}"))
            .walk(&target.entry)?;

        let options = EmitOptions {
            metadata: self.config.metadata,
            isolate: self.config.isolate,
        };
        let text = BundleOutput::new(&graph, options).render()?;
        Ok(RenderedBundle { graph, text })
    }

    /// Templates for a target: its own, the shared ones, or the entry directory's defaults
    pub fn search_path_for(&self, target: &TargetConfig) -> BundleResult<SearchPath> {
        let patterns = target.paths.as_ref().unwrap_or(&self.config.paths);
        if !patterns.is_empty() {
            return SearchPath::from_patterns(patterns);
        }
        let entry_dir = target
            .entry
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        Ok(SearchPath::for_directory(entry_dir))
    }

    pub fn output_location(&self, target: &TargetConfig) -> OutputLocation {
        OutputLocation {
            explicit: target.output.clone(),
            output_dir: self.config.output_dir.clone(),
            title_file: self.config.title_file.clone(),
            default_name: self.config.default_output_name.clone(),
        }
    }
}

/// Write `text` to `path` through a temporary file in the same directory.
/// On failure nothing is left at `path`.
pub fn write_bundle_atomically(path: &Path, text: &str) -> BundleResult<()> {
    let to_output_error = |source| BundleError::OutputWrite {
        path: path.to_path_buf(),
        source,
    };

    ensure_parent_dir(path).map_err(to_output_error)?;
    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut temp_file = NamedTempFile::new_in(dir).map_err(to_output_error)?;
    temp_file
        .write_all(text.as_bytes())
        .map_err(to_output_error)?;
    temp_file.flush().map_err(to_output_error)?;
    temp_file
        .persist(path)
        .map_err(|err| to_output_error(err.error))?;
    debug!("Wrote {} bytes to {}", text.len(), path.display());
    Ok(())
}
