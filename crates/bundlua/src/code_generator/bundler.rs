use std::{fmt::Write as _, sync::Arc};

use log::debug;

use super::{
    module_wrapper::wrap_module,
    runtime::{ALIAS_FN, REQUIRE_FN, prelude},
};
use crate::{
    bundle_graph::BundleGraph,
    error::BundleResult,
    metadata::{BundleMetadata, ModuleMetadata},
    util::lua_string_literal,
};

/// First line of every bundle body
pub const BUNDLE_HEADER: &str = "-- Bundled by bundlua";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmitOptions {
    /// Prepend a `-- bundlua-metadata:` header line
    pub metadata: bool,
    /// Raise an error for unbundled modules instead of calling the host `require`
    pub isolate: bool,
}

/// A module as it goes into the bundle
#[derive(Debug, Clone)]
pub struct EmittedModule {
    pub canonical_name: String,
    pub display_path: String,
    pub content_hash: String,
    pub source: Arc<String>,
}

/// Everything needed to render one bundle, captured from a BundleGraph
#[derive(Debug, Clone)]
pub struct BundleOutput {
    /// In load order
    modules: Vec<EmittedModule>,
    aliases: Vec<(String, String)>,
    entry: String,
    options: EmitOptions,
}

impl BundleOutput {
    pub fn new(graph: &BundleGraph, options: EmitOptions) -> Self {
        let modules = graph
            .load_order()
            .map(|module| EmittedModule {
                canonical_name: module.canonical_name.clone(),
                display_path: module.display_path.clone(),
                content_hash: module.content_hash.clone(),
                source: Arc::clone(&module.source),
            })
            .collect();
        let aliases = graph
            .aliases()
            .iter()
            .map(|(reference, canonical)| (reference.clone(), canonical.clone()))
            .collect();

        Self {
            modules,
            aliases,
            entry: graph.entry_name().to_string(),
            options,
        }
    }

    pub fn module_names(&self) -> Vec<&str> {
        self.modules
            .iter()
            .map(|module| module.canonical_name.as_str())
            .collect()
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }

    /// Render the bundle text
    pub fn render(&self) -> BundleResult<String> {
        self.render_with_metadata().map(|(text, _)| text)
    }

    /// Render the bundle text together with its line map.
    ///
    /// The map is computed even when the header is disabled; line numbers in it
    /// always refer to the returned text.
    pub fn render_with_metadata(&self) -> BundleResult<(String, BundleMetadata)> {
        let mut body = String::new();
        body.push_str(BUNDLE_HEADER);
        body.push('\n');
        body.push_str(&prelude(self.options.isolate));

        for (reference, canonical) in &self.aliases {
            let _ = writeln!(
                body,
                "{ALIAS_FN}({}, {})",
                lua_string_literal(reference),
                lua_string_literal(canonical)
            );
        }

        let mut metadata = BundleMetadata::new(self.entry.as_str());
        for module in &self.modules {
            let wrapper_line = count_lines(&body) + 1;
            let wrapped = wrap_module(&module.canonical_name, &module.source);
            metadata.modules.push(ModuleMetadata {
                name: module.canonical_name.clone(),
                path: module.display_path.clone(),
                hash: module.content_hash.clone(),
                start_line: wrapper_line + wrapped.body_offset,
                line_count: wrapped.line_count,
            });
            body.push_str(&wrapped.text);
        }

        let _ = writeln!(
            body,
            "return {REQUIRE_FN}({}, ...)",
            lua_string_literal(&self.entry)
        );

        if !self.options.metadata {
            return Ok((body, metadata));
        }

        for module in &mut metadata.modules {
            module.start_line += 1;
        }
        let header = metadata.header_line()?;
        debug!("Bundle metadata header is {} bytes", header.len());
        Ok((format!("{header}\n{body}"), metadata))
    }
}

fn count_lines(text: &str) -> usize {
    text.bytes().filter(|&byte| byte == b'\n').count()
}

/// Render a graph as a single Lua file
pub fn emit(graph: &BundleGraph, options: &EmitOptions) -> BundleResult<String> {
    BundleOutput::new(graph, *options).render()
}
