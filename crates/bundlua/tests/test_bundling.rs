use std::{fs, path::Path};

use anyhow::Result;
use bundlua::{
    code_generator::{EmitOptions, emit},
    config::{Config, TargetConfig},
    graph_builder::GraphBuilder,
    metadata::BundleMetadata,
    orchestrator::BundleOrchestrator,
    resolver::ModuleResolver,
    search_path::SearchPath,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn write_files(root: &Path, files: &[(&str, &str)]) -> Result<()> {
    for (name, content) in files {
        let path = root.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
    }
    Ok(())
}

fn main_and_utils() -> Result<TempDir> {
    let temp_dir = TempDir::new()?;
    write_files(
        temp_dir.path(),
        &[
            ("Main.lua", "local u = require(\"Utils\")\nprint(u.x)\n"),
            ("Utils.lua", "return { x = 1 }\n"),
        ],
    )?;
    Ok(temp_dir)
}

/// Everything after the loader prelude
fn modules_section(bundle: &str) -> &str {
    bundle
        .split_once("end)(require)\n")
        .map_or(bundle, |(_, rest)| rest)
}

#[test]
fn test_main_and_utils_bundle() -> Result<()> {
    let temp_dir = main_and_utils()?;
    let orchestrator = BundleOrchestrator::new(Config::defaults(temp_dir.path()));
    let target = TargetConfig::ad_hoc(
        temp_dir.path().join("Main.lua"),
        Some(temp_dir.path().join("out/bundle.lua")),
    );

    let report = orchestrator.bundle_target(&target)?;
    assert_eq!(report.modules, vec!["Utils", "Main"]);
    assert!(report.dynamic_references.is_empty());

    let bundle = fs::read_to_string(&report.output_path)?;
    insta::assert_snapshot!(modules_section(&bundle), @r#"
    __bundle_register("Utils", function(require, ...)
    return { x = 1 }
    end)
    __bundle_register("Main", function(require, ...)
    local u = require("Utils")
    print(u.x)
    end)
    return __bundle_require("Main", ...)
    "#);
    Ok(())
}

#[test]
fn test_bundling_is_deterministic() -> Result<()> {
    let temp_dir = main_and_utils()?;
    let mut config = Config::defaults(temp_dir.path());
    config.metadata = true;
    let orchestrator = BundleOrchestrator::new(config);
    let target = TargetConfig::ad_hoc(temp_dir.path().join("Main.lua"), None);

    let first = orchestrator.render_target(&target)?.text;
    let second = orchestrator.render_target(&target)?.text;
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn test_dynamic_require_is_reported_and_bundle_still_written() -> Result<()> {
    let temp_dir = TempDir::new()?;
    write_files(
        temp_dir.path(),
        &[(
            "Main.lua",
            "local name = 'plugins.' .. arg[1]\nlocal m = require(name)\nreturn m\n",
        )],
    )?;

    let mut warnings = Vec::new();
    let resolver = ModuleResolver::new(SearchPath::for_directory(temp_dir.path()));
    let graph = GraphBuilder::new(resolver)
        .on_dynamic_reference(|reference| warnings.push(reference.to_string()))
        .walk(&temp_dir.path().join("Main.lua"))?;

    assert_eq!(
        warnings,
        vec!["Non-literal require found in 'Main' at 2:18"]
    );
    let bundle = emit(&graph, &EmitOptions::default())?;
    assert!(bundle.contains("local m = require(name)\n"));
    Ok(())
}

#[test]
fn test_repeated_require_bundles_once() -> Result<()> {
    let temp_dir = TempDir::new()?;
    write_files(
        temp_dir.path(),
        &[
            (
                "Main.lua",
                "local a = require('Utils')\nlocal b = require \"Utils\"\nassert(a == b)\n",
            ),
            ("Utils.lua", "return {}\n"),
        ],
    )?;
    let orchestrator = BundleOrchestrator::new(Config::defaults(temp_dir.path()));
    let target = TargetConfig::ad_hoc(temp_dir.path().join("Main.lua"), None);

    let bundle = orchestrator.render_target(&target)?.text;
    assert_eq!(bundle.matches("__bundle_register(\"Utils\"").count(), 1);
    assert!(bundle.contains("loaded[name] = result"));
    Ok(())
}

#[test]
fn test_nested_packages_and_template_order() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let root = temp_dir.path();
    write_files(
        root,
        &[
            ("src/main.lua", "local http = require('net.http')\nreturn http\n"),
            ("src/net/http/init.lua", "return require('net.http.headers')\n"),
            ("src/net/http/headers.lua", "return {}\n"),
            ("vendor/net/http/headers.lua", "error('shadowed')\n"),
        ],
    )?;

    let search_path = SearchPath::from_patterns([
        format!("{}/src/?.lua", root.display()),
        format!("{}/src/?/init.lua", root.display()),
        format!("{}/vendor/?.lua", root.display()),
    ])?;
    let graph = GraphBuilder::new(ModuleResolver::new(search_path))
        .walk(&root.join("src/main.lua"))?;

    assert_eq!(
        graph.module_names(),
        vec!["net.http.headers", "net.http", "main"]
    );
    let headers = graph
        .get_module_by_name("net.http.headers")
        .expect("headers bundled");
    assert_eq!(headers.source.as_str(), "return {}\n");
    Ok(())
}

#[test]
fn test_long_require_chain() -> Result<()> {
    const DEPTH: usize = 300;
    let temp_dir = TempDir::new()?;
    let root = temp_dir.path();
    for i in 0..DEPTH {
        let content = if i + 1 < DEPTH {
            format!("return require('m{}')\n", i + 1)
        } else {
            "return 'bottom'\n".to_string()
        };
        fs::write(root.join(format!("m{i}.lua")), content)?;
    }

    let graph = GraphBuilder::new(ModuleResolver::new(SearchPath::for_directory(root)))
        .walk(&root.join("m0.lua"))?;
    let names = graph.module_names();
    assert_eq!(names.len(), DEPTH);
    assert_eq!(names.first().copied(), Some("m299"));
    assert_eq!(names.last().copied(), Some("m0"));
    Ok(())
}

#[test]
fn test_metadata_maps_lines_back_to_modules() -> Result<()> {
    let temp_dir = main_and_utils()?;
    let mut config = Config::defaults(temp_dir.path());
    config.metadata = true;
    let orchestrator = BundleOrchestrator::new(config);
    let target = TargetConfig::ad_hoc(temp_dir.path().join("Main.lua"), None);

    let bundle = orchestrator.render_target(&target)?.text;
    let metadata = BundleMetadata::from_bundle(&bundle)?.expect("metadata header");
    assert_eq!(metadata.entry, "Main");
    assert_eq!(
        metadata
            .modules
            .iter()
            .map(|m| m.name.as_str())
            .collect::<Vec<_>>(),
        vec!["Utils", "Main"]
    );

    let print_line = bundle
        .lines()
        .position(|line| line == "print(u.x)")
        .expect("print line present")
        + 1;
    let position = metadata.locate(print_line).expect("line belongs to Main");
    assert_eq!(position.module, "Main");
    assert_eq!(position.path, "Main.lua");
    assert_eq!(position.line, 2);
    Ok(())
}

#[test]
fn test_configured_targets_from_file() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let root = temp_dir.path();
    write_files(
        root,
        &[
            (
                "bundlua.toml",
                r#"
paths = ["src/?.lua", "src/?/init.lua"]

[[targets]]
name = "Library"
entry = "src/main.lua"

[[targets]]
name = "Simtest"
entry = "simtest/Main.lua"
output = "simtest/build/Simtest.lua"
paths = ["simtest/?.lua", "src/?.lua"]
"#,
            ),
            ("title.txt", "Library.lua\n"),
            ("src/main.lua", "return require('core')\n"),
            ("src/core.lua", "return {}\n"),
            ("simtest/Main.lua", "local core = require('core')\nreturn require('Harness')\n"),
            ("simtest/Harness.lua", "return {}\n"),
        ],
    )?;

    let mut config = Config::defaults(root);
    config.merge_file(&root.join("bundlua.toml"))?;
    let reports = BundleOrchestrator::new(config).bundle_targets(&[])?;

    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].output_path, root.join("build/Library.lua"));
    assert_eq!(reports[0].modules, vec!["core", "main"]);
    assert_eq!(
        reports[1].output_path,
        root.join("simtest/build/Simtest.lua")
    );
    assert_eq!(reports[1].modules, vec!["core", "Harness", "Main"]);
    assert!(reports.iter().all(|report| report.output_path.is_file()));
    Ok(())
}
