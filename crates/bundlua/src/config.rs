//! Layered configuration
//!
//! Layers, lowest precedence first:
//! 1. Built-in defaults
//! 2. User config (`<config dir>/bundlua/bundlua.toml`)
//! 3. Project config (`bundlua.toml` in the project directory, or `--config`)
//! 4. `BUNDLUA_*` environment variables
//! 5. Command-line flags, applied by the binary
//!
//! Relative paths inside a config file are taken relative to that file's directory.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use log::debug;
use serde::Deserialize;

use crate::{
    dirs::{self, CONFIG_FILE_NAME},
    error::BundleError,
    output::{DEFAULT_OUTPUT_DIR, DEFAULT_OUTPUT_NAME, DEFAULT_TITLE_FILE},
};

pub const PATHS_ENV: &str = "BUNDLUA_PATHS";
pub const METADATA_ENV: &str = "BUNDLUA_METADATA";
pub const ISOLATE_ENV: &str = "BUNDLUA_ISOLATE";
pub const LUA_PATH_ENV: &str = "BUNDLUA_LUA_PATH";
pub const OUTPUT_DIR_ENV: &str = "BUNDLUA_OUTPUT_DIR";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Search-path templates shared by every target
    pub paths: Vec<String>,
    pub metadata: bool,
    pub isolate: bool,
    /// Append the templates from `LUA_PATH`
    pub lua_path: bool,
    /// Module names left to the host `require`
    pub ignored_modules: Vec<String>,
    pub output_dir: PathBuf,
    pub title_file: Option<PathBuf>,
    pub default_output_name: String,
    pub targets: Vec<TargetConfig>,
}

/// One bundle to build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetConfig {
    pub name: String,
    pub entry: PathBuf,
    pub output: Option<PathBuf>,
    /// Replaces the shared templates for this target
    pub paths: Option<Vec<String>>,
}

impl TargetConfig {
    /// A target for an entry given on the command line, named after its file stem
    pub fn ad_hoc(entry: PathBuf, output: Option<PathBuf>) -> Self {
        let name = entry
            .file_stem()
            .map_or_else(|| "Bundle".to_string(), |stem| stem.to_string_lossy().into_owned());
        Self {
            name,
            entry,
            output,
            paths: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    paths: Option<Vec<String>>,
    metadata: Option<bool>,
    isolate: Option<bool>,
    lua_path: Option<bool>,
    ignored_modules: Option<Vec<String>>,
    output_dir: Option<PathBuf>,
    title_file: Option<PathBuf>,
    default_output_name: Option<String>,
    targets: Option<Vec<TargetFile>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TargetFile {
    name: String,
    entry: PathBuf,
    #[serde(default)]
    output: Option<PathBuf>,
    #[serde(default)]
    paths: Option<Vec<String>>,
}

impl Config {
    /// Built-in defaults for a project rooted at `project_dir`
    pub fn defaults(project_dir: &Path) -> Self {
        Self {
            paths: Vec::new(),
            metadata: false,
            isolate: false,
            lua_path: false,
            ignored_modules: Vec::new(),
            output_dir: project_dir.join(DEFAULT_OUTPUT_DIR),
            title_file: Some(project_dir.join(DEFAULT_TITLE_FILE)),
            default_output_name: DEFAULT_OUTPUT_NAME.to_string(),
            targets: Vec::new(),
        }
    }

    /// Load every layer up to and including the environment
    pub fn load(project_dir: &Path, explicit_config: Option<&Path>) -> Result<Self> {
        let mut config = Self::defaults(project_dir);

        if let Some(user_file) = dirs::user_config_file()
            && user_file.is_file()
        {
            config.merge_file(&user_file)?;
        }

        match explicit_config {
            Some(path) => {
                if !path.is_file() {
                    bail!("config file not found: {}", path.display());
                }
                config.merge_file(path)?;
            }
            None => {
                let project_file = project_dir.join(CONFIG_FILE_NAME);
                if project_file.is_file() {
                    config.merge_file(&project_file)?;
                }
            }
        }

        config.apply_env_overrides(project_dir)?;
        Ok(config)
    }

    /// Overlay one TOML file
    pub fn merge_file(&mut self, path: &Path) -> Result<()> {
        debug!("Loading config from {}", path.display());
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let file: ConfigFile = toml::from_str(&text).map_err(|err| BundleError::Config {
            path: path.to_path_buf(),
            message: err.message().to_string(),
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        self.merge(file, base);
        Ok(())
    }

    fn merge(&mut self, file: ConfigFile, base: &Path) {
        if let Some(paths) = file.paths {
            self.paths = paths.iter().map(|t| rebase_template(base, t)).collect();
        }
        if let Some(metadata) = file.metadata {
            self.metadata = metadata;
        }
        if let Some(isolate) = file.isolate {
            self.isolate = isolate;
        }
        if let Some(lua_path) = file.lua_path {
            self.lua_path = lua_path;
        }
        if let Some(ignored_modules) = file.ignored_modules {
            self.ignored_modules = ignored_modules;
        }
        if let Some(output_dir) = file.output_dir {
            self.output_dir = rebase(base, &output_dir);
        }
        if let Some(title_file) = file.title_file {
            // An empty title file disables title lookup
            self.title_file =
                (!title_file.as_os_str().is_empty()).then(|| rebase(base, &title_file));
        }
        if let Some(default_output_name) = file.default_output_name {
            self.default_output_name = default_output_name;
        }
        if let Some(targets) = file.targets {
            self.targets = targets
                .into_iter()
                .map(|target| TargetConfig {
                    name: target.name,
                    entry: rebase(base, &target.entry),
                    output: target.output.map(|output| rebase(base, &output)),
                    paths: target
                        .paths
                        .map(|paths| paths.iter().map(|t| rebase_template(base, t)).collect()),
                })
                .collect();
        }
    }

    /// Apply `BUNDLUA_*` variables from the process environment
    pub fn apply_env_overrides(&mut self, project_dir: &Path) -> Result<()> {
        self.apply_env(project_dir, |name| env::var(name).ok())
    }

    /// Apply `BUNDLUA_*` variables through `lookup`. Relative paths are taken
    /// relative to `project_dir`.
    pub fn apply_env(
        &mut self,
        project_dir: &Path,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<()> {
        if let Some(paths) = lookup(PATHS_ENV) {
            self.paths = paths
                .split(';')
                .filter(|template| !template.is_empty())
                .map(|template| rebase_template(project_dir, template))
                .collect();
            debug!("{PATHS_ENV} sets {} template(s)", self.paths.len());
        }
        if let Some(value) = lookup(METADATA_ENV) {
            self.metadata = parse_flag(METADATA_ENV, &value)?;
        }
        if let Some(value) = lookup(ISOLATE_ENV) {
            self.isolate = parse_flag(ISOLATE_ENV, &value)?;
        }
        if let Some(value) = lookup(LUA_PATH_ENV) {
            self.lua_path = parse_flag(LUA_PATH_ENV, &value)?;
        }
        if let Some(dir) = lookup(OUTPUT_DIR_ENV).filter(|dir| !dir.is_empty()) {
            self.output_dir = rebase(project_dir, Path::new(&dir));
        }
        Ok(())
    }

    /// Replace the search path of every target, including targets with their own `paths`
    pub fn override_paths(&mut self, paths: Vec<String>) {
        for target in &mut self.targets {
            target.paths = None;
        }
        self.paths = paths;
    }

    /// Targets to build, in order. An empty selection means every target.
    pub fn select_targets(&self, names: &[String]) -> Result<Vec<&TargetConfig>> {
        if self.targets.is_empty() {
            bail!("no bundle targets configured; add [[targets]] to {CONFIG_FILE_NAME} or pass --entry");
        }
        if names.is_empty() {
            return Ok(self.targets.iter().collect());
        }
        names
            .iter()
            .map(|name| {
                self.targets
                    .iter()
                    .find(|target| &target.name == name)
                    .with_context(|| format!("unknown target '{name}'"))
            })
            .collect()
    }
}

fn rebase(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

fn rebase_template(base: &Path, template: &str) -> String {
    rebase(base, Path::new(template))
        .to_string_lossy()
        .into_owned()
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("{name} must be a boolean, got '{other}'"),
    }
}
