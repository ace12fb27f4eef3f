use std::{path::PathBuf, process};

use anyhow::{Context, Result};
use bundlua::{
    config::{Config, TargetConfig},
    orchestrator::BundleOrchestrator,
};
use clap::{ArgAction, Parser};
use log::{debug, error};

/// Bundle a Lua project into a single file
#[derive(Parser, Debug)]
#[command(name = "bundlua")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file to use instead of ./bundlua.toml
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Build only this configured target (repeatable)
    #[arg(short, long = "target", value_name = "NAME", conflicts_with = "entry")]
    targets: Vec<String>,

    /// Bundle this entry file instead of the configured targets
    #[arg(short, long, value_name = "FILE")]
    entry: Option<PathBuf>,

    /// Output file for --entry
    #[arg(short, long, value_name = "FILE", requires = "entry")]
    output: Option<PathBuf>,

    /// Search-path template such as `src/?.lua` (repeatable, overrides shared and per-target paths)
    #[arg(short = 'p', long = "path", value_name = "TEMPLATE")]
    paths: Vec<String>,

    /// Prepend a machine-readable header describing the bundled modules
    #[arg(long)]
    metadata: bool,

    /// Fail at runtime on modules missing from the bundle instead of using the host `require`
    #[arg(long)]
    isolate: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[allow(clippy::exit)]
fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(err) = run(cli) {
        error!("{err:#}");
        process::exit(1);
    }
}

fn init_logging(verbosity: u8) {
    let default_filter = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let project_dir =
        std::env::current_dir().context("failed to determine the current directory")?;
    let mut config = Config::load(&project_dir, cli.config.as_deref())?;

    if !cli.paths.is_empty() {
        config.override_paths(cli.paths);
    }
    config.metadata |= cli.metadata;
    config.isolate |= cli.isolate;
    debug!("Effective config: {config:?}");

    let orchestrator = BundleOrchestrator::new(config);
    let reports = match cli.entry {
        Some(entry) => vec![orchestrator.bundle_target(&TargetConfig::ad_hoc(entry, cli.output))?],
        None => orchestrator.bundle_targets(&cli.targets)?,
    };

    for report in &reports {
        debug!(
            "{}: {} module(s), {} dynamic require(s), {} bytes",
            report.target,
            report.modules.len(),
            report.dynamic_references.len(),
            report.bytes_written
        );
        for cycle in &report.cycles {
            debug!("{}: circular requires between {}", report.target, cycle.join(", "));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_ad_hoc_build() {
        let cli = Cli::parse_from([
            "bundlua", "-e", "Main.lua", "-o", "out.lua", "-p", "?.lua", "-p", "lib/?.lua",
            "--isolate", "-vv",
        ]);
        assert_eq!(cli.entry, Some(PathBuf::from("Main.lua")));
        assert_eq!(cli.output, Some(PathBuf::from("out.lua")));
        assert_eq!(cli.paths, vec!["?.lua", "lib/?.lua"]);
        assert!(cli.isolate && !cli.metadata);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_output_requires_entry() {
        assert!(Cli::try_parse_from(["bundlua", "-o", "out.lua"]).is_err());
        assert!(Cli::try_parse_from(["bundlua", "-t", "Lib", "-e", "Main.lua"]).is_err());
    }
}
