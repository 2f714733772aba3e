#![deny(clippy::expect_used)]
//! weave-trace: run a callin scenario and print what happened
//!
//! Usage:
//!   weave-trace scenario.toml                 # Run with the scenario's config
//!   weave-trace scenario.toml --config w.toml # Override the engine config
//!   weave-trace scenario.toml --compact       # Single-line JSON

use std::env;
use std::process;

use callin_weave::config::WeaveConfig;
use callin_weave::scenario::ScenarioDocument;
use tracing::error;
use tracing_subscriber::EnvFilter;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_usage() {
    println!(
        r#"weave-trace {} - callin dispatch tracer

USAGE:
    weave-trace <scenario.toml> [OPTIONS]

OPTIONS:
    --config <file>   Engine configuration (replaces the scenario's [config])
    --compact         Print single-line JSON
    -h, --help        Show this help message
    -V, --version     Show version

ENVIRONMENT:
    RUST_LOG                               Log filter (default: warn)
    CALLIN_WEAVE_DISABLE_PLAN_CACHE        Disable dispatch plan caching
    CALLIN_WEAVE_DISABLE_RESOLUTION_CACHE  Disable lift/role method caching
    CALLIN_WEAVE_AFTER_POLICY              stop | fail"#,
        VERSION
    );
}

fn fail(message: impl std::fmt::Display) -> ! {
    error!("{}", message);
    eprintln!("Error: {}", message);
    process::exit(1);
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() == 1 || args.iter().any(|a| a == "-h" || a == "--help") {
        print_usage();
        return;
    }
    if args.iter().any(|a| a == "-V" || a == "--version") {
        println!("weave-trace {}", VERSION);
        return;
    }

    let compact = args.iter().any(|a| a == "--compact");
    let config_file = match args.iter().position(|a| a == "--config") {
        Some(i) => match args.get(i + 1) {
            Some(path) => Some(path.clone()),
            None => fail("--config requires a file"),
        },
        None => None,
    };
    let scenario_file = args
        .iter()
        .skip(1)
        .enumerate()
        .find(|(i, a)| !a.starts_with('-') && (*i == 0 || args[*i] != "--config"))
        .map(|(_, a)| a.clone())
        .unwrap_or_else(|| fail("missing scenario file"));

    let mut scenario = ScenarioDocument::from_file(&scenario_file).unwrap_or_else(|e| fail(e));
    if let Some(path) = config_file {
        scenario.config = WeaveConfig::from_file(&path).unwrap_or_else(|e| fail(e));
    }
    scenario.config = scenario
        .config
        .clone()
        .with_env_overrides()
        .unwrap_or_else(|e| fail(e));

    let reports = scenario.run().unwrap_or_else(|e| fail(e));
    let rendered = if compact {
        serde_json::to_string(&reports)
    } else {
        serde_json::to_string_pretty(&reports)
    };
    match rendered {
        Ok(json) => println!("{}", json),
        Err(e) => fail(e),
    }
}
