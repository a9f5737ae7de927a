// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! tether - run scripts through a CommonJS-style module loader
//!
//! This is the main entry point for the tether CLI/REPL.
//!
//! ## Features
//!
//! - Run an entry module with `require` wired up
//! - Evaluate inline code with `require` in scope
//! - Inspect resolution with `--resolve`
//! - Interactive REPL with history and loader commands

mod repl;

use anyhow::Context;
use clap::Parser;
use owo_colors::OwoColorize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tether_engine::Engine;
use tether_loader::path::absolutize;
use tether_loader::{Loader, LoaderConfig};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "tether",
    about = "Run scripts through a synchronous CommonJS-style module loader",
    version,
    author = "Pegasus Heavy Industries"
)]
struct Cli {
    /// Entry module to run
    script: Option<PathBuf>,

    /// Evaluate code with `require` in scope
    #[arg(short = 'e', long = "eval", conflicts_with = "script")]
    eval: Option<String>,

    /// Print the path an identifier resolves to and exit
    #[arg(long, value_name = "ID")]
    resolve: Option<String>,

    /// Print the entry module's exports after it runs
    #[arg(short = 'p', long)]
    print: bool,

    /// Extra module search directory (repeatable)
    #[arg(long = "path", value_name = "DIR")]
    paths: Vec<PathBuf>,

    /// Working directory bare identifiers resolve from
    #[arg(long, value_name = "DIR")]
    cwd: Option<PathBuf>,

    /// Start the interactive REPL
    #[arg(short = 'i', long = "interactive", alias = "repl")]
    interactive: bool,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {}", "Error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

/// Installs the log subscriber. `RUST_LOG` wins over `--verbose`.
fn init_logging(verbose: bool) {
    let default = if verbose {
        "tether_loader=debug,tether=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = build_config(&cli)?;
    tracing::debug!(?config, "loader configuration");

    let engine = Engine::new();
    let loader = Loader::with_engine(config, engine.clone());
    engine.define_global("require", loader.require_function());

    if let Some(identifier) = &cli.resolve {
        let path = loader.resolve(identifier)?;
        println!("{}", path.display());
        return Ok(());
    }

    if let Some(code) = &cli.eval {
        let value = engine.eval(code)?;
        if !value.is_undefined() {
            println!("{}", value);
        }
        return Ok(());
    }

    if let Some(script) = &cli.script {
        return run_script(&loader, script, cli.print);
    }

    if cli.interactive || atty::is(atty::Stream::Stdin) {
        let mut repl = repl::Repl::new(engine, loader).context("failed to start the REPL")?;
        repl.run()?;
        return Ok(());
    }

    // Read from stdin
    let mut code = String::new();
    std::io::Read::read_to_string(&mut std::io::stdin(), &mut code)?;
    let value = engine.eval(&code)?;
    if !value.is_undefined() {
        println!("{}", value);
    }
    Ok(())
}

/// Layers CLI flags over the project configuration.
fn build_config(cli: &Cli) -> anyhow::Result<LoaderConfig> {
    let process_cwd = std::env::current_dir().context("cannot determine the working directory")?;
    let cwd = match &cli.cwd {
        Some(dir) => absolutize(dir, &process_cwd),
        None => process_cwd.clone(),
    };

    let mut config = LoaderConfig::load(&cwd)?;
    config.cwd = Some(cwd);
    config
        .paths
        .extend(cli.paths.iter().map(|p| absolutize(p, &process_cwd)));
    Ok(config)
}

/// Runs the entry module through `require`.
fn run_script(loader: &Arc<Loader>, script: &std::path::Path, print: bool) -> anyhow::Result<()> {
    let process_cwd = std::env::current_dir().context("cannot determine the working directory")?;
    let entry = absolutize(script, &process_cwd);
    let identifier = entry.to_string_lossy();

    let exports = loader.require(&identifier)?;
    if print {
        println!("{}", exports);
    }
    Ok(())
}
