// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Resolve a hardware compilation config from the command line.
//!
//! Usage: `hwconfig compile <config.json> [--output settings|map] [--strict-options]
//! [--allow-equal-if] [--diagnostics]`

mod error;

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use hwconfig_log::{diagnostic, info};
use hwconfig_resolver::{CompilerSettings, HardwareCompilationConfig, UnusedOptionsPolicy};

use crate::error::create_error_message;

#[derive(Parser, Debug)]
#[command(name = "hwconfig")]
#[command(about = "Resolve hardware descriptions, options and connectivity into instrument settings")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile a JSON hardware compilation config
    Compile(CompileArgs),
}

#[derive(clap::Args, Debug)]
struct CompileArgs {
    /// Path to the hardware compilation config
    config: PathBuf,

    /// What to print
    #[arg(long, value_enum, default_value_t = OutputKind::Settings)]
    output: OutputKind,

    /// Fail on hardware options for port-clocks that are not connected
    #[arg(long)]
    strict_options: bool,

    /// Accept equal intermediate frequencies on one channel
    #[arg(long)]
    allow_equal_if: bool,

    /// Log diagnostics of each compilation stage
    #[arg(long)]
    diagnostics: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum OutputKind {
    /// Instrument settings of the config's backend
    Settings,
    /// The compiled hardware map
    Map,
}

impl CompileArgs {
    fn compiler_settings(&self) -> CompilerSettings {
        let mut settings = CompilerSettings {
            diagnostics: self.diagnostics,
            ..Default::default()
        };
        if self.strict_options {
            settings.unused_options = UnusedOptionsPolicy::Error;
        }
        if self.allow_equal_if {
            settings.require_distinct_intermediate_frequencies = false;
        }
        settings
    }
}

fn compile(args: &CompileArgs) -> anyhow::Result<String> {
    let text = fs::read_to_string(&args.config)
        .with_context(|| format!("Failed to read '{}'", args.config.display()))?;
    let config: HardwareCompilationConfig = serde_json::from_str(&text)
        .with_context(|| format!("'{}' is not a hardware compilation config", args.config.display()))?;

    let map = hwconfig_resolver::compile(&config, args.compiler_settings())?;
    info!(
        "Compiled {} channels for the '{}' backend",
        map.channels().len(),
        map.backend()
    );
    diagnostic!("{} frequencies left unresolved", map.unresolved().len());

    let output = match args.output {
        OutputKind::Map => map.to_json()?,
        OutputKind::Settings => {
            let settings = hwconfig_backends::generate_settings(&map)?;
            serde_json::to_string_pretty(&settings)?
        }
    };
    Ok(output)
}

/// Install `env_logger` on the `log` facade.
///
/// `RUST_LOG` overrides the default level.
fn init_logger(diagnostics: bool) -> anyhow::Result<()> {
    env_logger::Builder::new()
        .filter_level(default_level(diagnostics))
        .parse_default_env()
        .format_timestamp(None)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install the logger: {e}"))?;
    hwconfig_log::init_logging(diagnostics);
    Ok(())
}

fn default_level(diagnostics: bool) -> log::LevelFilter {
    if diagnostics {
        log::LevelFilter::Info
    } else {
        log::LevelFilter::Warn
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let Command::Compile(args) = args.command;
    init_logger(args.diagnostics)?;
    println!("{}", compile(&args)?);
    Ok(())
}

fn main() -> ExitCode {
    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("Error: {}", create_error_message(error));
            ExitCode::FAILURE
        }
    }
}
