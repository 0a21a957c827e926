mod cli;
mod commands;
mod config;
mod engine;
mod facts;
mod host;
mod nfs;
mod paths;
mod progress;
mod resource;
mod runner;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;
use std::path::PathBuf;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    /// `--config`, if given
    pub config: Option<String>,
    /// Filesystem root managed files are resolved under
    pub root: PathBuf,
    /// `--os-family`, if given
    pub os_family: Option<String>,
}

fn main() {
    if let Err(e) = run() {
        ui::error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        config: cli.config,
        root: cli.root,
        os_family: cli.os_family,
    };

    match cli.command {
        Command::Plan(args) => commands::plan::run(&ctx, args.target.as_deref()),
        Command::Apply(args) => commands::apply::run(
            &ctx,
            &engine::ApplyOptions {
                dry_run: args.dry_run,
                jobs: args.jobs,
                yes: args.yes,
                verbose: ctx.verbose > 0,
                json: args.json,
            },
        ),
        Command::Exports => commands::inspect::exports(&ctx),
        Command::Graph(args) => commands::inspect::graph(&ctx, args.target.as_deref()),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "nfsconv", &mut io::stdout());
            Ok(())
        }
    }
}
