//! wk CLI - wiki renderer.
//!
//! Provides commands for:
//! - `render`: Render one page to HTML
//! - `backlinks`: List the pages linking to a page
//! - `orphans`: List pages nothing links to
//! - `sites`: List the configured InterWiki sites

mod commands;
mod error;
mod output;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{BacklinksArgs, GlobalArgs, RenderArgs};
use output::Output;

/// wk - wiki markup renderer.
#[derive(Parser)]
#[command(name = "wk", version, about)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a page to HTML on stdout.
    Render(RenderArgs),
    /// List pages linking to a page.
    Backlinks(BacklinksArgs),
    /// List pages no other page links to.
    Orphans,
    /// List InterWiki sites.
    Sites,
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    // --verbose enables INFO level, otherwise use RUST_LOG or default to WARN
    let filter = if cli.global.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Render(args) => args.execute(&cli.global),
        Commands::Backlinks(args) => args.execute(&cli.global),
        Commands::Orphans => commands::orphans(&cli.global),
        Commands::Sites => commands::sites(&cli.global),
    };

    if let Err(err) = result {
        output.error(&format!("Error: {err}"));
        std::process::exit(1);
    }
}
