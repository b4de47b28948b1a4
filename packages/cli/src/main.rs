mod commands;
mod config;

use clap::{Parser, Subcommand};
use colored::Colorize;
use commands::{get, set, tree, validate, GetArgs, SetArgs, TreeArgs, ValidateArgs};
use tracing_subscriber::EnvFilter;

/// Nodegraph CLI - inspect and edit node-tree documents
#[derive(Parser, Debug)]
#[command(name = "nodegraph")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log engine activity (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the tree view of a document
    Tree(TreeArgs),

    /// Check a document and its metadata for consistency
    Validate(ValidateArgs),

    /// Print the value at a path as JSON
    Get(GetArgs),

    /// Set the value at a path as one undoable step
    Set(SetArgs),
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?.display().to_string();

    match cli.command {
        Command::Tree(args) => tree(args, &cwd),
        Command::Validate(args) => validate(args, &cwd),
        Command::Get(args) => get(args, &cwd),
        Command::Set(args) => set(args, &cwd),
    }
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(cli) {
        eprintln!();
        eprintln!("{} {:#}", "Error:".red().bold(), err);
        eprintln!();
        std::process::exit(1);
    }
}
