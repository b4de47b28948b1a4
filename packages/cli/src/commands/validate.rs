use super::open_document;
use crate::config::Config;
use anyhow::{bail, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Document to check
    pub input: PathBuf,
}

pub fn validate(args: ValidateArgs, cwd: &str) -> Result<()> {
    let config = Config::load(cwd)?;

    println!("🔍 {} {}", "Validating".green().bold(), args.input.display());

    let mut doc = open_document(&args.input, cwd, &config)?;
    println!(
        "   {} Parsed {} root(s), every type tag resolved",
        "✓".green(),
        doc.roots().len()
    );

    let (cached, skipped) = {
        let cache = doc.metadata();
        (cache.len(), cache.skipped())
    };
    println!("   {} Indexed {} node(s)", "✓".green(), cached);
    if skipped > 0 {
        println!(
            "   {} {} member(s) did not match their declared types",
            "⚠".yellow(),
            skipped
        );
    }

    let report = doc.validate();
    if report.is_consistent() {
        println!(
            "\n✨ {} {} entries consistent",
            "Done".green().bold(),
            report.checked
        );
        return Ok(());
    }

    println!();
    for issue in &report.issues {
        println!("   {} {}", "✗".red(), issue);
    }
    bail!("{} metadata issue(s) found", report.issues.len())
}
