use super::open_document;
use crate::config::Config;
use anyhow::Result;
use clap::Args;
use nodegraph_model::{Path, Value};
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct GetArgs {
    /// Document to read
    pub input: PathBuf,

    /// Address of the value, e.g. `[1].inputs[0].value`
    pub path: Path,

    /// Print on a single line
    #[arg(long)]
    pub compact: bool,
}

pub fn get(args: GetArgs, cwd: &str) -> Result<()> {
    let config = Config::load(cwd)?;
    let doc = open_document(&args.input, cwd, &config)?;

    let value: Value = doc.get_value(&args.path)?;
    let json = if args.compact {
        serde_json::to_string(&value)?
    } else {
        serde_json::to_string_pretty(&value)?
    };
    println!("{}", json);
    Ok(())
}
