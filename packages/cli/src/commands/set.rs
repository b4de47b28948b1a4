use super::open_document;
use crate::config::Config;
use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use nodegraph_editor::{AtomicOperation, Document};
use nodegraph_model::{format, Path, Value};
use std::path::PathBuf;
use tracing::info;

#[derive(Args, Debug)]
pub struct SetArgs {
    /// Document to edit
    pub input: PathBuf,

    /// Address of the value to replace
    pub path: Path,

    /// New value as JSON; nodes and records carry `$type`
    pub value: String,

    /// Undo description (defaults to `set <path>`)
    #[arg(short, long)]
    pub message: Option<String>,

    /// Undo and redo the edit, checking both restore the expected JSON
    #[arg(long)]
    pub undo_check: bool,

    /// Write the result back to the document
    #[arg(short, long)]
    pub write: bool,
}

pub fn set(args: SetArgs, cwd: &str) -> Result<()> {
    let config = Config::load(cwd)?;
    let mut doc = open_document(&args.input, cwd, &config)?;

    let json: serde_json::Value =
        serde_json::from_str(&args.value).context("value is not valid JSON")?;
    let value = format::value_from_json_any(&json, &args.path, doc.registry())?;
    let value = widen_to_current(&doc, &args.path, value);

    let before = doc.to_json()?;
    apply_set(&mut doc, &args.path, value, args.message)?;
    info!(path = %args.path, version = doc.version, "Applied edit");

    if args.undo_check {
        check_round_trip(&mut doc, &before)?;
        println!("{} undo and redo restore the document", "✓".green());
    }

    print!("{}", doc.metadata().render_tree(None));

    if args.write {
        doc.save()?;
        if let Some(path) = &doc.path {
            println!("{} wrote {}", "✓".green(), path.display());
        }
    }
    Ok(())
}

/// Apply one set and commit it as its own undo step
fn apply_set(doc: &mut Document, path: &Path, value: Value, message: Option<String>) -> Result<()> {
    doc.apply(AtomicOperation::set(path.clone(), value))?;
    let description = message.unwrap_or_else(|| format!("set {}", path));
    if !doc.commit(description) {
        bail!("edit at '{}' recorded no change", path);
    }
    Ok(())
}

/// JSON has no float/int distinction; `2` assigned over a float means `2.0`
fn widen_to_current(doc: &Document, path: &Path, value: Value) -> Value {
    match (doc.get_value::<Value>(path), value) {
        (Ok(Value::Float(_)), Value::Int(i)) => Value::Float(i as f64),
        (_, value) => value,
    }
}

fn check_round_trip(doc: &mut Document, before: &str) -> Result<()> {
    let after = doc.to_json()?;

    doc.undo()?;
    if doc.to_json()? != before {
        bail!("undo did not restore the original document");
    }
    doc.redo()?;
    if doc.to_json()? != after {
        bail!("redo did not restore the edited document");
    }
    Ok(())
}
