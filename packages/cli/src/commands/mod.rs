mod get;
mod set;
mod tree;
mod validate;

pub use get::{get, GetArgs};
pub use set::{set, SetArgs};
pub use tree::{tree, TreeArgs};
pub use validate::{validate, ValidateArgs};

use crate::config::Config;
use anyhow::{Context, Result};
use nodegraph_editor::{Document, History};
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Resolve `input` against the working directory
fn resolve(input: &Path, cwd: &str) -> PathBuf {
    if input.is_absolute() {
        input.to_path_buf()
    } else {
        PathBuf::from(cwd).join(input)
    }
}

/// Load a file-backed document with the configured types and history depth
fn open_document(input: &Path, cwd: &str, config: &Config) -> Result<Document> {
    let registry = Rc::new(config.registry()?);
    let path = resolve(input, cwd);
    let doc = Document::load(&path, registry)
        .with_context(|| format!("failed to load {}", path.display()))?;
    Ok(doc.with_history(History::with_max_levels(config.history_levels)))
}
