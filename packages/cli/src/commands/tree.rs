use super::open_document;
use crate::config::{Annotation, Config};
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use nodegraph_editor::NodeMetadata;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct TreeArgs {
    /// Document to display
    pub input: PathBuf,

    /// Annotation appended to each line (defaults to the config's)
    #[arg(short, long, value_enum)]
    pub annotate: Option<Annotation>,

    /// List node paths instead of drawing the tree
    #[arg(long)]
    pub paths: bool,

    /// Deepest level listed with --paths
    #[arg(short, long)]
    pub depth: Option<usize>,
}

pub fn tree(args: TreeArgs, cwd: &str) -> Result<()> {
    let config = Config::load(cwd)?;
    let mut doc = open_document(&args.input, cwd, &config)?;
    let annotation = args.annotate.unwrap_or(config.tree_view.annotate);
    let cache = doc.metadata();

    if args.paths {
        let max_depth = args.depth.or(config.tree_view.max_depth);
        for meta in cache.collect(max_depth) {
            println!("{}  {}", meta.path, meta.type_tag.cyan());
        }
        return Ok(());
    }

    let annotate = |meta: &NodeMetadata| annotation_text(annotation, meta);
    let rendered = match annotation {
        Annotation::None => cache.render_tree(None),
        _ => cache.render_tree(Some(&annotate)),
    };
    print!("{}", rendered);

    if let Some(warning) = skipped_warning(cache.skipped()) {
        eprintln!("{} {}", "⚠".yellow(), warning);
    }
    Ok(())
}

/// The cache skips unregistered nodes and members that do not match
/// their declared type alike.
fn skipped_warning(skipped: usize) -> Option<String> {
    (skipped > 0).then(|| {
        format!(
            "{} value(s) omitted: unregistered type or not matching the declaration",
            skipped
        )
    })
}

fn annotation_text(annotation: Annotation, meta: &NodeMetadata) -> Option<String> {
    match annotation {
        Annotation::None => None,
        Annotation::Depth => Some(format!("depth {}", meta.depth)),
        Annotation::Order => Some(format!("#{}", meta.render_order)),
        Annotation::Path => Some(meta.path.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodegraph_model::Path;

    fn meta() -> NodeMetadata {
        NodeMetadata {
            path: "[1].inputs[2]".parse::<Path>().unwrap(),
            parent: None,
            depth: 1,
            children: vec![],
            render_order: 4,
            in_multi_port: true,
            port_name: Some("inputs".to_string()),
            port_index: Some(2),
            root_index: 1,
            type_tag: "Constant".to_string(),
        }
    }

    #[test]
    fn test_skipped_warning_names_both_causes() {
        assert_eq!(skipped_warning(0), None);
        let warning = skipped_warning(3).unwrap();
        assert!(warning.starts_with("3 value(s) omitted"));
        assert!(warning.contains("unregistered type"));
        assert!(warning.contains("not matching the declaration"));
    }

    #[test]
    fn test_annotation_text() {
        let meta = meta();
        assert_eq!(annotation_text(Annotation::None, &meta), None);
        assert_eq!(annotation_text(Annotation::Depth, &meta).as_deref(), Some("depth 1"));
        assert_eq!(annotation_text(Annotation::Order, &meta).as_deref(), Some("#4"));
        assert_eq!(
            annotation_text(Annotation::Path, &meta).as_deref(),
            Some("[1].inputs[2]")
        );
    }
}
