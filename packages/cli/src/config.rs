use nodegraph_editor::DEFAULT_MAX_LEVELS;
use nodegraph_model::{TypeDecl, TypeShapeRegistry};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_CONFIG_NAME: &str = "nodegraph.config.json";

/// Nodegraph configuration file format
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Type declarations used to resolve `$type` tags
    #[serde(default)]
    pub types: Vec<TypeDecl>,

    /// Undo levels kept per session
    #[serde(default = "default_history_levels")]
    pub history_levels: usize,

    #[serde(default)]
    pub tree_view: TreeViewOptions,
}

fn default_history_levels() -> usize {
    DEFAULT_MAX_LEVELS
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeViewOptions {
    /// Deepest level listed by `tree --paths`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,

    #[serde(default)]
    pub annotate: Annotation,
}

/// Extra text appended to each tree line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "camelCase")]
pub enum Annotation {
    #[default]
    None,
    Depth,
    Order,
    Path,
}

impl Config {
    /// Load config from a directory
    pub fn load(cwd: &str) -> anyhow::Result<Self> {
        let config_path = PathBuf::from(cwd).join(DEFAULT_CONFIG_NAME);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            // Return default config if none exists
            Ok(Config::default())
        }
    }

    /// Build the type registry from the declared types
    pub fn registry(&self) -> anyhow::Result<TypeShapeRegistry> {
        Ok(TypeShapeRegistry::from_decls(self.types.iter().cloned())?)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            types: vec![],
            history_levels: default_history_levels(),
            tree_view: TreeViewOptions::default(),
        }
    }
}
