use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub db_path: Option<String>,
    pub logging_level: Option<String>,

    pub todos: Option<TodosConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct TodosConfig {
    /// Give the author of a new issue or merge request an ASSIGNED to-do when they
    /// assign themselves.
    pub assign_author_on_create: Option<bool>,
    /// Ignore mentions inside inline code and fenced code blocks.
    pub ignore_code_blocks: Option<bool>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
