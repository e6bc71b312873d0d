use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

/// Shell presentation settings, loaded from an optional TOML file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Prompt string printed before each command.
    pub prompt: String,
    /// Whether `ls` colorizes directory entries.
    pub color: bool,
}

impl Default for ShellConfig {
    fn default() -> Self {
        ShellConfig {
            prompt: "$".to_string(),
            color: true,
        }
    }
}

impl ShellConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("failed to parse config {}", path.display()))
    }
}
