use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use super::types::LockConfig;

/// Load a lock configuration file.
pub fn load_config(path: &Path) -> Result<LockConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config = parse_config(&content)
        .with_context(|| format!("Failed to load config file: {}", path.display()))?;
    tracing::debug!(path = %path.display(), ?config, "Loaded lock configuration");
    Ok(config)
}

/// Parse YAML content into a LockConfig. An empty document yields the defaults.
pub fn parse_config(content: &str) -> Result<LockConfig> {
    if content.trim().is_empty() {
        return Ok(LockConfig::default());
    }
    let config: Option<LockConfig> =
        serde_yaml::from_str(content).context("Failed to parse YAML configuration")?;
    Ok(config.unwrap_or_default())
}
