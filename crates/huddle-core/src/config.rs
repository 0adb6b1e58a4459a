use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Engine configuration, read from `.huddle/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

/// Structural limits enforced by the mutation processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_max_text_len")]
    pub max_text_len: usize,
    #[serde(default = "default_max_items")]
    pub max_items: usize,
    #[serde(default = "default_max_options")]
    pub max_options: usize,
    /// Dot-vote budget applied to boards created without one.
    #[serde(default)]
    pub default_votes_per_participant: Option<u32>,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_text_len: default_max_text_len(),
            max_items: default_max_items(),
            max_options: default_max_options(),
            default_votes_per_participant: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl StoreConfig {
    #[must_use]
    pub const fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

/// Load the effective configuration for a project root.
///
/// The user-level file (`<config dir>/huddle/config.toml`) is read first and
/// the project file (`<root>/.huddle/config.toml`) is layered on top, key by
/// key. Missing files are not an error.
///
/// # Errors
///
/// Returns an error if either file exists but cannot be read or parsed.
pub fn load_config(project_root: &Path) -> Result<EngineConfig> {
    let mut merged = toml::Value::Table(toml::map::Map::new());

    if let Some(config_dir) = dirs::config_dir() {
        if let Some(user) = read_toml(&config_dir.join("huddle/config.toml"))? {
            merge_values(&mut merged, user);
        }
    }

    if let Some(project) = read_toml(&project_root.join(".huddle/config.toml"))? {
        merge_values(&mut merged, project);
    }

    merged
        .try_into::<EngineConfig>()
        .context("Failed to interpret merged huddle configuration")
}

/// Parse a configuration document from a string.
///
/// # Errors
///
/// Returns an error if the content is not valid TOML for [`EngineConfig`].
pub fn parse_config(content: &str) -> Result<EngineConfig> {
    toml::from_str::<EngineConfig>(content).context("Failed to parse huddle configuration")
}

fn read_toml(path: &Path) -> Result<Option<toml::Value>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let value = toml::from_str::<toml::Value>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    tracing::debug!(path = %path.display(), "loaded configuration layer");
    Ok(Some(value))
}

fn merge_values(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

const fn default_max_text_len() -> usize {
    500
}

const fn default_max_items() -> usize {
    200
}

const fn default_max_options() -> usize {
    20
}

const fn default_busy_timeout_ms() -> u64 {
    5_000
}
