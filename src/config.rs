//! Composer configuration.
//!
//! Loaded from an optional `composer.toml` in the site root. Stock defaults
//! are the base layer; the file only needs the keys it wants to change.
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! content_root = "wwwroot"      # Directory holding index.yaml / tabs.yaml
//!
//! [drafts]
//! storage_key = "ns_composer_drafts_v1"  # Key of the persisted draft blob
//! autosave_delay_ms = 800                # Debounce between an edit and its autosave
//!
//! [export]
//! preferred_lang_order = ["en", "zh", "ja"]  # Languages listed first in YAML output
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::draft::DEFAULT_STORAGE_KEY;

/// File name looked up in the site root.
pub const CONFIG_FILENAME: &str = "composer.toml";

/// Upper bound for `drafts.autosave_delay_ms` (one hour).
pub const MAX_AUTOSAVE_DELAY_MS: u64 = 60 * 60 * 1000;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ComposerConfig {
    /// Directory (relative to the site root) holding the manifests.
    #[serde(default = "default_content_root")]
    pub content_root: String,
    /// Draft persistence and autosave settings.
    pub drafts: DraftsConfig,
    /// YAML export settings.
    pub export: ExportConfig,
}

fn default_content_root() -> String {
    "wwwroot".to_string()
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            content_root: default_content_root(),
            drafts: DraftsConfig::default(),
            export: ExportConfig::default(),
        }
    }
}

impl ComposerConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.content_root.trim().is_empty() {
            return Err(ConfigError::Validation(
                "content_root must not be empty".into(),
            ));
        }
        if self.drafts.storage_key.trim().is_empty() {
            return Err(ConfigError::Validation(
                "drafts.storage_key must not be empty".into(),
            ));
        }
        if self.drafts.autosave_delay_ms == 0 {
            return Err(ConfigError::Validation(
                "drafts.autosave_delay_ms must be non-zero".into(),
            ));
        }
        if self.drafts.autosave_delay_ms > MAX_AUTOSAVE_DELAY_MS {
            return Err(ConfigError::Validation(format!(
                "drafts.autosave_delay_ms must be at most {MAX_AUTOSAVE_DELAY_MS}"
            )));
        }
        Ok(())
    }

    /// Resolve the content root against the site root.
    pub fn content_dir(&self, site_root: &Path) -> std::path::PathBuf {
        site_root.join(&self.content_root)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DraftsConfig {
    pub storage_key: String,
    /// Quiet period after the last edit before the draft is written.
    pub autosave_delay_ms: u64,
}

impl Default for DraftsConfig {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            autosave_delay_ms: 800,
        }
    }
}

impl DraftsConfig {
    pub fn autosave_delay(&self) -> TimeDelta {
        i64::try_from(self.autosave_delay_ms)
            .ok()
            .and_then(TimeDelta::try_milliseconds)
            .unwrap_or(TimeDelta::MAX)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportConfig {
    /// Languages emitted first, in this order; the rest follow alphabetically.
    pub preferred_lang_order: Vec<String>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            preferred_lang_order: vec!["en".into(), "zh".into(), "ja".into()],
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Stock default config as a `toml::Value::Table`, the base layer for
/// merging user overrides.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(ComposerConfig::default())
        .map_err(|e| ConfigError::Validation(format!("default config must serialize: {e}")))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `composer.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist, `Err` if it is invalid TOML.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto the stock defaults, then deserialize and
/// validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<ComposerConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: ComposerConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `composer.toml` in the given directory.
pub fn load_config(dir: &Path) -> Result<ComposerConfig, ConfigError> {
    resolve_config(load_raw_config(dir)?)
}

/// A fully-commented stock `composer.toml`.
pub fn stock_config_toml() -> &'static str {
    r##"# Composer Configuration
# ======================
# All settings are optional. Values shown below are the defaults.
# Unknown keys will cause an error.

# Directory (relative to the site root) holding index.yaml and tabs.yaml.
content_root = "wwwroot"

[drafts]
# Key of the single JSON blob holding unsynced drafts for both manifests.
storage_key = "ns_composer_drafts_v1"
# Quiet period in milliseconds between the last edit and its autosave.
autosave_delay_ms = 800

[export]
# Languages listed first when writing YAML; others follow alphabetically.
preferred_lang_order = ["en", "zh", "ja"]
"##
}
