//! Engine configuration.
//!
//! There is no module-level state: every call into the engine carries an
//! [`EditConfig`]. `EditConfig::resolve` layers, highest priority first:
//! environment overrides, an optional TOML config file, built-in defaults.
//! The environment controls exist for diagnostics and testing; `auto`
//! falls through to the next layer.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Which edit grammar a call uses. `Auto` lets the façade infer the mode
/// from the descriptor shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditMode {
    Replace,
    Patch,
    Hashline,
    #[default]
    Auto,
}

impl EditMode {
    fn parse(s: &str) -> Option<EditMode> {
        match s.trim().to_ascii_lowercase().as_str() {
            "replace" => Some(EditMode::Replace),
            "patch" => Some(EditMode::Patch),
            "hashline" => Some(EditMode::Hashline),
            "auto" => Some(EditMode::Auto),
            _ => None,
        }
    }
}

const DEFAULT_FUZZY_THRESHOLD: f64 = 0.95;

/// Resolved per-call configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EditConfig {
    pub fuzzy_enabled: bool,
    /// Minimum mean per-line similarity for a fuzzy match to be accepted.
    pub fuzzy_threshold: f64,
    pub default_mode: EditMode,
}

impl Default for EditConfig {
    fn default() -> Self {
        Self {
            fuzzy_enabled: true,
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
            default_mode: EditMode::Auto,
        }
    }
}

// ── Config file ───────────────────────────────────────────────────────────────

/// On-disk configuration; every field optional so a partial file overrides
/// only what it names.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub fuzzy_enabled: Option<bool>,
    #[serde(default)]
    pub fuzzy_threshold: Option<f64>,
    #[serde(default)]
    pub edit_mode: Option<EditMode>,
}

impl ConfigFile {
    /// Load from disk, or return an empty config if the file doesn't exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file at {}", path.display()))
    }
}

// ── Environment overrides ─────────────────────────────────────────────────────

fn env_override(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty() && v.trim() != "auto")
}

impl EditConfig {
    /// Merge env overrides with a config file.
    /// Priority: env vars > config file > built-in defaults.
    pub fn resolve(file: &ConfigFile) -> Self {
        let defaults = EditConfig::default();

        let fuzzy_enabled = env_override("EMEND_FUZZY_ENABLED")
            .and_then(|v| v.trim().parse::<bool>().ok())
            .or(file.fuzzy_enabled)
            .unwrap_or(defaults.fuzzy_enabled);

        let fuzzy_threshold = env_override("EMEND_FUZZY_THRESHOLD")
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|t| (0.0..=1.0).contains(t))
            .or(file.fuzzy_threshold.filter(|t| (0.0..=1.0).contains(t)))
            .unwrap_or(defaults.fuzzy_threshold);

        let default_mode = env_override("EMEND_EDIT_MODE")
            .and_then(|v| EditMode::parse(&v))
            .or(file.edit_mode)
            .unwrap_or(defaults.default_mode);

        EditConfig { fuzzy_enabled, fuzzy_threshold, default_mode }
    }
}
