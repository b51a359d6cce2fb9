//! # Configuration Module
//!
//! This module handles the selection policy file and its default location.
//!
//! ## Policy File
//!
//! The policy is a JSON document declaring a weight and a backoff depth for each
//! collection, plus a global backoff for identical files:
//!
//! ```json
//! {
//!   "same_item_backoff": 1,
//!   "collections": {
//!     "music": { "weight": 10 },
//!     "ads": { "weight": 1, "backoff": 2 }
//!   }
//! }
//! ```
//!
//! Missing or `null` fields fall back to their defaults (weight 1, backoff 0). A
//! weight of 0 is treated as missing.
//!
//! ## Default Location
//!
//! When no path is given on the command line the policy is read from the
//! platform configuration directory:
//! - Linux: `~/.config/mediaspinner/config.json`
//! - macOS: `~/Library/Application Support/mediaspinner/config.json`
//! - Windows: `%APPDATA%\mediaspinner\config.json`

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Problems with a policy that make selection impossible.
///
/// These are always detected when the selector is built, before the first item
/// is chosen.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("configuration declares no collections")]
    NoCollections,

    #[error("collection '{0}' is configured but does not exist in the media directory")]
    UnknownCollection(String),

    #[error("collection '{0}' is configured but contains no files")]
    EmptyCollection(String),

    #[error("collection '{name}' has invalid weight {weight}; weights must be positive")]
    InvalidWeight { name: String, weight: f64 },
}

/// Selection rules for a single collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionPolicy {
    /// Relative draw weight, 1 when absent or 0
    #[serde(default)]
    pub weight: Option<f64>,
    /// Number of most recent picks that must not come from this collection
    #[serde(default)]
    pub backoff: Option<usize>,
}

impl CollectionPolicy {
    pub fn weight(&self) -> f64 {
        match self.weight {
            Some(weight) if weight != 0.0 => weight,
            _ => 1.0,
        }
    }

    pub fn backoff(&self) -> usize {
        self.backoff.unwrap_or(0)
    }
}

/// The whole selection policy, immutable once loaded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Number of most recent picks whose path may not be repeated
    #[serde(default, alias = "same_file_backoff")]
    pub same_item_backoff: Option<usize>,
    /// Per-collection rules, ordered by name
    pub collections: BTreeMap<String, CollectionPolicy>,
}

impl PolicyConfig {
    pub fn same_item_backoff(&self) -> usize {
        self.same_item_backoff.unwrap_or(0)
    }

    /// Largest lookback any rule needs.
    pub fn max_backoff(&self) -> usize {
        self.collections
            .values()
            .map(CollectionPolicy::backoff)
            .chain(std::iter::once(self.same_item_backoff()))
            .max()
            .unwrap_or(0)
    }

    /// Parses a policy from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("Invalid policy configuration JSON")
    }

    /// Reads and parses the policy file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid policy document
    /// (for instance when the `collections` map is missing).
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file {}", path.display()))?;
        Self::from_json(&text)
            .with_context(|| format!("Failed to parse configuration file {}", path.display()))
    }
}

/// Returns the platform-appropriate default policy file path.
///
/// The `mediaspinner` directory is not created; a missing file is reported when
/// the policy is loaded.
///
/// # Errors
///
/// Returns an error if the system configuration directory cannot be determined.
pub fn default_config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir().ok_or_else(|| anyhow::anyhow!(
        "Could not determine system configuration directory. Please pass --config explicitly."
    ))?;

    Ok(config_dir.join("mediaspinner").join("config.json"))
}
