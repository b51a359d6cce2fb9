//! # Collection Index
//!
//! Maps a collection name to the media files it contains. A collection is simply
//! an immediate subdirectory of the base directory; its members are the regular
//! files directly inside it. Nested directories are not descended into.
//!
//! ```text
//! base/
//! ├── music/      → "music": ["music/a.mp3", "music/b.mp3"]
//! │   ├── a.mp3
//! │   └── b.mp3
//! └── ads/        → "ads":   ["ads/x.mp3"]
//!     └── x.mp3
//! ```
//!
//! Member paths are stored relative to the base directory and sorted, so the same
//! tree and the same RNG seed always produce the same selections.

use anyhow::{Context, Result};
use log::{debug, warn};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// One selectable media file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct MediaItem {
    /// Name of the collection the file belongs to
    pub collection: String,
    /// Path relative to the base directory, `<collection>/<file name>`
    pub path: String,
}

impl MediaItem {
    pub fn new(collection: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            path: path.into(),
        }
    }
}

/// Immutable mapping of collection name to member paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionIndex {
    collections: BTreeMap<String, Vec<String>>,
}

impl CollectionIndex {
    /// Builds the index by listing the immediate subdirectories of `base_dir`.
    ///
    /// Each subdirectory becomes a collection and each regular file directly inside
    /// it becomes a member. Files and directories whose names are not valid UTF-8
    /// are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns an error if `base_dir` or one of its subdirectories cannot be read.
    pub fn from_dir(base_dir: &Path) -> Result<Self> {
        let entries = fs::read_dir(base_dir).with_context(|| {
            format!("Failed to read media base directory {}", base_dir.display())
        })?;

        let mut collections = BTreeMap::new();

        for entry in entries {
            let entry = entry
                .with_context(|| format!("Failed to list entry in {}", base_dir.display()))?;
            let dir_path = entry.path();
            if !dir_path.is_dir() {
                continue;
            }

            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                warn!("Skipping collection with non UTF-8 name: {}", dir_path.display());
                continue;
            };

            let members = list_members(&dir_path, &name)?;
            debug!("Collection '{name}': {} files", members.len());
            collections.insert(name, members);
        }

        Ok(Self { collections })
    }

    /// Builds the index from a caller-supplied listing.
    pub fn from_map<I, K, V>(listing: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: IntoIterator,
        V::Item: Into<String>,
    {
        let collections = listing
            .into_iter()
            .map(|(name, paths)| {
                let mut paths: Vec<String> = paths.into_iter().map(Into::into).collect();
                paths.sort();
                (name.into(), paths)
            })
            .collect();

        Self { collections }
    }

    /// Member paths of a collection, `None` if the collection does not exist.
    pub fn members(&self, name: &str) -> Option<&[String]> {
        self.collections.get(name).map(Vec::as_slice)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.collections.contains_key(name)
    }

    /// Collection names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.collections.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.collections
            .iter()
            .map(|(name, paths)| (name.as_str(), paths.as_slice()))
    }

    /// Number of collections.
    pub fn len(&self) -> usize {
        self.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }

    /// Number of files across all collections.
    pub fn total_items(&self) -> usize {
        self.collections.values().map(Vec::len).sum()
    }
}

/// Regular files directly inside `dir`, as sorted `<collection>/<file>` paths.
fn list_members(dir: &Path, collection: &str) -> Result<Vec<String>> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to read collection directory {}", dir.display()))?;

    let mut members = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("Failed to list entry in {}", dir.display()))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        match entry.file_name().to_str() {
            Some(file_name) => members.push(format!("{collection}/{file_name}")),
            None => warn!("Skipping file with non UTF-8 name: {}", path.display()),
        }
    }

    members.sort();
    Ok(members)
}
