use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Handle of the synthetic collection that stands for "every configured
/// collection". It is resolved by aggregation and must never be fetched
/// as a single collection.
pub const ALL_COLLECTION: &str = "all";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// URL handle used in the upstream page-data path, e.g. `"lot-7-denim"`.
    pub handle: String,
    /// Human-friendly label; falls back to the handle.
    #[serde(default)]
    pub name: Option<String>,
}

impl CollectionConfig {
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.handle)
    }
}

#[derive(Debug, Deserialize)]
pub struct CollectionsFile {
    pub collections: Vec<CollectionConfig>,
}

impl CollectionsFile {
    /// Handles of every individually fetchable collection, in file order.
    #[must_use]
    pub fn handles(&self) -> Vec<String> {
        self.collections.iter().map(|c| c.handle.clone()).collect()
    }
}

/// Load and validate the collections configuration from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_collections(path: &Path) -> Result<CollectionsFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::CollectionsFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_collections(&content)
}

/// Parse and validate collections YAML that has already been read into memory.
///
/// # Errors
///
/// Returns `ConfigError` if the YAML is malformed or fails validation.
pub fn parse_collections(content: &str) -> Result<CollectionsFile, ConfigError> {
    let file: CollectionsFile = serde_yaml::from_str(content)?;
    validate_collections(&file)?;
    Ok(file)
}

fn validate_collections(file: &CollectionsFile) -> Result<(), ConfigError> {
    if file.collections.is_empty() {
        return Err(ConfigError::Validation(
            "at least one collection must be configured".to_string(),
        ));
    }

    let mut seen = HashSet::new();

    for collection in &file.collections {
        let handle = collection.handle.as_str();
        if handle.trim().is_empty() {
            return Err(ConfigError::Validation(
                "collection handle must be non-empty".to_string(),
            ));
        }

        if handle != handle.trim() {
            return Err(ConfigError::Validation(format!(
                "collection handle '{handle}' has surrounding whitespace"
            )));
        }

        if handle.eq_ignore_ascii_case(ALL_COLLECTION) {
            return Err(ConfigError::Validation(format!(
                "'{ALL_COLLECTION}' is reserved for the aggregate of every collection \
                 and cannot be listed"
            )));
        }

        if !handle
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(ConfigError::Validation(format!(
                "collection handle '{handle}' must be lowercase kebab-case"
            )));
        }

        if !seen.insert(handle.to_ascii_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "duplicate collection handle: '{handle}'"
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "collections_test.rs"]
mod tests;
