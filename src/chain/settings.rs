//! Filter settings documents.
//!
//! A settings document is the engine's input contract written down: an
//! ordered map from chain-entry name to the registry id, an enabled flag and
//! the parameter values for that entry.
//!
//! ```toml
//! [soften]
//! filter = "gaussian_blur"
//! params = { sigma = 1.5, size = 7 }
//!
//! [mono]
//! filter = "grayscale"
//! enabled = false
//! ```

use crate::chain::structure::{ChainChange, FilterChain};
use crate::core::error::SettingsError;
use crate::core::params::Parameters;
use crate::filters::registry::FilterRegistry;
use indexmap::IndexMap;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_enabled() -> bool {
    true
}

/// One chain entry in a settings document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsEntry {
    /// Registry id of the filter type.
    pub filter: String,
    /// Whether the entry should be in the chain at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Parameter values; absent ones take their defaults.
    #[serde(default)]
    pub params: Parameters,
}

impl SettingsEntry {
    pub fn new(filter: impl Into<String>, params: Parameters) -> Self {
        Self {
            filter: filter.into(),
            enabled: true,
            params,
        }
    }

    /// Builder-style enabled flag.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Ordered chain-entry name → [`SettingsEntry`] map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterSettings {
    entries: IndexMap<String, SettingsEntry>,
}

impl FilterSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, entry: SettingsEntry) -> Self {
        self.entries.insert(name.into(), entry);
        self
    }

    /// Insert or overwrite an entry, keeping its position if it exists.
    pub fn insert(&mut self, name: impl Into<String>, entry: SettingsEntry) {
        self.entries.insert(name.into(), entry);
    }

    pub fn get(&self, name: &str) -> Option<&SettingsEntry> {
        self.entries.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SettingsEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse a JSON document.
    pub fn from_json_str(s: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(s)?)
    }

    /// Parse a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(s)?)
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String, SettingsError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Serialize to TOML.
    pub fn to_toml(&self) -> Result<String, SettingsError> {
        Ok(toml::to_string(self)?)
    }

    /// Load from a `.json` or `.toml` file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let format = SettingsFormat::from_path(path)?;
        let text = std::fs::read_to_string(path)?;
        debug!("Loading {:?} settings from {}", format, path.display());
        match format {
            SettingsFormat::Json => Self::from_json_str(&text),
            SettingsFormat::Toml => Self::from_toml_str(&text),
        }
    }

    /// Write to a `.json` or `.toml` file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SettingsError> {
        let path = path.as_ref();
        let text = match SettingsFormat::from_path(path)? {
            SettingsFormat::Json => self.to_json()?,
            SettingsFormat::Toml => self.to_toml()?,
        };
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Build a fresh chain from these settings.
    pub fn build_chain(&self, registry: &FilterRegistry) -> Result<FilterChain, SettingsError> {
        let mut chain = FilterChain::new();
        chain.apply_settings(self, registry)?;
        Ok(chain)
    }
}

/// Settings file format, picked by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsFormat {
    Json,
    Toml,
}

impl SettingsFormat {
    pub fn from_path(path: &Path) -> Result<Self, SettingsError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "json" => Ok(SettingsFormat::Json),
            "toml" => Ok(SettingsFormat::Toml),
            _ => Err(SettingsError::UnsupportedFormat(ext)),
        }
    }
}

impl FilterChain {
    /// Drive [`update_or_insert`](FilterChain::update_or_insert) once per
    /// settings entry, in document order.
    ///
    /// An entry stays in the chain only if it is enabled and its filter is
    /// not neutral. Each entry is built through `registry`; the first entry
    /// that fails to build aborts with [`SettingsError::Entry`] and leaves
    /// earlier updates applied.
    pub fn apply_settings(
        &mut self,
        settings: &FilterSettings,
        registry: &FilterRegistry,
    ) -> Result<(), SettingsError> {
        let mut changed = 0;
        for (name, entry) in settings.iter() {
            let instance = registry
                .create(&entry.filter, &entry.params)
                .map_err(|error| SettingsError::Entry {
                    entry: name.to_string(),
                    error,
                })?;
            let should_apply = entry.enabled && !instance.is_neutral();
            if self.update_or_insert(name, instance, should_apply) != ChainChange::Unchanged {
                changed += 1;
            }
        }
        info!(
            "Applied {} settings entries ({} changed), chain has {} filters",
            settings.len(),
            changed,
            self.len()
        );
        Ok(())
    }

    /// Describe the chain as a settings document.
    pub fn to_settings(&self) -> FilterSettings {
        let mut settings = FilterSettings::new();
        for (name, filter) in self.iter() {
            settings.insert(
                name,
                SettingsEntry::new(filter.metadata().id, filter.parameters()),
            );
        }
        settings
    }
}
