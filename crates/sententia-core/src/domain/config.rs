use std::{
    collections::{BTreeMap, BTreeSet},
    path::Path,
};

use serde::{Deserialize, Serialize};

use crate::domain::{
    id::Prefix,
    registry::{EnumField, Registry},
};

/// Project configuration.
///
/// Loaded once at startup from `.sen/config.toml` and passed explicitly to the
/// components that need it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Versions", into = "Versions")]
pub struct Config {
    /// Project name, shown in rendered document headers.
    pub project: Option<String>,

    /// Prefix used when allocating ids for new requirements.
    id_prefix: Prefix,

    /// The number of digits in allocated ids.
    ///
    /// Digits are padded to this width with leading zeros, e.g. '001'.
    digits: usize,

    /// Registry values retired from use, keyed by field name.
    retired: BTreeMap<String, BTreeSet<String>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project: None,
            id_prefix: default_prefix(),
            digits: default_digits(),
            retired: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Loads the configuration from a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the TOML content is
    /// invalid.
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {e}"))?;
        toml::from_str(&content).map_err(|e| format!("Failed to parse config file: {e}"))
    }

    /// Saves the configuration to a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be serialized to TOML or if
    /// the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), String> {
        let content =
            toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize config: {e}"))?;
        std::fs::write(path, content).map_err(|e| format!("Failed to write config file: {e}"))
    }

    /// The prefix for newly allocated ids.
    #[must_use]
    pub const fn id_prefix(&self) -> &Prefix {
        &self.id_prefix
    }

    /// Sets the prefix for newly allocated ids.
    pub fn set_id_prefix(&mut self, prefix: Prefix) {
        self.id_prefix = prefix;
    }

    /// Returns the number of digits for padding allocated ids.
    #[must_use]
    pub const fn digits(&self) -> usize {
        self.digits
    }

    /// Sets the number of digits for padding allocated ids.
    pub const fn set_digits(&mut self, digits: usize) {
        self.digits = digits;
    }

    /// Builds the enum registry, applying retired values.
    ///
    /// Entries that name an unknown field or value are skipped with a warning,
    /// so a hand-edited config never prevents the project from loading.
    #[must_use]
    pub fn registry(&self) -> Registry {
        let mut registry = Registry::new();
        for (field, values) in &self.retired {
            let Ok(field) = field.parse::<EnumField>() else {
                tracing::warn!(field, "ignoring retired values for unknown field");
                continue;
            };
            for value in values {
                if let Err(e) = registry.retire(field, value) {
                    tracing::warn!(%field, value, "ignoring retired value: {e}");
                }
            }
        }
        registry
    }

    /// Records the registry's retired values, replacing any previously
    /// configured.
    pub fn set_registry(&mut self, registry: &Registry) {
        let mut retired: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (field, value) in registry.retired() {
            retired
                .entry(field.name().to_string())
                .or_default()
                .insert(value.to_string());
        }
        self.retired = retired;
    }
}

const fn default_digits() -> usize {
    3
}

fn default_prefix() -> Prefix {
    Prefix::new("R").unwrap_or_else(|_| unreachable!("'R' is a valid prefix"))
}

fn default_prefix_string() -> String {
    "R".to_string()
}

/// The serialized versions of the configuration.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_version")]
enum Versions {
    #[serde(rename = "1")]
    V1 {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        project: Option<String>,

        #[serde(default = "default_prefix_string")]
        id_prefix: String,

        /// The number of digits in allocated ids.
        #[serde(default = "default_digits")]
        digits: usize,

        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        retired: BTreeMap<String, BTreeSet<String>>,
    },
}

impl TryFrom<Versions> for Config {
    type Error = String;

    fn try_from(versions: Versions) -> Result<Self, Self::Error> {
        match versions {
            Versions::V1 {
                project,
                id_prefix,
                digits,
                retired,
            } => Ok(Self {
                project,
                id_prefix: Prefix::new(id_prefix).map_err(|e| e.to_string())?,
                digits,
                retired,
            }),
        }
    }
}

impl From<Config> for Versions {
    fn from(config: Config) -> Self {
        Self::V1 {
            project: config.project,
            id_prefix: config.id_prefix.to_string(),
            digits: config.digits,
            retired: config.retired,
        }
    }
}
