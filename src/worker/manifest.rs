use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::Result;

/// Fixed manifest filename looked up at the root of every checkout.
pub const MANIFEST_FILENAME: &str = ".podium.yml";

/// One manifest entry: presentation name -> build declaration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestEntry {
    /// Source path relative to the checkout. Defaults to `<name>.rst`.
    #[serde(default)]
    pub source: Option<String>,
    /// Glob patterns for files copied alongside the rendered output.
    #[serde(default)]
    pub assets: Vec<String>,
}

impl ManifestEntry {
    #[must_use]
    pub fn source_for(&self, name: &str) -> String {
        self.source
            .clone()
            .unwrap_or_else(|| format!("{name}.rst"))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Manifest {
    entries: BTreeMap<String, ManifestEntry>,
}

impl Manifest {
    pub fn parse(contents: &str) -> Result<Self> {
        // A bare `name:` line declares a presentation with all defaults.
        let raw: BTreeMap<String, Option<ManifestEntry>> = serde_yaml::from_str(contents)?;
        let entries = raw
            .into_iter()
            .map(|(name, entry)| (name, entry.unwrap_or_default()))
            .collect();
        Ok(Self { entries })
    }

    /// Reads the manifest from a checkout. `Ok(None)` when the file is absent.
    pub fn load(checkout: &Path) -> Result<Option<Self>> {
        let path = checkout.join(MANIFEST_FILENAME);
        if !path.is_file() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path)?;
        Ok(Some(Self::parse(&contents)?))
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &ManifestEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
