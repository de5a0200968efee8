//! Content records shown by the coverflow gallery.
//!
//! The gallery takes a read-only snapshot of these records once at build time.
//! Every field is optional on the wire; missing values degrade to empty strings.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// One portfolio entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ProjectRecord {
    pub title: String,
    pub category: String,
    #[serde(alias = "image")]
    pub image_url: String,
    pub url: String,
}

impl ProjectRecord {
    /// Navigation destination, if the record carries one.
    pub fn destination(&self) -> Option<&str> {
        let url = self.url.trim();
        (!url.is_empty()).then_some(url)
    }
}

/// Ordered list of records, immutable once loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ContentSnapshot {
    pub projects: Vec<ProjectRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ManifestFormat {
    Yaml,
    Json,
}

impl ManifestFormat {
    fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Yaml,
        }
    }
}

impl ContentSnapshot {
    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(raw)?)
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Load a manifest from disk. `.json` files are parsed as JSON, anything else as
    /// YAML. Relative image paths are resolved against the manifest's directory.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read content manifest {}", path.display()))?;
        let mut snapshot = match ManifestFormat::for_path(path) {
            ManifestFormat::Json => Self::from_json_str(&raw),
            ManifestFormat::Yaml => Self::from_yaml_str(&raw),
        }
        .with_context(|| format!("failed to parse content manifest {}", path.display()))?;
        if let Some(base) = path.parent() {
            snapshot.resolve_relative_images(base);
        }
        Ok(snapshot)
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ProjectRecord> {
        self.projects.get(index)
    }

    fn resolve_relative_images(&mut self, base: &Path) {
        for record in &mut self.projects {
            if record.image_url.is_empty() || has_scheme(&record.image_url) {
                continue;
            }
            let candidate = PathBuf::from(&record.image_url);
            if candidate.is_relative() {
                record.image_url = base.join(candidate).to_string_lossy().into_owned();
            }
        }
    }
}

fn has_scheme(raw: &str) -> bool {
    raw.split_once("://").is_some_and(|(scheme, _)| {
        !scheme.is_empty()
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    })
}
