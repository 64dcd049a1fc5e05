//! Named genome assemblies: which annotation table and FASTA to load.
//!
//! The registry is a JSON object keyed by assembly name:
//!
//! ```json
//! {
//!   "grch38": {
//!     "assembly": "GRCh38",
//!     "annotation": "annotations/grch38.txt",
//!     "fasta_env": "GRCH38_FASTA",
//!     "fasta_path": "/data/hg38.fa"
//!   }
//! }
//! ```
//!
//! Relative paths resolve against the registry file's directory. When
//! `fasta_env` names a set variable its value wins over `fasta_path`.

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblyEntry {
    pub assembly: String,
    pub annotation: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fasta_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fasta_env: Option<String>,
}

/// Concrete file locations for one assembly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedAssembly {
    pub name: String,
    pub assembly: String,
    pub annotation: PathBuf,
    pub fasta: PathBuf,
}

#[derive(Debug, Clone, Default)]
pub struct AssemblyRegistry {
    base_dir: PathBuf,
    entries: BTreeMap<String, AssemblyEntry>,
}

impl AssemblyRegistry {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read registry {}", path.display()))?;
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let registry = Self::from_json(&text, base_dir)
            .with_context(|| format!("invalid registry {}", path.display()))?;
        tracing::info!(
            assemblies = registry.entries.len(),
            path = %path.display(),
            "loaded assembly registry"
        );
        Ok(registry)
    }

    pub fn from_json(text: &str, base_dir: impl Into<PathBuf>) -> Result<Self> {
        let entries: BTreeMap<String, AssemblyEntry> = serde_json::from_str(text)?;
        Ok(Self {
            base_dir: base_dir.into(),
            entries,
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn get(&self, name: &str) -> Option<&AssemblyEntry> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve `name` using the process environment for `fasta_env`.
    pub fn resolve(&self, name: &str) -> Result<ResolvedAssembly> {
        self.resolve_with(name, |key| std::env::var_os(key))
    }

    /// Resolve `name`, looking up environment variables through `env`.
    pub fn resolve_with<F>(&self, name: &str, env: F) -> Result<ResolvedAssembly>
    where
        F: Fn(&str) -> Option<OsString>,
    {
        let entry = self.entries.get(name).ok_or_else(|| {
            let known: Vec<&str> = self.names().collect();
            anyhow!("unknown assembly '{}' (known: {})", name, known.join(", "))
        })?;

        let from_env = entry
            .fasta_env
            .as_deref()
            .and_then(|key| env(key))
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        let fasta = match (from_env, &entry.fasta_path) {
            (Some(p), _) => p,
            (None, Some(p)) => self.base_dir.join(p),
            (None, None) => bail!(
                "assembly '{}' has no FASTA: set {} or fasta_path",
                name,
                entry.fasta_env.as_deref().unwrap_or("fasta_env")
            ),
        };

        Ok(ResolvedAssembly {
            name: name.to_string(),
            assembly: entry.assembly.clone(),
            annotation: self.base_dir.join(&entry.annotation),
            fasta,
        })
    }

    /// Check that every assembly resolves to an existing FASTA and annotation file.
    pub fn validate(&self) -> Result<()> {
        self.validate_with(|key| std::env::var_os(key))
    }

    pub fn validate_with<F>(&self, env: F) -> Result<()>
    where
        F: Fn(&str) -> Option<OsString>,
    {
        for name in self.entries.keys() {
            let resolved = self.resolve_with(name, &env)?;
            if !resolved.fasta.is_file() {
                bail!(
                    "FASTA for assembly '{}' not found at {}",
                    name,
                    resolved.fasta.display()
                );
            }
            if !resolved.annotation.is_file() {
                bail!(
                    "annotation for assembly '{}' not found at {}",
                    name,
                    resolved.annotation.display()
                );
            }
        }
        Ok(())
    }
}
