//! Where baselines come from.
//!
//! The controller only needs a raw document per manifest kind; how it is
//! transported is the host's business. [`DirectorySource`] covers the common
//! local case: a checked-out site whose content root holds `index.yaml` and
//! `tabs.yaml` (`.yml` accepted as a fallback, as the site loader does).

use crate::types::Kind;
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("No {kind} manifest found under {}", root.display())]
    NotFound { kind: Kind, root: PathBuf },
    #[error("Manifest source unavailable: {0}")]
    Unavailable(String),
}

/// Supplies the raw remote document for a manifest kind.
///
/// Implementations must not retry; the caller owns retry policy. The
/// returned value may be any shape; it goes through
/// [`normalize`](crate::normalize::normalize) before use.
#[allow(async_fn_in_trait)]
pub trait ManifestSource {
    async fn fetch(&self, kind: Kind) -> Result<Value, SourceError>;
}

/// Reads manifests from a content root on disk.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Candidate file paths for a kind, in lookup order.
    pub fn candidates(&self, kind: Kind) -> [PathBuf; 2] {
        let stem = kind.as_str();
        [
            self.root.join(format!("{stem}.yaml")),
            self.root.join(format!("{stem}.yml")),
        ]
    }

    /// Synchronous read used by the async [`ManifestSource`] impl.
    pub fn read(&self, kind: Kind) -> Result<Value, SourceError> {
        for path in self.candidates(kind) {
            if !path.is_file() {
                continue;
            }
            let content = std::fs::read_to_string(&path)?;
            debug!("Read {} manifest from {}", kind, path.display());
            if content.trim().is_empty() {
                return Ok(Value::Object(Default::default()));
            }
            return Ok(serde_yaml::from_str(&content)?);
        }
        Err(SourceError::NotFound {
            kind,
            root: self.root.clone(),
        })
    }
}

impl ManifestSource for DirectorySource {
    async fn fetch(&self, kind: Kind) -> Result<Value, SourceError> {
        self.read(kind)
    }
}
