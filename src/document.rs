use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::debug;
use tempfile::Builder;

/// The document the user is currently editing, if any
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveDocument {
    /// Language of the document, eg. `yaml`
    pub language_id: String,
    /// Current contents, including unsaved edits
    pub text: String,
    /// Whether `text` differs from what is on disk
    pub dirty: bool,
    /// Where the document lives, if it was ever saved
    pub path: Option<PathBuf>,
}

/// Snapshot of a document holding a Kind cluster config
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterSpecDocument {
    /// Cluster config YAML
    pub text: String,
    /// Whether `text` differs from what is on disk
    pub dirty: bool,
    /// Where the document lives, if it was ever saved
    pub path: Option<PathBuf>,
}

/// Language id for a file, going by its extension
fn language_id(path: &Path) -> String {
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => "yaml".into(),
        Some(ext) => ext.to_lowercase(),
        None => "plaintext".into(),
    }
}

/// Whether `text` looks like a Kind cluster config.
///
/// This is a crude textual check, not a YAML parse.
pub fn is_kind_cluster_spec(text: &str) -> bool {
    text.contains("kind: Cluster")
        && (text.contains("apiVersion: kind.x-k8s.io")
            || text.contains("apiVersion: kind.sigs.k8s.io"))
}

impl ActiveDocument {
    /// Open a saved document
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(Self {
            language_id: language_id(path),
            text,
            dirty: false,
            path: Some(path.to_owned()),
        })
    }

    /// Read an unsaved YAML document from `reader`
    pub fn unsaved<R: Read>(mut reader: R) -> Result<Self> {
        let mut text = String::new();
        reader
            .read_to_string(&mut text)
            .context("Failed to read document")?;
        Ok(Self {
            language_id: "yaml".into(),
            text,
            dirty: true,
            path: None,
        })
    }

    /// This document as a cluster spec, if it is one
    pub fn as_cluster_spec(&self) -> Option<ClusterSpecDocument> {
        if self.language_id != "yaml" || !is_kind_cluster_spec(&self.text) {
            return None;
        }

        Some(ClusterSpecDocument {
            text: self.text.clone(),
            dirty: self.dirty,
            path: self.path.clone(),
        })
    }
}

/// Call `f` with a path holding `document`'s current text.
///
/// Saved, clean documents are used in place. Anything else is written to
/// a temporary file that lives until `f` returns.
pub fn with_cluster_spec<T, F>(document: &ClusterSpecDocument, f: F) -> Result<T>
where
    F: FnOnce(&Path) -> T,
{
    if let (false, Some(path)) = (document.dirty, &document.path) {
        return Ok(f(path));
    }

    let mut spec = Builder::new()
        .prefix("kind-cluster")
        .suffix(".yaml")
        .rand_bytes(5)
        .tempfile()
        .context("Failed to create tempfile")?;
    spec.write_all(document.text.as_bytes())
        .context("Failed to write cluster spec to tempfile")?;
    spec.flush().context("Failed to flush cluster spec")?;
    debug!("Wrote unsaved cluster spec to {}", spec.path().display());

    Ok(f(spec.path()))
}
