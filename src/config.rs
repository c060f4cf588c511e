use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::debug;
use serde_derive::Deserialize;

use crate::progress::DEFAULT_MARKER;

/// How to talk to the `kind` binary
#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct KindConfig {
    /// Path to the `kind` executable.
    ///
    /// Default: `kind` (looked up in `$PATH`)
    #[serde(default = "KindConfig::default_path")]
    pub path: PathBuf,
    /// Image repository node versions are resolved against.
    ///
    /// An image version `v1.27.3` becomes `<node_image>:v1.27.3`.
    /// Default: kindest/node
    #[serde(default = "KindConfig::default_node_image")]
    pub node_image: String,
}

impl KindConfig {
    fn default_path() -> PathBuf {
        "kind".into()
    }

    fn default_node_image() -> String {
        "kindest/node".into()
    }
}

impl Default for KindConfig {
    fn default() -> Self {
        Self {
            path: Self::default_path(),
            node_image: Self::default_node_image(),
        }
    }
}

/// Progress display settings
#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct ProgressConfig {
    /// Only output lines starting with this marker are shown as progress.
    ///
    /// Default: •
    #[serde(default = "ProgressConfig::default_marker")]
    pub marker: String,
}

impl ProgressConfig {
    fn default_marker() -> String {
        DEFAULT_MARKER.into()
    }
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            marker: Self::default_marker(),
        }
    }
}

/// Whether an open cluster spec document drives cluster creation
#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum CreatePolicy {
    /// Use an active Kind cluster spec unless launched from the cluster tree
    #[default]
    ActiveDocument,
    /// Always prompt for settings
    AlwaysInteractive,
}

/// Cluster creation settings
#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
pub struct CreateConfig {
    /// Default: active-document
    #[serde(default)]
    pub policy: CreatePolicy,
}

/// Top level configuration
#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Config {
    /// `kind` binary settings.
    #[serde(default)]
    pub kind: KindConfig,
    /// Progress display settings.
    #[serde(default)]
    pub progress: ProgressConfig,
    /// Cluster creation settings.
    #[serde(default)]
    pub create: CreateConfig,
}

impl Config {
    /// Load config from `path`.
    ///
    /// A missing file is not an error; defaults are used instead.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config at {}; using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).context("Failed to read config file")?;
        toml::from_str(&contents).context("Failed to parse config")
    }
}

#[test]
fn test_empty_config_is_default() {
    let config: Config = toml::from_str("").unwrap();
    assert_eq!(config, Config::default());
    assert_eq!(config.kind.path, PathBuf::from("kind"));
    assert_eq!(config.kind.node_image, "kindest/node");
    assert_eq!(config.progress.marker, "•");
    assert_eq!(config.create.policy, CreatePolicy::ActiveDocument);
}

#[test]
fn test_partial_config() {
    let config: Config = toml::from_str(
        r#"
        [kind]
        path = "/opt/bin/kind"

        [create]
        policy = "always-interactive"
        "#,
    )
    .unwrap();
    assert_eq!(config.kind.path, PathBuf::from("/opt/bin/kind"));
    assert_eq!(config.kind.node_image, "kindest/node");
    assert_eq!(config.create.policy, CreatePolicy::AlwaysInteractive);
}

#[test]
fn test_unknown_policy_rejected() {
    let config: Result<Config, _> = toml::from_str(
        r#"
        [create]
        policy = "sometimes"
        "#,
    );
    assert!(config.is_err());
}

#[test]
fn test_missing_file_is_default() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load(&dir.path().join("kindling.toml")).unwrap();
    assert_eq!(config, Config::default());
}
