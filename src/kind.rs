use std::path::Path;
use std::sync::mpsc::Receiver;
use std::sync::Arc;

use crate::config::KindConfig;
use crate::output::{Errorable, ProcessEvent};
use crate::tracker::{exec, track, CommandLog, Invocation};

/// A cluster `kind` knows about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterInfo {
    /// Cluster name, as passed to `--name`
    pub name: String,
}

/// Settings for creating a cluster without a config file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterSettings {
    /// Cluster name
    pub name: String,
    /// Node image version (eg. `v1.27.3`). `None` means kind's default.
    pub image: Option<String>,
}

impl ClusterSettings {
    /// Build settings from raw user input. A blank image means the default.
    pub fn new<S: Into<String>>(name: S, image: Option<&str>) -> Self {
        let image = image
            .map(str::trim)
            .filter(|i| !i.is_empty())
            .map(String::from);
        Self {
            name: name.into(),
            image,
        }
    }
}

/// Thin client over the `kind` binary
#[derive(Clone)]
pub struct Kind {
    config: KindConfig,
    log: Arc<dyn CommandLog>,
}

/// Parse `kind get clusters` output
fn parse_clusters(stdout: &str) -> Vec<ClusterInfo> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|l| ClusterInfo {
            name: l.to_string(),
        })
        .collect()
}

impl Kind {
    /// Construct a new client
    pub fn new(config: &KindConfig, log: Arc<dyn CommandLog>) -> Self {
        Self {
            config: config.clone(),
            log,
        }
    }

    fn invocation(&self, command: &[&str]) -> Invocation {
        Invocation::new(&self.config.path).args(command.iter().copied())
    }

    fn invoke(&self, command: &[&str], args: &[&str]) -> Errorable<String> {
        let description = format!("kind {}", command.join(" "));
        let invocation = self.invocation(command).args(args.iter().copied());
        exec(&invocation, &description, self.log.clone())
    }

    /// Full image reference for a node version
    fn node_image(&self, version: &str) -> String {
        format!("{}:{}", self.config.node_image, version)
    }

    /// List existing clusters
    pub fn get_clusters(&self) -> Errorable<Vec<ClusterInfo>> {
        self.invoke(&["get", "clusters"], &[])
            .map(|stdout| parse_clusters(&stdout))
    }

    /// Get the kubeconfig YAML for a cluster.
    ///
    /// Line endings are normalised and the trailing newline dropped, see
    /// [`exec`](crate::tracker::exec).
    pub fn get_kubeconfig(&self, name: &str) -> Errorable<String> {
        self.invoke(&["get", "kubeconfig"], &["--name", name])
    }

    /// `kind version` output
    pub fn version(&self) -> Errorable<String> {
        self.invoke(&["version"], &[])
            .map(|stdout| stdout.trim().to_string())
    }

    /// Arguments for `kind create cluster` from settings
    pub fn create_invocation(&self, settings: &ClusterSettings) -> Invocation {
        let mut i = self
            .invocation(&["create", "cluster"])
            .args(["--name", settings.name.as_str()]);
        if let Some(version) = &settings.image {
            i = i.args(["--image".to_string(), self.node_image(version)]);
        }
        i
    }

    /// Start creating a cluster from settings
    pub fn create_cluster(&self, settings: &ClusterSettings) -> Receiver<ProcessEvent> {
        track(&self.create_invocation(settings), self.log.clone())
    }

    /// Start creating a cluster from a Kind cluster config file
    pub fn create_cluster_from_config(&self, path: &Path) -> Receiver<ProcessEvent> {
        let invocation = self
            .invocation(&["create", "cluster"])
            .arg("--config")
            .arg(path.display().to_string());
        track(&invocation, self.log.clone())
    }

    /// Start deleting a cluster
    pub fn delete_cluster(&self, name: &str) -> Receiver<ProcessEvent> {
        let invocation = self
            .invocation(&["delete", "cluster"])
            .args(["--name", name]);
        track(&invocation, self.log.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::LogCommandLog;
    use rstest::rstest;

    fn kind() -> Kind {
        Kind::new(&KindConfig::default(), Arc::new(LogCommandLog))
    }

    #[test]
    fn test_parse_clusters_is_defensive() {
        let clusters = parse_clusters("  kind \n\n\ndev\r\n   \n");
        assert_eq!(
            clusters,
            vec![
                ClusterInfo {
                    name: "kind".into()
                },
                ClusterInfo { name: "dev".into() },
            ]
        );
        assert!(parse_clusters("").is_empty());
    }

    #[rstest]
    #[case(None, "$ kind create cluster --name kind")]
    #[case(Some(""), "$ kind create cluster --name kind")]
    #[case(Some("  "), "$ kind create cluster --name kind")]
    #[case(
        Some("v1.27.3"),
        "$ kind create cluster --name kind --image kindest/node:v1.27.3"
    )]
    fn test_create_invocation(#[case] image: Option<&str>, #[case] expected: &str) {
        let settings = ClusterSettings::new("kind", image);
        assert_eq!(kind().create_invocation(&settings).to_string(), expected);
    }

    #[test]
    fn test_custom_node_image() {
        let config = KindConfig {
            node_image: "registry.local/node".into(),
            ..Default::default()
        };
        let kind = Kind::new(&config, Arc::new(LogCommandLog));
        let i = kind.create_invocation(&ClusterSettings::new("dev", Some("v1.30.0")));
        assert_eq!(
            i.arguments(),
            ["create", "cluster", "--name", "dev", "--image", "registry.local/node:v1.30.0"]
        );
    }

    #[test]
    fn test_missing_binary_is_diagnostic() {
        let config = KindConfig {
            path: "/nonexistent/kind".into(),
            ..Default::default()
        };
        let kind = Kind::new(&config, Arc::new(LogCommandLog));
        let err = kind.get_clusters().unwrap_err();
        assert!(err.first().starts_with("kind get clusters error:"));
    }
}
