//! `ClusterHandle` backed by the `kubectl` binary.

use std::process::{Output, Stdio};
use std::time::Duration;

use serde::de::DeserializeOwned;
use tokio::process::Command;

use super::{ClusterError, ClusterHandle, Deployment, ResourceKind};
use crate::apptree::Application;
use crate::settings::ClusterSettings;

/// Upper bound for a single kubectl invocation.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs `kubectl` for every cluster call.
#[derive(Debug, Clone)]
pub struct KubectlCluster {
    program: String,
    context: Option<String>,
    timeout: Duration,
}

impl KubectlCluster {
    pub fn new(program: impl Into<String>, context: Option<String>) -> Self {
        Self {
            program: program.into(),
            context,
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub fn from_settings(settings: &ClusterSettings) -> Self {
        Self::new(settings.kubectl.clone(), settings.context.clone())
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Full argument list for one invocation, context flag first.
    fn args<'a>(&'a self, args: &[&'a str]) -> Vec<&'a str> {
        let mut full = Vec::with_capacity(args.len() + 2);
        if let Some(context) = &self.context {
            full.push("--context");
            full.push(context.as_str());
        }
        full.extend_from_slice(args);
        full
    }

    async fn run(&self, args: &[&str]) -> Result<Output, ClusterError> {
        let args = self.args(args);
        tracing::debug!(program = %self.program, args = ?args, "Running kubectl");

        let child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(ClusterError::Command(format!(
                "failed to run {}: {}",
                self.program, e
            ))),
            Err(_) => Err(ClusterError::Command(format!(
                "{} timed out after {}s",
                self.program,
                self.timeout.as_secs()
            ))),
        }
    }

    async fn get<T: DeserializeOwned>(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
    ) -> Result<T, ClusterError> {
        let output = self
            .run(&["get", kind.as_str(), name, "-n", namespace, "-o", "json"])
            .await?;

        if !output.status.success() {
            return Err(command_error(&output, kind, namespace, name));
        }

        serde_json::from_slice(&output.stdout).map_err(|e| ClusterError::Decode {
            kind,
            message: e.to_string(),
        })
    }
}

impl ClusterHandle for KubectlCluster {
    async fn deployment(&self, namespace: &str, name: &str) -> Result<Deployment, ClusterError> {
        self.get(ResourceKind::Deployment, namespace, name).await
    }

    async fn application(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Application, ClusterError> {
        self.get(ResourceKind::Application, namespace, name).await
    }

    async fn delete(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
    ) -> Result<(), ClusterError> {
        let output = self
            .run(&[
                "delete",
                kind.as_str(),
                name,
                "-n",
                namespace,
                "--ignore-not-found",
                "--wait=false",
            ])
            .await?;

        if output.status.success() {
            tracing::info!(kind = %kind, namespace, name, "Deletion requested");
            Ok(())
        } else {
            Err(command_error(&output, kind, namespace, name))
        }
    }
}

/// Maps a failed kubectl run to `NotFound` or a generic command error.
fn command_error(output: &Output, kind: ResourceKind, namespace: &str, name: &str) -> ClusterError {
    let stderr = String::from_utf8_lossy(&output.stderr);
    if stderr.contains("(NotFound)") || stderr.contains("not found") {
        return ClusterError::NotFound {
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
        };
    }

    let message = stderr.trim();
    if message.is_empty() {
        ClusterError::Command(format!(
            "kubectl exited with code {}",
            output.status.code().unwrap_or(-1)
        ))
    } else {
        ClusterError::Command(message.to_string())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    /// Writes a stand-in kubectl that records its arguments and runs `body`.
    fn fake_kubectl(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("kubectl");
        let log = dir.join("args.log");
        let script = format!("#!/bin/sh\necho \"$@\" >> '{}'\n{}\n", log.display(), body);
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn recorded_args(dir: &Path) -> String {
        std::fs::read_to_string(dir.join("args.log")).unwrap()
    }

    #[tokio::test]
    async fn test_get_deployment() {
        let dir = TempDir::new().unwrap();
        let program = fake_kubectl(
            dir.path(),
            r#"echo '{"metadata":{"name":"web"},"spec":{"replicas":2},"status":{"readyReplicas":1}}'"#,
        );
        let cluster = KubectlCluster::new(program.to_string_lossy(), Some("prod".to_string()));

        let deployment = cluster.deployment("shop", "web").await.unwrap();
        assert_eq!(deployment.metadata.name, "web");
        assert!(!deployment.is_ready());
        assert_eq!(
            recorded_args(dir.path()).trim(),
            "--context prod get deployments.apps web -n shop -o json"
        );
    }

    #[tokio::test]
    async fn test_get_application_status() {
        let dir = TempDir::new().unwrap();
        let program = fake_kubectl(
            dir.path(),
            r#"echo '{"apiVersion":"argoproj.io/v1alpha1","kind":"Application","metadata":{"name":"root","namespace":"argocd"},"spec":{},"status":{"sync":{"status":"Synced","revision":"abc"}}}'"#,
        );
        let cluster = KubectlCluster::new(program.to_string_lossy(), None);

        let app = cluster.application("argocd", "root").await.unwrap();
        let sync = app.sync_status().unwrap();
        assert_eq!(sync.status, "Synced");
        assert_eq!(sync.revision, "abc");
    }

    #[tokio::test]
    async fn test_not_found_is_mapped() {
        let dir = TempDir::new().unwrap();
        let program = fake_kubectl(
            dir.path(),
            "echo 'Error from server (NotFound): applications.argoproj.io \"root\" not found' >&2\nexit 1",
        );
        let cluster = KubectlCluster::new(program.to_string_lossy(), None);

        let err = cluster.application("argocd", "root").await.unwrap_err();
        assert!(err.is_not_found(), "got: {err}");
    }

    #[tokio::test]
    async fn test_other_failures_are_command_errors() {
        let dir = TempDir::new().unwrap();
        let program = fake_kubectl(
            dir.path(),
            "echo 'Unable to connect to the server' >&2\nexit 1",
        );
        let cluster = KubectlCluster::new(program.to_string_lossy(), None);

        let err = cluster.deployment("shop", "web").await.unwrap_err();
        assert!(matches!(err, ClusterError::Command(ref m) if m.contains("Unable to connect")));
    }

    #[tokio::test]
    async fn test_garbage_output_is_decode_error() {
        let dir = TempDir::new().unwrap();
        let program = fake_kubectl(dir.path(), "echo 'not json'");
        let cluster = KubectlCluster::new(program.to_string_lossy(), None);

        let err = cluster.deployment("shop", "web").await.unwrap_err();
        assert!(matches!(
            err,
            ClusterError::Decode {
                kind: ResourceKind::Deployment,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_delete_ignores_missing() {
        let dir = TempDir::new().unwrap();
        let program = fake_kubectl(dir.path(), "exit 0");
        let cluster = KubectlCluster::new(program.to_string_lossy(), None);

        cluster
            .delete(ResourceKind::Application, "argocd", "root")
            .await
            .unwrap();
        assert_eq!(
            recorded_args(dir.path()).trim(),
            "delete applications.argoproj.io root -n argocd --ignore-not-found --wait=false"
        );
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let cluster = KubectlCluster::new("/nonexistent/kubectl", None);
        let err = cluster.deployment("shop", "web").await.unwrap_err();
        assert!(matches!(err, ClusterError::Command(_)));
    }
}
