//! Error types for registry, tree, install and readiness operations.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::cluster::ClusterError;

/// Errors that can occur while managing a GitOps working tree.
#[derive(Error, Debug)]
pub enum GraftError {
    #[error("No prior installation found: registry '{0}' does not exist")]
    ConfigNotFound(PathBuf),

    #[error("Environment '{0}' already exists")]
    EnvironmentAlreadyExists(String),

    #[error("Environment '{0}' does not exist")]
    EnvironmentNotExist(String),

    #[error("Registry has no environments to merge into")]
    NoEnvironments,

    #[error("Application '{0}' not found in managed tree")]
    AppNotFound(String),

    #[error("Failed to read file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read directory '{path}': {source}")]
    ReadDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse YAML in '{path}': {message}")]
    ParseYaml { path: PathBuf, message: String },

    #[error("Failed to serialize YAML: {0}")]
    SerializeYaml(String),

    #[error("Invalid manifest '{path}': {message}")]
    InvalidManifest { path: PathBuf, message: String },

    #[error("Kustomization '{0}' has no resources to use as a shared base")]
    MissingKustomizeBase(PathBuf),

    #[error("Install would overwrite '{path}': {message}")]
    InstallConflict { path: PathBuf, message: String },

    #[error("Failed to copy '{from}' to '{to}': {message}")]
    CopyDir {
        from: PathBuf,
        to: PathBuf,
        message: String,
    },

    #[error("Git operation failed: {0}")]
    GitOperation(String),

    #[error("Git repository not initialized")]
    GitNotInitialized,

    #[error("Git authentication failed: {0}")]
    GitAuthFailed(String),

    #[error("Cluster error: {0}")]
    Cluster(#[from] ClusterError),

    #[error("Timed out after {}s waiting for: {}", timeout.as_secs_f64(), pending.join(", "))]
    WaitTimedOut {
        timeout: Duration,
        pending: Vec<String>,
    },

    #[error("Invalid settings in '{path}': {message}")]
    Settings { path: PathBuf, message: String },
}

impl GraftError {
    /// Returns true if callers are expected to branch on this error rather than abort.
    ///
    /// `AppNotFound` selects the installer's "new app" path.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, GraftError::AppNotFound(_))
    }
}

/// Classifies a git stderr string into a more specific error variant.
pub fn classify_git_error(stderr: &str) -> GraftError {
    let lower = stderr.to_lowercase();

    if lower.contains("authentication failed")
        || lower.contains("permission denied")
        || lower.contains("invalid credentials")
        || lower.contains("could not read username")
    {
        return GraftError::GitAuthFailed(stderr.trim().to_string());
    }

    GraftError::GitOperation(stderr.trim().to_string())
}

/// Result type for appgraft operations.
pub type Result<T> = std::result::Result<T, GraftError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_not_found_is_recoverable() {
        assert!(GraftError::AppNotFound("web".to_string()).is_recoverable());
        assert!(!GraftError::EnvironmentNotExist("prod".to_string()).is_recoverable());
        assert!(!GraftError::ConfigNotFound(PathBuf::from("appgraft.yaml")).is_recoverable());
    }

    #[test]
    fn test_wait_timed_out_lists_pending() {
        let err = GraftError::WaitTimedOut {
            timeout: Duration::from_millis(1500),
            pending: vec!["argocd/root".to_string(), "web/api".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("1.5s"), "got: {msg}");
        assert!(msg.contains("argocd/root, web/api"), "got: {msg}");
    }

    #[test]
    fn test_classify_git_error_auth() {
        let err = classify_git_error("fatal: Authentication failed for 'https://example.com'");
        assert!(matches!(err, GraftError::GitAuthFailed(_)));
    }

    #[test]
    fn test_classify_git_error_generic() {
        let err = classify_git_error("fatal: not a git repository\n");
        match err {
            GraftError::GitOperation(msg) => assert_eq!(msg, "fatal: not a git repository"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_errors_carry_path_context() {
        let err = GraftError::ParseYaml {
            path: PathBuf::from("apps/web.yaml"),
            message: "did not find expected key".to_string(),
        };
        assert!(err.to_string().contains("apps/web.yaml"));
    }
}
