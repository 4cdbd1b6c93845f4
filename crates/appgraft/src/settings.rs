//! Tool settings: label conventions, wait timings, git identity and cluster access.
//!
//! Settings are read from `$APPGRAFT_SETTINGS`, then from
//! `<config_dir>/appgraft/settings.yaml`, and fall back to built-in defaults.
//! Every field has its own default so partial files are valid.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{GraftError, Result};

/// Env var pointing at an explicit settings file.
pub const SETTINGS_ENV_VAR: &str = "APPGRAFT_SETTINGS";
/// Env var overriding `cluster.context`.
pub const KUBE_CONTEXT_ENV_VAR: &str = "APPGRAFT_KUBE_CONTEXT";
/// Env var overriding `wait.timeoutSecs`.
pub const WAIT_TIMEOUT_ENV_VAR: &str = "APPGRAFT_WAIT_TIMEOUT_SECS";

/// Top-level tool settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub labels: LabelSettings,

    #[serde(default)]
    pub wait: WaitSettings,

    #[serde(default)]
    pub git: GitSettings,

    #[serde(default)]
    pub cluster: ClusterSettings,
}

/// Label keys used to recognise nodes this tool owns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LabelSettings {
    /// Label key carrying the managed-by marker.
    #[serde(default = "default_managed_by")]
    pub managed_by: String,

    /// Value of the managed-by label that marks a node as ours.
    #[serde(default = "default_managed_by_value")]
    pub managed_by_value: String,

    /// Label key carrying the application's stable name across environments.
    #[serde(default = "default_managed_name")]
    pub managed_name: String,
}

fn default_managed_by() -> String {
    "app.kubernetes.io/managed-by".to_string()
}

fn default_managed_by_value() -> String {
    "appgraft".to_string()
}

fn default_managed_name() -> String {
    "appgraft.io/app-name".to_string()
}

impl Default for LabelSettings {
    fn default() -> Self {
        Self {
            managed_by: default_managed_by(),
            managed_by_value: default_managed_by_value(),
            managed_name: default_managed_name(),
        }
    }
}

/// Polling cadence for readiness waits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WaitSettings {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_interval_secs() -> u64 {
    5
}

fn default_timeout_secs() -> u64 {
    300
}

impl Default for WaitSettings {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl WaitSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Git identity, remote and authentication.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GitSettings {
    #[serde(default = "default_remote")]
    pub remote: String,

    #[serde(default = "default_branch")]
    pub branch: String,

    #[serde(default = "default_user_name")]
    pub user_name: String,

    #[serde(default = "default_user_email")]
    pub user_email: String,

    #[serde(default)]
    pub auth: GitAuthSettings,
}

fn default_remote() -> String {
    "origin".to_string()
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_user_name() -> String {
    "appgraft".to_string()
}

fn default_user_email() -> String {
    "appgraft@localhost".to_string()
}

impl Default for GitSettings {
    fn default() -> Self {
        Self {
            remote: default_remote(),
            branch: default_branch(),
            user_name: default_user_name(),
            user_email: default_user_email(),
            auth: GitAuthSettings::default(),
        }
    }
}

/// Git push authentication. An empty `token_env_var` disables token auth.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GitAuthSettings {
    /// Environment variable holding an HTTPS access token.
    #[serde(default)]
    pub token_env_var: String,

    /// Username presented alongside the token.
    #[serde(default)]
    pub username: Option<String>,
}

/// How the cluster is reached.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSettings {
    #[serde(default = "default_kubectl")]
    pub kubectl: String,

    #[serde(default)]
    pub context: Option<String>,

    /// Namespace the Application controller runs in.
    #[serde(default = "default_argocd_namespace")]
    pub argocd_namespace: String,
}

fn default_kubectl() -> String {
    "kubectl".to_string()
}

fn default_argocd_namespace() -> String {
    "argocd".to_string()
}

impl Default for ClusterSettings {
    fn default() -> Self {
        Self {
            kubectl: default_kubectl(),
            context: None,
            argocd_namespace: default_argocd_namespace(),
        }
    }
}

impl Settings {
    /// Loads settings from the default location, then applies env overrides.
    pub fn load() -> Result<Self> {
        Self::load_with(None)
    }

    /// Loads settings from `path` when given, else from the default location.
    /// Env overrides apply either way.
    pub fn load_with(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => Self::load_from(path)?,
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::load_from(&path)?,
                _ => Self::default(),
            },
        };
        settings.apply_env_overrides()?;
        Ok(settings)
    }

    /// Loads settings from an explicit file. No env overrides are applied.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| GraftError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let settings: Self = serde_yaml::from_str(&content).map_err(|e| GraftError::Settings {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        settings.validate(path)?;
        Ok(settings)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if self.wait.interval_secs == 0 {
            return Err(GraftError::Settings {
                path: path.to_path_buf(),
                message: "wait.intervalSecs must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Returns the settings file path that `load` consults.
    pub fn default_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(SETTINGS_ENV_VAR) {
            return Some(PathBuf::from(path));
        }
        dirs::config_dir().map(|dir| dir.join("appgraft").join("settings.yaml"))
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(context) = std::env::var(KUBE_CONTEXT_ENV_VAR) {
            if !context.is_empty() {
                self.cluster.context = Some(context);
            }
        }

        if let Ok(raw) = std::env::var(WAIT_TIMEOUT_ENV_VAR) {
            self.wait.timeout_secs = raw.trim().parse().map_err(|_| GraftError::Settings {
                path: PathBuf::from(format!("${}", WAIT_TIMEOUT_ENV_VAR)),
                message: format!("expected a number of seconds, got '{}'", raw),
            })?;
        }

        Ok(())
    }
}
