//! Environment registry stored at the root of the GitOps working tree.
//!
//! The registry records every installed environment and the path of its root
//! Application manifest. It is created on first install and rewritten on every
//! add/remove.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{GraftError, Result};

/// File name of the registry, relative to the working-tree root.
pub const REGISTRY_FILE: &str = "appgraft.yaml";

/// The only registry schema version this tool reads and writes.
pub const REGISTRY_VERSION: &str = "1.0";

/// One installed environment. Its name is the registry map key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    /// Source template URL and ref the environment was rendered from.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub template_ref: String,

    /// Root Application manifest, relative to the working-tree root.
    pub root_app_path: String,
}

impl Environment {
    pub fn new(template_ref: impl Into<String>, root_app_path: impl Into<String>) -> Self {
        Self {
            template_ref: template_ref.into(),
            root_app_path: root_app_path.into(),
        }
    }

    /// Returns the root manifest path as a `Path`.
    pub fn root_app_path(&self) -> &Path {
        Path::new(&self.root_app_path)
    }
}

/// The environment registry bound to a working tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip)]
    root_path: PathBuf,

    pub version: String,

    #[serde(default)]
    pub environments: BTreeMap<String, Environment>,
}

impl Config {
    /// Creates an empty registry for a working tree that has none yet.
    pub fn new(root_path: impl Into<PathBuf>) -> Self {
        Self {
            root_path: root_path.into(),
            version: REGISTRY_VERSION.to_string(),
            environments: BTreeMap::new(),
        }
    }

    /// Loads the registry from `root_path`.
    ///
    /// Returns `ConfigNotFound` when the working tree has never been installed into.
    pub fn load(root_path: impl Into<PathBuf>) -> Result<Self> {
        let root_path = root_path.into();
        let path = root_path.join(REGISTRY_FILE);

        if !path.exists() {
            return Err(GraftError::ConfigNotFound(path));
        }

        let content = fs::read_to_string(&path).map_err(|e| GraftError::ReadFile {
            path: path.clone(),
            source: e,
        })?;

        let mut config: Config =
            serde_yaml::from_str(&content).map_err(|e| GraftError::ParseYaml {
                path: path.clone(),
                message: e.to_string(),
            })?;

        if config.version != REGISTRY_VERSION {
            return Err(GraftError::ParseYaml {
                path,
                message: format!(
                    "unsupported registry version '{}', expected '{}'",
                    config.version, REGISTRY_VERSION
                ),
            });
        }

        config.root_path = root_path;
        Ok(config)
    }

    /// Loads the registry, or returns an empty one when none exists yet.
    pub fn load_or_init(root_path: impl Into<PathBuf>) -> Result<Self> {
        let root_path = root_path.into();
        match Self::load(&root_path) {
            Err(GraftError::ConfigNotFound(_)) => Ok(Self::new(root_path)),
            other => other,
        }
    }

    /// Writes the registry back to the working tree it was loaded from.
    pub fn persist(&self) -> Result<()> {
        let path = self.registry_path();
        let content =
            serde_yaml::to_string(self).map_err(|e| GraftError::SerializeYaml(e.to_string()))?;

        // Temp file then rename so a failed write never truncates the registry.
        let temp_path = path.with_extension("yaml.tmp");
        fs::write(&temp_path, content).map_err(|e| GraftError::WriteFile {
            path: temp_path.clone(),
            source: e,
        })?;
        fs::rename(&temp_path, &path).map_err(|e| GraftError::WriteFile {
            path: path.clone(),
            source: e,
        })?;

        tracing::debug!(path = %path.display(), environments = self.environments.len(), "Registry persisted");
        Ok(())
    }

    /// Registers a new environment and persists the registry.
    pub fn add_environment(&mut self, name: &str, env: Environment) -> Result<()> {
        if self.environments.contains_key(name) {
            return Err(GraftError::EnvironmentAlreadyExists(name.to_string()));
        }

        self.environments.insert(name.to_string(), env);
        if let Err(e) = self.persist() {
            self.environments.remove(name);
            return Err(e);
        }

        tracing::info!(env = name, "Environment registered");
        Ok(())
    }

    /// Removes an environment and persists the registry.
    pub fn delete_environment(&mut self, name: &str) -> Result<Environment> {
        let removed = self
            .environments
            .remove(name)
            .ok_or_else(|| GraftError::EnvironmentNotExist(name.to_string()))?;

        if let Err(e) = self.persist() {
            self.environments.insert(name.to_string(), removed);
            return Err(e);
        }

        tracing::info!(env = name, "Environment removed");
        Ok(removed)
    }

    /// Looks up an environment by name.
    pub fn environment(&self, name: &str) -> Result<&Environment> {
        self.environments
            .get(name)
            .ok_or_else(|| GraftError::EnvironmentNotExist(name.to_string()))
    }

    /// Iterates environments in name order.
    pub fn environments(&self) -> impl Iterator<Item = (&str, &Environment)> {
        self.environments.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// The lexically first registered environment.
    pub fn first_environment(&self) -> Option<(&str, &Environment)> {
        self.environments().next()
    }

    /// Like `first_environment`, but an empty registry is an error.
    pub fn require_first_environment(&self) -> Result<(&str, &Environment)> {
        self.first_environment().ok_or(GraftError::NoEnvironments)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.environments.contains_key(name)
    }

    /// The working-tree root this registry is bound to.
    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    /// Absolute path of the registry file.
    pub fn registry_path(&self) -> PathBuf {
        self.root_path.join(REGISTRY_FILE)
    }
}
