//! Builders for GitOps working trees laid out on disk.

#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

use appgraft::registry::{Config, Environment};
use appgraft::settings::{LabelSettings, Settings};
use appgraft::{Application, GitRepository, WorkflowContext};

pub const REPO_URL: &str = "https://github.com/acme/gitops.git";

/// Renders an Application manifest, labelled as managed when `managed` is set.
pub fn application_yaml(name: &str, source_path: &str, managed: bool) -> String {
    let mut app = Application::new(name, REPO_URL, source_path);
    if managed {
        let labels = LabelSettings::default();
        app.metadata = app
            .metadata
            .with_label(labels.managed_by, labels.managed_by_value)
            .with_label(labels.managed_name, name);
    }
    serde_yaml::to_string(&app).expect("Failed to serialize application")
}

/// Kustomization whose only resource is `base`.
pub fn kustomization_yaml(base: &str) -> String {
    format!("apiVersion: kustomize.config.k8s.io/v1beta1\nkind: Kustomization\nresources:\n  - {base}\n")
}

/// Settings with a short poll interval so cluster waits finish quickly.
pub fn fast_settings() -> Settings {
    let mut settings = Settings::default();
    settings.wait.interval_secs = 1;
    settings.wait.timeout_secs = 10;
    settings
}

/// A temporary directory populated file by file.
pub struct RepoBuilder {
    dir: TempDir,
    environments: Vec<(String, Environment)>,
}

impl RepoBuilder {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
            environments: Vec::new(),
        }
    }

    /// Writes `content` to `rel`, creating parent directories.
    pub fn file(self, rel: &str, content: &str) -> Self {
        let path = self.dir.path().join(rel);
        fs::create_dir_all(path.parent().expect("relative path has a parent"))
            .expect("Failed to create parent directory");
        fs::write(&path, content).expect("Failed to write file");
        self
    }

    /// Writes a managed Application manifest.
    pub fn app(self, rel: &str, name: &str, source_path: &str) -> Self {
        self.file(rel, &application_yaml(name, source_path, true))
    }

    /// Writes an Application manifest without the managed-by label.
    pub fn unmanaged_app(self, rel: &str, name: &str, source_path: &str) -> Self {
        self.file(rel, &application_yaml(name, source_path, false))
    }

    /// Writes a base and one overlay of a kustomize application folder.
    pub fn kustomize_app(self, folder: &str, overlay: &str) -> Self {
        self.file(
            &format!("{folder}/base/kustomization.yaml"),
            "resources:\n  - deployment.yaml\n",
        )
        .file(
            &format!("{folder}/base/deployment.yaml"),
            "apiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: web\n",
        )
        .file(
            &format!("{folder}/overlays/{overlay}/kustomization.yaml"),
            &kustomization_yaml("../../base"),
        )
    }

    /// Registers an environment in the registry written by `build`.
    pub fn environment(mut self, name: &str, root_app_path: &str) -> Self {
        self.environments
            .push((name.to_string(), Environment::new("", root_app_path)));
        self
    }

    /// Persists the registry, if any environment was registered.
    pub fn build(self) -> TempDir {
        if !self.environments.is_empty() {
            let mut registry = Config::new(self.dir.path());
            for (name, env) in self.environments {
                registry
                    .add_environment(&name, env)
                    .expect("Failed to register environment");
            }
        }
        self.dir
    }
}

impl Default for RepoBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A working tree committed to git and pushing to a local bare remote.
pub struct GitFixture {
    pub work: TempDir,
    pub remote: TempDir,
    pub repo: GitRepository,
}

impl GitFixture {
    /// Initialises git in `work`, commits everything and pushes it.
    pub fn new(work: TempDir, settings: &Settings) -> Self {
        let remote = TempDir::new().expect("Failed to create remote directory");
        let output = Command::new("git")
            .args(["init", "--bare"])
            .arg(remote.path())
            .output()
            .expect("Failed to run git");
        assert!(output.status.success(), "git init --bare failed");

        let repo = GitRepository::new(work.path(), settings.git.clone());
        repo.init().expect("Failed to init repository");
        repo.set_remote(remote.path().to_str().expect("utf-8 temp path"))
            .expect("Failed to set remote");
        repo.add(".").expect("Failed to stage");
        repo.commit("Initial layout").expect("Failed to commit");
        repo.push().expect("Failed to push");

        Self { work, remote, repo }
    }

    pub fn context(&self, settings: Settings) -> WorkflowContext {
        WorkflowContext::new(settings, self.work.path())
    }

    pub fn path(&self) -> &Path {
        self.work.path()
    }

    /// SHA of `branch` on the bare remote.
    pub fn remote_sha(&self, branch: &str) -> String {
        let output = Command::new("git")
            .current_dir(self.remote.path())
            .args(["rev-parse", branch])
            .output()
            .expect("Failed to run git");
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }
}

