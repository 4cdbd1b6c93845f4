//! Per-invocation state shared by the install and uninstall workflows.

use std::path::{Path, PathBuf};

use crate::apptree::AppTree;
use crate::error::Result;
use crate::git::GitRepository;
use crate::readiness::WaitOptions;
use crate::registry::Config;
use crate::settings::Settings;

/// Everything a workflow needs, built once per command run and passed down.
#[derive(Debug, Clone)]
pub struct WorkflowContext {
    pub settings: Settings,
    /// Checkout of the GitOps repository being mutated.
    pub work_tree: PathBuf,
    /// Skip pushes and cluster mutations; waits converge immediately.
    pub dry_run: bool,
}

impl WorkflowContext {
    pub fn new(settings: Settings, work_tree: impl Into<PathBuf>) -> Self {
        Self {
            settings,
            work_tree: work_tree.into(),
            dry_run: false,
        }
    }

    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn work_tree(&self) -> &Path {
        &self.work_tree
    }

    /// Tree walker over the working tree.
    pub fn tree(&self) -> AppTree {
        AppTree::new(&self.work_tree, self.settings.labels.clone())
    }

    /// Loads the registry. Fails with `ConfigNotFound` if nothing is installed.
    pub fn registry(&self) -> Result<Config> {
        Config::load(&self.work_tree)
    }

    pub fn git(&self) -> GitRepository {
        GitRepository::new(&self.work_tree, self.settings.git.clone())
    }

    pub fn wait_options(&self) -> WaitOptions {
        WaitOptions::from_settings(&self.settings.wait, self.dry_run)
    }
}
