//! Git repository operations.
//!
//! Every operation shells out to the `git` binary in the repository directory.
//! Commands that reach the remote run with the auth environment from
//! [`build_auth_env`].

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use super::auth::{build_auth_env, AuthEnv};
use super::parse::{failure_message, first_line};
use super::types::CommitResult;
use crate::error::{classify_git_error, GraftError, Result};
use crate::settings::GitSettings;

/// Git repository operations.
pub struct GitRepository {
    /// Path to the git working tree.
    repo_path: PathBuf,
    /// Git settings.
    pub(crate) settings: GitSettings,
}

impl GitRepository {
    /// Creates a new git repository handle.
    pub fn new(repo_path: impl Into<PathBuf>, settings: GitSettings) -> Self {
        Self {
            repo_path: repo_path.into(),
            settings,
        }
    }

    /// Clones `url` at the configured branch into `dest`.
    pub fn clone_into(url: &str, dest: impl Into<PathBuf>, settings: GitSettings) -> Result<Self> {
        let dest = dest.into();
        let auth = build_auth_env(&settings.auth)?;

        let mut cmd = Command::new("git");
        cmd.arg("clone")
            .args(["--branch", &settings.branch, "--single-branch"])
            .arg(url)
            .arg(&dest);
        for (key, value) in &auth.env_vars {
            cmd.env(key, value);
        }

        let output = cmd
            .output()
            .map_err(|e| GraftError::GitOperation(e.to_string()))?;
        drop(auth);

        if !output.status.success() {
            return Err(classify_git_error(&failure_message(&output)));
        }

        log::info!("Cloned {} into {}", url, dest.display());
        let repo = Self::new(dest, settings);
        repo.configure_identity();
        Ok(repo)
    }

    /// Returns the repository path.
    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    /// Returns the configured branch name.
    pub fn branch(&self) -> &str {
        &self.settings.branch
    }

    /// Checks if the directory is a git repository.
    pub fn is_git_repo(&self) -> bool {
        self.repo_path.join(".git").exists()
    }

    /// Initializes a git repository if one doesn't exist.
    pub fn init(&self) -> Result<()> {
        if self.is_git_repo() {
            return Ok(());
        }

        let output = self.run_git(&["init", "--initial-branch", &self.settings.branch])?;
        if !output.status.success() {
            return Err(GraftError::GitOperation(failure_message(&output)));
        }

        self.configure_identity();
        Ok(())
    }

    /// Sets the URL of the configured remote, adding it if missing.
    pub fn set_remote(&self, url: &str) -> Result<()> {
        let remote = self.settings.remote.as_str();
        let remote_exists = self
            .run_git(&["remote", "get-url", remote])
            .map(|output| output.status.success())
            .unwrap_or(false);

        let output = if remote_exists {
            self.run_git(&["remote", "set-url", remote, url])?
        } else {
            self.run_git(&["remote", "add", remote, url])?
        };

        if output.status.success() {
            Ok(())
        } else {
            Err(GraftError::GitOperation(failure_message(&output)))
        }
    }

    /// Stages changes matching `pattern`, including deletions.
    pub fn add(&self, pattern: &str) -> Result<()> {
        self.ensure_repo()?;

        let output = self.run_git(&["add", "--all", "--", pattern])?;
        if output.status.success() {
            Ok(())
        } else {
            Err(GraftError::GitOperation(failure_message(&output)))
        }
    }

    /// Returns true if the index differs from HEAD.
    pub fn has_staged_changes(&self) -> Result<bool> {
        self.ensure_repo()?;

        let output = self.run_git(&["diff", "--cached", "--quiet"])?;
        match output.status.code() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(GraftError::GitOperation(failure_message(&output))),
        }
    }

    /// Commits whatever is staged.
    ///
    /// Returns a result without a hash when nothing is staged.
    pub fn commit(&self, message: &str) -> Result<CommitResult> {
        if !self.has_staged_changes()? {
            log::debug!("Nothing staged in {}", self.repo_path.display());
            return Ok(CommitResult::nothing_to_commit());
        }

        let output = self.run_git(&["commit", "--no-gpg-sign", "-m", message])?;
        if !output.status.success() {
            return Err(GraftError::GitOperation(failure_message(&output)));
        }

        let commit_hash = self.head_sha()?;
        log::info!("Committed {}: {}", commit_hash, message);

        Ok(CommitResult {
            message: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            commit_hash: Some(commit_hash),
        })
    }

    /// Full SHA of the current HEAD commit.
    pub fn head_sha(&self) -> Result<String> {
        self.ensure_repo()?;

        let output = self.run_git(&["rev-parse", "HEAD"])?;
        if output.status.success() {
            Ok(first_line(&output))
        } else {
            Err(GraftError::GitOperation(failure_message(&output)))
        }
    }

    /// Pushes HEAD to the configured branch on the configured remote.
    pub fn push(&self) -> Result<()> {
        self.ensure_repo()?;

        let auth = self.get_auth_env()?;
        let refspec = format!("HEAD:{}", self.settings.branch);

        let mut cmd = Command::new("git");
        cmd.current_dir(&self.repo_path)
            .args(["push", &self.settings.remote, &refspec]);
        for (key, value) in &auth.env_vars {
            cmd.env(key, value);
        }

        let output = cmd
            .output()
            .map_err(|e| GraftError::GitOperation(e.to_string()))?;

        // Drop auth env (cleanup guard) after command completes
        drop(auth);

        if output.status.success() {
            log::info!("Pushed to {}/{}", self.settings.remote, self.settings.branch);
            Ok(())
        } else {
            Err(classify_git_error(&failure_message(&output)))
        }
    }

    // ========================================================================
    // Private helpers
    // ========================================================================

    fn ensure_repo(&self) -> Result<()> {
        if self.is_git_repo() {
            Ok(())
        } else {
            Err(GraftError::GitNotInitialized)
        }
    }

    fn configure_identity(&self) {
        if let Err(e) = self.run_git(&["config", "user.email", &self.settings.user_email]) {
            log::warn!("Failed to set git user.email: {}", e);
        }
        if let Err(e) = self.run_git(&["config", "user.name", &self.settings.user_name]) {
            log::warn!("Failed to set git user.name: {}", e);
        }
    }

    /// Runs a git command in the repository directory.
    fn run_git(&self, args: &[&str]) -> Result<Output> {
        let output = Command::new("git")
            .current_dir(&self.repo_path)
            .args(args)
            .output()
            .map_err(|e| GraftError::GitOperation(e.to_string()))?;

        Ok(output)
    }

    fn get_auth_env(&self) -> Result<AuthEnv> {
        build_auth_env(&self.settings.auth)
    }
}
