//! Merging a freshly rendered environment into an existing GitOps tree.
//!
//! For each leaf application of the new environment:
//!
//! - if the destination tree already has a managed application with the same
//!   managed name, the leaf becomes a new overlay next to that application's
//!   existing overlays, sharing its kustomize base;
//! - otherwise the leaf's whole application folder (base and overlays) is
//!   copied over as a new application.
//!
//! The new environment's root app-of-apps directory is then merged into the
//! directory holding the first registered environment's root application, and
//! the environment is registered.
//!
//! The merge is not transactional. A failure part way through leaves the
//! working tree partially modified; discard the checkout instead of retrying
//! in place.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, info_span, warn};

use crate::apptree::{write_application, AppNode, AppTree, Application, Kustomization};
use crate::error::{GraftError, Result};
use crate::fsutil::{clean_path, conflicting_files, copy_dir, to_slash};
use crate::git::CommitResult;
use crate::registry::{Config, Environment};
use crate::workflow::WorkflowContext;

/// A rendered environment waiting to be merged.
#[derive(Debug, Clone)]
pub struct NewEnvironment {
    pub name: String,
    /// Root of the rendered tree.
    pub source_root: PathBuf,
    /// Root Application manifest, relative to `source_root`.
    pub root_app_path: String,
    pub template_ref: String,
}

impl NewEnvironment {
    pub fn new(
        name: impl Into<String>,
        source_root: impl Into<PathBuf>,
        root_app_path: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            source_root: source_root.into(),
            root_app_path: root_app_path.into(),
            template_ref: String::new(),
        }
    }

    #[must_use]
    pub fn with_template_ref(mut self, template_ref: impl Into<String>) -> Self {
        self.template_ref = template_ref.into();
        self
    }

    fn entry(&self) -> Environment {
        Environment::new(self.template_ref.clone(), self.root_app_path.clone())
    }
}

/// A leaf merged as a new overlay of an application already in the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedApp {
    pub name: String,
    /// Overlay directory the leaf was copied into, relative to the working tree.
    pub destination: String,
}

/// What an install changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallReport {
    pub merged: Vec<MergedApp>,
    /// Applications copied over whole because the tree did not have them yet.
    pub added: Vec<String>,
    /// Registered root Application path of the new environment.
    pub root_app_path: String,
}

/// Merges rendered environments into the context's working tree.
pub struct Installer<'a> {
    ctx: &'a WorkflowContext,
}

impl<'a> Installer<'a> {
    pub fn new(ctx: &'a WorkflowContext) -> Self {
        Self { ctx }
    }

    /// Merges `env` into the working tree and registers it.
    ///
    /// The rendered tree under `env.source_root` is only read. Nothing in the
    /// working tree is touched until the name, the root manifest path and the
    /// root directory have been checked against what is already installed.
    pub fn install(&self, env: &NewEnvironment) -> Result<InstallReport> {
        let span = info_span!("install", env = %env.name);
        let _enter = span.enter();

        let mut registry = Config::load_or_init(self.ctx.work_tree())?;
        if registry.contains(&env.name) {
            return Err(GraftError::EnvironmentAlreadyExists(env.name.clone()));
        }

        let first_env = registry
            .first_environment()
            .map(|(name, entry)| (name.to_string(), entry.clone()));
        let placement = RootPlacement::new(env, first_env.as_ref().map(|(_, e)| e))?;
        self.check_root_conflicts(env, &placement, &registry)?;

        let source_tree = AppTree::new(&env.source_root, self.ctx.settings.labels.clone());
        let new_root = source_tree.root_app(&env.entry())?;
        let leaves = source_tree.leaf_apps(&new_root)?;
        info!(leaves = leaves.len(), "Discovered leaf applications");

        let dest_tree = self.ctx.tree();
        let dest_root = match &first_env {
            Some((_, entry)) => Some(dest_tree.root_app(entry)?),
            None => None,
        };

        let mut report = InstallReport::default();
        let mut rewrites = Vec::new();
        for leaf in &leaves {
            let managed_name = source_tree
                .managed_name(leaf)
                .unwrap_or_else(|| leaf.name())
                .to_string();

            let existing = match &dest_root {
                Some(root) => match dest_tree.find_by_managed_name(root, &managed_name) {
                    Ok(found) => Some(found),
                    Err(e) if e.is_recoverable() => None,
                    Err(e) => return Err(e),
                },
                None => None,
            };

            match existing {
                Some(reference) => {
                    let manifest = self.merge_overlay(env, leaf, &reference)?;
                    report.merged.push(MergedApp {
                        name: managed_name,
                        destination: manifest.source_path().unwrap_or_default().to_string(),
                    });
                    rewrites.push((leaf, manifest));
                }
                None => {
                    self.add_application(env, leaf)?;
                    report.added.push(managed_name);
                }
            }
        }

        copy_dir(
            &env.source_root.join(&placement.source_dir),
            &self.ctx.work_tree().join(&placement.target_dir),
        )?;
        for (leaf, manifest) in rewrites {
            self.write_rewritten(env, &placement, leaf, &manifest)?;
        }

        let root_app_path = placement.root_app_path();
        registry.add_environment(
            &env.name,
            Environment::new(env.template_ref.clone(), root_app_path.clone()),
        )?;
        report.root_app_path = root_app_path;

        info!(
            merged = report.merged.len(),
            added = report.added.len(),
            root_app_path = %report.root_app_path,
            "Environment installed"
        );
        Ok(report)
    }

    /// Refuses a root directory merge that would replace another
    /// environment's root manifest or change any file already in place.
    fn check_root_conflicts(
        &self,
        env: &NewEnvironment,
        placement: &RootPlacement,
        registry: &Config,
    ) -> Result<()> {
        let root_app_path = placement.root_app_path();
        let new_root = clean_path(Path::new(&root_app_path));
        if let Some((owner, _)) = registry
            .environments()
            .find(|(_, entry)| clean_path(entry.root_app_path()) == new_root)
        {
            return Err(GraftError::InstallConflict {
                path: self.ctx.work_tree().join(&new_root),
                message: format!(
                    "already the root application of environment '{}'",
                    owner
                ),
            });
        }

        let target_dir = self.ctx.work_tree().join(&placement.target_dir);
        let conflicts = conflicting_files(&env.source_root.join(&placement.source_dir), &target_dir)?;
        if let Some(first) = conflicts.first() {
            return Err(GraftError::InstallConflict {
                path: target_dir.join(first),
                message: format!(
                    "exists with different content ({} conflicting file(s) in the root directory)",
                    conflicts.len()
                ),
            });
        }
        Ok(())
    }

    /// Copies `leaf`'s sync directory in as a sibling overlay of `reference`.
    ///
    /// Returns the leaf manifest pointed at the new overlay directory.
    fn merge_overlay(&self, env: &NewEnvironment, leaf: &AppNode, reference: &AppNode) -> Result<Application> {
        let destination = overlay_destination(self.ctx.work_tree(), reference, &env.name)?;
        let destination_str = to_slash(&destination);

        let source_dir = leaf_source_dir(&env.source_root, leaf)?;
        copy_dir(&source_dir, &self.ctx.work_tree().join(&destination))?;

        let mut manifest = leaf.resource.clone();
        manifest.set_source_path(destination_str.clone());
        debug!(app = leaf.name(), destination = %destination_str, "Merged overlay");
        Ok(manifest)
    }

    /// Writes a merged leaf's manifest over the copy the root directory merge
    /// placed in the working tree.
    fn write_rewritten(
        &self,
        env: &NewEnvironment,
        placement: &RootPlacement,
        leaf: &AppNode,
        manifest: &Application,
    ) -> Result<()> {
        match placement.destination_of(&env.source_root, &leaf.path) {
            Some(relative) => write_application(&self.ctx.work_tree().join(relative), manifest),
            None => {
                warn!(
                    app = leaf.name(),
                    path = %leaf.path.display(),
                    "Leaf manifest lies outside the root directory, not carried over"
                );
                Ok(())
            }
        }
    }

    /// Copies the folder two levels above `leaf`'s sync directory verbatim.
    fn add_application(&self, env: &NewEnvironment, leaf: &AppNode) -> Result<()> {
        let source_path = leaf.source_path().ok_or_else(|| missing_source(leaf))?;
        let app_folder = clean_path(Path::new(source_path))
            .parent()
            .and_then(Path::parent)
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .ok_or_else(|| GraftError::InvalidManifest {
                path: leaf.path.clone(),
                message: format!(
                    "source path '{}' has no application folder two levels up",
                    source_path
                ),
            })?;

        copy_dir(
            &env.source_root.join(&app_folder),
            &self.ctx.work_tree().join(&app_folder),
        )?;
        debug!(app = leaf.name(), folder = %app_folder.display(), "Added application");
        Ok(())
    }
}

/// Where the directory holding the new root Application lands.
///
/// It merges into the directory holding the first registered root, or keeps
/// its own relative directory when nothing is installed yet.
struct RootPlacement {
    /// Relative to the rendered tree.
    source_dir: PathBuf,
    /// Relative to the working tree.
    target_dir: PathBuf,
    file_name: OsString,
}

impl RootPlacement {
    fn new(env: &NewEnvironment, first: Option<&Environment>) -> Result<Self> {
        let new_root = clean_path(Path::new(&env.root_app_path));
        let file_name = new_root
            .file_name()
            .map(OsStr::to_os_string)
            .ok_or_else(|| GraftError::InvalidManifest {
                path: env.source_root.join(&env.root_app_path),
                message: "root application path has no file name".to_string(),
            })?;
        let source_dir = new_root.parent().map(Path::to_path_buf).unwrap_or_default();

        let target_dir = match first {
            Some(entry) => clean_path(entry.root_app_path())
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default(),
            None => source_dir.clone(),
        };

        Ok(Self {
            source_dir,
            target_dir,
            file_name,
        })
    }

    /// Registered root Application path of the new environment.
    fn root_app_path(&self) -> String {
        to_slash(&self.target_dir.join(&self.file_name))
    }

    /// Where a file of the rendered root directory ends up, relative to the
    /// working tree. `None` for files outside that directory.
    fn destination_of(&self, source_root: &Path, path: &Path) -> Option<PathBuf> {
        let base = clean_path(&source_root.join(&self.source_dir));
        clean_path(path)
            .strip_prefix(&base)
            .ok()
            .map(|relative| self.target_dir.join(relative))
    }
}

/// `dirname(base)/../overlays/<env>`, where `base` is the first resource of
/// the kustomization in `reference`'s sync directory.
fn overlay_destination(work_tree: &Path, reference: &AppNode, env_name: &str) -> Result<PathBuf> {
    let ref_source = reference.source_path().ok_or_else(|| missing_source(reference))?;
    let (kustomization, kustomization_path) = Kustomization::load(&work_tree.join(ref_source))?;
    let base = kustomization
        .base()
        .ok_or(GraftError::MissingKustomizeBase(kustomization_path))?;

    let base_dir = clean_path(&Path::new(ref_source).join(base));
    let parent = base_dir.parent().map(Path::to_path_buf).unwrap_or_default();
    Ok(clean_path(&parent.join("..").join("overlays").join(env_name)))
}

fn leaf_source_dir(source_root: &Path, leaf: &AppNode) -> Result<PathBuf> {
    leaf.source_dir(source_root)
        .ok_or_else(|| missing_source(leaf))
}

fn missing_source(node: &AppNode) -> GraftError {
    GraftError::InvalidManifest {
        path: node.path.clone(),
        message: "spec.source.path is not set".to_string(),
    }
}

/// Stages the whole working tree, commits, and pushes unless dry-running.
pub fn commit_install(ctx: &WorkflowContext, env_name: &str) -> Result<CommitResult> {
    let git = ctx.git();
    git.add(".")?;
    let result = git.commit(&format!("Install environment {}", env_name))?;
    if !ctx.dry_run && !result.is_empty() {
        git.push()?;
    }
    Ok(result)
}
