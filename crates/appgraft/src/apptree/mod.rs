//! App-of-apps tree discovery.
//!
//! An Application whose sync directory holds further Application manifests is a
//! grouping node; one whose directory holds none is a leaf. The tree is never
//! stored: every call walks the working tree as it is on disk.
//!
//! Children are enumerated with `glob("<dir>/*.yaml")`, so sibling order is
//! lexical by file path on every platform.

pub mod resource;

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{GraftError, Result};
use crate::registry::Environment;
use crate::settings::LabelSettings;

pub use resource::{
    parse_first_document, write_application, Application, ApplicationSource, ApplicationSpec,
    ApplicationStatus, HealthStatus, Kustomization, ManifestDocument, ObjectMeta, ResourceHeader,
    ResourceWithPath, SyncStatus, APPLICATION_KIND, DEFAULT_NAMESPACE,
};

/// An Application manifest together with the file it was read from.
pub type AppNode = ResourceWithPath<Application>;

impl ResourceWithPath<Application> {
    pub fn name(&self) -> &str {
        self.resource.name()
    }

    /// The node's sync directory, relative to the repository root.
    pub fn source_path(&self) -> Option<&str> {
        self.resource.source_path()
    }

    /// The node's sync directory resolved against `root`.
    pub fn source_dir(&self, root: &Path) -> Option<PathBuf> {
        self.source_path().map(|p| root.join(p))
    }
}

/// Walks the Application tree of one working tree.
#[derive(Debug, Clone)]
pub struct AppTree {
    root: PathBuf,
    labels: LabelSettings,
}

impl AppTree {
    pub fn new(root: impl Into<PathBuf>, labels: LabelSettings) -> Self {
        Self {
            root: root.into(),
            labels,
        }
    }

    /// The working-tree root that source paths are resolved against.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// True if the node carries the managed-by marker.
    pub fn is_managed(&self, node: &AppNode) -> bool {
        node.resource.label(&self.labels.managed_by) == Some(self.labels.managed_by_value.as_str())
    }

    /// The node's stable cross-environment name, if labelled.
    pub fn managed_name<'a>(&self, node: &'a AppNode) -> Option<&'a str> {
        node.resource.label(&self.labels.managed_name)
    }

    /// Reads an Application manifest. The first document must be an Application.
    pub fn load_app(&self, path: &Path) -> Result<AppNode> {
        match self.read_candidate(path)? {
            Some(node) => Ok(node),
            None => Err(GraftError::InvalidManifest {
                path: path.to_path_buf(),
                message: format!("first document is not an {}", APPLICATION_KIND),
            }),
        }
    }

    /// Reads the root Application of an environment.
    pub fn root_app(&self, env: &Environment) -> Result<AppNode> {
        self.load_app(&self.root.join(env.root_app_path()))
    }

    /// Applications declared directly in the node's sync directory.
    ///
    /// Only the first document of each `*.yaml` file is considered; files whose
    /// first document is not an Application are skipped. A node without a
    /// local sync directory has no children.
    pub fn child_candidates(&self, node: &AppNode) -> Result<Vec<AppNode>> {
        let Some(dir) = node.source_dir(&self.root) else {
            return Ok(Vec::new());
        };

        let pattern = format!(
            "{}/*.yaml",
            glob::Pattern::escape(&dir.to_string_lossy())
        );
        let paths = glob::glob(&pattern).map_err(|e| GraftError::ReadDirectory {
            path: dir.clone(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()),
        })?;

        let mut children = Vec::new();
        for entry in paths {
            let path = entry.map_err(|e| GraftError::ReadDirectory {
                path: e.path().to_path_buf(),
                source: e.into_error(),
            })?;
            if !path.is_file() {
                continue;
            }
            if let Some(child) = self.read_candidate(&path)? {
                children.push(child);
            }
        }

        debug!(
            app = node.name(),
            dir = %dir.display(),
            children = children.len(),
            "Listed child applications"
        );
        Ok(children)
    }

    /// Leaf applications under `root`, in traversal order.
    ///
    /// A node with no Application children is emitted. A node with children is
    /// not emitted; traversal continues into its managed children only.
    pub fn leaf_apps(&self, root: &AppNode) -> Result<Vec<AppNode>> {
        let mut leaves = Vec::new();
        let mut visited = HashSet::from([root.path.clone()]);
        self.collect_leaves(root, &mut visited, &mut leaves)?;
        Ok(leaves)
    }

    fn collect_leaves(
        &self,
        node: &AppNode,
        visited: &mut HashSet<PathBuf>,
        leaves: &mut Vec<AppNode>,
    ) -> Result<()> {
        let children = self.child_candidates(node)?;
        if children.is_empty() {
            leaves.push(node.clone());
            return Ok(());
        }

        for child in children {
            if !self.is_managed(&child) {
                debug!(app = child.name(), "Skipping unmanaged application");
                continue;
            }
            if !visited.insert(child.path.clone()) {
                warn!(path = %child.path.display(), "Application reached twice, not descending again");
                continue;
            }
            self.collect_leaves(&child, visited, leaves)?;
        }
        Ok(())
    }

    /// Depth-first search for a managed node whose managed name is `name`.
    ///
    /// Nodes without the managed-by marker are neither matched nor descended into.
    pub fn find_by_managed_name(&self, root: &AppNode, name: &str) -> Result<AppNode> {
        let mut visited = HashSet::new();
        self.find(root, name, &mut visited)?
            .ok_or_else(|| GraftError::AppNotFound(name.to_string()))
    }

    fn find(
        &self,
        node: &AppNode,
        name: &str,
        visited: &mut HashSet<PathBuf>,
    ) -> Result<Option<AppNode>> {
        if !self.is_managed(node) || !visited.insert(node.path.clone()) {
            return Ok(None);
        }
        if self.managed_name(node) == Some(name) {
            return Ok(Some(node.clone()));
        }
        for child in self.child_candidates(node)? {
            if let Some(found) = self.find(&child, name, visited)? {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    /// Every node reachable from `root` through managed children, pre-order.
    pub fn walk(&self, root: &AppNode) -> Result<Vec<AppNode>> {
        let mut nodes = Vec::new();
        let mut visited = HashSet::from([root.path.clone()]);
        self.collect_all(root, &mut visited, &mut nodes)?;
        Ok(nodes)
    }

    fn collect_all(
        &self,
        node: &AppNode,
        visited: &mut HashSet<PathBuf>,
        nodes: &mut Vec<AppNode>,
    ) -> Result<()> {
        nodes.push(node.clone());
        for child in self.child_candidates(node)? {
            if self.is_managed(&child) && visited.insert(child.path.clone()) {
                self.collect_all(&child, visited, nodes)?;
            }
        }
        Ok(())
    }

    /// Path of `node` relative to the working-tree root.
    pub fn relative_path<'a>(&self, node: &'a AppNode) -> &'a Path {
        node.path.strip_prefix(&self.root).unwrap_or(&node.path)
    }

    fn read_candidate(&self, path: &Path) -> Result<Option<AppNode>> {
        let content = fs::read_to_string(path).map_err(|e| GraftError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;

        match parse_first_document(&content, path)? {
            ManifestDocument::Application(app) => Ok(Some(AppNode::new(*app, path))),
            ManifestDocument::Other { kind } => {
                debug!(path = %path.display(), kind = ?kind, "Not an application manifest");
                Ok(None)
            }
        }
    }
}
