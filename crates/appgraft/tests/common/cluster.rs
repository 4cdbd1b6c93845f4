//! Cluster double that behaves like a controller tracking a git branch.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use appgraft::apptree::{ApplicationStatus, SyncStatus};
use appgraft::cluster::{Deployment, DeploymentSpec, DeploymentStatus};
use appgraft::{Application, ClusterError, ClusterHandle, GitRepository, ResourceKind};

/// How long a deleted Application stays visible, counted in reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deletion {
    Immediate,
    AfterReads(usize),
    Never,
}

/// Reports every known Application as synced at the repository's current
/// HEAD, and removes resources when asked to delete them.
pub struct SyncingCluster {
    repo: GitRepository,
    applications: Mutex<BTreeSet<String>>,
    deleted: Mutex<Vec<String>>,
    deletion: Deletion,
    // Reads left before each deleted key disappears; `None` never does.
    lingering: Mutex<BTreeMap<String, Option<usize>>>,
    reads_after_delete: AtomicUsize,
    calls: AtomicUsize,
}

fn key(namespace: &str, name: &str) -> String {
    format!("{namespace}/{name}")
}

impl SyncingCluster {
    pub fn new(repo: GitRepository) -> Self {
        Self {
            repo,
            applications: Mutex::new(BTreeSet::new()),
            deleted: Mutex::new(Vec::new()),
            deletion: Deletion::Immediate,
            lingering: Mutex::new(BTreeMap::new()),
            reads_after_delete: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    /// Keeps deleted Applications around, like a controller still running
    /// finalizers.
    pub fn with_deletion(mut self, deletion: Deletion) -> Self {
        self.deletion = deletion;
        self
    }

    pub fn with_application(self, namespace: &str, name: &str) -> Self {
        self.applications.lock().unwrap().insert(key(namespace, name));
        self
    }

    pub fn has_application(&self, namespace: &str, name: &str) -> bool {
        self.applications.lock().unwrap().contains(&key(namespace, name))
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    /// Application reads made for keys that were already deleted.
    pub fn reads_after_delete(&self) -> usize {
        self.reads_after_delete.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Counts a read of a deleted key and drops it once its reads run out.
    fn observe_lingering(&self, key: &str) {
        let mut lingering = self.lingering.lock().unwrap();
        let Some(remaining) = lingering.get_mut(key) else {
            return;
        };
        self.reads_after_delete.fetch_add(1, Ordering::SeqCst);
        let gone = match remaining {
            Some(0) => true,
            Some(n) => {
                *n -= 1;
                false
            }
            None => false,
        };
        if gone {
            lingering.remove(key);
            self.applications.lock().unwrap().remove(key);
        }
    }

    fn not_found(kind: ResourceKind, namespace: &str, name: &str) -> ClusterError {
        ClusterError::NotFound {
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }
}

impl ClusterHandle for SyncingCluster {
    async fn deployment(&self, namespace: &str, name: &str) -> Result<Deployment, ClusterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        // Every Deployment is rolled out.
        let mut deployment = Deployment::default();
        deployment.metadata.name = name.to_string();
        deployment.metadata.namespace = Some(namespace.to_string());
        deployment.spec = DeploymentSpec { replicas: Some(1) };
        deployment.status = DeploymentStatus {
            ready_replicas: Some(1),
        };
        Ok(deployment)
    }

    async fn application(&self, namespace: &str, name: &str) -> Result<Application, ClusterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.observe_lingering(&key(namespace, name));
        if !self.has_application(namespace, name) {
            return Err(Self::not_found(ResourceKind::Application, namespace, name));
        }

        let revision = self
            .repo
            .head_sha()
            .map_err(|e| ClusterError::Command(e.to_string()))?;
        let mut app = Application::new(name, "https://github.com/acme/gitops.git", "argocd-apps");
        app.metadata.namespace = Some(namespace.to_string());
        app.status = Some(ApplicationStatus {
            sync: Some(SyncStatus {
                status: "Synced".to_string(),
                revision,
            }),
            ..Default::default()
        });
        Ok(app)
    }

    async fn delete(&self, kind: ResourceKind, namespace: &str, name: &str) -> Result<(), ClusterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.deleted.lock().unwrap().push(format!("{kind} {}", key(namespace, name)));
        let key = key(namespace, name);
        match self.deletion {
            Deletion::Immediate => {
                self.applications.lock().unwrap().remove(&key);
            }
            Deletion::AfterReads(reads) => {
                self.lingering.lock().unwrap().insert(key, Some(reads));
            }
            Deletion::Never => {
                self.lingering.lock().unwrap().insert(key, None);
            }
        }
        Ok(())
    }
}
