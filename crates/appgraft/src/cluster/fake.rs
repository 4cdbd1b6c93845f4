//! In-memory cluster for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{ClusterError, ClusterHandle, Deployment, DeploymentSpec, DeploymentStatus, ResourceKind};
use crate::apptree::{Application, ApplicationStatus, ObjectMeta, SyncStatus};

fn key(namespace: &str, name: &str) -> String {
    format!("{namespace}/{name}")
}

#[derive(Default)]
pub(crate) struct FakeCluster {
    deployments: Mutex<HashMap<String, Deployment>>,
    applications: Mutex<HashMap<String, Application>>,
    failing: Mutex<HashSet<String>>,
    deleted: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl FakeCluster {
    pub fn set_deployment(&self, namespace: &str, name: &str, replicas: i32, ready: i32) {
        let deployment = Deployment {
            metadata: ObjectMeta::new(name),
            spec: DeploymentSpec {
                replicas: Some(replicas),
            },
            status: DeploymentStatus {
                ready_replicas: Some(ready),
            },
        };
        self.deployments.lock().unwrap().insert(key(namespace, name), deployment);
    }

    pub fn set_application(&self, namespace: &str, name: &str, status: &str, revision: &str) {
        let mut app = Application::new(name, "https://example.com/repo.git", "apps");
        app.status = Some(ApplicationStatus {
            sync: Some(SyncStatus {
                status: status.to_string(),
                revision: revision.to_string(),
            }),
            ..Default::default()
        });
        self.applications.lock().unwrap().insert(key(namespace, name), app);
    }

    /// Every read of this resource fails with a command error.
    pub fn fail(&self, namespace: &str, name: &str) {
        self.failing.lock().unwrap().insert(key(namespace, name));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    fn check(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().contains(&key(namespace, name)) {
            return Err(ClusterError::Command("connection refused".to_string()));
        }
        Ok(())
    }

    fn not_found(kind: ResourceKind, namespace: &str, name: &str) -> ClusterError {
        ClusterError::NotFound {
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }
}

impl ClusterHandle for FakeCluster {
    async fn deployment(&self, namespace: &str, name: &str) -> Result<Deployment, ClusterError> {
        self.check(namespace, name)?;
        self.deployments
            .lock()
            .unwrap()
            .get(&key(namespace, name))
            .cloned()
            .ok_or_else(|| Self::not_found(ResourceKind::Deployment, namespace, name))
    }

    async fn application(&self, namespace: &str, name: &str) -> Result<Application, ClusterError> {
        self.check(namespace, name)?;
        self.applications
            .lock()
            .unwrap()
            .get(&key(namespace, name))
            .cloned()
            .ok_or_else(|| Self::not_found(ResourceKind::Application, namespace, name))
    }

    async fn delete(&self, kind: ResourceKind, namespace: &str, name: &str) -> Result<(), ClusterError> {
        self.deleted.lock().unwrap().push(format!("{kind} {}", key(namespace, name)));
        if kind == ResourceKind::Application {
            self.applications.lock().unwrap().remove(&key(namespace, name));
        } else {
            self.deployments.lock().unwrap().remove(&key(namespace, name));
        }
        Ok(())
    }
}
