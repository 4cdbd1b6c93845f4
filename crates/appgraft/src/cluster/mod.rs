//! Read and delete access to the cluster the controller reconciles into.
//!
//! The core only needs three calls: fetch a Deployment, fetch an Application,
//! and delete a named resource. [`ClusterHandle`] is that port;
//! [`KubectlCluster`] is the adapter used by the CLI.

pub mod kubectl;

#[cfg(test)]
pub(crate) mod fake;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::apptree::{Application, ObjectMeta};

pub use kubectl::KubectlCluster;

/// Errors returned by cluster adapters.
#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("{kind} '{namespace}/{name}' not found")]
    NotFound {
        kind: ResourceKind,
        namespace: String,
        name: String,
    },

    #[error("Cluster command failed: {0}")]
    Command(String),

    #[error("Failed to decode {kind}: {message}")]
    Decode { kind: ResourceKind, message: String },
}

impl ClusterError {
    /// True when the resource does not exist. Backs the "gone" check.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClusterError::NotFound { .. })
    }
}

/// Resource kinds the core reads or deletes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Deployment,
    Application,
}

impl ResourceKind {
    /// Resource name as accepted by `kubectl get`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Deployment => "deployments.apps",
            ResourceKind::Application => "applications.argoproj.io",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Deployment => write!(f, "Deployment"),
            ResourceKind::Application => write!(f, "Application"),
        }
    }
}

/// The subset of a Deployment needed to judge rollout readiness.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Deployment {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: DeploymentSpec,
    #[serde(default)]
    pub status: DeploymentStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentSpec {
    /// Desired replicas. The API server defaults this to 1.
    #[serde(default)]
    pub replicas: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentStatus {
    #[serde(default)]
    pub ready_replicas: Option<i32>,
}

impl Deployment {
    /// Ready once `status.readyReplicas >= spec.replicas`.
    pub fn is_ready(&self) -> bool {
        let desired = self.spec.replicas.unwrap_or(1);
        self.status.ready_replicas.unwrap_or(0) >= desired
    }
}

/// Access to cluster state for readiness checks and teardown.
#[allow(async_fn_in_trait)]
pub trait ClusterHandle {
    /// Fetches a Deployment.
    async fn deployment(&self, namespace: &str, name: &str) -> Result<Deployment, ClusterError>;

    /// Fetches an Application, including its reported status.
    async fn application(&self, namespace: &str, name: &str)
        -> Result<Application, ClusterError>;

    /// Requests deletion of a resource. Deleting an absent resource succeeds.
    async fn delete(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
    ) -> Result<(), ClusterError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deployment(replicas: Option<i32>, ready: Option<i32>) -> Deployment {
        Deployment {
            metadata: ObjectMeta::new("web"),
            spec: DeploymentSpec { replicas },
            status: DeploymentStatus {
                ready_replicas: ready,
            },
        }
    }

    #[test]
    fn test_deployment_ready() {
        assert!(deployment(Some(3), Some(3)).is_ready());
        assert!(!deployment(Some(3), Some(2)).is_ready());
        assert!(!deployment(Some(1), None).is_ready());
        // Unset replicas default to one.
        assert!(deployment(None, Some(1)).is_ready());
        assert!(deployment(Some(0), None).is_ready());
    }

    #[test]
    fn test_decode_deployment_json() {
        let json = r#"{
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {"name": "web", "namespace": "shop", "uid": "1234"},
            "spec": {"replicas": 2, "selector": {}},
            "status": {"readyReplicas": 2, "replicas": 2}
        }"#;
        let deployment: Deployment = serde_json::from_str(json).unwrap();
        assert_eq!(deployment.metadata.namespace.as_deref(), Some("shop"));
        assert!(deployment.is_ready());
    }

    #[test]
    fn test_not_found_display() {
        let err = ClusterError::NotFound {
            kind: ResourceKind::Application,
            namespace: "argocd".to_string(),
            name: "root".to_string(),
        };
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Application 'argocd/root' not found");
        assert!(!ClusterError::Command("boom".to_string()).is_not_found());
    }
}
