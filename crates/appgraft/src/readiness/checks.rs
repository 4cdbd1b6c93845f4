//! Readiness conditions, expressed as plain values.

use std::fmt;

use crate::cluster::{ClusterError, ClusterHandle};

/// Sync status reported by the controller once live state matches git.
pub const SYNCED: &str = "Synced";

/// What "ready" means for one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// Deployment has at least as many ready replicas as desired.
    DeploymentReady,
    /// Application reports `Synced` at exactly this revision.
    ApplicationSynced { revision: String },
    /// Application no longer exists.
    ApplicationGone,
}

/// One resource to wait on, with everything needed to evaluate it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadinessCheck {
    pub name: String,
    pub namespace: String,
    pub condition: Condition,
}

impl ReadinessCheck {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, condition: Condition) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            condition,
        }
    }

    pub fn deployment_ready(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(namespace, name, Condition::DeploymentReady)
    }

    pub fn application_synced(
        namespace: impl Into<String>,
        name: impl Into<String>,
        revision: impl Into<String>,
    ) -> Self {
        Self::new(
            namespace,
            name,
            Condition::ApplicationSynced {
                revision: revision.into(),
            },
        )
    }

    pub fn application_gone(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(namespace, name, Condition::ApplicationGone)
    }

    /// `namespace/name`, as listed in timeout errors.
    pub fn id(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }

    /// Evaluates the condition once against the cluster.
    pub async fn evaluate<C: ClusterHandle>(&self, cluster: &C) -> Result<bool, ClusterError> {
        match &self.condition {
            Condition::DeploymentReady => {
                let deployment = cluster.deployment(&self.namespace, &self.name).await?;
                Ok(deployment.is_ready())
            }
            Condition::ApplicationSynced { revision } => {
                let app = cluster.application(&self.namespace, &self.name).await?;
                Ok(app
                    .sync_status()
                    .is_some_and(|s| s.status == SYNCED && &s.revision == revision))
            }
            Condition::ApplicationGone => {
                match cluster.application(&self.namespace, &self.name).await {
                    Ok(_) => Ok(false),
                    Err(e) if e.is_not_found() => Ok(true),
                    Err(e) => Err(e),
                }
            }
        }
    }
}

impl fmt::Display for ReadinessCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.condition {
            Condition::DeploymentReady => write!(f, "deployment {} ready", self.id()),
            Condition::ApplicationSynced { revision } => {
                write!(f, "application {} synced at {}", self.id(), revision)
            }
            Condition::ApplicationGone => write!(f, "application {} gone", self.id()),
        }
    }
}
