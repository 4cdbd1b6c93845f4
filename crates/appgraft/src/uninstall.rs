//! Removing an environment, and tearing down its root Application safely.

use serde::Serialize;
use tracing::{info, info_span, Instrument};

use crate::cluster::{ClusterHandle, ResourceKind};
use crate::error::Result;
use crate::readiness::{wait_for, ReadinessCheck};
use crate::registry::{Environment, REGISTRY_FILE};
use crate::workflow::WorkflowContext;

/// What an uninstall did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UninstallReport {
    /// Commit that removed the registry entry.
    pub commit: Option<String>,
    /// Whether the root Application was deleted from the cluster.
    pub cleaned: bool,
}

/// Removes `name` from the registry and persists it. Touches nothing else.
pub fn delete_environment(ctx: &WorkflowContext, name: &str) -> Result<Environment> {
    let mut registry = ctx.registry()?;
    registry.delete_environment(name)
}

/// Removes an environment and, when `should_clean` is set, its root Application.
///
/// The registry change is committed and pushed first. When cleaning, the root
/// Application is only deleted once the controller reports it synced at that
/// commit, and the call returns only once the Application is gone.
pub async fn uninstall<C: ClusterHandle>(
    ctx: &WorkflowContext,
    cluster: &C,
    name: &str,
    should_clean: bool,
) -> Result<UninstallReport> {
    remove_and_clean(ctx, cluster, name, should_clean)
        .instrument(info_span!("uninstall", env = %name))
        .await
}

async fn remove_and_clean<C: ClusterHandle>(
    ctx: &WorkflowContext,
    cluster: &C,
    name: &str,
    should_clean: bool,
) -> Result<UninstallReport> {
    let registry = ctx.registry()?;
    let env = registry.environment(name)?.clone();
    // Identify the root Application while its manifest is still registered.
    let target = if should_clean {
        let root = ctx.tree().root_app(&env)?;
        let namespace = root
            .resource
            .metadata
            .namespace
            .clone()
            .unwrap_or_else(|| ctx.settings.cluster.argocd_namespace.clone());
        Some((namespace, root.name().to_string()))
    } else {
        None
    };

    delete_environment(ctx, name)?;

    let git = ctx.git();
    git.add(REGISTRY_FILE)?;
    let commit = git.commit(&format!("Remove environment {}", name))?;
    if ctx.dry_run {
        info!("Dry run, not pushing");
    } else if !commit.is_empty() {
        git.push()?;
    }
    let revision = match &commit.commit_hash {
        Some(sha) => sha.clone(),
        None => git.head_sha()?,
    };

    let mut report = UninstallReport {
        commit: commit.commit_hash,
        cleaned: false,
    };
    let Some((app_namespace, app_name)) = target else {
        return Ok(report);
    };

    let options = ctx.wait_options();
    info!(app = %app_name, revision = %revision, "Waiting for root application to sync");
    wait_for(
        cluster,
        vec![ReadinessCheck::application_synced(&app_namespace, &app_name, &revision)],
        options,
    )
    .await?;

    if ctx.dry_run {
        info!(app = %app_name, "Dry run, not deleting root application");
    } else {
        cluster
            .delete(ResourceKind::Application, &app_namespace, &app_name)
            .await?;
    }

    wait_for(
        cluster,
        vec![ReadinessCheck::application_gone(&app_namespace, &app_name)],
        options,
    )
    .await?;

    report.cleaned = !ctx.dry_run;
    info!(app = %app_name, "Root application removed");
    Ok(report)
}
