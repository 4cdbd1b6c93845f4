pub mod apptree;
pub mod cluster;
pub mod error;
pub mod fsutil;
pub mod git;
pub mod install;
pub mod readiness;
pub mod registry;
pub mod settings;
pub mod uninstall;
pub mod workflow;

pub use apptree::{AppNode, AppTree, Application, ManifestDocument};
pub use cluster::{ClusterError, ClusterHandle, KubectlCluster, ResourceKind};
pub use error::{GraftError, Result};
pub use git::GitRepository;
pub use install::{commit_install, InstallReport, Installer, MergedApp, NewEnvironment};
pub use readiness::{wait_for, ReadinessCheck, ReadinessWaiter, WaitOptions, WaitOutcome, WaitState};
pub use registry::{Config, Environment, REGISTRY_FILE};
pub use settings::Settings;
pub use uninstall::{delete_environment, uninstall, UninstallReport};
pub use workflow::WorkflowContext;
