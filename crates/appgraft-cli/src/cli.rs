//! Command-line definitions.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::logging::LogFormat;

/// Manage app-of-apps environments in a GitOps repository.
#[derive(Debug, Parser)]
#[command(name = "appgraft", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// GitOps working tree to operate on
    #[arg(long, global = true, env = "APPGRAFT_REPO", default_value = ".")]
    pub repo: PathBuf,

    /// Settings file (defaults to $APPGRAFT_SETTINGS or the user config dir)
    #[arg(long, global = true, value_name = "FILE")]
    pub settings: Option<PathBuf>,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Inspect or edit the environment registry
    Env {
        #[command(subcommand)]
        command: EnvCommand,
    },

    /// Inspect an environment's application tree
    Tree {
        #[command(subcommand)]
        command: TreeCommand,
    },

    /// Merge a rendered environment into the working tree
    Install(InstallArgs),

    /// Remove an environment
    Uninstall(UninstallArgs),

    /// Block until cluster resources are ready
    Wait {
        #[command(subcommand)]
        command: WaitCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum EnvCommand {
    /// List registered environments
    List,

    /// Register an environment without copying any files
    Add {
        name: String,

        /// Root Application manifest, relative to the working tree
        #[arg(long)]
        root_app_path: String,

        /// Template URL and ref the environment was rendered from
        #[arg(long, default_value = "")]
        template_ref: String,
    },

    /// Remove an environment from the registry only
    Remove { name: String },
}

#[derive(Debug, Subcommand)]
pub enum TreeCommand {
    /// List leaf applications
    Leaves { env: String },

    /// Show every managed application reachable from the root
    Show { env: String },

    /// Find a managed application by its managed name
    Find { env: String, app: String },
}

#[derive(Debug, Args)]
pub struct InstallArgs {
    /// Name of the new environment
    pub name: String,

    /// Root of the rendered environment
    #[arg(long)]
    pub source: PathBuf,

    /// Root Application manifest, relative to --source
    /// (defaults to the first environment in the source's registry)
    #[arg(long)]
    pub root_app_path: Option<String>,

    /// Template URL and ref the environment was rendered from
    #[arg(long, default_value = "")]
    pub template_ref: String,

    /// Commit the result, and push unless --dry-run
    #[arg(long)]
    pub commit: bool,

    /// Commit locally without pushing
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Args)]
pub struct UninstallArgs {
    /// Environment to remove
    pub name: String,

    /// Also delete the environment's root Application from the cluster
    #[arg(long)]
    pub clean: bool,

    /// Commit locally; do not push or touch the cluster
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Subcommand)]
pub enum WaitCommand {
    /// Wait for Deployments to have all replicas ready
    Deployment {
        /// Deployments as NAMESPACE/NAME
        #[arg(required = true, value_name = "NAMESPACE/NAME")]
        targets: Vec<String>,

        /// Give up after this many seconds
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,

        /// Seconds between checks
        #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
        interval: Option<u64>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_install() {
        let cli = Cli::try_parse_from([
            "appgraft",
            "--repo",
            "/work/gitops",
            "install",
            "prod",
            "--source",
            "/tmp/rendered",
            "--commit",
        ])
        .unwrap();

        assert_eq!(cli.repo, PathBuf::from("/work/gitops"));
        match cli.command {
            Command::Install(args) => {
                assert_eq!(args.name, "prod");
                assert_eq!(args.source, PathBuf::from("/tmp/rendered"));
                assert!(args.commit);
                assert!(!args.dry_run);
                assert!(args.root_app_path.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_uninstall_with_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "appgraft",
            "uninstall",
            "staging",
            "--clean",
            "--dry-run",
            "-vv",
            "--log-format",
            "json",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.log_format, LogFormat::Json);
        match cli.command {
            Command::Uninstall(args) => {
                assert_eq!(args.name, "staging");
                assert!(args.clean);
                assert!(args.dry_run);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_wait_requires_a_target() {
        assert!(Cli::try_parse_from(["appgraft", "wait", "deployment"]).is_err());
    }

    #[test]
    fn test_wait_interval_must_be_positive() {
        let err = Cli::try_parse_from([
            "appgraft",
            "wait",
            "deployment",
            "web/api",
            "--interval",
            "0",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);

        let cli = Cli::try_parse_from([
            "appgraft",
            "wait",
            "deployment",
            "web/api",
            "--interval",
            "2",
        ])
        .unwrap();
        match cli.command {
            Command::Wait {
                command: WaitCommand::Deployment { interval, .. },
            } => {
                assert_eq!(interval, Some(2));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
