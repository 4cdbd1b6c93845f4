//! Command handlers. Each builds what it needs from the workflow context and
//! prints results to stdout; logs go to stderr.

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use appgraft::{
    commit_install, delete_environment, uninstall, wait_for, Config, Environment, Installer,
    KubectlCluster, NewEnvironment, ReadinessCheck, WorkflowContext,
};

use crate::cli::{Command, EnvCommand, InstallArgs, TreeCommand, UninstallArgs, WaitCommand};

pub async fn run(command: Command, ctx: WorkflowContext) -> Result<()> {
    match command {
        Command::Env { command } => env(command, &ctx),
        Command::Tree { command } => tree(command, &ctx),
        Command::Install(args) => install(args, ctx),
        Command::Uninstall(args) => uninstall_env(args, ctx).await,
        Command::Wait { command } => wait(command, &ctx).await,
    }
}

fn env(command: EnvCommand, ctx: &WorkflowContext) -> Result<()> {
    match command {
        EnvCommand::List => {
            let registry = ctx.registry()?;
            for (name, env) in registry.environments() {
                if env.template_ref.is_empty() {
                    println!("{}\t{}", name, env.root_app_path);
                } else {
                    println!("{}\t{}\t{}", name, env.root_app_path, env.template_ref);
                }
            }
        }
        EnvCommand::Add {
            name,
            root_app_path,
            template_ref,
        } => {
            let mut registry = Config::load_or_init(ctx.work_tree())?;
            registry
                .add_environment(&name, Environment::new(template_ref, root_app_path))
                .with_context(|| format!("Failed to register environment '{}'", name))?;
            println!("Registered {}", name);
        }
        EnvCommand::Remove { name } => {
            delete_environment(ctx, &name)
                .with_context(|| format!("Failed to remove environment '{}'", name))?;
            println!("Removed {}", name);
        }
    }
    Ok(())
}

fn tree(command: TreeCommand, ctx: &WorkflowContext) -> Result<()> {
    let registry = ctx.registry()?;
    let tree = ctx.tree();

    match command {
        TreeCommand::Leaves { env } => {
            let root = tree.root_app(registry.environment(&env)?)?;
            for leaf in tree.leaf_apps(&root)? {
                println!(
                    "{}\t{}\t{}",
                    leaf.name(),
                    tree.relative_path(&leaf).display(),
                    leaf.source_path().unwrap_or("-")
                );
            }
        }
        TreeCommand::Show { env } => {
            let root = tree.root_app(registry.environment(&env)?)?;
            for node in tree.walk(&root)? {
                let marker = if tree.is_managed(&node) { "" } else { " (unmanaged)" };
                println!("{}\t{}{}", node.name(), tree.relative_path(&node).display(), marker);
            }
        }
        TreeCommand::Find { env, app } => {
            let root = tree.root_app(registry.environment(&env)?)?;
            let found = tree
                .find_by_managed_name(&root, &app)
                .with_context(|| format!("in environment '{}'", env))?;
            println!(
                "{}\t{}",
                tree.relative_path(&found).display(),
                found.source_path().unwrap_or("-")
            );
        }
    }
    Ok(())
}

fn install(args: InstallArgs, ctx: WorkflowContext) -> Result<()> {
    let ctx = ctx.with_dry_run(args.dry_run);
    let root_app_path = match args.root_app_path {
        Some(path) => path,
        None => source_root_app(&args.source)?,
    };

    let env = NewEnvironment::new(&args.name, &args.source, root_app_path)
        .with_template_ref(args.template_ref);
    let report = Installer::new(&ctx)
        .install(&env)
        .with_context(|| format!("Failed to install environment '{}'", args.name))?;

    for merged in &report.merged {
        println!("merged\t{}\t{}", merged.name, merged.destination);
    }
    for added in &report.added {
        println!("added\t{}", added);
    }
    println!("root\t{}", report.root_app_path);

    if args.commit {
        let commit = commit_install(&ctx, &args.name)?;
        match commit.commit_hash {
            Some(sha) => println!("commit\t{}", sha),
            None => println!("commit\t(nothing to commit)"),
        }
    }
    Ok(())
}

/// Root Application path of the first environment in the rendered tree's registry.
fn source_root_app(source: &Path) -> Result<String> {
    let registry = Config::load(source).with_context(|| {
        format!(
            "No --root-app-path given and no registry found in '{}'",
            source.display()
        )
    })?;
    let (_, env) = registry.require_first_environment().with_context(|| {
        format!(
            "Registry in '{}' cannot name a root application; pass --root-app-path",
            source.display()
        )
    })?;
    Ok(env.root_app_path.clone())
}

async fn uninstall_env(args: UninstallArgs, ctx: WorkflowContext) -> Result<()> {
    let ctx = ctx.with_dry_run(args.dry_run);
    let cluster = KubectlCluster::from_settings(&ctx.settings.cluster);

    let report = uninstall(&ctx, &cluster, &args.name, args.clean)
        .await
        .with_context(|| format!("Failed to uninstall environment '{}'", args.name))?;

    if let Some(sha) = &report.commit {
        println!("commit\t{}", sha);
    }
    if report.cleaned {
        println!("cleaned\t{}", args.name);
    }
    Ok(())
}

async fn wait(command: WaitCommand, ctx: &WorkflowContext) -> Result<()> {
    match command {
        WaitCommand::Deployment {
            targets,
            timeout,
            interval,
        } => {
            let checks = targets
                .iter()
                .map(|target| parse_target(target))
                .collect::<Result<Vec<_>>>()?;

            let mut options = ctx.wait_options();
            if let Some(secs) = timeout {
                options.timeout = Duration::from_secs(secs);
            }
            if let Some(secs) = interval {
                options.interval = Duration::from_secs(secs);
            }

            let cluster = KubectlCluster::from_settings(&ctx.settings.cluster);
            let outcome = wait_for(&cluster, checks, options).await?;
            println!(
                "ready after {:.1}s ({} checks)",
                outcome.elapsed.as_secs_f64(),
                outcome.ticks
            );
        }
    }
    Ok(())
}

fn parse_target(target: &str) -> Result<ReadinessCheck> {
    match target.split_once('/') {
        Some((namespace, name)) if !namespace.is_empty() && !name.is_empty() => {
            Ok(ReadinessCheck::deployment_ready(namespace, name))
        }
        _ => bail!("Expected NAMESPACE/NAME, got '{}'", target),
    }
}
