//! Subcommand implementations and the environment plumbing they share.

pub mod concentrate;
pub mod exec;
pub mod shell;

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use container_remote_core::config::{DockerConfig, FileConfig};
use container_remote_docker::{
    ContainerRuntime, DockerCli, EnvConfig, ExecOutput, RemoteCommand, RemoteEnv,
};

use crate::cli::EnvArgs;
use crate::observability;

/// Merge the config file (if any) with command-line overrides.
pub fn build_env_config(args: &EnvArgs, keep_staging: bool) -> Result<EnvConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let file = FileConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?;
            EnvConfig::from_file(&file)
        }
        None => match &args.image {
            Some(image) => EnvConfig::new(image.clone()),
            None => bail!("Either --config or --image is required"),
        },
    };

    if let Some(image) = &args.image {
        config.image = image.clone();
    }
    if args.name.is_some() {
        config.name = args.name.clone();
    }
    config.mounts.extend(args.mounts.iter().cloned());
    if args.reuse {
        config.force_rerun = false;
    }
    if keep_staging {
        config.staging.keep_staging = true;
    }
    Ok(config)
}

pub fn docker_runtime() -> Result<Arc<dyn ContainerRuntime>> {
    let cli = DockerCli::from_config(&DockerConfig::from_env());
    cli.locate()
        .with_context(|| format!("Container runtime '{}' not found on PATH", cli.bin()))?;
    Ok(Arc::new(cli))
}

pub fn open_env(config: EnvConfig, runtime: Arc<dyn ContainerRuntime>) -> Result<RemoteEnv> {
    let image = config.image.clone();
    let env = RemoteEnv::initialize(config, runtime)
        .with_context(|| format!("Failed to initialize environment for image {}", image))?;

    let mounts: Vec<String> = env
        .mounts()
        .iter()
        .map(|m| format!("{} -> {}", m.source.display(), m.container_path.display()))
        .collect();
    observability::audit_environment_initialized(env.name(), &image, env.staging_root(), &mounts);
    Ok(env)
}

/// Run one command and write its audit record.
pub fn run_command(env: &mut RemoteEnv, command: impl Into<RemoteCommand>) -> Result<ExecOutput> {
    let command = command.into();
    let rendered = command.to_string();
    let cwd = env.cwd().map(str::to_string);
    let started = Instant::now();
    let output = env.execute(command)?;
    observability::audit_command_executed(
        env.name(),
        &rendered,
        cwd.as_deref(),
        output.exit_code,
        started.elapsed().as_millis(),
    );
    Ok(output)
}

pub fn close_env(mut env: RemoteEnv) -> Result<()> {
    let report = env.teardown();
    let errors: Vec<String> = [&report.container, &report.staging]
        .iter()
        .filter_map(|r| r.as_ref().err().map(ToString::to_string))
        .collect();
    observability::audit_environment_torn_down(env.name(), report.is_clean(), &errors);
    report.into_result().context("Teardown incomplete")
}

pub fn display_path(path: Option<&Path>) -> String {
    path.map(|p| p.display().to_string()).unwrap_or_else(|| "-".to_string())
}
