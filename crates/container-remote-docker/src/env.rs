//! RemoteEnv: stage the mounts, launch the container, run commands, tear
//! everything down again.
//!
//! `initialize` is all-or-nothing: if any source fails to stage or the
//! container fails to launch, the staging directory is removed before the
//! error is returned and no container is left behind.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use container_remote_core::config::{FileConfig, StagingConfig};
use container_remote_mount::{MountEntry, MountTable, StagingArea, DEFAULT_REMOTE_ROOT};

use crate::error::{RemoteError, Result};
use crate::info_log;
use crate::lifecycle::{ContainerHandle, ContainerLifecycle, ContainerState};
use crate::remote::{RemoteCommand, RemoteExecutor};
use crate::runtime::{ContainerRuntime, ExecOutput};
use crate::spec::ContainerSpec;

/// Everything needed to bring up one environment.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub image: String,
    pub mounts: Vec<PathBuf>,
    pub remote_root: String,
    /// Generated when `None`.
    pub name: Option<String>,
    /// Defaults to `remote_root`.
    pub workdir: Option<String>,
    pub command: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub extra_flags: BTreeMap<String, String>,
    pub force_rerun: bool,
    pub read_only: bool,
    pub staging: StagingConfig,
}

impl EnvConfig {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            mounts: Vec::new(),
            remote_root: DEFAULT_REMOTE_ROOT.to_string(),
            name: None,
            workdir: None,
            command: Vec::new(),
            env: BTreeMap::new(),
            extra_flags: BTreeMap::new(),
            force_rerun: true,
            read_only: false,
            staging: StagingConfig::from_env(),
        }
    }

    /// Environment-derived staging settings, overridden by the file's
    /// `staging:` section.
    pub fn from_file(file: &FileConfig) -> Self {
        let docker = &file.docker;
        let mut config = Self::new(docker.image.clone());
        config.mounts = file.mounts.clone();
        if let Some(root) = &docker.remote_root {
            config.remote_root = root.clone();
        }
        config.name = docker.name.clone();
        config.workdir = docker.workdir.clone();
        config.command = docker.command.clone();
        config.env = docker.environment.clone();
        config.extra_flags = docker.flags.clone();
        config.force_rerun = docker.force_rerun.unwrap_or(true);
        config.read_only = docker.read_only;

        if let Some(tmp_root) = &file.staging.tmp_root {
            config.staging.tmp_root = tmp_root.clone();
        }
        if let Some(mode) = file.staging.mount_mode {
            config.staging.mount_mode = mode;
        }
        if let Some(keep) = file.staging.keep {
            config.staging.keep_staging = keep;
        }
        config
    }

    pub fn with_mounts<I, P>(mut self, mounts: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.mounts = mounts.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_staging(mut self, staging: StagingConfig) -> Self {
        self.staging = staging;
        self
    }

    fn container_spec(&self, table: &MountTable) -> ContainerSpec {
        ContainerSpec::new(self.image.clone())
            .with_name(self.name.clone())
            .with_command(self.command.clone())
            .with_env(self.env.clone())
            .with_workdir(Some(
                self.workdir.clone().unwrap_or_else(|| self.remote_root.clone()),
            ))
            .with_volumes(table.volumes())
            .with_extra_flags(self.extra_flags.clone())
    }
}

/// Outcome of both teardown steps; one failing never skips the other.
#[derive(Debug)]
pub struct TeardownReport {
    pub container: Result<()>,
    pub staging: Result<()>,
}

impl TeardownReport {
    pub fn is_clean(&self) -> bool {
        self.container.is_ok() && self.staging.is_ok()
    }

    pub fn into_result(self) -> Result<()> {
        let errors: Vec<String> = [self.container, self.staging]
            .into_iter()
            .filter_map(|r| r.err().map(|e| e.to_string()))
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(RemoteError::TeardownIncomplete(errors))
        }
    }
}

#[derive(Debug)]
pub struct RemoteEnv {
    staging: StagingArea,
    table: MountTable,
    executor: RemoteExecutor,
    keep_staging: bool,
    torn_down: bool,
}

impl RemoteEnv {
    /// Stage every mount, then launch the container with the staged copies
    /// bound under `remote_root`.
    pub fn initialize(config: EnvConfig, runtime: Arc<dyn ContainerRuntime>) -> Result<Self> {
        let mut staging = StagingArea::from_config(&config.image, &config.staging);

        let prepared = Self::stage(&config, &mut staging);
        let table = match prepared {
            Ok(table) => table,
            Err(e) => {
                discard(&mut staging);
                return Err(e);
            }
        };

        let spec = config.container_spec(&table);
        let default_cwd = spec.workdir.clone();
        let lifecycle = ContainerLifecycle::new(runtime, spec);
        let mut executor = RemoteExecutor::new(lifecycle, default_cwd);
        if let Err(e) = executor.start(config.force_rerun) {
            discard(&mut staging);
            return Err(e);
        }

        info_log!(
            container = %executor.lifecycle().name(),
            mounts = table.entries().len(),
            staging = %staging.root().map(|p| p.display().to_string()).unwrap_or_default(),
            "Remote environment ready"
        );
        Ok(Self {
            staging,
            table,
            executor,
            keep_staging: config.staging.keep_staging,
            torn_down: false,
        })
    }

    fn stage(config: &EnvConfig, staging: &mut StagingArea) -> Result<MountTable> {
        for mount in &config.mounts {
            staging.add(mount)?;
        }
        let table = MountTable::from_staging(config.remote_root.as_str(), staging)?
            .read_only(config.read_only);
        Ok(table)
    }

    pub fn execute(&mut self, command: impl Into<RemoteCommand>) -> Result<ExecOutput> {
        self.executor.remote(command)
    }

    pub fn set_working_directory(&mut self, dir: &str, create: bool) -> Result<&str> {
        self.executor.set_remote_cwd(dir, create)
    }

    pub fn cwd(&self) -> Option<&str> {
        self.executor.cwd()
    }

    pub fn mounts(&self) -> &[MountEntry] {
        self.table.entries()
    }

    pub fn remote_root(&self) -> &Path {
        self.table.remote_root()
    }

    pub fn staging_root(&self) -> Option<&Path> {
        self.staging.root()
    }

    pub fn container(&self) -> Option<&ContainerHandle> {
        self.executor.lifecycle().handle()
    }

    pub fn name(&self) -> &str {
        self.executor.lifecycle().name()
    }

    pub fn state(&self) -> Option<ContainerState> {
        self.executor.lifecycle().state()
    }

    /// Remove the container and the staging directory. Safe to call again;
    /// a later call retries whatever failed before.
    pub fn teardown(&mut self) -> TeardownReport {
        let container = self.executor.lifecycle_mut().remove_container();
        if let Err(e) = &container {
            tracing::warn!(container = %self.name(), error = %e, "Container removal failed");
        }

        let staging = if self.keep_staging {
            self.staging.keep();
            Ok(())
        } else {
            self.staging.remove_staging().map_err(RemoteError::from)
        };
        if let Err(e) = &staging {
            tracing::warn!(error = %e, "Staging removal failed");
        }

        let report = TeardownReport { container, staging };
        self.torn_down = report.is_clean();
        if self.torn_down {
            info_log!(container = %self.name(), "Remote environment torn down");
        }
        report
    }
}

impl Drop for RemoteEnv {
    fn drop(&mut self) {
        if !self.torn_down {
            let report = self.teardown();
            if !report.is_clean() {
                tracing::warn!("Teardown on drop left resources behind");
            }
        }
    }
}

fn discard(staging: &mut StagingArea) {
    if let Err(e) = staging.remove_staging() {
        tracing::warn!(error = %e, "Failed to remove staging after failed initialize");
    }
}
