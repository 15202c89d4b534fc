//! ContainerRuntime trait: the transport boundary to the container engine.
//!
//! The lifecycle and executor only ever talk to a runtime through this trait.
//! [`crate::docker_cli::DockerCli`] is the production implementation; tests
//! use the in-memory runtime from [`crate::testing`].

use std::collections::BTreeMap;
use std::fmt;
use std::io;

use serde::Serialize;
use thiserror::Error;

use crate::spec::ContainerSpec;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("no such container: {0}")]
    NotFound(String),

    #[error("container {0} is not running")]
    NotRunning(String),

    #[error("`{command}` failed (exit {code:?}): {stderr}")]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("cannot run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("unexpected runtime output: {0}")]
    Protocol(String),
}

/// Engine-reported container status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerStatus {
    Created,
    Running,
    Paused,
    Restarting,
    Exited,
    Dead,
    Removing,
    Unknown(String),
}

impl ContainerStatus {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "created" => Self::Created,
            "running" => Self::Running,
            "paused" => Self::Paused,
            "restarting" => Self::Restarting,
            "exited" => Self::Exited,
            "dead" => Self::Dead,
            "removing" => Self::Removing,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Running => write!(f, "running"),
            Self::Paused => write!(f, "paused"),
            Self::Restarting => write!(f, "restarting"),
            Self::Exited => write!(f, "exited"),
            Self::Dead => write!(f, "dead"),
            Self::Removing => write!(f, "removing"),
            Self::Unknown(s) => write!(f, "{}", s),
        }
    }
}

/// A container as listed by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerSummary {
    pub id: String,
    pub name: String,
    pub status: ContainerStatus,
    pub labels: BTreeMap<String, String>,
}

/// One command to run inside a running container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecRequest {
    pub argv: Vec<String>,
    pub workdir: Option<String>,
    pub env: BTreeMap<String, String>,
}

impl ExecRequest {
    pub fn new<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn in_dir(mut self, workdir: impl Into<String>) -> Self {
        self.workdir = Some(workdir.into());
        self
    }
}

/// Output of an exec, passed back uninterpreted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i64,
}

/// Extension point for container engines.
///
/// Implementations must be safe to call from several independent processes
/// at once; the only shared state is the engine's own container registry.
pub trait ContainerRuntime: Send + Sync {
    /// Backend name for logging and diagnostics.
    fn name(&self) -> &str;

    /// Create (but do not start) a container; returns its id.
    fn create(&self, spec: &ContainerSpec) -> Result<String, RuntimeError>;

    fn start(&self, id: &str) -> Result<(), RuntimeError>;

    fn exec(&self, id: &str, request: &ExecRequest) -> Result<ExecOutput, RuntimeError>;

    fn stop(&self, id: &str) -> Result<(), RuntimeError>;

    /// Remove a container; `force` kills it first if running.
    fn remove(&self, id: &str, force: bool) -> Result<(), RuntimeError>;

    /// All containers (any state) whose name is exactly `name`.
    fn find_by_name(&self, name: &str) -> Result<Vec<ContainerSummary>, RuntimeError>;
}
