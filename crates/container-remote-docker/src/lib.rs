//! Container side of container-remote: lifecycle, remote execution and the
//! `RemoteEnv` facade tying them to the staged mounts.
//!
//! ```no_run
//! use std::sync::Arc;
//! use container_remote_docker::{DockerCli, EnvConfig, RemoteEnv};
//!
//! # fn main() -> Result<(), container_remote_docker::RemoteError> {
//! let config = EnvConfig::new("python:3.12-slim").with_mounts(["./workspace"]);
//! let mut env = RemoteEnv::initialize(config, Arc::new(DockerCli::default()))?;
//! let out = env.execute("ls /remote_root/workspace")?;
//! println!("{}", out.stdout);
//! env.teardown().into_result()?;
//! # Ok(())
//! # }
//! ```

pub mod docker_cli;
pub mod env;
pub mod error;
pub mod lifecycle;
pub mod log;
pub mod remote;
pub mod runtime;
pub mod spec;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use docker_cli::DockerCli;
pub use env::{EnvConfig, RemoteEnv, TeardownReport};
pub use error::{RemoteError, Result};
pub use lifecycle::{ContainerHandle, ContainerLifecycle, ContainerState};
pub use remote::{RemoteCommand, RemoteExecutor};
pub use runtime::{
    ContainerRuntime, ContainerStatus, ContainerSummary, ExecOutput, ExecRequest, RuntimeError,
};
pub use spec::ContainerSpec;
