//! Container lifecycle: `Created -> Running -> Stopped -> Removed`.
//!
//! A lifecycle owns exactly one container name. `run_container` is
//! idempotent without `force_rerun` (a live container of that name is
//! adopted when it carries the same mounts label) and replacing with it
//! (every container of that name is removed first).

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::error::{RemoteError, Result};
use crate::info_log;
use crate::runtime::{ContainerRuntime, ContainerStatus, RuntimeError};
use crate::spec::ContainerSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerState {
    Created,
    Running,
    Stopped,
    /// Terminal.
    Removed,
}

impl fmt::Display for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Removed => "removed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerHandle {
    pub id: String,
    pub name: String,
    pub state: ContainerState,
}

pub struct ContainerLifecycle {
    runtime: Arc<dyn ContainerRuntime>,
    spec: ContainerSpec,
    handle: Option<ContainerHandle>,
}

impl fmt::Debug for ContainerLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerLifecycle")
            .field("runtime", &self.runtime.name())
            .field("spec", &self.spec)
            .field("handle", &self.handle)
            .finish()
    }
}

impl ContainerLifecycle {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, spec: ContainerSpec) -> Self {
        Self {
            runtime,
            spec,
            handle: None,
        }
    }

    pub fn spec(&self) -> &ContainerSpec {
        &self.spec
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn handle(&self) -> Option<&ContainerHandle> {
        self.handle.as_ref()
    }

    /// `None` before the first `run_container`.
    pub fn state(&self) -> Option<ContainerState> {
        self.handle.as_ref().map(|h| h.state)
    }

    pub fn runtime(&self) -> &Arc<dyn ContainerRuntime> {
        &self.runtime
    }

    /// Make sure a container of this lifecycle's name is running.
    pub fn run_container(&mut self, force_rerun: bool) -> Result<&ContainerHandle> {
        let name = self.spec.name.clone();
        if force_rerun {
            self.remove_all_named(&name)?;
            return self.create_and_start();
        }

        if let Some(handle) = &self.handle {
            match handle.state {
                ContainerState::Running => {
                    tracing::debug!(name = %name, id = %handle.id, "Container already running");
                    return self.current();
                }
                ContainerState::Created => {
                    let id = handle.id.clone();
                    return self.start_existing(id);
                }
                ContainerState::Stopped | ContainerState::Removed => {}
            }
        }

        let mut found = self
            .runtime
            .find_by_name(&name)
            .map_err(|e| RemoteError::launch(&name, "container lookup failed", Some(e)))?;
        if found.len() > 1 {
            return Err(RemoteError::launch(
                &name,
                format!(
                    "{} containers share this name; rerun with force_rerun to replace them",
                    found.len()
                ),
                None,
            ));
        }

        let Some(existing) = found.pop() else {
            return self.create_and_start();
        };
        match existing.status {
            ContainerStatus::Running if self.spec.mounts_match(&existing.labels) => {
                info_log!(name = %name, id = %existing.id, "Reusing running container");
                self.handle = Some(ContainerHandle {
                    id: existing.id,
                    name,
                    state: ContainerState::Running,
                });
                self.current()
            }
            ContainerStatus::Created if self.spec.mounts_match(&existing.labels) => {
                self.start_existing(existing.id)
            }
            status => {
                let reason = match status {
                    ContainerStatus::Running | ContainerStatus::Created => "bound to other mounts",
                    _ => "not live",
                };
                info_log!(
                    name = %name,
                    id = %existing.id,
                    status = %status,
                    reason,
                    "Replacing existing container"
                );
                self.remove_id(&existing.id).map_err(|e| {
                    RemoteError::launch(&name, "cannot remove existing container", Some(e))
                })?;
                self.create_and_start()
            }
        }
    }

    /// Running -> Stopped. No-op in other states.
    pub fn stop_container(&mut self) -> Result<()> {
        let Some(handle) = self.handle.as_mut() else {
            return Ok(());
        };
        if handle.state != ContainerState::Running {
            return Ok(());
        }
        match self.runtime.stop(&handle.id) {
            Ok(()) => {
                info_log!(name = %handle.name, id = %handle.id, "Container stopped");
                handle.state = ContainerState::Stopped;
                Ok(())
            }
            Err(RuntimeError::NotFound(_)) => {
                tracing::warn!(name = %handle.name, "Container vanished before stop");
                handle.state = ContainerState::Removed;
                Ok(())
            }
            Err(RuntimeError::NotRunning(_)) => {
                handle.state = ContainerState::Stopped;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Force-remove the container. Removed is a no-op, and a container that
    /// disappeared out of band counts as removed.
    pub fn remove_container(&mut self) -> Result<()> {
        let Some(handle) = self.handle.as_mut() else {
            return Ok(());
        };
        if handle.state == ContainerState::Removed {
            return Ok(());
        }
        match self.runtime.remove(&handle.id, true) {
            Ok(()) => {
                info_log!(name = %handle.name, id = %handle.id, "Container removed");
            }
            Err(RuntimeError::NotFound(_)) => {
                tracing::debug!(name = %handle.name, "Container already gone");
            }
            Err(e) => return Err(e.into()),
        }
        handle.state = ContainerState::Removed;
        Ok(())
    }

    /// Record a state the runtime reported out of band (e.g. during exec).
    pub(crate) fn observe(&mut self, state: ContainerState) {
        if let Some(handle) = self.handle.as_mut() {
            handle.state = state;
        }
    }

    fn current(&self) -> Result<&ContainerHandle> {
        self.handle
            .as_ref()
            .ok_or_else(|| RemoteError::launch(&self.spec.name, "no container handle", None))
    }

    fn remove_id(&self, id: &str) -> std::result::Result<(), RuntimeError> {
        match self.runtime.remove(id, true) {
            Ok(()) | Err(RuntimeError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn remove_all_named(&mut self, name: &str) -> Result<()> {
        let found = self
            .runtime
            .find_by_name(name)
            .map_err(|e| RemoteError::launch(name, "container lookup failed", Some(e)))?;
        for existing in &found {
            info_log!(name = %name, id = %existing.id, "Force rerun: removing existing container");
            self.remove_id(&existing.id).map_err(|e| {
                RemoteError::launch(name, "cannot remove existing container", Some(e))
            })?;
        }
        self.observe(ContainerState::Removed);
        Ok(())
    }

    fn start_existing(&mut self, id: String) -> Result<&ContainerHandle> {
        let name = self.spec.name.clone();
        self.runtime
            .start(&id)
            .map_err(|e| RemoteError::launch(&name, "cannot start created container", Some(e)))?;
        info_log!(name = %name, id = %id, "Started existing container");
        self.handle = Some(ContainerHandle {
            id,
            name,
            state: ContainerState::Running,
        });
        self.current()
    }

    fn create_and_start(&mut self) -> Result<&ContainerHandle> {
        let name = self.spec.name.clone();
        let id = self
            .runtime
            .create(&self.spec)
            .map_err(|e| RemoteError::launch(&name, "runtime rejected create", Some(e)))?;

        if let Err(e) = self.runtime.start(&id) {
            if let Err(cleanup) = self.remove_id(&id) {
                tracing::warn!(
                    id = %id,
                    error = %cleanup,
                    "Failed to remove container that did not start"
                );
            }
            self.handle = None;
            return Err(RemoteError::launch(&name, "runtime rejected start", Some(e)));
        }

        info_log!(
            name = %name,
            id = %id,
            image = %self.spec.image,
            volumes = self.spec.volumes.len(),
            "Container running"
        );
        self.handle = Some(ContainerHandle {
            id,
            name,
            state: ContainerState::Running,
        });
        self.current()
    }
}
