//! Remote command execution inside the running container.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::error::{RemoteError, Result};
use crate::info_log;
use crate::lifecycle::{ContainerHandle, ContainerLifecycle, ContainerState};
use crate::runtime::{ExecOutput, ExecRequest, RuntimeError};

const SHELL: &str = "/bin/bash";

/// A command for the container: a shell script or a verbatim argv.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteCommand {
    /// Run through `/bin/bash -c`.
    Shell(String),
    /// Run as-is, no shell.
    Argv(Vec<String>),
}

impl RemoteCommand {
    pub fn shell(script: impl Into<String>) -> Self {
        Self::Shell(script.into())
    }

    pub fn argv<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Argv(argv.into_iter().map(Into::into).collect())
    }

    /// The argv handed to the runtime. A script already written as
    /// `/bin/bash -c '...'` is unwrapped instead of being wrapped twice.
    pub fn to_argv(&self) -> Vec<String> {
        match self {
            Self::Argv(argv) if !argv.is_empty() => argv.clone(),
            Self::Argv(_) => bash(String::new()),
            Self::Shell(script) => bash(unwrap_bash(script).unwrap_or_else(|| script.clone())),
        }
    }
}

impl fmt::Display for RemoteCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shell(script) => f.write_str(script),
            Self::Argv(argv) => f.write_str(&argv.join(" ")),
        }
    }
}

impl From<&str> for RemoteCommand {
    fn from(script: &str) -> Self {
        Self::Shell(script.to_string())
    }
}

impl From<String> for RemoteCommand {
    fn from(script: String) -> Self {
        Self::Shell(script)
    }
}

impl From<Vec<String>> for RemoteCommand {
    fn from(argv: Vec<String>) -> Self {
        Self::Argv(argv)
    }
}

fn bash(script: String) -> Vec<String> {
    vec![SHELL.to_string(), "-c".to_string(), script]
}

fn wrapped_bash_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?s)^\s*/bin/bash\s+-c\s+(?:"(.*)"|'(.*)')\s*$"#).ok())
        .as_ref()
}

fn unwrap_bash(script: &str) -> Option<String> {
    let caps = wrapped_bash_re()?.captures(script)?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str().to_string())
}

/// Runs commands in the lifecycle's container, tracking a working directory.
#[derive(Debug)]
pub struct RemoteExecutor {
    lifecycle: ContainerLifecycle,
    default_cwd: Option<String>,
    /// (container id, directory); only valid for that container instance.
    cwd: Option<(String, String)>,
}

impl RemoteExecutor {
    /// `default_cwd` applies until `set_remote_cwd` and after every re-creation.
    pub fn new(lifecycle: ContainerLifecycle, default_cwd: Option<String>) -> Self {
        Self {
            lifecycle,
            default_cwd,
            cwd: None,
        }
    }

    pub fn lifecycle(&self) -> &ContainerLifecycle {
        &self.lifecycle
    }

    pub fn lifecycle_mut(&mut self) -> &mut ContainerLifecycle {
        &mut self.lifecycle
    }

    /// Launch (or adopt) the container.
    pub fn start(&mut self, force_rerun: bool) -> Result<&ContainerHandle> {
        self.lifecycle.run_container(force_rerun)
    }

    /// Working directory for the next command.
    pub fn cwd(&self) -> Option<&str> {
        let id = self.lifecycle.handle().map(|h| h.id.as_str());
        match &self.cwd {
            Some((owner, dir)) if Some(owner.as_str()) == id => Some(dir.as_str()),
            _ => self.default_cwd.as_deref(),
        }
    }

    fn not_running(&self) -> RemoteError {
        RemoteError::ContainerNotRunning {
            name: self.lifecycle.name().to_string(),
            state: self
                .lifecycle
                .state()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "not launched".to_string()),
        }
    }

    fn running_id(&self) -> Result<String> {
        match self.lifecycle.handle() {
            Some(handle) if handle.state == ContainerState::Running => Ok(handle.id.clone()),
            _ => Err(self.not_running()),
        }
    }

    fn exec(&mut self, id: &str, request: &ExecRequest) -> Result<ExecOutput> {
        match self.lifecycle.runtime().exec(id, request) {
            Ok(output) => Ok(output),
            Err(RuntimeError::NotFound(_)) => {
                self.lifecycle.observe(ContainerState::Removed);
                Err(self.not_running())
            }
            Err(RuntimeError::NotRunning(_)) => {
                self.lifecycle.observe(ContainerState::Stopped);
                Err(self.not_running())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Run `command` in the container. The exit code is returned, not judged.
    pub fn remote(&mut self, command: impl Into<RemoteCommand>) -> Result<ExecOutput> {
        let command = command.into();
        let id = self.running_id()?;
        let mut request = ExecRequest::new(command.to_argv());
        request.workdir = self.cwd().map(str::to_string);

        let output = self.exec(&id, &request)?;
        info_log!(
            container = %self.lifecycle.name(),
            command = %command,
            exit_code = output.exit_code,
            "Remote command finished"
        );
        Ok(output)
    }

    /// Use `cwd` for later commands. Relative paths resolve against the
    /// current directory. With `create` the directory is made first.
    pub fn set_remote_cwd(&mut self, cwd: &str, create: bool) -> Result<&str> {
        let id = self.running_id()?;
        let dir = self.resolve(cwd);
        let invalid = |reason: String| RemoteError::InvalidWorkingDirectory {
            path: dir.clone(),
            reason,
        };

        if create {
            let out = self.exec(&id, &ExecRequest::new(["mkdir", "-p", "--", dir.as_str()]))?;
            if out.exit_code != 0 {
                return Err(invalid(format!("mkdir failed: {}", out.stderr.trim())));
            }
        }
        let out = self.exec(&id, &ExecRequest::new(["test", "-d", dir.as_str()]))?;
        if out.exit_code != 0 {
            return Err(invalid("not a directory in the container".to_string()));
        }

        tracing::debug!(container = %self.lifecycle.name(), cwd = %dir, "Remote cwd set");
        let (_, dir) = self.cwd.insert((id, dir));
        Ok(dir.as_str())
    }

    fn resolve(&self, cwd: &str) -> String {
        if cwd.starts_with('/') {
            return cwd.to_string();
        }
        let base = self.cwd().unwrap_or("/");
        format!("{}/{}", base.trim_end_matches('/'), cwd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::ContainerSpec;
    use crate::testing::FakeRuntime;
    use std::sync::Arc;

    fn executor(fake: &Arc<FakeRuntime>) -> RemoteExecutor {
        let spec = ContainerSpec::new("alpine").with_name(Some("box".into()));
        let lifecycle = ContainerLifecycle::new(fake.clone(), spec);
        RemoteExecutor::new(lifecycle, Some("/remote_root".into()))
    }

    #[test]
    fn test_shell_wrapping() {
        assert_eq!(
            RemoteCommand::from("ls -la").to_argv(),
            vec!["/bin/bash", "-c", "ls -la"]
        );
        assert_eq!(
            RemoteCommand::from("/bin/bash -c 'echo hi && pwd'").to_argv(),
            vec!["/bin/bash", "-c", "echo hi && pwd"]
        );
        assert_eq!(
            RemoteCommand::from("  /bin/bash -c \"a\nb\" ").to_argv(),
            vec!["/bin/bash", "-c", "a\nb"]
        );
        // Not a complete wrapped form: wrapped as a whole.
        assert_eq!(
            RemoteCommand::from("/bin/bash -c 'x' && rm y").to_argv(),
            vec!["/bin/bash", "-c", "/bin/bash -c 'x' && rm y"]
        );
    }

    #[test]
    fn test_argv_runs_verbatim() {
        let cmd = RemoteCommand::argv(["python3", "-c", "print(1)"]);
        assert_eq!(cmd.to_argv(), vec!["python3", "-c", "print(1)"]);
        assert_eq!(RemoteCommand::Argv(vec![]).to_argv(), vec!["/bin/bash", "-c", ""]);
    }

    #[test]
    fn test_remote_requires_running() {
        let fake = Arc::new(FakeRuntime::new());
        let mut exec = executor(&fake);
        assert!(matches!(
            exec.remote("echo hi"),
            Err(RemoteError::ContainerNotRunning { ref state, .. }) if state == "not launched"
        ));

        exec.start(false).unwrap();
        exec.lifecycle_mut().remove_container().unwrap();
        assert!(matches!(
            exec.remote("echo hi"),
            Err(RemoteError::ContainerNotRunning { ref state, .. }) if state == "removed"
        ));
    }

    #[test]
    fn test_remote_returns_nonzero_exit_without_error() {
        let fake = Arc::new(FakeRuntime::new());
        let mut exec = executor(&fake);
        exec.start(false).unwrap();
        let out = exec.remote("exit 3").unwrap();
        assert_eq!(out.exit_code, 3);
        let out = exec.remote("echo hello").unwrap();
        assert_eq!(out.stdout, "hello\n");
        assert_eq!(out.exit_code, 0);
    }

    #[test]
    fn test_vanished_container_surfaces_not_running() {
        let fake = Arc::new(FakeRuntime::new());
        let mut exec = executor(&fake);
        let id = exec.start(false).unwrap().id.clone();
        fake.vanish(&id);
        assert!(matches!(
            exec.remote("echo hi"),
            Err(RemoteError::ContainerNotRunning { .. })
        ));
        assert_eq!(exec.lifecycle().state(), Some(ContainerState::Removed));
    }

    #[test]
    fn test_set_remote_cwd() {
        let fake = Arc::new(FakeRuntime::new());
        let mut exec = executor(&fake);
        exec.start(false).unwrap();
        assert_eq!(exec.cwd(), Some("/remote_root"));

        assert!(matches!(
            exec.set_remote_cwd("/nope", false),
            Err(RemoteError::InvalidWorkingDirectory { .. })
        ));
        assert_eq!(exec.set_remote_cwd("/work/a", true).unwrap(), "/work/a");
        assert_eq!(exec.set_remote_cwd("b", true).unwrap(), "/work/a/b");
        assert_eq!(exec.remote("pwd").unwrap().stdout, "/work/a/b\n");

        let last = fake.exec_requests().pop().unwrap();
        assert_eq!(last.workdir.as_deref(), Some("/work/a/b"));
    }

    #[test]
    fn test_cwd_resets_when_container_recreated() {
        let fake = Arc::new(FakeRuntime::new());
        let mut exec = executor(&fake);
        exec.start(false).unwrap();
        exec.set_remote_cwd("/tmp", true).unwrap();
        assert_eq!(exec.cwd(), Some("/tmp"));

        exec.start(true).unwrap();
        assert_eq!(exec.cwd(), Some("/remote_root"));
    }
}
