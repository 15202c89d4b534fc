//! `ContainerRuntime` backed by the `docker` command line client.
//!
//! Every call is one blocking `docker <subcommand>` process. Daemon errors
//! come back on stderr as `Error response from daemon: ...`; the two that the
//! lifecycle cares about (missing container, container not running) are
//! mapped to dedicated `RuntimeError` variants.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

use container_remote_core::config::DockerConfig;
use serde::Deserialize;

use crate::runtime::{
    ContainerRuntime, ContainerStatus, ContainerSummary, ExecOutput, ExecRequest, RuntimeError,
};
use crate::spec::{ContainerSpec, MOUNTS_LABEL};

const DAEMON_ERROR_PREFIX: &str = "Error response from daemon:";

#[derive(Debug, Clone)]
pub struct DockerCli {
    bin: String,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new("docker")
    }
}

impl DockerCli {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    pub fn from_config(config: &DockerConfig) -> Self {
        Self::new(config.docker_bin.clone())
    }

    /// Resolve the client binary on PATH. Fails early instead of on the
    /// first container operation.
    pub fn locate(&self) -> Result<PathBuf, RuntimeError> {
        which::which(&self.bin).map_err(|e| RuntimeError::Spawn {
            program: self.bin.clone(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, e.to_string()),
        })
    }

    pub fn bin(&self) -> &str {
        &self.bin
    }

    fn output(&self, args: &[String]) -> Result<Output, RuntimeError> {
        tracing::debug!(bin = %self.bin, args = ?args, "Running docker command");
        Command::new(&self.bin)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|source| RuntimeError::Spawn {
                program: self.bin.clone(),
                source,
            })
    }

    /// Run and require success; returns trimmed stdout.
    fn run(&self, args: &[String], target: &str) -> Result<String, RuntimeError> {
        let output = self.output(args)?;
        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).trim().to_string());
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        Err(classify_failure(
            &self.command_line(args),
            output.status.code(),
            stderr,
            target,
        ))
    }

    fn command_line(&self, args: &[String]) -> String {
        let subcommand = args.first().map(String::as_str).unwrap_or_default();
        format!("{} {}", self.bin, subcommand)
    }
}

/// `docker create` arguments for `spec`, image and command last.
pub fn create_args(spec: &ContainerSpec) -> Vec<String> {
    let mut args = vec!["create".to_string(), "--name".to_string(), spec.name.clone()];
    if let Some(workdir) = &spec.workdir {
        args.push("--workdir".to_string());
        args.push(workdir.clone());
    }
    for (key, value) in &spec.env {
        args.push("--env".to_string());
        args.push(format!("{}={}", key, value));
    }
    for volume in &spec.volumes {
        args.push("--volume".to_string());
        args.push(volume.to_string());
    }
    args.push("--label".to_string());
    args.push(format!("{}={}", MOUNTS_LABEL, spec.mounts_fingerprint()));
    args.extend(spec.extra_flag_args());
    if spec.command.is_empty() {
        // Keep shell-like default commands (bash, sh) alive without a client.
        args.push("--interactive".to_string());
        args.push("--tty".to_string());
    }
    args.push(spec.image.clone());
    args.extend(spec.command.iter().cloned());
    args
}

pub fn exec_args(id: &str, request: &ExecRequest) -> Vec<String> {
    let mut args = vec!["exec".to_string()];
    if let Some(workdir) = &request.workdir {
        args.push("--workdir".to_string());
        args.push(workdir.clone());
    }
    for (key, value) in &request.env {
        args.push("--env".to_string());
        args.push(format!("{}={}", key, value));
    }
    args.push(id.to_string());
    args.extend(request.argv.iter().cloned());
    args
}

fn classify_failure(
    command: &str,
    code: Option<i32>,
    stderr: String,
    target: &str,
) -> RuntimeError {
    if stderr.contains("No such container") {
        return RuntimeError::NotFound(target.to_string());
    }
    if stderr.contains("is not running") {
        return RuntimeError::NotRunning(target.to_string());
    }
    RuntimeError::CommandFailed {
        command: command.to_string(),
        code,
        stderr,
    }
}

/// One line of `docker ps --format '{{json .}}'`.
#[derive(Debug, Deserialize)]
struct PsLine {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Names")]
    names: String,
    #[serde(rename = "State", default)]
    state: String,
    /// `key=value` pairs joined with commas.
    #[serde(rename = "Labels", default)]
    labels: String,
}

fn parse_labels(raw: &str) -> BTreeMap<String, String> {
    raw.split(',')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .collect()
}

fn parse_ps(stdout: &str, name: &str) -> Result<Vec<ContainerSummary>, RuntimeError> {
    let mut found = Vec::new();
    for line in stdout.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let row: PsLine = serde_json::from_str(line).map_err(|e| {
            RuntimeError::Protocol(format!("bad `docker ps` line {:?}: {}", line, e))
        })?;
        // The name filter is a regex match; keep exact names only.
        if !row.names.split(',').any(|n| n.trim_start_matches('/') == name) {
            continue;
        }
        found.push(ContainerSummary {
            id: row.id,
            name: name.to_string(),
            status: ContainerStatus::parse(&row.state),
            labels: parse_labels(&row.labels),
        });
    }
    Ok(found)
}

impl ContainerRuntime for DockerCli {
    fn name(&self) -> &str {
        "docker"
    }

    fn create(&self, spec: &ContainerSpec) -> Result<String, RuntimeError> {
        let id = self.run(&create_args(spec), &spec.name)?;
        match id.lines().last() {
            Some(id) if !id.trim().is_empty() => Ok(id.trim().to_string()),
            _ => Err(RuntimeError::Protocol(
                "`docker create` printed no container id".to_string(),
            )),
        }
    }

    fn start(&self, id: &str) -> Result<(), RuntimeError> {
        self.run(&["start".to_string(), id.to_string()], id).map(|_| ())
    }

    fn exec(&self, id: &str, request: &ExecRequest) -> Result<ExecOutput, RuntimeError> {
        let output = self.output(&exec_args(id, request))?;
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        // A daemon error means the command never ran; anything else is the
        // command's own result and goes back to the caller untouched.
        if !output.status.success() && stderr.trim_start().starts_with(DAEMON_ERROR_PREFIX) {
            return Err(classify_failure(
                &format!("{} exec", self.bin),
                output.status.code(),
                stderr.trim().to_string(),
                id,
            ));
        }
        Ok(ExecOutput {
            stdout,
            stderr,
            exit_code: output.status.code().map(i64::from).unwrap_or(-1),
        })
    }

    fn stop(&self, id: &str) -> Result<(), RuntimeError> {
        self.run(&["stop".to_string(), id.to_string()], id).map(|_| ())
    }

    fn remove(&self, id: &str, force: bool) -> Result<(), RuntimeError> {
        let mut args = vec!["rm".to_string()];
        if force {
            args.push("--force".to_string());
        }
        args.push(id.to_string());
        self.run(&args, id).map(|_| ())
    }

    fn find_by_name(&self, name: &str) -> Result<Vec<ContainerSummary>, RuntimeError> {
        let args = vec![
            "ps".to_string(),
            "--all".to_string(),
            "--no-trunc".to_string(),
            "--filter".to_string(),
            format!("name=^/?{}$", regex::escape(name)),
            "--format".to_string(),
            "{{json .}}".to_string(),
        ];
        let stdout = self.run(&args, name)?;
        parse_ps(&stdout, name)
    }
}
