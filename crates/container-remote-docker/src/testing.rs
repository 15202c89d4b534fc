//! In-memory `ContainerRuntime` for tests.
//!
//! Containers live in a map; exec understands a handful of shell commands
//! (`cat`, `ls`, `test -d`, `test -e`, `mkdir -p`, `pwd`, `echo`, `exit N`) and
//! resolves paths under bind mounts to the host, so staged files can be read
//! back through the container path.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use uuid::Uuid;

use crate::runtime::{
    ContainerRuntime, ContainerStatus, ContainerSummary, ExecOutput, ExecRequest, RuntimeError,
};
use crate::spec::{ContainerSpec, MOUNTS_LABEL};

#[derive(Debug, Clone)]
struct FakeContainer {
    id: String,
    name: String,
    status: ContainerStatus,
    spec: Option<ContainerSpec>,
    dirs: BTreeSet<String>,
}

#[derive(Debug, Default)]
struct FakeState {
    containers: Vec<FakeContainer>,
    execs: Vec<ExecRequest>,
    fail_create: Option<String>,
    fail_start: Option<String>,
    fail_remove: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct FakeRuntime {
    state: Arc<Mutex<FakeState>>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn fail_next_create(&self, message: &str) {
        self.lock().fail_create = Some(message.to_string());
    }

    pub fn fail_next_start(&self, message: &str) {
        self.lock().fail_start = Some(message.to_string());
    }

    pub fn fail_next_remove(&self, message: &str) {
        self.lock().fail_remove = Some(message.to_string());
    }

    /// Register a container created outside this runtime; returns its id.
    pub fn insert_container(&self, name: &str, status: ContainerStatus) -> String {
        let id = new_id();
        self.lock().containers.push(FakeContainer {
            id: id.clone(),
            name: name.to_string(),
            status,
            spec: None,
            dirs: default_dirs(),
        });
        id
    }

    /// Drop a container behind the lifecycle's back.
    pub fn vanish(&self, id: &str) {
        self.lock().containers.retain(|c| c.id != id);
    }

    pub fn containers_named(&self, name: &str) -> Vec<ContainerSummary> {
        self.lock()
            .containers
            .iter()
            .filter(|c| c.name == name)
            .map(summary)
            .collect()
    }

    pub fn container_count(&self) -> usize {
        self.lock().containers.len()
    }

    pub fn spec_of(&self, id: &str) -> Option<ContainerSpec> {
        self.lock()
            .containers
            .iter()
            .find(|c| c.id == id)
            .and_then(|c| c.spec.clone())
    }

    pub fn exec_requests(&self) -> Vec<ExecRequest> {
        self.lock().execs.clone()
    }
}

fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

fn default_dirs() -> BTreeSet<String> {
    ["/", "/tmp", "/root"].iter().map(|s| s.to_string()).collect()
}

/// Created containers carry the mounts label, like `docker create` does;
/// inserted ones carry none.
fn summary(c: &FakeContainer) -> ContainerSummary {
    let labels = c
        .spec
        .iter()
        .map(|spec| (MOUNTS_LABEL.to_string(), spec.mounts_fingerprint()))
        .collect::<BTreeMap<_, _>>();
    ContainerSummary {
        id: c.id.clone(),
        name: c.name.clone(),
        status: c.status.clone(),
        labels,
    }
}

fn find<'a>(state: &'a mut FakeState, id: &str) -> Result<&'a mut FakeContainer, RuntimeError> {
    state
        .containers
        .iter_mut()
        .find(|c| c.id == id || c.name == id)
        .ok_or_else(|| RuntimeError::NotFound(id.to_string()))
}

fn failure(command: &str, message: String) -> RuntimeError {
    RuntimeError::CommandFailed {
        command: command.to_string(),
        code: Some(125),
        stderr: message,
    }
}

impl ContainerRuntime for FakeRuntime {
    fn name(&self) -> &str {
        "fake"
    }

    fn create(&self, spec: &ContainerSpec) -> Result<String, RuntimeError> {
        let mut state = self.lock();
        if let Some(message) = state.fail_create.take() {
            return Err(failure("create", message));
        }
        if state.containers.iter().any(|c| c.name == spec.name) {
            return Err(failure(
                "create",
                format!("Conflict. The container name \"/{}\" is already in use", spec.name),
            ));
        }
        let mut dirs = default_dirs();
        if let Some(workdir) = &spec.workdir {
            add_with_ancestors(&mut dirs, workdir);
        }
        for volume in &spec.volumes {
            if let Some(parent) = volume.container.parent() {
                add_with_ancestors(&mut dirs, &parent.to_string_lossy());
            }
        }
        let id = new_id();
        state.containers.push(FakeContainer {
            id: id.clone(),
            name: spec.name.clone(),
            status: ContainerStatus::Created,
            spec: Some(spec.clone()),
            dirs,
        });
        Ok(id)
    }

    fn start(&self, id: &str) -> Result<(), RuntimeError> {
        let mut state = self.lock();
        if let Some(message) = state.fail_start.take() {
            return Err(failure("start", message));
        }
        find(&mut state, id)?.status = ContainerStatus::Running;
        Ok(())
    }

    fn exec(&self, id: &str, request: &ExecRequest) -> Result<ExecOutput, RuntimeError> {
        let mut state = self.lock();
        state.execs.push(request.clone());
        let container = find(&mut state, id)?;
        if container.status != ContainerStatus::Running {
            return Err(RuntimeError::NotRunning(id.to_string()));
        }
        Ok(run(container, request))
    }

    fn stop(&self, id: &str) -> Result<(), RuntimeError> {
        let mut state = self.lock();
        let container = find(&mut state, id)?;
        if container.status != ContainerStatus::Running {
            return Err(RuntimeError::NotRunning(id.to_string()));
        }
        container.status = ContainerStatus::Exited;
        Ok(())
    }

    fn remove(&self, id: &str, force: bool) -> Result<(), RuntimeError> {
        let mut state = self.lock();
        if let Some(message) = state.fail_remove.take() {
            return Err(failure("rm", message));
        }
        let container = find(&mut state, id)?;
        if container.status == ContainerStatus::Running && !force {
            return Err(failure(
                "rm",
                "You cannot remove a running container".to_string(),
            ));
        }
        let id = container.id.clone();
        state.containers.retain(|c| c.id != id);
        Ok(())
    }

    fn find_by_name(&self, name: &str) -> Result<Vec<ContainerSummary>, RuntimeError> {
        Ok(self.containers_named(name))
    }
}

fn add_with_ancestors(dirs: &mut BTreeSet<String>, dir: &str) {
    let mut path = PathBuf::from(dir);
    loop {
        dirs.insert(path.to_string_lossy().into_owned());
        if !path.pop() {
            break;
        }
    }
}

fn output(stdout: String, stderr: String, exit_code: i64) -> ExecOutput {
    ExecOutput {
        stdout,
        stderr,
        exit_code,
    }
}

/// Host path behind a container path, if it sits under a bind mount.
fn host_path(container: &FakeContainer, path: &str) -> Option<PathBuf> {
    let spec = container.spec.as_ref()?;
    let path = Path::new(path);
    spec.volumes.iter().find_map(|v| {
        path.strip_prefix(&v.container)
            .ok()
            .map(|rel| v.host.join(rel))
    })
}

fn absolute(workdir: Option<&str>, path: &str) -> String {
    if path.starts_with('/') {
        return path.to_string();
    }
    let base = workdir.unwrap_or("/").trim_end_matches('/');
    format!("{}/{}", base, path)
}

fn run(container: &mut FakeContainer, request: &ExecRequest) -> ExecOutput {
    let argv: Vec<String> = match request.argv.as_slice() {
        [shell, flag, script] if shell == "/bin/bash" && flag == "-c" => {
            script.split_whitespace().map(str::to_string).collect()
        }
        other => other.to_vec(),
    };
    let workdir = request.workdir.as_deref();
    let args: Vec<&str> = argv.iter().map(String::as_str).collect();

    match args.as_slice() {
        [] => output(String::new(), String::new(), 0),
        ["pwd"] => output(format!("{}\n", workdir.unwrap_or("/")), String::new(), 0),
        ["echo", rest @ ..] => output(format!("{}\n", rest.join(" ")), String::new(), 0),
        ["exit", code] => output(String::new(), String::new(), code.parse().unwrap_or(2)),
        ["mkdir", "-p", paths @ ..] => {
            for p in paths.iter().filter(|p| **p != "--") {
                let p = absolute(workdir, p);
                match host_path(container, &p) {
                    Some(host) => {
                        if let Err(e) = std::fs::create_dir_all(&host) {
                            return output(String::new(), format!("mkdir: {}: {}\n", p, e), 1);
                        }
                    }
                    None => add_with_ancestors(&mut container.dirs, &p),
                }
            }
            output(String::new(), String::new(), 0)
        }
        ["test", flag @ ("-d" | "-e"), path] => {
            let p = absolute(workdir, path);
            let exists = match host_path(container, &p) {
                Some(host) if *flag == "-d" => host.is_dir(),
                Some(host) => host.exists(),
                None => container.dirs.contains(&p),
            };
            output(String::new(), String::new(), if exists { 0 } else { 1 })
        }
        ["cat", paths @ ..] => {
            let mut stdout = String::new();
            for p in paths {
                let p = absolute(workdir, p);
                match host_path(container, &p).map(std::fs::read_to_string) {
                    Some(Ok(content)) => stdout.push_str(&content),
                    _ => {
                        return output(
                            stdout,
                            format!("cat: {}: No such file or directory\n", p),
                            1,
                        )
                    }
                }
            }
            output(stdout, String::new(), 0)
        }
        ["ls", path] => {
            let p = absolute(workdir, path);
            let listing = host_path(container, &p)
                .and_then(|host| std::fs::read_dir(host).ok())
                .map(|entries| {
                    let mut names: Vec<String> = entries
                        .filter_map(|e| e.ok())
                        .map(|e| e.file_name().to_string_lossy().into_owned())
                        .collect();
                    names.sort();
                    names
                });
            match listing {
                Some(names) => output(
                    names.iter().map(|n| format!("{}\n", n)).collect(),
                    String::new(),
                    0,
                ),
                None => output(
                    String::new(),
                    format!("ls: cannot access '{}': No such file or directory\n", p),
                    2,
                ),
            }
        }
        [program, ..] => output(
            String::new(),
            format!("bash: {}: command not found\n", program),
            127,
        ),
    }
}
