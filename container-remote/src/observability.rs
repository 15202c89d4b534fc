//! Observability: tracing init and the JSONL audit log.
//!
//! Uses config::ObservabilityConfig for CONTAINER_REMOTE_QUIET, LOG_LEVEL,
//! LOG_JSON and AUDIT_LOG.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use chrono::Utc;
use container_remote_core::config::ObservabilityConfig;
use serde_json::json;
use tracing_subscriber::{prelude::*, EnvFilter};

/// Initialize tracing. Call at process startup.
/// With CONTAINER_REMOTE_QUIET=1 only WARN and above are logged.
pub fn init_tracing() {
    let cfg = ObservabilityConfig::from_env();
    let level = if cfg.quiet {
        "container_remote=warn".to_string()
    } else {
        cfg.log_level.clone()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

    // Logs go to stderr; stdout carries command output.
    let _ = if cfg.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .try_init()
    };
}

fn audit_path() -> Option<&'static str> {
    let path = ObservabilityConfig::from_env().audit_log.as_deref()?;
    if path.is_empty() {
        return None;
    }
    if let Some(parent) = Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    Some(path)
}

fn append_jsonl(path: &str, record: &serde_json::Value) {
    if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(path) {
        if let Ok(line) = serde_json::to_string(record) {
            let _ = writeln!(f, "{}", line);
        }
    }
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

fn environment_initialized_record(
    container: &str,
    image: &str,
    staging_root: Option<&Path>,
    mounts: &[String],
) -> serde_json::Value {
    json!({
        "ts": now(),
        "event": "environment_initialized",
        "container": container,
        "image": image,
        "staging_root": staging_root.map(|p| p.display().to_string()),
        "mounts": mounts,
    })
}

fn command_executed_record(
    container: &str,
    command: &str,
    cwd: Option<&str>,
    exit_code: i64,
    duration_ms: u128,
) -> serde_json::Value {
    json!({
        "ts": now(),
        "event": "command_executed",
        "container": container,
        "command": command,
        "cwd": cwd,
        "exit_code": exit_code,
        "duration_ms": duration_ms,
    })
}

fn environment_torn_down_record(
    container: &str,
    clean: bool,
    errors: &[String],
) -> serde_json::Value {
    json!({
        "ts": now(),
        "event": "environment_torn_down",
        "container": container,
        "clean": clean,
        "errors": errors,
    })
}

/// Audit: environment_initialized
pub fn audit_environment_initialized(
    container: &str,
    image: &str,
    staging_root: Option<&Path>,
    mounts: &[String],
) {
    if let Some(path) = audit_path() {
        append_jsonl(
            path,
            &environment_initialized_record(container, image, staging_root, mounts),
        );
    }
}

/// Audit: command_executed
pub fn audit_command_executed(
    container: &str,
    command: &str,
    cwd: Option<&str>,
    exit_code: i64,
    duration_ms: u128,
) {
    if let Some(path) = audit_path() {
        append_jsonl(
            path,
            &command_executed_record(container, command, cwd, exit_code, duration_ms),
        );
    }
}

/// Audit: environment_torn_down
pub fn audit_environment_torn_down(container: &str, clean: bool, errors: &[String]) {
    if let Some(path) = audit_path() {
        append_jsonl(path, &environment_torn_down_record(container, clean, errors));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_jsonl_writes_one_line_per_record() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("audit.jsonl");
        let path = path.to_str().unwrap();

        append_jsonl(
            path,
            &command_executed_record("box", "ls -la", Some("/remote_root"), 0, 12),
        );
        append_jsonl(path, &environment_torn_down_record("box", true, &[]));

        let content = std::fs::read_to_string(path).unwrap();
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "command_executed");
        assert_eq!(lines[0]["cwd"], "/remote_root");
        assert_eq!(lines[0]["exit_code"], 0);
        assert_eq!(lines[1]["event"], "environment_torn_down");
        assert_eq!(lines[1]["clean"], true);
        assert!(chrono::DateTime::parse_from_rfc3339(lines[1]["ts"].as_str().unwrap()).is_ok());
    }

    #[test]
    fn test_initialized_record_shape() {
        let record = environment_initialized_record(
            "box",
            "alpine",
            Some(Path::new("/tmp/alpine_1")),
            &["/a/src -> /remote_root/src".to_string()],
        );
        assert_eq!(record["event"], "environment_initialized");
        assert_eq!(record["staging_root"], "/tmp/alpine_1");
        assert_eq!(record["mounts"][0], "/a/src -> /remote_root/src");
    }
}
