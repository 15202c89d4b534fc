//! YAML config file: the `docker:` section plus the `mounts:` list.
//!
//! ```yaml
//! docker:
//!   image: ubuntu:22.04
//!   name: agent-box
//!   environment: {LANG: C.UTF-8}
//!   flags: {network: none, privileged: false}
//! mounts:
//!   - ./workspace
//! ```

use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::schema::MountMode;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileConfig {
    pub docker: DockerSection,
    #[serde(default)]
    pub mounts: Vec<PathBuf>,
    #[serde(default)]
    pub staging: StagingSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DockerSection {
    pub image: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub remote_root: Option<String>,
    #[serde(default)]
    pub workdir: Option<String>,
    #[serde(default)]
    pub command: Vec<String>,
    #[serde(default, deserialize_with = "scalar_map")]
    pub environment: BTreeMap<String, String>,
    /// Passed through to the runtime as `--key value`
    #[serde(default, deserialize_with = "scalar_map")]
    pub flags: BTreeMap<String, String>,
    #[serde(default)]
    pub force_rerun: Option<bool>,
    #[serde(default)]
    pub read_only: bool,
}

/// Overrides for the env-derived `StagingConfig`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StagingSection {
    #[serde(default)]
    pub tmp_root: Option<PathBuf>,
    #[serde(default)]
    pub mount_mode: Option<MountMode>,
    #[serde(default)]
    pub keep: Option<bool>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut cfg: Self = serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        // Relative mounts are relative to the config file, not the cwd.
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        for mount in cfg.mounts.iter_mut() {
            if mount.is_relative() {
                *mount = base.join(&*mount);
            }
        }
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_yaml::from_str(content).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.docker.image.trim().is_empty() {
            return Err(ConfigError::Invalid("docker.image must not be empty".into()));
        }
        if let Some(root) = &self.docker.remote_root {
            if !root.starts_with('/') {
                return Err(ConfigError::Invalid(format!(
                    "docker.remote_root must be absolute, got '{}'",
                    root
                )));
            }
        }
        Ok(())
    }
}

/// Accept YAML scalars of any type (`true`, `8080`, `"x"`) as strings.
fn scalar_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    use serde_yaml::Value;

    let raw: Option<BTreeMap<String, Value>> = Option::deserialize(deserializer)?;
    let mut out = BTreeMap::new();
    for (key, value) in raw.unwrap_or_default() {
        let rendered = match value {
            Value::String(s) => s,
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::Null => String::new(),
            other => {
                return Err(D::Error::custom(format!(
                    "value for '{}' must be a scalar, got {:?}",
                    key, other
                )))
            }
        };
        out.insert(key, rendered);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_parse_full_config() {
        let cfg = FileConfig::from_yaml_str(
            r#"
docker:
  image: python:3.12-slim
  name: agent-box
  remote_root: /work
  command: ["sleep", "infinity"]
  environment:
    DEBUG: 1
    LANG: C.UTF-8
  flags:
    network: none
    privileged: false
  force_rerun: false
mounts:
  - /tmp/src
staging:
  mount_mode: direct
"#,
        )
        .unwrap();
        assert_eq!(cfg.docker.image, "python:3.12-slim");
        assert_eq!(cfg.docker.name.as_deref(), Some("agent-box"));
        assert_eq!(cfg.docker.environment.get("DEBUG").unwrap(), "1");
        assert_eq!(cfg.docker.flags.get("privileged").unwrap(), "false");
        assert_eq!(cfg.docker.force_rerun, Some(false));
        assert_eq!(cfg.mounts, vec![PathBuf::from("/tmp/src")]);
        assert_eq!(cfg.staging.mount_mode, Some(MountMode::Direct));
    }

    #[test]
    fn test_rejects_relative_remote_root_and_empty_image() {
        let err = FileConfig::from_yaml_str("docker:\n  image: alpine\n  remote_root: work\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = FileConfig::from_yaml_str("docker:\n  image: ' '\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_nested_flag_value_rejected() {
        let yaml = "docker:\n  image: alpine\n  flags:\n    label: [a, b]\n";
        let err = FileConfig::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_load_resolves_relative_mounts_against_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.yaml");
        fs::write(&path, "docker:\n  image: alpine\nmounts:\n  - src\n  - /abs\n").unwrap();
        let cfg = FileConfig::load(&path).unwrap();
        assert_eq!(cfg.mounts, vec![tmp.path().join("src"), PathBuf::from("/abs")]);
    }
}
