//! What to launch: image, command, name, env, volumes and passthrough flags.

use std::collections::BTreeMap;

use container_remote_mount::VolumeBinding;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Prefix for names generated when the caller gives none.
pub const GENERATED_NAME_PREFIX: &str = "container-remote";

/// Label carrying [`ContainerSpec::mounts_fingerprint`] on every created
/// container.
pub const MOUNTS_LABEL: &str = "container-remote.mounts";

/// Flags that collide with explicit `ContainerSpec` fields.
const RESERVED_FLAGS: &[&str] = &[
    "name", "workdir", "w", "env", "e", "volume", "v", "mount", "image",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub image: String,
    /// Empty means the image's default command (kept alive with `-i -t`).
    pub command: Vec<String>,
    pub name: String,
    pub env: BTreeMap<String, String>,
    pub workdir: Option<String>,
    pub volumes: Vec<VolumeBinding>,
    /// Rendered as `--key value`; see [`ContainerSpec::extra_flag_args`].
    pub extra_flags: BTreeMap<String, String>,
}

impl ContainerSpec {
    /// A spec with a generated, collision-free name.
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            command: Vec::new(),
            name: generate_name(),
            env: BTreeMap::new(),
            workdir: None,
            volumes: Vec::new(),
            extra_flags: BTreeMap::new(),
        }
    }

    pub fn with_name(mut self, name: Option<String>) -> Self {
        if let Some(name) = name.filter(|n| !n.trim().is_empty()) {
            self.name = name;
        }
        self
    }

    pub fn with_command(mut self, command: Vec<String>) -> Self {
        self.command = command;
        self
    }

    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn with_workdir(mut self, workdir: Option<String>) -> Self {
        self.workdir = workdir;
        self
    }

    pub fn with_volumes(mut self, volumes: Vec<VolumeBinding>) -> Self {
        self.volumes = volumes;
        self
    }

    pub fn with_extra_flags(mut self, flags: BTreeMap<String, String>) -> Self {
        self.extra_flags = flags;
        self
    }

    /// Hex SHA-256 over the volume list. Two specs with the same fingerprint
    /// bind the same host paths at the same container paths.
    pub fn mounts_fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for volume in &self.volumes {
            hasher.update(volume.to_string().as_bytes());
            hasher.update(b"\n");
        }
        hex::encode(hasher.finalize())
    }

    /// True when a container carrying `labels` was created with this spec's
    /// volumes.
    pub fn mounts_match(&self, labels: &BTreeMap<String, String>) -> bool {
        labels.get(MOUNTS_LABEL).map(String::as_str) == Some(self.mounts_fingerprint().as_str())
    }

    /// Passthrough flags as CLI arguments.
    ///
    /// `network: host` becomes `--network host`, `privileged: true`
    /// becomes `--privileged`, `false` drops the flag. Single-letter keys use
    /// the short form. Keys that would override an explicit field are dropped.
    pub fn extra_flag_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        for (key, value) in &self.extra_flags {
            let flag = key.trim().trim_start_matches('-').replace('_', "-");
            if flag.is_empty() {
                continue;
            }
            if RESERVED_FLAGS.contains(&flag.as_str()) {
                tracing::warn!(
                    flag = %flag,
                    "Ignoring extra flag that overrides an explicit field"
                );
                continue;
            }
            let rendered = if flag.len() == 1 {
                format!("-{}", flag)
            } else {
                format!("--{}", flag)
            };
            match value.trim() {
                "false" => {}
                "true" | "" => args.push(rendered),
                v => {
                    args.push(rendered);
                    args.push(v.to_string());
                }
            }
        }
        args
    }
}

pub fn generate_name() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{}-{}", GENERATED_NAME_PREFIX, &id[..12])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags(items: &[(&str, &str)]) -> BTreeMap<String, String> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_generated_names_are_unique() {
        let a = ContainerSpec::new("alpine");
        let b = ContainerSpec::new("alpine");
        assert!(a.name.starts_with("container-remote-"));
        assert_eq!(a.name.len(), "container-remote-".len() + 12);
        assert_ne!(a.name, b.name);
    }

    #[test]
    fn test_with_name_ignores_blank() {
        let spec = ContainerSpec::new("alpine").with_name(Some("  ".into()));
        assert!(spec.name.starts_with(GENERATED_NAME_PREFIX));
        let spec = spec.with_name(Some("box".into()));
        assert_eq!(spec.name, "box");
    }

    #[test]
    fn test_extra_flag_rendering() {
        let spec = ContainerSpec::new("alpine").with_extra_flags(flags(&[
            ("security_opt", "no-new-privileges"),
            ("privileged", "true"),
            ("rm", "false"),
            ("m", "512m"),
            ("init", ""),
        ]));
        assert_eq!(
            spec.extra_flag_args(),
            vec![
                "--init",
                "-m",
                "512m",
                "--privileged",
                "--security-opt",
                "no-new-privileges",
            ]
        );
    }

    #[test]
    fn test_reserved_flags_are_dropped() {
        let spec = ContainerSpec::new("alpine").with_extra_flags(flags(&[
            ("name", "other"),
            ("volume", "/etc:/etc"),
            ("--workdir", "/"),
            ("cpus", "2"),
        ]));
        assert_eq!(spec.extra_flag_args(), vec!["--cpus", "2"]);
    }

    #[test]
    fn test_mounts_fingerprint_tracks_volumes() {
        let volume = |host: &str| VolumeBinding {
            host: host.into(),
            container: "/remote_root/src".into(),
            read_only: false,
        };
        let a = ContainerSpec::new("alpine").with_volumes(vec![volume("/tmp/s1/src")]);
        let same = ContainerSpec::new("ubuntu").with_volumes(vec![volume("/tmp/s1/src")]);
        let moved = ContainerSpec::new("alpine").with_volumes(vec![volume("/tmp/s2/src")]);

        assert_eq!(a.mounts_fingerprint(), same.mounts_fingerprint());
        assert_ne!(a.mounts_fingerprint(), moved.mounts_fingerprint());
        assert_eq!(a.mounts_fingerprint().len(), 64);

        let labels = BTreeMap::from([(MOUNTS_LABEL.to_string(), a.mounts_fingerprint())]);
        assert!(same.mounts_match(&labels));
        assert!(!moved.mounts_match(&labels));
        assert!(!a.mounts_match(&BTreeMap::new()));
    }
}
