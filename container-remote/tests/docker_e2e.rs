//! Against a real docker daemon. Run with `cargo test -- --ignored`.

use std::fs;
use std::sync::Arc;

use container_remote_core::config::{MountMode, StagingConfig};
use container_remote_docker::{
    ContainerRuntime, ContainerState, DockerCli, EnvConfig, RemoteEnv, RemoteError,
};

const IMAGE: &str = "ubuntu:22.04";

fn staging(parent: &std::path::Path) -> StagingConfig {
    StagingConfig {
        tmp_root: parent.to_path_buf(),
        mount_mode: MountMode::Copy,
        keep_staging: false,
        mount_boundary: None,
    }
}

#[test]
#[ignore = "requires a docker daemon"]
fn staged_file_is_readable_in_container() {
    let tmp = tempfile::tempdir().unwrap();
    let src = tmp.path().join("src");
    fs::create_dir_all(&src).unwrap();
    fs::write(src.join("x.txt"), "hello from the host").unwrap();

    let docker = Arc::new(DockerCli::default());
    let mut config = EnvConfig::new(IMAGE)
        .with_mounts([&src])
        .with_staging(staging(&tmp.path().join("staging")));
    config.command = vec!["sleep".into(), "infinity".into()];
    let mut env = RemoteEnv::initialize(config, docker.clone()).unwrap();
    let name = env.name().to_string();
    let root = env.staging_root().unwrap().to_path_buf();

    let out = env.execute("cat /remote_root/src/x.txt").unwrap();
    assert_eq!(out.stdout, "hello from the host");
    assert_eq!(out.exit_code, 0);

    let out = env.execute("exit 7").unwrap();
    assert_eq!(out.exit_code, 7);

    env.set_working_directory("/remote_root/src/nested", true).unwrap();
    assert_eq!(env.execute("pwd").unwrap().stdout.trim(), "/remote_root/src/nested");

    assert!(env.teardown().is_clean());
    assert_eq!(env.state(), Some(ContainerState::Removed));
    assert!(!root.exists());
    assert!(docker.find_by_name(&name).unwrap().is_empty());
    assert!(matches!(
        env.execute("true"),
        Err(RemoteError::ContainerNotRunning { .. })
    ));
}

#[test]
#[ignore = "requires a docker daemon"]
fn force_rerun_replaces_named_container() {
    let tmp = tempfile::tempdir().unwrap();
    let docker = Arc::new(DockerCli::default());
    let name = format!("container-remote-e2e-{}", std::process::id());

    let make = || {
        let mut config = EnvConfig::new(IMAGE).with_staging(staging(&tmp.path().join("staging")));
        config.name = Some(name.clone());
        config.command = vec!["sleep".into(), "infinity".into()];
        config
    };

    let mut first = RemoteEnv::initialize(make(), docker.clone()).unwrap();
    let first_id = first.container().unwrap().id.clone();
    let mut second = RemoteEnv::initialize(make(), docker.clone()).unwrap();

    let found = docker.find_by_name(&name).unwrap();
    assert_eq!(found.len(), 1);
    assert_ne!(found[0].id, first_id);

    assert!(second.teardown().is_clean());
    // The first handle's container is already gone; removal still succeeds.
    assert!(first.teardown().is_clean());
}
