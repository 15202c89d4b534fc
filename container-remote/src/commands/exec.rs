use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use container_remote_docker::{ContainerRuntime, ExecOutput, RemoteCommand};

use crate::cli::EnvArgs;
use crate::commands::{build_env_config, close_env, open_env, run_command};

/// Run one command in a fresh environment. Returns the command's exit code.
pub fn exec_once(
    args: &EnvArgs,
    command: &[String],
    json: bool,
    keep_staging: bool,
    runtime: Arc<dyn ContainerRuntime>,
) -> Result<i64> {
    let config = build_env_config(args, keep_staging)?;
    let mut env = open_env(config, runtime)?;

    let outcome = run_command(&mut env, remote_command(command));
    // Teardown happens whether or not the command ran.
    let closed = close_env(env);

    let output = outcome?;
    print_output(&output, json)?;
    closed?;
    Ok(output.exit_code)
}

/// A single word is a shell script (`exec -- 'ls | wc -l'`); several words
/// are an argv and keep their boundaries.
pub fn remote_command(command: &[String]) -> RemoteCommand {
    match command {
        [script] => RemoteCommand::shell(script.clone()),
        argv => RemoteCommand::argv(argv.iter().cloned()),
    }
}

pub fn print_output(output: &ExecOutput, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(output)?);
        return Ok(());
    }
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(output.stdout.as_bytes())?;
    stdout.flush()?;
    let mut stderr = std::io::stderr().lock();
    stderr.write_all(output.stderr.as_bytes())?;
    stderr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use container_remote_docker::testing::FakeRuntime;
    use std::fs;
    use std::path::PathBuf;

    #[test]
    fn test_exec_once_returns_exit_code_and_cleans_up() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir_all(&src).unwrap();

        let config = tmp.path().join("config.yaml");
        fs::write(
            &config,
            format!(
                "docker:\n  image: alpine\nmounts:\n  - src\nstaging:\n  tmp_root: {}\n",
                tmp.path().join("staging").display()
            ),
        )
        .unwrap();

        let fake = Arc::new(FakeRuntime::new());
        let args = EnvArgs {
            config: Some(config),
            ..EnvArgs::default()
        };
        let code = exec_once(
            &args,
            &["exit".to_string(), "4".to_string()],
            true,
            false,
            fake.clone(),
        )
        .unwrap();

        assert_eq!(code, 4);
        assert_eq!(fake.container_count(), 0);
        let staging: PathBuf = tmp.path().join("staging");
        assert_eq!(fs::read_dir(staging).unwrap().count(), 0);
    }

    #[test]
    fn test_exec_once_keeps_argument_boundaries() {
        let fake = Arc::new(FakeRuntime::new());
        let args = EnvArgs {
            image: Some("python:3.12-slim".into()),
            ..EnvArgs::default()
        };
        let command: Vec<String> = ["python3", "-c", "print(1)"].map(String::from).to_vec();
        exec_once(&args, &command, true, false, fake.clone()).unwrap();

        let request = fake.exec_requests().pop().unwrap();
        assert_eq!(request.argv, vec!["python3", "-c", "print(1)"]);
    }

    #[test]
    fn test_single_word_runs_through_shell() {
        let command = remote_command(&["ls | wc -l".to_string()]);
        assert_eq!(command.to_argv(), vec!["/bin/bash", "-c", "ls | wc -l"]);
        let command = remote_command(&["echo".to_string(), "a b".to_string()]);
        assert_eq!(command.to_argv(), vec!["echo", "a b"]);
    }
}
