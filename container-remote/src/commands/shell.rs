//! Interactive loop: every line runs in the container until `exit`.
//!
//! Built-ins: `exit`/`quit`, `cd <dir>` (moves the remote working directory),
//! `:history` (commands run so far with their exit codes).

use std::sync::Arc;

use anyhow::{Context, Result};
use container_remote_docker::{ContainerRuntime, RemoteEnv, RemoteError};

use crate::cli::EnvArgs;
use crate::commands::exec::print_output;
use crate::commands::{build_env_config, close_env, display_path, open_env, run_command};
use crate::history::Transcript;

/// What the loop should do after a line.
#[derive(Debug, PartialEq, Eq)]
pub enum LineOutcome {
    Continue,
    Exit,
}

pub fn run_shell(
    args: &EnvArgs,
    json: bool,
    keep_staging: bool,
    runtime: Arc<dyn ContainerRuntime>,
) -> Result<()> {
    let config = build_env_config(args, keep_staging)?;
    let mut env = open_env(config, runtime)?;

    eprintln!("Container: {}", env.name());
    eprintln!("Staging:   {}", display_path(env.staging_root()));
    for mount in env.mounts() {
        eprintln!(
            "Mount:     {} -> {}",
            mount.source.display(),
            mount.container_path.display()
        );
    }
    eprintln!("Type `exit` to quit, `:history` for the command log.\n");

    let looped = interactive_loop(&mut env, json);
    let closed = close_env(env);
    looped?;
    closed
}

fn interactive_loop(env: &mut RemoteEnv, json: bool) -> Result<()> {
    let mut rl = rustyline::DefaultEditor::new().context("Failed to create line editor")?;
    let mut transcript = Transcript::default();

    loop {
        let prompt = format!("{}:{}$ ", env.name(), env.cwd().unwrap_or("/"));
        match rl.readline(&prompt) {
            Ok(line) => {
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(input);
                match handle_line(env, &mut transcript, input, json) {
                    Ok(LineOutcome::Exit) => break,
                    Ok(LineOutcome::Continue) => {}
                    Err(e) => {
                        eprintln!("Error: {:#}", e);
                        if matches!(
                            e.downcast_ref::<RemoteError>(),
                            Some(RemoteError::ContainerNotRunning { .. })
                        ) {
                            break;
                        }
                    }
                }
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                eprintln!("^C");
                break;
            }
            Err(rustyline::error::ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("Error: {}", e);
                break;
            }
        }
    }
    Ok(())
}

pub fn handle_line(
    env: &mut RemoteEnv,
    transcript: &mut Transcript,
    input: &str,
    json: bool,
) -> Result<LineOutcome> {
    match input {
        "exit" | "quit" => return Ok(LineOutcome::Exit),
        ":history" => {
            if json {
                let entries: Vec<_> = transcript.entries().collect();
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                print!("{}", transcript.render());
            }
            return Ok(LineOutcome::Continue);
        }
        _ => {}
    }

    if input == "cd" || input.starts_with("cd ") {
        let dir = input[2..].trim();
        let target = if dir.is_empty() {
            env.remote_root().display().to_string()
        } else {
            dir.to_string()
        };
        env.set_working_directory(&target, false)?;
        return Ok(LineOutcome::Continue);
    }

    let cwd = env.cwd().map(str::to_string);
    let output = run_command(env, input)?;
    transcript.record(input, cwd.as_deref(), output.exit_code, &output.stdout, &output.stderr);
    print_output(&output, json)?;
    Ok(LineOutcome::Continue)
}
