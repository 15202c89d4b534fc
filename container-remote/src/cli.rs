use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// container-remote - run commands in a disposable container against staged
/// copies of host directories
#[derive(Parser, Debug)]
#[command(name = "container-remote")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Print machine-readable JSON instead of plain text
    #[arg(long, global = true)]
    pub json: bool,

    /// Leave the staging directory on disk after teardown
    #[arg(long, global = true)]
    pub keep_staging: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Bring up the environment and open an interactive shell loop
    Shell {
        #[command(flatten)]
        env: EnvArgs,
    },

    /// Bring up the environment, run one command, tear down
    Exec {
        #[command(flatten)]
        env: EnvArgs,

        /// Command to run (joined and run through /bin/bash -c)
        #[arg(last = true, required = true, value_name = "CMD")]
        command: Vec<String>,
    },

    /// Print the mount roots a set of paths concentrates to
    Concentrate {
        #[arg(required = true, value_name = "PATH")]
        paths: Vec<PathBuf>,

        /// Reject roots outside this directory
        #[arg(long, value_name = "DIR")]
        boundary: Option<PathBuf>,
    },
}

/// Where the environment definition comes from. Flags override the file.
#[derive(Args, Debug, Clone, Default)]
pub struct EnvArgs {
    /// YAML config with `docker:` and `mounts:` sections
    #[arg(long, short = 'c', value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Image to run (required without --config)
    #[arg(long)]
    pub image: Option<String>,

    /// Container name (generated when omitted)
    #[arg(long)]
    pub name: Option<String>,

    /// Host path to mount; repeatable
    #[arg(long = "mount", short = 'm', value_name = "PATH")]
    pub mounts: Vec<PathBuf>,

    /// Reuse a running container of the same name instead of replacing it
    #[arg(long)]
    pub reuse: bool,
}
