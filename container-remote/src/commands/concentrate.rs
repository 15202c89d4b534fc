use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use container_remote_mount::concentrate_sources;

pub fn concentrate_paths(paths: &[PathBuf], boundary: Option<&Path>) -> Result<Vec<PathBuf>> {
    concentrate_sources(paths, boundary).context("Failed to concentrate paths")
}

pub fn print_roots(roots: &[PathBuf], json: bool) -> Result<()> {
    if json {
        let rendered: Vec<String> = roots.iter().map(|p| p.display().to_string()).collect();
        println!("{}", serde_json::to_string_pretty(&rendered)?);
    } else {
        for root in roots {
            println!("{}", root.display());
        }
    }
    Ok(())
}
