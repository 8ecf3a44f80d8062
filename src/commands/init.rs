use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config::{CONFIG_FILE_NAMES, EXAMPLE_CONFIG};

/// Write an example config into the current directory
pub fn init(force: bool) -> Result<()> {
    let cwd = std::env::current_dir().context("Failed to determine current directory")?;
    let path = write_example(&cwd, force)?;

    println!("✓ Configuration written to: {}", path.display());
    println!();
    println!("Next steps:");
    println!("  1. Adjust remote, branch and timeouts");
    println!("  2. Start checkpointing:");
    println!("     anti-eneo run");

    Ok(())
}

fn write_example(dir: &Path, force: bool) -> Result<PathBuf> {
    let path = dir.join(CONFIG_FILE_NAMES[0]);
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }

    std::fs::write(&path, EXAMPLE_CONFIG)
        .with_context(|| format!("Failed to write config file: {}", path.display()))?;

    Ok(path)
}
