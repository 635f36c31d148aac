use crate::runner::Runner;
use crate::utils::stays_inside;
use anyhow::{bail, Context as _, Result};
use std::fs;

/// Delete the output root; a missing root is not an error
pub fn clean(runner: &Runner) -> Result<()> {
    let ctx = runner.context();
    let output = ctx.output_dir();

    if ctx.config.output.as_os_str().is_empty()
        || !stays_inside(&ctx.config.output)
        || output == ctx.root
    {
        bail!(
            "Refusing to delete {}: the output root must be a directory inside the project",
            output.display()
        );
    }

    if !output.exists() {
        ctx.reporter.debug(&format!("{} does not exist", output.display()));
        return Ok(());
    }

    fs::remove_dir_all(&output)
        .with_context(|| format!("Failed to delete {}", output.display()))?;
    ctx.reporter.debug(&format!("Deleted {}", output.display()));
    Ok(())
}
