//! Recipe generation: resolve, compose and write a CMake recipe.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::builder::cmake;
use crate::core::Workspace;
use crate::ops::load::compose_workspace;
use crate::resolver::ResolveWarning;
use crate::util::fs::write_string;

/// Result of generating a recipe.
#[derive(Debug)]
pub struct GenerateResult {
    pub path: PathBuf,
    pub warnings: Vec<ResolveWarning>,
}

/// Generate the recipe for `target` and write it.
///
/// Relative output paths are taken from the workspace root; without one the
/// configured output file name is used.
pub fn generate_recipe(
    ws: &Workspace,
    target: &str,
    output: Option<&Path>,
) -> Result<GenerateResult> {
    let (resolution, projects) = compose_workspace(ws, &[target.to_string()])?;
    let project = projects
        .into_iter()
        .next()
        .with_context(|| format!("target `{}` produced no project", target))?;

    let recipe = cmake::render(&project, &ws.config().recipe_options());

    let path = match output {
        Some(path) if path.is_absolute() => path.to_path_buf(),
        Some(path) => ws.root().join(path),
        None => ws.output_path(),
    };
    write_string(&path, &recipe)?;
    tracing::info!("wrote {} for target `{}`", path.display(), target);

    Ok(GenerateResult {
        path,
        warnings: resolution.warnings,
    })
}
