//! Workspace loading: resolve bits and compose targets.

use std::path::Path;

use anyhow::{Context, Result};

use crate::core::project::Project;
use crate::core::Workspace;
use crate::ops::compose::{Composer, LocalFs};
use crate::resolver::{LocalBitSource, Resolution, Resolver};

/// Resolve every declared bit of the workspace descriptor.
///
/// Missing bits are reported as warnings on the resolution; only a broken
/// bit descriptor or a rejected version conflict fails.
pub fn resolve_workspace(ws: &Workspace) -> Result<Resolution> {
    let config = ws.config().resolver_config(ws.root());
    let source = LocalBitSource::new(&config.bits_dir);
    tracing::debug!("resolving bits from {}", source.bits_dir().display());

    let resolution = Resolver::new(&source, config.conflict)
        .resolve(ws.descriptor().clone())
        .with_context(|| format!("failed to resolve bits for `{}`", ws.descriptor().name))?;

    Ok(resolution)
}

/// Resolve the workspace and compose the given targets, in order.
pub fn compose_workspace(ws: &Workspace, targets: &[String]) -> Result<(Resolution, Vec<Project>)> {
    let resolution = resolve_workspace(ws)?;
    let projects = compose_resolved(ws.root(), ws.config().bits_dir(), &resolution, targets)?;
    Ok((resolution, projects))
}

/// Compose targets of an already resolved descriptor rooted at `root`.
pub fn compose_resolved(
    root: &Path,
    bits_dir: &str,
    resolution: &Resolution,
    targets: &[String],
) -> Result<Vec<Project>> {
    let fs = LocalFs::new(root);
    let projects = Composer::new(&fs)
        .with_bits_dir(bits_dir)
        .compose_targets(&resolution.descriptor, targets)?;
    Ok(projects)
}
