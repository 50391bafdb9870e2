//! `bits plan` command

use anyhow::{Context, Result};

use crate::cli::PlanArgs;
use bits::core::descriptor::DEFAULT_TARGET;
use bits::core::Workspace;
use bits::ops::compose_workspace;
use bits::util::GlobalContext;

/// Targets to compose, `default` when none were named.
pub fn requested_targets(targets: &[String]) -> Vec<String> {
    if targets.is_empty() {
        vec![DEFAULT_TARGET.to_string()]
    } else {
        targets.to_vec()
    }
}

pub fn execute(args: PlanArgs, ctx: &GlobalContext) -> Result<()> {
    let ws = Workspace::discover(ctx)?;
    let targets = requested_targets(&args.target);

    let (_, projects) = compose_workspace(&ws, &targets)?;

    let json = match projects.as_slice() {
        [project] => serde_json::to_string_pretty(project),
        projects => serde_json::to_string_pretty(projects),
    }
    .context("failed to serialize composed project")?;

    println!("{}", json);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requested_targets_default() {
        assert_eq!(requested_targets(&[]), vec!["default"]);
    }

    #[test]
    fn test_requested_targets_keep_order() {
        let targets = vec!["nano33".to_string(), "default".to_string()];
        assert_eq!(requested_targets(&targets), targets);
    }
}
