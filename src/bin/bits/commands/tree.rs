//! `bits tree` command

use anyhow::Result;

use crate::cli::TreeArgs;
use bits::core::Workspace;
use bits::ops::resolve_workspace;
use bits::util::GlobalContext;

pub fn execute(_args: TreeArgs, ctx: &GlobalContext) -> Result<()> {
    let ws = Workspace::discover(ctx)?;
    let resolution = resolve_workspace(&ws)?;

    print!("{}", resolution.graph.render_tree());

    if !resolution.warnings.is_empty() {
        println!();
        for warning in &resolution.warnings {
            println!("warning: {}", warning);
        }
    }

    Ok(())
}
