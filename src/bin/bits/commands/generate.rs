//! `bits generate` command

use anyhow::Result;

use crate::cli::GenerateArgs;
use bits::core::Workspace;
use bits::ops::generate_recipe;
use bits::util::GlobalContext;

pub fn execute(args: GenerateArgs, ctx: &GlobalContext) -> Result<()> {
    let ws = Workspace::discover(ctx)?;

    let result = generate_recipe(&ws, &args.target, args.output.as_deref())?;

    eprintln!(
        "   Generated {} for target `{}`",
        result.path.display(),
        args.target
    );
    if !result.warnings.is_empty() {
        eprintln!("    {} warning(s) during resolution", result.warnings.len());
    }

    Ok(())
}
