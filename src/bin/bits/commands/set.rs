//! `bits set` command

use anyhow::Result;

use crate::cli::SetArgs;
use bits::ops::set_value;
use bits::util::GlobalContext;

pub fn execute(args: SetArgs, ctx: &GlobalContext) -> Result<()> {
    let path = ctx.find_descriptor()?;

    set_value(&path, &args.key, &args.value)?;

    eprintln!("     Updated `{}` in {}", args.key, path.display());
    Ok(())
}
