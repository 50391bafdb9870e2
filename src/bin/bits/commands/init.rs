//! `bits init` command

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::cli::InitArgs;
use bits::ops::bits_new::{init_project, NewOptions};
use bits::util::GlobalContext;

/// Determines the project name from the arguments or directory.
pub fn determine_project_name(name: &Option<String>, path: &Path) -> String {
    name.clone().unwrap_or_else(|| {
        path.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unnamed")
            .to_string()
    })
}

pub fn execute(args: InitArgs, ctx: &GlobalContext) -> Result<()> {
    let path = match args.path {
        Some(path) if path.is_absolute() => path,
        Some(path) => ctx.cwd().join(path),
        None => PathBuf::from(ctx.cwd()),
    };

    let name = determine_project_name(&args.name, &path);

    let opts = NewOptions {
        name: name.clone(),
        init: true,
    };

    init_project(&path, &opts)?;

    eprintln!("     Created project `{}`", name);

    Ok(())
}
