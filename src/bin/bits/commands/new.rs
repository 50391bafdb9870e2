//! `bits new` command

use std::path::PathBuf;

use anyhow::Result;

use crate::cli::NewArgs;
use bits::ops::bits_new::{new_project, NewOptions};

/// Determines the output path for a new project.
///
/// If a path is explicitly specified, uses that. Otherwise, creates a directory
/// with the same name as the project.
pub fn determine_project_path(name: &str, path: &Option<PathBuf>) -> PathBuf {
    path.clone().unwrap_or_else(|| PathBuf::from(name))
}

pub fn execute(args: NewArgs) -> Result<()> {
    let path = determine_project_path(&args.name, &args.path);

    let opts = NewOptions {
        name: args.name.clone(),
        init: false,
    };

    new_project(&path, &opts)?;

    eprintln!("     Created project `{}`", args.name);

    Ok(())
}
