//! Implementation of `bits new` and `bits init`.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::core::descriptor::{generate_default_descriptor, DEFAULT_MAIN, DESCRIPTOR_NAME};

/// Options for creating a new project.
#[derive(Debug, Clone)]
pub struct NewOptions {
    /// Project name
    pub name: String,

    /// Initialize in existing directory
    pub init: bool,
}

/// Create a new bits project.
pub fn new_project(path: &Path, opts: &NewOptions) -> Result<()> {
    if path.exists() && !opts.init {
        bail!(
            "destination `{}` already exists\n\
             \n\
             Use `bits init` to initialize an existing directory.",
            path.display()
        );
    }

    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("failed to create directory: {}", path.display()))?;
    }

    let descriptor_path = path.join(DESCRIPTOR_NAME);
    if descriptor_path.exists() {
        bail!("`{}` already exists in `{}`", DESCRIPTOR_NAME, path.display());
    }

    fs::write(&descriptor_path, generate_default_descriptor(&opts.name))
        .with_context(|| format!("failed to write {}", DESCRIPTOR_NAME))?;

    let src_dir = path.join("src");
    fs::create_dir_all(&src_dir).with_context(|| "failed to create src directory")?;
    fs::create_dir_all(path.join("include"))
        .with_context(|| "failed to create include directory")?;

    let main_path = path.join(DEFAULT_MAIN);
    if !main_path.exists() {
        let main_content = r#"#include <cstdio>

int main(int argc, char *argv[]) {
    std::printf("Hello, bits!\n");
    return 0;
}
"#;
        fs::write(&main_path, main_content)?;
    }

    let unit = src_dir.join(format!("{}.cpp", source_stem(&opts.name)));
    if !unit.exists() {
        fs::write(&unit, format!("// {}\n", opts.name))?;
    }

    let gitignore = path.join(".gitignore");
    if !gitignore.exists() {
        let content = r#"# bits state and generated recipe
.bits/
CMakeLists.txt

# Editor files
*.swp
*~
.vscode/
.idea/
"#;
        fs::write(&gitignore, content)?;
    }

    tracing::info!("created project `{}` in {}", opts.name, path.display());
    Ok(())
}

/// Initialize a bits project in an existing directory.
pub fn init_project(path: &Path, opts: &NewOptions) -> Result<()> {
    let mut opts = opts.clone();
    opts.init = true;
    new_project(path, &opts)
}

fn source_stem(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}
