//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// bits - project descriptors for a C/C++ build tool
#[derive(Parser)]
#[command(name = "bits")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the composed project as JSON
    Plan(PlanArgs),

    /// Write the CMake recipe for a target
    Generate(GenerateArgs),

    /// Display the resolved bit tree
    Tree(TreeArgs),

    /// Set a value in project.yaml
    Set(SetArgs),

    /// Create a new project
    New(NewArgs),

    /// Initialize a project in an existing directory
    Init(InitArgs),
}

#[derive(Args)]
pub struct PlanArgs {
    /// Targets to compose (defaults to `default`)
    #[arg(short, long)]
    pub target: Vec<String>,
}

#[derive(Args)]
pub struct GenerateArgs {
    /// Target to generate the recipe for
    #[arg(short, long, default_value = "default")]
    pub target: String,

    /// Output file (defaults to the configured output)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct TreeArgs {}

#[derive(Args)]
pub struct SetArgs {
    /// Dotted key, e.g. `build.cflags`
    pub key: String,

    /// Value, read as a literal (`[a, b]` for a list)
    pub value: String,
}

#[derive(Args)]
pub struct NewArgs {
    /// Project name
    pub name: String,

    /// Directory to create the project in (defaults to name)
    #[arg(long)]
    pub path: Option<PathBuf>,
}

#[derive(Args)]
pub struct InitArgs {
    /// Project name (defaults to directory name)
    #[arg(long)]
    pub name: Option<String>,

    /// Directory to initialize (defaults to current directory)
    pub path: Option<PathBuf>,
}
