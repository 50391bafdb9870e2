//! bits CLI - project descriptors for a C/C++ build tool

use std::io::IsTerminal;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use bits::resolver::ResolveError;
use bits::util::diagnostic::emit;
use bits::{DescriptorError, GlobalContext};
use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();
    let color = !cli.no_color && std::io::stderr().is_terminal();

    if let Err(e) = run(cli, color) {
        report(e, color);
        std::process::exit(1);
    }
}

fn run(cli: Cli, color: bool) -> Result<()> {
    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("bits=debug")
    } else {
        EnvFilter::new("bits=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(color)
        .with_target(false)
        .without_time()
        .init();

    let mut ctx = GlobalContext::new()?;
    ctx.set_verbose(cli.verbose);
    ctx.set_color(color);

    match cli.command {
        Commands::Plan(args) => commands::plan::execute(args, &ctx),
        Commands::Generate(args) => commands::generate::execute(args, &ctx),
        Commands::Tree(args) => commands::tree::execute(args, &ctx),
        Commands::Set(args) => commands::set::execute(args, &ctx),
        Commands::New(args) => commands::new::execute(args),
        Commands::Init(args) => commands::init::execute(args, &ctx),
    }
}

/// Print a failed command's error.
///
/// Resolver errors and lookup failures carry their own diagnostic; schema
/// errors get a source snippet on a colored terminal.
fn report(e: anyhow::Error, color: bool) {
    if let Some(resolve) = e.downcast_ref::<ResolveError>() {
        emit(&resolve.to_diagnostic(), color);
        return;
    }

    if let Some(
        descriptor @ (DescriptorError::NotFound(_) | DescriptorError::TargetNotDescribed { .. }),
    ) = e.downcast_ref::<DescriptorError>()
    {
        emit(&descriptor.to_diagnostic(), color);
        return;
    }

    if color {
        match e.downcast::<DescriptorError>() {
            Ok(descriptor) => eprintln!("{:?}", miette::Report::new(descriptor)),
            Err(e) => eprintln!("error: {:#}", e),
        }
        return;
    }

    eprintln!("error: {:#}", e);
}
