//! bits - project descriptors for a C/C++ build tool
//!
//! This crate reads `project.yaml` descriptors, resolves the bits they
//! depend on, composes concrete build targets and emits CMake recipes.

pub mod builder;
pub mod core;
pub mod ops;
pub mod resolver;
pub mod util;

/// Test utilities and mocks for bits unit tests.
///
/// This module is only available when compiling with `--cfg test` or
/// running tests. It provides in-memory implementations of the composer's
/// filesystem and the resolver's bit source.
#[cfg(test)]
pub mod test_support;

pub use core::{
    descriptor::ProjectDescriptor, errors::DescriptorError, project::Project,
    workspace::Workspace,
};

pub use resolver::{Resolution, Resolver};
pub use util::context::GlobalContext;
