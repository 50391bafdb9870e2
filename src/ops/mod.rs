//! High-level operations.
//!
//! This module contains the implementation of bits commands.

pub mod bits_new;
pub mod compose;
pub mod edit;
pub mod generate;
pub mod load;

pub use bits_new::{init_project, new_project, NewOptions};
pub use compose::{compose, compose_targets, Composer, Filesystem, LocalFs};
pub use edit::set_value;
pub use generate::{generate_recipe, GenerateResult};
pub use load::{compose_resolved, compose_workspace, resolve_workspace};
