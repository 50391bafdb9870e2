//! Build recipe generation.
//!
//! Turns composed projects into native build-system recipes.

pub mod cmake;

pub use cmake::{render, RecipeOptions};
