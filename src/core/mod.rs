//! Core data structures for bits.
//!
//! This module contains the foundational types used throughout bits:
//! - The `project.yaml` markup parser
//! - The descriptor model and its digester
//! - The composed project model
//! - Workspace management

pub mod descriptor;
pub mod digest;
pub mod errors;
pub mod markup;
pub mod project;
pub mod workspace;

pub use descriptor::{
    CompilationPlan, DeclaredBit, PackageDescription, ProjectDescriptor, ResolvedBit,
    TargetDescription, DEFAULT_TARGET, DESCRIPTOR_NAME,
};
pub use errors::{DescriptorError, MissingRequiredField, ParseError};
pub use project::{Package, Project, Target, Test, TestSuite};
pub use workspace::Workspace;
