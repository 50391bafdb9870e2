//! Command implementations

pub mod generate;
pub mod init;
pub mod new;
pub mod plan;
pub mod set;
pub mod tree;
