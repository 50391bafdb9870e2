//! Errors surfaced by descriptor loading, digesting and composition.

use std::path::PathBuf;

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

use crate::core::markup::Position;

/// A schema violation at a precise location in a descriptor.
#[derive(Debug, Error, Diagnostic)]
#[error("{}:{}:{}: {}", .file.display(), .line, .column, .message)]
#[diagnostic(code(bits::descriptor::parse))]
pub struct ParseError {
    pub file: PathBuf,
    pub line: usize,
    pub column: usize,
    pub message: String,
    #[source_code]
    pub src: Option<NamedSource<String>>,
    #[label("here")]
    pub span: Option<SourceSpan>,
}

impl ParseError {
    pub fn new(file: impl Into<PathBuf>, at: Position, message: impl Into<String>) -> Self {
        ParseError {
            file: file.into(),
            line: at.line,
            column: at.column,
            message: message.into(),
            src: None,
            span: None,
        }
    }

    /// Attach the descriptor text so the error renders with a snippet.
    pub fn with_source(mut self, source: &str, at: Position) -> Self {
        let name = self.file.display().to_string();
        self.src = Some(NamedSource::new(name, source.to_string()));
        self.span = Some(SourceSpan::from((at.offset.min(source.len()), 1)));
        self
    }
}

/// A required field is absent from a mapping.
#[derive(Debug, Error, Diagnostic)]
#[error("{}:{}:{}: missing required field `{}`", .file.display(), .line, .column, .field)]
#[diagnostic(code(bits::descriptor::missing_field))]
pub struct MissingRequiredField {
    pub file: PathBuf,
    pub line: usize,
    pub column: usize,
    pub field: String,
}

/// Errors raised while loading, digesting or composing a descriptor.
#[derive(Debug, Error, Diagnostic)]
pub enum DescriptorError {
    #[error("project descriptor not found: {}", .0.display())]
    #[diagnostic(
        code(bits::descriptor::not_found),
        help("Run `bits init` to create a project descriptor")
    )]
    NotFound(PathBuf),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    MissingRequiredField(#[from] MissingRequiredField),

    #[error("target `{target}` is not described in the project descriptor")]
    #[diagnostic(code(bits::compose::target_not_described))]
    TargetNotDescribed {
        target: String,
        #[help]
        help: Option<String>,
    },

    #[error("failed to read {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DescriptorError {
    /// Build a `TargetNotDescribed` error listing the targets that do exist.
    pub fn target_not_described<'a>(
        target: &str,
        available: impl IntoIterator<Item = &'a String>,
    ) -> Self {
        let available: Vec<&str> = available.into_iter().map(String::as_str).collect();
        let help = (!available.is_empty())
            .then(|| format!("described targets: {}", available.join(", ")));
        DescriptorError::TargetNotDescribed {
            target: target.to_string(),
            help,
        }
    }
}
