//! User-friendly diagnostic messages.
//!
//! Every error shown to the user should carry its root cause, the
//! conflicting inputs and a suggested fix.

use std::fmt;
use std::path::PathBuf;

use crate::core::errors::DescriptorError;

/// Common suggestion messages for consistent error handling.
pub mod suggestions {
    /// Suggestion when no descriptor is found.
    pub const NO_DESCRIPTOR: &str = "Run `bits init` to create a project descriptor";

    /// Suggestion when a bit is declared but not installed.
    pub const NOT_INSTALLED: &str = "Run `bits install` to fetch missing bits";

    /// Suggestion when a target is not found.
    pub const TARGET_NOT_FOUND: &str = "Add the target under `targets:` in project.yaml";

    /// Suggestion for a bit declared with several versions.
    pub const CONFLICT_POLICY: &str =
        "Set `conflict = \"highest\"` under `[resolve]` in .bits/config.toml";
}

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// A diagnostic message with optional suggestions.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Primary message
    pub message: String,
    /// Severity level
    pub severity: Severity,
    /// Additional context lines
    pub context: Vec<String>,
    /// Suggested fixes
    pub suggestions: Vec<String>,
    /// Related location (file path)
    pub location: Option<PathBuf>,
}

impl Diagnostic {
    /// Create a new error diagnostic.
    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic {
            message: message.into(),
            severity: Severity::Error,
            context: Vec::new(),
            suggestions: Vec::new(),
            location: None,
        }
    }

    /// Create a new warning diagnostic.
    pub fn warning(message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            ..Diagnostic::error(message)
        }
    }

    /// Add context to the diagnostic.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context.push(context.into());
        self
    }

    /// Add a suggestion for fixing the issue.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Add a file location.
    pub fn with_location(mut self, path: impl Into<PathBuf>) -> Self {
        self.location = Some(path.into());
        self
    }

    /// Format the diagnostic for terminal output.
    pub fn format(&self, color: bool) -> String {
        let mut output = String::new();

        let severity_str = if color {
            match self.severity {
                Severity::Error => "\x1b[1;31merror\x1b[0m",
                Severity::Warning => "\x1b[1;33mwarning\x1b[0m",
            }
        } else {
            match self.severity {
                Severity::Error => "error",
                Severity::Warning => "warning",
            }
        };

        output.push_str(&format!("{}: {}\n", severity_str, self.message));

        if let Some(ref path) = self.location {
            output.push_str(&format!("  --> {}\n", path.display()));
        }

        for ctx in &self.context {
            output.push_str(&format!("  = {}\n", ctx));
        }

        if !self.suggestions.is_empty() {
            output.push('\n');
            let help_prefix = if color {
                "\x1b[1;32mhelp\x1b[0m"
            } else {
                "help"
            };
            output.push_str(&format!("{}: consider:\n", help_prefix));
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                output.push_str(&format!("  {}. {}\n", i + 1, suggestion));
            }
        }

        output
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format(false))
    }
}

impl DescriptorError {
    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            DescriptorError::NotFound(path) => {
                Diagnostic::error(format!("could not find {}", path.display()))
                    .with_suggestion(suggestions::NO_DESCRIPTOR)
            }
            DescriptorError::TargetNotDescribed { target, help } => {
                let mut diag = Diagnostic::error(format!("target `{}` is not described", target));
                if let Some(help) = help {
                    diag = diag.with_context(help.clone());
                }
                diag.with_suggestion(suggestions::TARGET_NOT_FOUND)
            }
            DescriptorError::Parse(err) => Diagnostic::error(err.message.clone())
                .with_location(format!("{}:{}:{}", err.file.display(), err.line, err.column)),
            DescriptorError::MissingRequiredField(err) => {
                Diagnostic::error(format!("missing required field `{}`", err.field))
                    .with_location(format!("{}:{}:{}", err.file.display(), err.line, err.column))
            }
            DescriptorError::Io { path, source } => {
                Diagnostic::error(format!("failed to read {}", path.display()))
                    .with_context(source.to_string())
            }
        }
    }
}

/// Print a diagnostic to stderr.
pub fn emit(diagnostic: &Diagnostic, color: bool) {
    eprint!("{}", diagnostic.format(color));
}
