//! Resolution error types and diagnostics.

use thiserror::Error;

use crate::core::errors::DescriptorError;
use crate::util::diagnostic::{suggestions, Diagnostic};

/// Error during bit resolution.
///
/// A bit that is not installed is never an error; only a bit whose
/// descriptor is broken, or a version conflict under the `error` policy.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("failed to load bit `{name}` {version}")]
    BrokenBit {
        name: String,
        version: String,
        #[source]
        source: DescriptorError,
    },

    #[error("version conflict for bit `{name}`")]
    VersionConflict {
        name: String,
        requirements: Vec<(String, String)>, // (requirer, version)
    },
}

impl ResolveError {
    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            ResolveError::BrokenBit {
                name,
                version,
                source,
            } => Diagnostic::error(format!("bit `{}` {} has an invalid descriptor", name, version))
                .with_context(source.to_string())
                .with_suggestion(format!("Reinstall `{}` with `bits install`", name)),

            ResolveError::VersionConflict { name, requirements } => {
                let mut diag = Diagnostic::error(format!("version conflict for bit `{}`", name));

                for (requirer, version) in requirements {
                    diag = diag.with_context(format!("`{}` requires {} {}", requirer, name, version));
                }

                diag.with_suggestion(format!(
                    "Declare the same version of `{}` everywhere",
                    name
                ))
                .with_suggestion(suggestions::CONFLICT_POLICY)
            }
        }
    }
}
