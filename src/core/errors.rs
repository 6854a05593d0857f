//! Harvest error types and diagnostics.
//!
//! Each stage of a harvest has its own error type so callers can react to the
//! failure kind: a [`ClosureError::NotFound`] skips one library in batch mode,
//! everything else aborts that library. Cancellation is its own variant in
//! every type and is never folded into a generic failure.

use std::path::PathBuf;

use thiserror::Error;

use crate::util::cancel::Canceled;
use crate::util::diagnostic::{suggestions, Diagnostic};

/// Invalid runtime profile input.
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("unsupported runtime identifier `{rid}`")]
    UnsupportedRid { rid: String },

    #[error("invalid system library pattern `{pattern}`: {message}")]
    InvalidPattern { pattern: String, message: String },
}

/// Failure to compute a binary closure.
#[derive(Debug, Error)]
pub enum ClosureError {
    /// The root package is absent from the vcpkg index.
    #[error("package `{package}:{triplet}` is not installed")]
    NotFound { package: String, triplet: String },

    /// The primary binary could not be resolved, or the walk failed.
    #[error("{message}")]
    Failed {
        message: String,
        #[source]
        cause: Option<anyhow::Error>,
    },

    #[error(transparent)]
    Canceled(#[from] Canceled),
}

impl ClosureError {
    pub fn failed(message: impl Into<String>) -> Self {
        ClosureError::Failed {
            message: message.into(),
            cause: None,
        }
    }

    pub fn failed_with(message: impl Into<String>, cause: anyhow::Error) -> Self {
        ClosureError::Failed {
            message: message.into(),
            cause: Some(cause),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ClosureError::NotFound { .. })
    }
}

/// Failure to build a deployment plan.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("{message}")]
    Failed {
        message: String,
        #[source]
        cause: Option<anyhow::Error>,
    },

    #[error(transparent)]
    Canceled(#[from] Canceled),
}

impl PlanError {
    pub fn failed(message: impl Into<String>) -> Self {
        PlanError::Failed {
            message: message.into(),
            cause: None,
        }
    }
}

/// Failure while executing a deployment plan.
#[derive(Debug, Error)]
pub enum DeployError {
    /// A plan action failed; `action` is the action kind.
    #[error("error executing deployment action {action}: {message}")]
    Action {
        action: &'static str,
        message: String,
        #[source]
        cause: Option<anyhow::Error>,
    },

    #[error("tar {} while creating archive {}", exit_status(*code), archive.display())]
    Archiver {
        archive: PathBuf,
        code: Option<i32>,
        stderr: String,
    },

    #[error(transparent)]
    Canceled(#[from] Canceled),
}

fn exit_status(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("failed with exit code {}", code),
        None => "was killed by a signal".to_string(),
    }
}

/// Failure of a whole harvest run (not of an individual library).
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error(transparent)]
    Profile(#[from] ProfileError),

    #[error("{0}")]
    Config(String),

    #[error(transparent)]
    Canceled(#[from] Canceled),
}

impl ClosureError {
    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self, library: &str) -> Diagnostic {
        match self {
            ClosureError::NotFound { package, triplet } => Diagnostic::warning(format!(
                "library `{}` skipped: vcpkg package `{}:{}` is not installed",
                library, package, triplet
            ))
            .with_suggestion(format!("vcpkg install {}:{}", package, triplet)),

            ClosureError::Failed { message, cause } => {
                let mut diag = Diagnostic::error(format!(
                    "binary closure could not be resolved for `{}`",
                    library
                ))
                .with_context(message.clone());
                if let Some(cause) = cause {
                    diag = diag.with_context(format!("{:#}", cause));
                }
                diag.with_suggestion(suggestions::CHECK_PRIMARY_PATTERNS)
            }

            ClosureError::Canceled(_) => Diagnostic::warning("harvest canceled"),
        }
    }
}

impl PlanError {
    pub fn to_diagnostic(&self, library: &str) -> Diagnostic {
        match self {
            PlanError::Failed { message, cause } => {
                let mut diag =
                    Diagnostic::error(format!("could not plan artifacts for `{}`", library))
                        .with_context(message.clone());
                if let Some(cause) = cause {
                    diag = diag.with_context(format!("{:#}", cause));
                }
                diag
            }
            PlanError::Canceled(_) => Diagnostic::warning("harvest canceled"),
        }
    }
}

impl DeployError {
    pub fn to_diagnostic(&self, library: &str) -> Diagnostic {
        let diag = Diagnostic::error(format!("deployment failed for `{}`", library))
            .with_context(self.to_string());

        match self {
            DeployError::Action { cause, .. } => match cause {
                Some(cause) => diag.with_context(format!("{:#}", cause)),
                None => diag,
            },
            DeployError::Archiver { stderr, .. } => {
                let diag = if stderr.trim().is_empty() {
                    diag
                } else {
                    diag.with_context(stderr.trim().to_string())
                };
                diag.with_suggestion(suggestions::CHECK_TAR)
            }
            DeployError::Canceled(_) => Diagnostic::warning("harvest canceled"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canceled_is_distinct() {
        let err: ClosureError = Canceled.into();
        assert!(matches!(err, ClosureError::Canceled(_)));
        assert!(!err.is_not_found());

        let err: DeployError = Canceled.into();
        assert_eq!(err.to_string(), "operation canceled");
    }

    #[test]
    fn test_archiver_exit_status() {
        let err = DeployError::Archiver {
            archive: PathBuf::from("/out/zlib-linux-x64.tar.gz"),
            code: Some(2),
            stderr: String::new(),
        };
        assert_eq!(
            err.to_string(),
            "tar failed with exit code 2 while creating archive /out/zlib-linux-x64.tar.gz"
        );

        let err = DeployError::Archiver {
            archive: PathBuf::from("/out/zlib-linux-x64.tar.gz"),
            code: None,
            stderr: String::new(),
        };
        assert!(err.to_string().starts_with("tar was killed by a signal"));
    }

    #[test]
    fn test_failed_keeps_cause() {
        let err = ClosureError::failed_with("walk failed", anyhow::anyhow!("vcpkg exploded"));
        let source = std::error::Error::source(&err).expect("cause");
        assert!(source.to_string().contains("vcpkg exploded"));
    }

    #[test]
    fn test_not_found_diagnostic() {
        let err = ClosureError::NotFound {
            package: "sdl2-image".to_string(),
            triplet: "x64-linux".to_string(),
        };
        let output = err.to_diagnostic("SDL2_image").format(false);
        assert!(output.starts_with("warning: library `SDL2_image` skipped"));
        assert!(output.contains("vcpkg install sdl2-image:x64-linux"));
    }

    #[test]
    fn test_archiver_diagnostic() {
        let err = DeployError::Archiver {
            archive: PathBuf::from("/out/a.tar.gz"),
            code: Some(2),
            stderr: "tar: libfoo.so: Cannot stat".to_string(),
        };
        let output = err.to_diagnostic("foo").format(false);
        assert!(output.contains("failed with exit code 2 while"));
        assert!(output.contains("Cannot stat"));
    }
}
