//! Error types for setup and resolution.

use async_helpers_config::ConfigError;
use async_helpers_types::ValidationError;
use async_helpers_utils::render_args;
use serde_json::Value;
use thiserror::Error;

/// Failure while registering helpers or applying options.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid token prefix {prefix:?}: {source}")]
    Pattern {
        prefix: String,
        source: regex::Error,
    },
}

/// A helper that errored, panicked, or never signaled its completion.
///
/// The helper's own error stays available through [`HelperFailure::error`]
/// and `std::error::Error::source`, so callers can downcast it.
#[derive(Debug, Error)]
#[error("{reason}: {source}")]
pub struct HelperFailure {
    helper: String,
    args: String,
    reason: String,
    source: anyhow::Error,
}

impl HelperFailure {
    pub(crate) fn new(helper: &str, args: &[Value], source: anyhow::Error) -> Self {
        let args = render_args(args);
        let reason = format!("\"{helper}\" helper cannot resolve: `{args}`");
        Self {
            helper: helper.to_string(),
            args,
            reason,
            source,
        }
    }

    /// Name of the helper that failed.
    #[must_use]
    pub fn helper(&self) -> &str {
        &self.helper
    }

    /// Rendered arguments, empty ones omitted.
    #[must_use]
    pub fn args(&self) -> &str {
        &self.args
    }

    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// The error the helper reported.
    #[must_use]
    pub fn error(&self) -> &anyhow::Error {
        &self.source
    }

    pub fn into_error(self) -> anyhow::Error {
        self.source
    }
}

/// Failure while resolving tokens.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("cannot resolve helper token {token:?}: not found")]
    UnresolvableToken { token: String },
    #[error("expected text to resolve, got {found}")]
    NotText { found: &'static str },
    #[error(transparent)]
    Helper(#[from] HelperFailure),
}

impl ResolveError {
    #[must_use]
    pub fn helper_failure(&self) -> Option<&HelperFailure> {
        match self {
            ResolveError::Helper(failure) => Some(failure),
            _ => None,
        }
    }
}
