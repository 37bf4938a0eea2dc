//! Core domain types for async-helpers.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the workspace.

mod ids;
mod token;

pub use ids::{InstanceId, Sequence};
pub use token::{DEFAULT_PREFIX, TOKEN_SEPARATOR, TOKEN_SUFFIX, Token, TokenParts};

use thiserror::Error;

// ============================================================================
// Validation
// ============================================================================

/// Rejected registration or configuration input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("helper name must not be empty")]
    EmptyHelperName,
    #[error("helper group \"{name}\" has no members")]
    EmptyGroup { name: String },
    #[error("token prefix must not be empty")]
    EmptyPrefix,
}

// ============================================================================
// Calling Conventions
// ============================================================================

/// How a helper hands back its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallingConvention {
    /// The helper returns its value.
    Direct,
    /// The helper signals `(error, value)` through a completion handle.
    Callback,
}

impl CallingConvention {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CallingConvention::Direct => "direct",
            CallingConvention::Callback => "callback",
        }
    }
}

// ============================================================================
// Engine Options
// ============================================================================

/// Validated engine options.
///
/// `prefix` starts every minted token; `wrap` is the default used by `get`
/// when the caller does not say whether to wrap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    prefix: String,
    wrap: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            wrap: false,
        }
    }
}

impl EngineOptions {
    pub fn new(prefix: impl Into<String>, wrap: bool) -> Result<Self, ValidationError> {
        let prefix = prefix.into();
        if prefix.is_empty() {
            return Err(ValidationError::EmptyPrefix);
        }
        Ok(Self { prefix, wrap })
    }

    pub fn with_prefix(self, prefix: impl Into<String>) -> Result<Self, ValidationError> {
        Self::new(prefix, self.wrap)
    }

    pub fn with_wrap(mut self, wrap: bool) -> Self {
        self.wrap = wrap;
        self
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    #[must_use]
    pub fn wrap(&self) -> bool {
        self.wrap
    }
}

#[cfg(test)]
mod tests {
    use super::{CallingConvention, DEFAULT_PREFIX, EngineOptions, ValidationError};

    #[test]
    fn default_options_use_sentinel_prefix() {
        let options = EngineOptions::default();
        assert_eq!(options.prefix(), DEFAULT_PREFIX);
        assert!(!options.wrap());
    }

    #[test]
    fn empty_prefix_is_rejected() {
        assert_eq!(
            EngineOptions::new("", true),
            Err(ValidationError::EmptyPrefix)
        );
        assert_eq!(
            EngineOptions::default().with_prefix(""),
            Err(ValidationError::EmptyPrefix)
        );
    }

    #[test]
    fn with_prefix_keeps_wrap() {
        let options = EngineOptions::default()
            .with_wrap(true)
            .with_prefix("<<")
            .unwrap();
        assert_eq!(options.prefix(), "<<");
        assert!(options.wrap());
    }

    #[test]
    fn convention_labels() {
        assert_eq!(CallingConvention::Direct.as_str(), "direct");
        assert_eq!(CallingConvention::Callback.as_str(), "callback");
    }
}
