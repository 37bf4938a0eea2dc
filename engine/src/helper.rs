//! Helper values and calling conventions.
//!
//! A helper is classified once, when it is built: a raw callable tagged with
//! its calling convention, a group of named sub-helpers, or a callable already
//! wrapped for deferred resolution.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_helpers_types::{CallingConvention, ValidationError};
use serde_json::Value;
use tokio::sync::oneshot;

use crate::wrapper::WrappedHelper;

/// What a helper body produces.
pub type HelperResult = anyhow::Result<Value>;

/// Body of a helper that returns its result.
pub type DirectFn = dyn Fn(&Value, &[Value]) -> HelperResult + Send + Sync;

/// Body of a helper that signals its result through a [`Completion`].
pub type CallbackFn = dyn Fn(&Value, Vec<Value>, Completion) + Send + Sync;

/// A helper body tagged with its calling convention.
#[derive(Clone)]
pub enum HelperFn {
    Direct(Arc<DirectFn>),
    Callback(Arc<CallbackFn>),
}

impl HelperFn {
    /// Build a helper that returns its result.
    ///
    /// The body receives the invocation context and the arguments.
    pub fn direct<F>(f: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> HelperResult + Send + Sync + 'static,
    {
        Self::Direct(Arc::new(f))
    }

    /// Build a helper that reports through a completion handle.
    ///
    /// The body may complete inline or move the handle into a spawned task.
    pub fn callback<F>(f: F) -> Self
    where
        F: Fn(&Value, Vec<Value>, Completion) + Send + Sync + 'static,
    {
        Self::Callback(Arc::new(f))
    }

    #[must_use]
    pub fn convention(&self) -> CallingConvention {
        match self {
            HelperFn::Direct(_) => CallingConvention::Direct,
            HelperFn::Callback(_) => CallingConvention::Callback,
        }
    }
}

impl fmt::Debug for HelperFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HelperFn")
            .field(&self.convention().as_str())
            .finish()
    }
}

/// Completion handle passed to callback-style helpers.
///
/// Consuming the handle delivers the `(error, value)` outcome exactly once.
/// Dropping it without signaling fails the resolution; holding it forever
/// stalls the resolution, since there is no timeout.
#[derive(Debug)]
pub struct Completion {
    tx: oneshot::Sender<HelperResult>,
}

impl Completion {
    pub(crate) fn channel() -> (Self, oneshot::Receiver<HelperResult>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    pub fn complete(self, result: HelperResult) {
        // Receiver is gone only if the resolution future was dropped.
        let _ = self.tx.send(result);
    }

    pub fn ok(self, value: impl Into<Value>) {
        self.complete(Ok(value.into()));
    }

    pub fn err(self, error: impl Into<anyhow::Error>) {
        self.complete(Err(error.into()));
    }
}

/// A registered helper.
#[derive(Debug, Clone)]
pub enum Helper {
    /// A plain callable, run only when wrapping is not requested.
    Raw(HelperFn),
    /// Named sub-helpers, wrapped member by member.
    Group(BTreeMap<String, Helper>),
    /// A callable that defers its work behind a token.
    Wrapped(WrappedHelper),
}

impl Helper {
    pub fn direct<F>(f: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> HelperResult + Send + Sync + 'static,
    {
        Self::Raw(HelperFn::direct(f))
    }

    pub fn callback<F>(f: F) -> Self
    where
        F: Fn(&Value, Vec<Value>, Completion) + Send + Sync + 'static,
    {
        Self::Raw(HelperFn::callback(f))
    }

    pub fn group<I, K>(members: I) -> Self
    where
        I: IntoIterator<Item = (K, Helper)>,
        K: Into<String>,
    {
        Self::Group(
            members
                .into_iter()
                .map(|(name, helper)| (name.into(), helper))
                .collect(),
        )
    }

    #[must_use]
    pub fn is_group(&self) -> bool {
        matches!(self, Helper::Group(_))
    }

    #[must_use]
    pub fn is_wrapped(&self) -> bool {
        matches!(self, Helper::Wrapped(_))
    }

    #[must_use]
    pub fn as_raw(&self) -> Option<&HelperFn> {
        match self {
            Helper::Raw(func) => Some(func),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_wrapped(&self) -> Option<&WrappedHelper> {
        match self {
            Helper::Wrapped(wrapped) => Some(wrapped),
            _ => None,
        }
    }

    /// Member `name` of a group.
    #[must_use]
    pub fn member(&self, name: &str) -> Option<&Helper> {
        match self {
            Helper::Group(members) => members.get(name),
            _ => None,
        }
    }

    pub(crate) fn validate(&self, name: &str) -> Result<(), ValidationError> {
        if name.is_empty() {
            return Err(ValidationError::EmptyHelperName);
        }
        if let Helper::Group(members) = self {
            if members.is_empty() {
                return Err(ValidationError::EmptyGroup {
                    name: name.to_string(),
                });
            }
            for (member, helper) in members {
                helper.validate(member)?;
            }
        }
        Ok(())
    }
}
