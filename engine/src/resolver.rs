//! Recursive token resolution.
//!
//! Resolution is strictly sequential. Within a text, distinct tokens resolve
//! in order of first appearance. Within a call, arguments resolve in
//! position order and fully before the helper runs. Results that are or
//! contain tokens resolve again before being handed back.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};

use async_helpers_utils::{panic_message, preview, value_to_text};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde_json::{Map, Value};

use crate::error::{HelperFailure, ResolveError};
use crate::helper::{Completion, HelperFn};
use crate::pattern::TokenPattern;
use crate::stash::{DeferredCall, SharedState};

/// Resolution future type alias.
pub type ResolveFut<'a, T> = BoxFuture<'a, Result<T, ResolveError>>;

#[derive(Clone, Copy)]
pub(crate) struct Resolver<'a> {
    shared: &'a SharedState,
    pattern: &'a TokenPattern,
}

impl<'a> Resolver<'a> {
    pub(crate) fn new(shared: &'a SharedState, pattern: &'a TokenPattern) -> Self {
        Self { shared, pattern }
    }

    /// Resolve one stashed call to its final value.
    pub(crate) fn resolve_token(self, token: String) -> ResolveFut<'a, Value> {
        async move {
            let Some(call) = self.shared.get(&token) else {
                tracing::debug!(%token, "Token not found in stash");
                return Err(ResolveError::UnresolvableToken { token });
            };
            tracing::trace!(helper = call.name(), %token, "Resolving deferred call");

            let args = self.resolve_args(call.args().to_vec()).await?;
            let value = invoke(&call, args).await?;
            self.resolve_value(value).await
        }
        .boxed()
    }

    /// Replace every token in `text` with its resolved value.
    pub(crate) fn resolve_text(self, text: String) -> ResolveFut<'a, String> {
        async move {
            let tokens: Vec<String> = self
                .pattern
                .distinct_matches(&text)
                .into_iter()
                .map(str::to_string)
                .collect();
            if tokens.is_empty() {
                return Ok(text);
            }

            let mut values = HashMap::with_capacity(tokens.len());
            for token in tokens {
                let value = self.resolve_token(token.clone()).await?;
                values.insert(token, value_to_text(&value));
            }
            Ok(self.pattern.substitute(&text, &values))
        }
        .boxed()
    }

    /// Resolve the token-bearing text values of an object, one level deep.
    pub(crate) fn resolve_object(self, map: Map<String, Value>) -> ResolveFut<'a, Map<String, Value>> {
        async move {
            let mut resolved = Map::with_capacity(map.len());
            for (key, value) in map {
                let value = match value {
                    Value::String(_) => self.resolve_value(value).await?,
                    other => other,
                };
                resolved.insert(key, value);
            }
            Ok(resolved)
        }
        .boxed()
    }

    /// Resolve a value that may be or contain a token.
    ///
    /// A text that is exactly one token becomes that token's value, keeping
    /// its type. A text with tokens among other text becomes the substituted
    /// text. Anything else is returned as is.
    fn resolve_value(self, value: Value) -> ResolveFut<'a, Value> {
        async move {
            match value {
                Value::String(text) if self.pattern.is_token(&text) => {
                    self.resolve_token(text).await
                }
                Value::String(text) if self.pattern.contains_token(&text) => {
                    self.resolve_text(text).await.map(Value::String)
                }
                other => Ok(other),
            }
        }
        .boxed()
    }

    async fn resolve_args(self, mut args: Vec<Value>) -> Result<Vec<Value>, ResolveError> {
        let last = args.len().checked_sub(1);
        for index in 0..args.len() {
            let arg = std::mem::take(&mut args[index]);
            args[index] = match arg {
                Value::String(_) => self.resolve_value(arg).await?,
                // Only the trailing options object, and only its own values.
                Value::Object(map) if Some(index) == last => {
                    Value::Object(self.resolve_object(map).await?)
                }
                other => other,
            };
        }
        Ok(args)
    }
}

/// Run the helper behind `call` with resolved `args`.
async fn invoke(call: &DeferredCall, args: Vec<Value>) -> Result<Value, ResolveError> {
    let outcome = match call.func() {
        HelperFn::Direct(func) => catch_unwind(AssertUnwindSafe(|| func(call.context(), &args)))
            .unwrap_or_else(|payload| Err(panicked(payload.as_ref()))),
        HelperFn::Callback(func) => {
            let (done, rx) = Completion::channel();
            let passed = args.clone();
            match catch_unwind(AssertUnwindSafe(|| func(call.context(), passed, done))) {
                Ok(()) => rx.await.unwrap_or_else(|_| {
                    Err(anyhow::anyhow!(
                        "helper dropped its completion without signaling"
                    ))
                }),
                Err(payload) => Err(panicked(payload.as_ref())),
            }
        }
    };

    outcome.map_err(|source| {
        let failure = HelperFailure::new(call.name(), &args, source);
        tracing::debug!(
            helper = failure.helper(),
            args = %preview(failure.args(), 120),
            error = %failure.error(),
            "Helper failed"
        );
        ResolveError::Helper(failure)
    })
}

fn panicked(payload: &(dyn std::any::Any + Send)) -> anyhow::Error {
    anyhow::anyhow!("helper panicked: {}", panic_message(payload))
}
