//! Deferred helper calls for synchronous template engines.
//!
//! Template engines call helpers synchronously. A helper wrapped by
//! [`AsyncHelpers`] returns a placeholder token instead of doing its work and
//! records the call in a stash. Once the template has rendered, hand the
//! output to [`AsyncHelpers::resolve_all_in_text`]: every token is resolved
//! (nested tokens first), the real helpers run, and their results replace the
//! tokens.
//!
//! ```
//! use async_helpers_engine::{AsyncHelpers, GetOptions, Helper, SharedState};
//! use serde_json::json;
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let mut helpers = AsyncHelpers::with_shared(SharedState::new());
//! helpers
//!     .set("upper", Helper::callback(|_, args, done| {
//!         let text = args[0].as_str().unwrap_or_default().to_uppercase();
//!         done.ok(text);
//!     }))
//!     .unwrap();
//!
//! let upper = helpers.get("upper", GetOptions::wrapped()).unwrap();
//! let token = upper.as_wrapped().unwrap().call(vec![json!("doowb")]);
//! let rendered = format!("Hello {token}!");
//!
//! assert_eq!(helpers.resolve_all_in_text(rendered).await.unwrap(), "Hello DOOWB!");
//! # });
//! ```

mod error;
mod helper;
mod pattern;
mod registry;
mod resolver;
mod stash;
mod wrapper;

pub use async_helpers_config::{ConfigError, HelpersConfig};
pub use async_helpers_types::{
    CallingConvention, DEFAULT_PREFIX, EngineOptions, InstanceId, Sequence, Token, TokenParts,
    ValidationError,
};
pub use error::{HelperFailure, ResolveError, SetupError};
pub use helper::{CallbackFn, Completion, DirectFn, Helper, HelperFn, HelperResult};
pub use pattern::TokenPattern;
pub use registry::HelperRegistry;
pub use resolver::ResolveFut;
pub use stash::{DeferredCall, SharedState};
pub use wrapper::WrappedHelper;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_helpers_utils::value_kind;
use serde_json::{Map, Value};

use resolver::Resolver;
use wrapper::{Minter, wrap_helper};

/// Per-call override of the instance's wrapping default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GetOptions {
    /// `None` defers to the instance option.
    pub wrap: Option<bool>,
}

impl GetOptions {
    #[must_use]
    pub fn wrapped() -> Self {
        Self { wrap: Some(true) }
    }

    #[must_use]
    pub fn raw() -> Self {
        Self { wrap: Some(false) }
    }
}

/// One engine instance: a helper registry plus a token minter bound to a
/// shared stash.
pub struct AsyncHelpers {
    shared: SharedState,
    minter: Arc<Minter>,
    pattern: Arc<TokenPattern>,
    registry: HelperRegistry,
    options: EngineOptions,
}

impl Default for AsyncHelpers {
    fn default() -> Self {
        Self::new()
    }
}

impl AsyncHelpers {
    /// Instance on the process-wide shared state with default options.
    #[must_use]
    pub fn new() -> Self {
        Self::with_shared(SharedState::global())
    }

    /// Instance on `shared` with default options.
    ///
    /// Never panics: the default prefix always compiles.
    #[must_use]
    pub fn with_shared(shared: SharedState) -> Self {
        Self::with_options(shared, EngineOptions::default())
            .expect("default token prefix compiles")
    }

    pub fn with_options(shared: SharedState, options: EngineOptions) -> Result<Self, SetupError> {
        let pattern = compile(&shared, options.prefix())?;
        let minter = Arc::new(Minter::new(shared.clone(), options.prefix()));
        tracing::debug!(
            instance = %minter.instance(),
            prefix = options.prefix(),
            "Created helper instance"
        );
        Ok(Self {
            shared,
            minter,
            pattern,
            registry: HelperRegistry::new(),
            options,
        })
    }

    /// Instance on `shared` configured from a loaded config file.
    pub fn from_config(shared: SharedState, config: &HelpersConfig) -> Result<Self, SetupError> {
        Self::with_options(shared, config.options()?)
    }

    /// Replace the options. Wrappers handed out earlier mint tokens with the
    /// new prefix from now on.
    pub fn configure(&mut self, options: EngineOptions) -> Result<(), SetupError> {
        self.pattern = compile(&self.shared, options.prefix())?;
        self.minter.set_prefix(options.prefix());
        self.options = options;
        Ok(())
    }

    #[must_use]
    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        self.options.prefix()
    }

    #[must_use]
    pub fn instance_id(&self) -> InstanceId {
        self.minter.instance()
    }

    #[must_use]
    pub fn shared(&self) -> &SharedState {
        &self.shared
    }

    #[must_use]
    pub fn registry(&self) -> &HelperRegistry {
        &self.registry
    }

    // ========================================================================
    // Registration
    // ========================================================================

    pub fn set(&mut self, name: impl Into<String>, helper: Helper) -> Result<(), SetupError> {
        Ok(self.registry.set(name, helper)?)
    }

    pub fn set_many<I, K>(&mut self, helpers: I) -> Result<(), SetupError>
    where
        I: IntoIterator<Item = (K, Helper)>,
        K: Into<String>,
    {
        Ok(self.registry.set_many(helpers)?)
    }

    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.registry.has(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Helper> {
        self.registry.remove(name)
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.registry.names()
    }

    /// The helper registered as `name`, wrapped if requested.
    #[must_use]
    pub fn get(&self, name: &str, options: GetOptions) -> Option<Helper> {
        let wrap = options.wrap.unwrap_or(self.options.wrap());
        self.registry
            .get(name)
            .map(|helper| wrap_helper(name, helper, wrap, &self.minter))
    }

    /// Every registered helper, each wrapped the way [`get`](Self::get) would.
    #[must_use]
    pub fn all(&self, options: GetOptions) -> BTreeMap<String, Helper> {
        let wrap = options.wrap.unwrap_or(self.options.wrap());
        self.registry
            .iter()
            .map(|(name, helper)| {
                (
                    name.to_string(),
                    wrap_helper(name, helper, wrap, &self.minter),
                )
            })
            .collect()
    }

    /// Wrap a helper that is not in the registry.
    #[must_use]
    pub fn wrap(&self, name: &str, helper: &Helper) -> Helper {
        wrap_helper(name, helper, true, &self.minter)
    }

    // ========================================================================
    // Tokens
    // ========================================================================

    /// Drop every pending call in the shared stash and restart this
    /// instance's sequence.
    ///
    /// Pending calls minted by other instances on the same shared state are
    /// dropped too; their tokens become unresolvable.
    ///
    /// The restarted sequence mints the same token strings again. Text
    /// rendered before the reset that still holds an old token resolves to
    /// whichever new call reused that token, not to an unresolvable error.
    pub fn reset(&self) {
        let cleared = self.shared.clear();
        self.minter.reset_sequence();
        tracing::debug!(instance = %self.minter.instance(), cleared, "Reset token stash");
    }

    #[must_use]
    pub fn contains_token(&self, text: &str) -> bool {
        self.pattern.contains_token(text)
    }

    /// Every token occurrence in `text`, left to right.
    #[must_use]
    pub fn list_tokens<'t>(&self, text: &'t str) -> Vec<&'t str> {
        self.pattern.matches(text)
    }

    // ========================================================================
    // Resolution
    // ========================================================================

    /// Resolve one token to its final value.
    pub fn resolve_token(&self, token: &str) -> ResolveFut<'_, Value> {
        self.resolver().resolve_token(token.to_string())
    }

    /// Resolve every token in `text` and substitute the results.
    ///
    /// Text without tokens comes back unchanged. Anything other than a JSON
    /// string is rejected with [`ResolveError::NotText`].
    pub async fn resolve_all_in_text(&self, text: impl Into<Value>) -> Result<String, ResolveError> {
        let text = match text.into() {
            Value::String(text) => text,
            other => {
                return Err(ResolveError::NotText {
                    found: value_kind(&other),
                });
            }
        };
        tracing::trace!(instance = %self.minter.instance(), "Resolving text");
        self.resolver().resolve_text(text).await
    }

    /// Resolve the token-bearing text values of `map`, one level deep.
    pub fn resolve_object(&self, map: Map<String, Value>) -> ResolveFut<'_, Map<String, Value>> {
        self.resolver().resolve_object(map)
    }

    fn resolver(&self) -> Resolver<'_> {
        Resolver::new(&self.shared, &self.pattern)
    }
}

impl std::fmt::Debug for AsyncHelpers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncHelpers")
            .field("instance", &self.minter.instance())
            .field("options", &self.options)
            .field("helpers", &self.registry.names())
            .finish_non_exhaustive()
    }
}

fn compile(shared: &SharedState, prefix: &str) -> Result<Arc<TokenPattern>, SetupError> {
    shared
        .pattern(prefix)
        .map_err(|source| SetupError::Pattern {
            prefix: prefix.to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{AsyncHelpers, EngineOptions, GetOptions, Helper, SetupError, SharedState};
    use crate::ValidationError;

    fn instance() -> AsyncHelpers {
        AsyncHelpers::with_shared(SharedState::new())
    }

    fn echo() -> Helper {
        Helper::direct(|_, args| Ok(args.first().cloned().unwrap_or_default()))
    }

    #[test]
    fn get_respects_instance_default() {
        let mut helpers = instance();
        helpers.set("echo", echo()).unwrap();
        assert!(helpers.get("echo", GetOptions::default()).unwrap().as_raw().is_some());

        helpers
            .configure(EngineOptions::default().with_wrap(true))
            .unwrap();
        assert!(helpers.get("echo", GetOptions::default()).unwrap().is_wrapped());
        assert!(helpers.get("echo", GetOptions::raw()).unwrap().as_raw().is_some());
    }

    #[test]
    fn get_unknown_is_none() {
        assert!(instance().get("missing", GetOptions::wrapped()).is_none());
    }

    #[test]
    fn all_wraps_groups_recursively() {
        let mut helpers = instance();
        helpers
            .set_many([
                ("echo", echo()),
                ("math", Helper::group([("add", echo()), ("sub", echo())])),
            ])
            .unwrap();
        let all = helpers.all(GetOptions::wrapped());
        assert_eq!(all.len(), 2);
        assert!(all["echo"].is_wrapped());
        assert!(all["math"].member("add").unwrap().is_wrapped());
        assert!(all["math"].member("sub").unwrap().is_wrapped());
    }

    #[test]
    fn set_surfaces_validation_errors() {
        let mut helpers = instance();
        assert!(matches!(
            helpers.set("", echo()),
            Err(SetupError::Validation(ValidationError::EmptyHelperName))
        ));
    }

    #[test]
    fn instances_on_one_state_get_distinct_ids() {
        let shared = SharedState::new();
        let a = AsyncHelpers::with_shared(shared.clone());
        let b = AsyncHelpers::with_shared(shared);
        assert_ne!(a.instance_id(), b.instance_id());
    }

    #[test]
    fn tokens_follow_configured_prefix() {
        let mut helpers = instance();
        helpers.set("echo", echo()).unwrap();
        helpers
            .configure(EngineOptions::new("@@[", true).unwrap())
            .unwrap();
        let token = helpers
            .get("echo", GetOptions::default())
            .unwrap()
            .as_wrapped()
            .unwrap()
            .call(vec![json!(1)]);
        assert!(token.starts_with("@@["));
        assert!(helpers.contains_token(&format!("x {token} y")));
        assert_eq!(helpers.list_tokens(&format!("{token}{token}")).len(), 2);
    }

    #[test]
    fn reset_clears_stash() {
        let mut helpers = instance();
        helpers.set("echo", echo()).unwrap();
        let wrapped = helpers.get("echo", GetOptions::wrapped()).unwrap();
        wrapped.as_wrapped().unwrap().call(vec![]);
        assert_eq!(helpers.shared().len(), 1);
        helpers.reset();
        assert!(helpers.shared().is_empty());
    }
}
