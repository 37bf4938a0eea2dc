//! Resolution state shared between engine instances.
//!
//! Rendered text can travel between instances before it is resolved, so the
//! token stash and the compiled token patterns live in a [`SharedState`]
//! handle that every instance receives at construction. Instances built from
//! clones of the same handle see each other's tokens.
//!
//! Locks are held only for single map operations and never across an await.
//! There is no per-instance ownership of stash entries: `clear` drops every
//! pending call, including calls minted by other instances.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use async_helpers_types::{CallingConvention, InstanceId, Token};
use serde_json::Value;

use crate::helper::HelperFn;
use crate::pattern::TokenPattern;

/// Everything needed to perform a helper call later.
#[derive(Debug, Clone)]
pub struct DeferredCall {
    name: Arc<str>,
    token: Token,
    func: HelperFn,
    args: Vec<Value>,
    context: Value,
}

impl DeferredCall {
    pub(crate) fn new(
        name: Arc<str>,
        token: Token,
        func: HelperFn,
        args: Vec<Value>,
        context: Value,
    ) -> Self {
        Self {
            name,
            token,
            func,
            args,
            context,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn token(&self) -> &Token {
        &self.token
    }

    #[must_use]
    pub fn convention(&self) -> CallingConvention {
        self.func.convention()
    }

    /// Arguments exactly as the wrapper received them.
    #[must_use]
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// The context the wrapper was invoked with.
    #[must_use]
    pub fn context(&self) -> &Value {
        &self.context
    }

    pub(crate) fn func(&self) -> &HelperFn {
        &self.func
    }
}

#[derive(Default)]
struct Inner {
    stash: Mutex<HashMap<Token, DeferredCall>>,
    patterns: Mutex<HashMap<String, Arc<TokenPattern>>>,
    next_instance: AtomicU64,
}

/// Handle to a token stash and pattern cache.
///
/// Cloning is cheap and yields a handle to the same state.
#[derive(Clone, Default)]
pub struct SharedState {
    inner: Arc<Inner>,
}

static GLOBAL: OnceLock<SharedState> = OnceLock::new();

impl SharedState {
    /// A fresh, empty state not shared with anyone yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide state used by `AsyncHelpers::new`.
    #[must_use]
    pub fn global() -> Self {
        GLOBAL.get_or_init(SharedState::new).clone()
    }

    /// Whether both handles point at the same state.
    #[must_use]
    pub fn ptr_eq(&self, other: &SharedState) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn next_instance_id(&self) -> InstanceId {
        InstanceId::new(self.inner.next_instance.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn insert(&self, call: DeferredCall) {
        let mut stash = self
            .inner
            .stash
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        stash.insert(call.token.clone(), call);
    }

    /// Look up the pending call for `token`.
    #[must_use]
    pub fn get(&self, token: &str) -> Option<DeferredCall> {
        self.inner
            .stash
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(token)
            .cloned()
    }

    #[must_use]
    pub fn contains(&self, token: &str) -> bool {
        self.inner
            .stash
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(token)
    }

    /// Number of pending calls.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .stash
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every pending call. Returns how many were dropped.
    pub(crate) fn clear(&self) -> usize {
        let mut stash = self
            .inner
            .stash
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let cleared = stash.len();
        stash.clear();
        cleared
    }

    /// Compiled pattern for `prefix`, built on first request.
    pub fn pattern(&self, prefix: &str) -> Result<Arc<TokenPattern>, regex::Error> {
        let mut patterns = self
            .inner
            .patterns
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(pattern) = patterns.get(prefix) {
            return Ok(Arc::clone(pattern));
        }
        let pattern = Arc::new(TokenPattern::new(prefix)?);
        patterns.insert(prefix.to_string(), Arc::clone(&pattern));
        Ok(pattern)
    }
}

impl std::fmt::Debug for SharedState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedState")
            .field("pending_calls", &self.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_helpers_types::{InstanceId, Sequence, Token};
    use serde_json::json;

    use super::{DeferredCall, SharedState};
    use crate::helper::HelperFn;

    fn call(token: &Token) -> DeferredCall {
        DeferredCall::new(
            Arc::from("echo"),
            token.clone(),
            HelperFn::direct(|_, args| Ok(args[0].clone())),
            vec![json!("hi")],
            json!(null),
        )
    }

    fn token(seq: u64) -> Token {
        Token::new("{$ASYNCID$", InstanceId::new(0), Sequence::new(seq))
    }

    #[test]
    fn instance_ids_increase() {
        let shared = SharedState::new();
        let a = shared.next_instance_id();
        let b = shared.next_instance_id();
        assert!(b > a);
    }

    #[test]
    fn insert_get_and_clear() {
        let shared = SharedState::new();
        shared.insert(call(&token(0)));
        shared.insert(call(&token(1)));
        assert_eq!(shared.len(), 2);
        assert!(shared.contains(token(1).as_str()));

        let found = shared.get(token(0).as_str()).unwrap();
        assert_eq!(found.name(), "echo");
        assert_eq!(found.args(), &[json!("hi")]);

        assert_eq!(shared.clear(), 2);
        assert!(shared.is_empty());
        assert!(shared.get(token(0).as_str()).is_none());
    }

    #[test]
    fn clones_share_the_stash() {
        let shared = SharedState::new();
        let other = shared.clone();
        shared.insert(call(&token(5)));
        assert!(other.contains(token(5).as_str()));
        assert!(shared.ptr_eq(&other));
        assert!(!shared.ptr_eq(&SharedState::new()));
    }

    #[test]
    fn pattern_cache_reuses_compiled_patterns() {
        let shared = SharedState::new();
        let a = shared.pattern("<<").unwrap();
        let b = shared.pattern("<<").unwrap();
        let c = shared.pattern(">>").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn global_state_is_a_single_instance() {
        assert!(SharedState::global().ptr_eq(&SharedState::global()));
    }
}
