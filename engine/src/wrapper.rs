//! Deferred-call wrapping.
//!
//! A wrapped helper does no work when the template engine calls it. It mints
//! a token, records the call in the shared stash under that token, and hands
//! the token back as if it were the helper's output.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use async_helpers_types::{CallingConvention, InstanceId, Sequence, Token};
use serde_json::Value;

use crate::helper::{Helper, HelperFn};
use crate::stash::{DeferredCall, SharedState};

/// Per-instance token source.
pub(crate) struct Minter {
    shared: SharedState,
    instance: InstanceId,
    sequence: AtomicU64,
    prefix: RwLock<Arc<str>>,
}

impl Minter {
    pub(crate) fn new(shared: SharedState, prefix: &str) -> Self {
        let instance = shared.next_instance_id();
        Self {
            shared,
            instance,
            sequence: AtomicU64::new(0),
            prefix: RwLock::new(Arc::from(prefix)),
        }
    }

    pub(crate) fn instance(&self) -> InstanceId {
        self.instance
    }

    pub(crate) fn shared(&self) -> &SharedState {
        &self.shared
    }

    pub(crate) fn prefix(&self) -> Arc<str> {
        Arc::clone(&self.prefix.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub(crate) fn set_prefix(&self, prefix: &str) {
        *self.prefix.write().unwrap_or_else(PoisonError::into_inner) = Arc::from(prefix);
    }

    pub(crate) fn next_token(&self) -> Token {
        let sequence = Sequence::new(self.sequence.fetch_add(1, Ordering::Relaxed));
        Token::new(&self.prefix(), self.instance, sequence)
    }

    pub(crate) fn reset_sequence(&self) {
        self.sequence.store(0, Ordering::Relaxed);
    }
}

/// A helper whose calls are deferred behind tokens.
#[derive(Clone)]
pub struct WrappedHelper {
    name: Arc<str>,
    func: HelperFn,
    minter: Arc<Minter>,
}

impl WrappedHelper {
    pub(crate) fn new(name: &str, func: HelperFn, minter: Arc<Minter>) -> Self {
        Self {
            name: Arc::from(name),
            func,
            minter,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn convention(&self) -> CallingConvention {
        self.func.convention()
    }

    /// Defer a call made without a context.
    pub fn call(&self, args: Vec<Value>) -> String {
        self.call_with_context(Value::Null, args)
    }

    /// Defer a call, remembering `context` for the real invocation.
    ///
    /// Returns the token to embed in the rendered output.
    pub fn call_with_context(&self, context: Value, args: Vec<Value>) -> String {
        let token = self.minter.next_token();
        tracing::debug!(
            helper = %self.name,
            token = %token,
            args = args.len(),
            "Deferred helper call"
        );
        self.minter.shared().insert(DeferredCall::new(
            Arc::clone(&self.name),
            token.clone(),
            self.func.clone(),
            args,
            context,
        ));
        token.into_inner()
    }
}

impl fmt::Debug for WrappedHelper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WrappedHelper")
            .field("name", &self.name)
            .field("convention", &self.convention().as_str())
            .field("instance", &self.minter.instance())
            .finish_non_exhaustive()
    }
}

/// Wrap `helper` for deferred resolution.
///
/// Already-wrapped helpers come back unchanged. Group members are wrapped one
/// by one under `<group>.<member>` names. Raw callables are wrapped only when
/// `wrap` is set.
pub(crate) fn wrap_helper(name: &str, helper: &Helper, wrap: bool, minter: &Arc<Minter>) -> Helper {
    match helper {
        Helper::Wrapped(_) => helper.clone(),
        Helper::Group(members) => Helper::Group(
            members
                .iter()
                .map(|(member, inner)| {
                    let qualified = format!("{name}.{member}");
                    (member.clone(), wrap_helper(&qualified, inner, wrap, minter))
                })
                .collect(),
        ),
        Helper::Raw(func) if wrap => {
            Helper::Wrapped(WrappedHelper::new(name, func.clone(), Arc::clone(minter)))
        }
        Helper::Raw(_) => helper.clone(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_helpers_types::{DEFAULT_PREFIX, Token};
    use serde_json::json;

    use super::{Minter, wrap_helper};
    use crate::helper::Helper;
    use crate::stash::SharedState;

    fn minter(shared: &SharedState) -> Arc<Minter> {
        Arc::new(Minter::new(shared.clone(), DEFAULT_PREFIX))
    }

    fn echo() -> Helper {
        Helper::direct(|_, args| Ok(args.first().cloned().unwrap_or_default()))
    }

    #[test]
    fn wrapped_call_stashes_record() {
        let shared = SharedState::new();
        let minter = minter(&shared);
        let wrapped = wrap_helper("echo", &echo(), true, &minter);
        let wrapped = wrapped.as_wrapped().unwrap();

        let token = wrapped.call_with_context(json!({"user": "doowb"}), vec![json!("hi")]);
        let record = shared.get(&token).unwrap();
        assert_eq!(record.name(), "echo");
        assert_eq!(record.token().as_str(), token);
        assert_eq!(record.args(), &[json!("hi")]);
        assert_eq!(record.context(), &json!({"user": "doowb"}));
    }

    #[test]
    fn sequence_numbers_increase() {
        let shared = SharedState::new();
        let minter = minter(&shared);
        let wrapped = wrap_helper("echo", &echo(), true, &minter);
        let wrapped = wrapped.as_wrapped().unwrap();

        let first = wrapped.call(vec![]);
        let second = wrapped.call(vec![]);
        assert_ne!(first, second);
        let first = Token::parse(DEFAULT_PREFIX, &first).unwrap();
        let second = Token::parse(DEFAULT_PREFIX, &second).unwrap();
        assert_eq!(first.instance, second.instance);
        assert!(second.sequence > first.sequence);
    }

    #[test]
    fn wrapping_is_idempotent() {
        let shared = SharedState::new();
        let minter_a = minter(&shared);
        let minter_b = minter(&shared);
        let once = wrap_helper("echo", &echo(), true, &minter_a);
        let twice = wrap_helper("echo", &once, true, &minter_b);

        let token = twice.as_wrapped().unwrap().call(vec![]);
        let parts = Token::parse(DEFAULT_PREFIX, &token).unwrap();
        assert_eq!(parts.instance, minter_a.instance());
    }

    #[test]
    fn raw_helper_unchanged_without_wrap() {
        let shared = SharedState::new();
        let result = wrap_helper("echo", &echo(), false, &minter(&shared));
        assert!(result.as_raw().is_some());
        assert!(shared.is_empty());
    }

    #[test]
    fn group_members_wrapped_independently() {
        let shared = SharedState::new();
        let group = Helper::group([("a", echo()), ("b", echo())]);
        let wrapped = wrap_helper("math", &group, true, &minter(&shared));

        let a = wrapped.member("a").unwrap().as_wrapped().unwrap();
        let b = wrapped.member("b").unwrap().as_wrapped().unwrap();
        assert_eq!(a.name(), "math.a");
        assert_eq!(b.name(), "math.b");
        assert_ne!(a.call(vec![]), b.call(vec![]));
    }

    #[test]
    fn prefix_change_applies_to_existing_wrappers() {
        let shared = SharedState::new();
        let minter = minter(&shared);
        let wrapped = wrap_helper("echo", &echo(), true, &minter);
        minter.set_prefix("<<");
        let token = wrapped.as_wrapped().unwrap().call(vec![]);
        assert!(token.starts_with("<<"));
    }

    #[test]
    fn reset_sequence_restarts_numbering() {
        let shared = SharedState::new();
        let minter = minter(&shared);
        let first = minter.next_token();
        minter.next_token();
        minter.reset_sequence();
        assert_eq!(minter.next_token(), first);
    }
}
