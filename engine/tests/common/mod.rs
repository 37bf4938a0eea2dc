use std::sync::Once;

use async_helpers_engine::{AsyncHelpers, GetOptions, Helper, SharedState};
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Install a test subscriber once; `RUST_LOG` selects the level.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// A fresh instance on its own shared state, so tests never see each other's
/// tokens.
pub fn isolated() -> AsyncHelpers {
    init_tracing();
    AsyncHelpers::with_shared(SharedState::new())
}

/// Defer a call to `name` and return its token.
pub fn defer(helpers: &AsyncHelpers, name: &str, args: Vec<Value>) -> String {
    helpers
        .get(name, GetOptions::wrapped())
        .and_then(|helper| helper.as_wrapped().cloned())
        .unwrap_or_else(|| panic!("helper {name} is not registered"))
        .call(args)
}

pub fn upper_callback() -> Helper {
    Helper::callback(|_, args, done| {
        let text = args
            .first()
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_uppercase();
        done.ok(text);
    })
}

pub fn concat_direct() -> Helper {
    Helper::direct(|_, args| {
        let joined: String = args
            .iter()
            .map(|arg| match arg {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect();
        Ok(json!(joined))
    })
}
