//! Placeholder token wire format.
//!
//! A token has the fixed shape `<prefix><instance>$<sequence>$}`. Template
//! engines must emit it untouched so the resolver can find it again in the
//! rendered output.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::{InstanceId, Sequence};

/// Prefix used when no custom prefix is configured.
pub const DEFAULT_PREFIX: &str = "{$ASYNCID$";

/// Separator between the instance id and the sequence number.
pub const TOKEN_SEPARATOR: char = '$';

/// Closing marker of every token.
pub const TOKEN_SUFFIX: &str = "$}";

/// An opaque placeholder standing in for a deferred helper result.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(String);

/// The numeric parts of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenParts {
    pub instance: InstanceId,
    pub sequence: Sequence,
}

impl Token {
    #[must_use]
    pub fn new(prefix: &str, instance: InstanceId, sequence: Sequence) -> Self {
        Self(format!(
            "{prefix}{instance}{TOKEN_SEPARATOR}{sequence}{TOKEN_SUFFIX}"
        ))
    }

    /// Split `text` into instance id and sequence if it is exactly one token
    /// minted with `prefix`.
    #[must_use]
    pub fn parse(prefix: &str, text: &str) -> Option<TokenParts> {
        let body = text.strip_prefix(prefix)?.strip_suffix(TOKEN_SUFFIX)?;
        let (instance, sequence) = body.split_once(TOKEN_SEPARATOR)?;
        if !is_digits(instance) || !is_digits(sequence) {
            return None;
        }
        Some(TokenParts {
            instance: InstanceId::new(instance.parse().ok()?),
            sequence: Sequence::new(sequence.parse().ok()?),
        })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Token {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl Borrow<str> for Token {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl From<Token> for String {
    fn from(value: Token) -> Self {
        value.0
    }
}
