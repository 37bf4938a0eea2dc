//! Token detection for one prefix.

use std::collections::HashMap;

use regex::{Captures, Regex};

/// Compiled matcher for `<prefix><digits>$<digits>$}`. Digits are ASCII only.
#[derive(Debug)]
pub struct TokenPattern {
    prefix: String,
    regex: Regex,
}

impl TokenPattern {
    /// Compile the matcher for `prefix`. Pattern metacharacters in the prefix
    /// are matched literally.
    pub fn new(prefix: &str) -> Result<Self, regex::Error> {
        let source = format!(r"{}[0-9]+\$[0-9]+\$\}}", regex::escape(prefix));
        Ok(Self {
            prefix: prefix.to_string(),
            regex: Regex::new(&source)?,
        })
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Every token occurrence in `text`, left to right. Repeated tokens are
    /// listed once per occurrence.
    #[must_use]
    pub fn matches<'t>(&self, text: &'t str) -> Vec<&'t str> {
        self.regex.find_iter(text).map(|m| m.as_str()).collect()
    }

    /// Distinct tokens in order of first occurrence.
    #[must_use]
    pub fn distinct_matches<'t>(&self, text: &'t str) -> Vec<&'t str> {
        let mut seen = Vec::new();
        for token in self.matches(text) {
            if !seen.contains(&token) {
                seen.push(token);
            }
        }
        seen
    }

    #[must_use]
    pub fn contains_token(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    /// Whether `text` is exactly one token and nothing else.
    #[must_use]
    pub fn is_token(&self, text: &str) -> bool {
        self.regex
            .find(text)
            .is_some_and(|m| m.start() == 0 && m.end() == text.len())
    }

    /// Replace every token found in `text` that has an entry in `values`.
    ///
    /// The text is scanned once, so substituted values are never scanned
    /// again for tokens.
    #[must_use]
    pub fn substitute(&self, text: &str, values: &HashMap<String, String>) -> String {
        self.regex
            .replace_all(text, |caps: &Captures<'_>| {
                let token = &caps[0];
                values
                    .get(token)
                    .cloned()
                    .unwrap_or_else(|| token.to_string())
            })
            .into_owned()
    }
}
