//! Per-instance helper registry.

use std::collections::BTreeMap;

use async_helpers_types::ValidationError;

use crate::helper::Helper;

/// Helpers by name, as registered.
#[derive(Debug, Clone, Default)]
pub struct HelperRegistry {
    helpers: BTreeMap<String, Helper>,
}

impl HelperRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `helper` under `name`, replacing any helper of that name.
    pub fn set(&mut self, name: impl Into<String>, helper: Helper) -> Result<(), ValidationError> {
        let name = name.into();
        helper.validate(&name)?;
        if self.helpers.insert(name.clone(), helper).is_some() {
            tracing::debug!(helper = %name, "Replaced registered helper");
        }
        Ok(())
    }

    /// Register several helpers. Nothing is registered if any entry is invalid.
    pub fn set_many<I, K>(&mut self, helpers: I) -> Result<(), ValidationError>
    where
        I: IntoIterator<Item = (K, Helper)>,
        K: Into<String>,
    {
        let staged: Vec<(String, Helper)> = helpers
            .into_iter()
            .map(|(name, helper)| (name.into(), helper))
            .collect();
        for (name, helper) in &staged {
            helper.validate(name)?;
        }
        self.helpers.extend(staged);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Helper> {
        self.helpers.get(name)
    }

    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.helpers.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Helper> {
        self.helpers.remove(name)
    }

    /// Registered names in sorted order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.helpers.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Helper)> {
        self.helpers.iter().map(|(name, helper)| (name.as_str(), helper))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.helpers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.helpers.is_empty()
    }
}
