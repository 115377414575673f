//! Where the custom events of an account come from.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::recurrence::{CustomEvent, ValidationOptions};
use crate::{Error, Result};

#[async_trait]
pub trait RuleStore: Send + Sync {
    async fn custom_events(&self, account: &str) -> Result<Vec<CustomEvent>>;
}

/// Custom events held in memory, keyed by account. Every event is validated
/// when the store is built, so expansion never sees a malformed rule.
#[derive(Debug, Clone, Default)]
pub struct MemoryRuleStore {
    events: HashMap<String, Vec<CustomEvent>>,
}

impl MemoryRuleStore {
    pub fn new(
        events: HashMap<String, Vec<CustomEvent>>,
        options: &ValidationOptions,
    ) -> Result<Self> {
        for event in events.values().flatten() {
            event.validate(options)?;
        }

        Ok(Self { events })
    }

    /// Reads `{"<account>": [<custom event>, ...]}`.
    pub fn from_json(raw: &str, options: &ValidationOptions) -> Result<Self> {
        let events = serde_json::from_str(raw).map_err(|err| Error::Validation(err.to_string()))?;
        Self::new(events, options)
    }
}

#[async_trait]
impl RuleStore for MemoryRuleStore {
    async fn custom_events(&self, account: &str) -> Result<Vec<CustomEvent>> {
        Ok(self.events.get(account).cloned().unwrap_or_default())
    }
}
