//! Dispatch types contributed at runtime by other components.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Serialize;

use crate::uri::RawParams;

/// Outcome reported by a foreign handler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ForeignOutcome {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub err: Option<String>,
}

impl ForeignOutcome {
    pub fn ok() -> Self {
        Self { ok: true, err: None }
    }

    pub fn failed(err: impl Into<String>) -> Self {
        Self {
            ok: false,
            err: Some(err.into()),
        }
    }
}

#[async_trait]
pub trait ForeignHandler: Send + Sync {
    /// The `type` value this handler answers to.
    fn kind(&self) -> &str;
    fn description(&self) -> &str;
    /// Receives the raw parameter object, `type` included.
    async fn invoke(&self, params: &RawParams) -> ForeignOutcome;
}

struct ForeignEntry {
    handler: Arc<dyn ForeignHandler>,
    enabled: bool,
}

/// Catalog view of a registered foreign handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForeignInfo {
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    pub enabled: bool,
}

/// Append-only list of foreign handlers. Registering a type twice keeps both
/// entries; lookups take the first enabled one.
#[derive(Default)]
pub struct ForeignRegistry {
    entries: RwLock<Vec<ForeignEntry>>,
}

impl ForeignRegistry {
    pub fn register(&self, handler: Arc<dyn ForeignHandler>, enabled: bool) {
        self.entries.write().push(ForeignEntry { handler, enabled });
    }

    pub fn find_enabled(&self, kind: &str) -> Option<Arc<dyn ForeignHandler>> {
        self.entries
            .read()
            .iter()
            .find(|e| e.enabled && e.handler.kind() == kind)
            .map(|e| Arc::clone(&e.handler))
    }

    /// Flip every entry of `kind`. Returns how many entries matched.
    pub fn set_enabled(&self, kind: &str, enabled: bool) -> usize {
        let mut entries = self.entries.write();
        let mut matched = 0;
        for entry in entries.iter_mut().filter(|e| e.handler.kind() == kind) {
            entry.enabled = enabled;
            matched += 1;
        }
        matched
    }

    pub fn entries(&self) -> Vec<ForeignInfo> {
        self.entries
            .read()
            .iter()
            .map(|e| ForeignInfo {
                kind: e.handler.kind().to_string(),
                description: e.handler.description().to_string(),
                enabled: e.enabled,
            })
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
pub(crate) mod tests {
    use parking_lot::Mutex;

    use super::*;

    /// Records invocations and answers with a fixed outcome.
    pub(crate) struct EchoHandler {
        kind: String,
        description: String,
        outcome: ForeignOutcome,
        pub(crate) calls: Mutex<Vec<RawParams>>,
    }

    impl EchoHandler {
        pub(crate) fn new(kind: &str) -> Self {
            Self {
                kind: kind.to_string(),
                description: format!("{kind} handler"),
                outcome: ForeignOutcome::ok(),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn with_description(mut self, description: &str) -> Self {
            self.description = description.to_string();
            self
        }

        pub(crate) fn failing(mut self, err: &str) -> Self {
            self.outcome = ForeignOutcome::failed(err);
            self
        }
    }

    #[async_trait]
    impl ForeignHandler for EchoHandler {
        fn kind(&self) -> &str {
            &self.kind
        }

        fn description(&self) -> &str {
            &self.description
        }

        async fn invoke(&self, params: &RawParams) -> ForeignOutcome {
            self.calls.lock().push(params.clone());
            self.outcome.clone()
        }
    }

    #[test]
    fn first_enabled_registration_wins() {
        let registry = ForeignRegistry::default();
        let disabled = Arc::new(EchoHandler::new("x").with_description("first"));
        let second = Arc::new(EchoHandler::new("x").with_description("second"));
        let third = Arc::new(EchoHandler::new("x").with_description("third"));
        registry.register(disabled, false);
        registry.register(second, true);
        registry.register(third, true);

        let found = registry.find_enabled("x").unwrap();
        assert_eq!(found.description(), "second");
        assert_eq!(registry.entries().len(), 3);
    }

    #[test]
    fn toggling_applies_to_every_entry_of_a_type() {
        let registry = ForeignRegistry::default();
        registry.register(Arc::new(EchoHandler::new("a")), false);
        registry.register(Arc::new(EchoHandler::new("a")), false);
        registry.register(Arc::new(EchoHandler::new("b")), false);
        assert_eq!(registry.set_enabled("a", true), 2);
        assert!(registry.find_enabled("a").is_some());
        assert!(registry.find_enabled("b").is_none());
        assert_eq!(registry.set_enabled("missing", true), 0);
    }
}
