//! Dispatcher identity table

use crate::dispatch::MockMethodDispatcher;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::sync::Arc;

static GLOBAL_DISPATCHERS: Lazy<DispatcherTable> = Lazy::new(DispatcherTable::new);

/// Errors raised by the dispatcher table
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TableError {
    /// Another dispatcher already uses the identifier
    #[error("Dispatcher identifier '{0}' is already registered")]
    DuplicateIdentifier(String),
}

/// Table mapping identifiers to dispatchers
///
/// Several instrumentation contexts can live in one process, each under
/// its own identifier. Code that is handed a table should use it; call
/// sites generated into code that can not receive a reference use
/// [`DispatcherTable::global`].
pub struct DispatcherTable {
    dispatchers: DashMap<String, Arc<dyn MockMethodDispatcher>>,
}

impl DispatcherTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self {
            dispatchers: DashMap::new(),
        }
    }

    /// The process-wide table
    pub fn global() -> &'static DispatcherTable {
        &GLOBAL_DISPATCHERS
    }

    /// Register a dispatcher under a new identifier
    pub fn register(
        &self,
        identifier: impl Into<String>,
        dispatcher: Arc<dyn MockMethodDispatcher>,
    ) -> Result<(), TableError> {
        let identifier = identifier.into();
        match self.dispatchers.entry(identifier) {
            Entry::Occupied(entry) => Err(TableError::DuplicateIdentifier(entry.key().clone())),
            Entry::Vacant(entry) => {
                tracing::debug!(identifier = %entry.key(), "registered mock dispatcher");
                entry.insert(dispatcher);
                Ok(())
            }
        }
    }

    /// Find the dispatcher registered under an identifier
    pub fn resolve(&self, identifier: &str) -> Option<Arc<dyn MockMethodDispatcher>> {
        self.dispatchers.get(identifier).map(|entry| entry.value().clone())
    }

    /// Remove a dispatcher
    pub fn unregister(&self, identifier: &str) -> Option<Arc<dyn MockMethodDispatcher>> {
        let removed = self.dispatchers.remove(identifier).map(|(_, dispatcher)| dispatcher);
        if removed.is_some() {
            tracing::debug!(identifier, "unregistered mock dispatcher");
        }
        removed
    }

    /// Get the number of registered dispatchers
    pub fn len(&self) -> usize {
        self.dispatchers.len()
    }

    /// Check if the table is empty
    pub fn is_empty(&self) -> bool {
        self.dispatchers.is_empty()
    }

    /// Get all registered identifiers
    pub fn identifiers(&self) -> Vec<String> {
        self.dispatchers.iter().map(|entry| entry.key().clone()).collect()
    }
}

impl Default for DispatcherTable {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DispatcherTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatcherTable")
            .field("identifiers", &self.identifiers())
            .finish()
    }
}
