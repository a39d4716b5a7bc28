//! Maker configuration

use mimic_core::{ConditionalStackTraceFilter, DispatcherTable, MockRegistry};

/// Options for an inline mock maker
#[derive(Debug, Clone)]
pub struct MakerOptions {
    /// Dispatcher identifier; a random one is generated when unset
    pub identifier: Option<String>,

    /// Strip interception frames from real-call failures
    pub clean_stack_traces: bool,

    /// Registry accesses between two incremental sweeps of dead entries
    pub expunge_interval: usize,

    /// Table the maker's dispatcher is installed in
    pub table: &'static DispatcherTable,
}

impl MakerOptions {
    /// Use a fixed dispatcher identifier
    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    /// Enable or disable stack trace cleaning
    pub fn with_clean_stack_traces(mut self, clean: bool) -> Self {
        self.clean_stack_traces = clean;
        self
    }

    /// Set the registry sweep interval
    pub fn with_expunge_interval(mut self, interval: usize) -> Self {
        self.expunge_interval = interval;
        self
    }

    /// Install the dispatcher in `table` instead of the global table
    pub fn with_table(mut self, table: &'static DispatcherTable) -> Self {
        self.table = table;
        self
    }

    pub(crate) fn stack_trace_filter(&self) -> ConditionalStackTraceFilter {
        ConditionalStackTraceFilter::new(self.clean_stack_traces)
    }
}

impl Default for MakerOptions {
    fn default() -> Self {
        Self {
            identifier: None,
            clean_stack_traces: true,
            expunge_interval: MockRegistry::DEFAULT_EXPUNGE_INTERVAL,
            table: DispatcherTable::global(),
        }
    }
}
