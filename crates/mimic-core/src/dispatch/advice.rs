//! The advice dispatcher

use crate::dispatch::{
    DispatcherTable, MockMethodDispatcher, PendingResult, RealMethod, RealMethodCall,
    SelfCallMarker, SerializableRealMethodCall,
};
use crate::fault::{CallError, ConditionalStackTraceFilter};
use crate::method::Method;
use crate::object::ObjectId;
use crate::registry::MockRegistry;
use crate::value::Value;
use std::any::Any;
use std::sync::Arc;

/// Dispatcher backed by a mock registry
///
/// Owns the self-call marker its real calls arm, and the stack trace
/// filter applied to failures of those calls. Serializable real calls
/// find the advice again through the table it is installed in (the
/// global table unless set with [`with_table`](Self::with_table)).
pub struct MockMethodAdvice {
    interceptors: Arc<MockRegistry>,
    identifier: String,
    self_call: SelfCallMarker,
    filter: ConditionalStackTraceFilter,
    table: &'static DispatcherTable,
}

impl MockMethodAdvice {
    /// Create a dispatcher over a registry
    pub fn new(
        interceptors: Arc<MockRegistry>,
        identifier: impl Into<String>,
        filter: ConditionalStackTraceFilter,
    ) -> Self {
        Self {
            interceptors,
            identifier: identifier.into(),
            self_call: SelfCallMarker::new(),
            filter,
            table: DispatcherTable::global(),
        }
    }

    /// Resolve serializable real calls in `table` instead of the global table
    pub fn with_table(mut self, table: &'static DispatcherTable) -> Self {
        self.table = table;
        self
    }

    /// The table serializable real calls resolve this dispatcher in
    pub fn table(&self) -> &'static DispatcherTable {
        self.table
    }

    /// The registry this dispatcher consults
    pub fn interceptors(&self) -> &Arc<MockRegistry> {
        &self.interceptors
    }

    /// The marker armed by this dispatcher's real calls
    pub fn self_call_marker(&self) -> &SelfCallMarker {
        &self.self_call
    }

    /// Filter applied to failures of real calls
    pub fn stack_trace_filter(&self) -> &ConditionalStackTraceFilter {
        &self.filter
    }
}

impl MockMethodDispatcher for MockMethodAdvice {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn handle(
        &self,
        instance: ObjectId,
        origin: &Arc<Method>,
        arguments: &[Value],
    ) -> Result<Option<PendingResult>, CallError> {
        // No registry guard is held past this lookup; handlers may re-enter.
        let Some((mock, interceptor)) = self.interceptors.get_entry(instance) else {
            return Ok(None);
        };

        let real_method = if mock.is_serializable() {
            RealMethod::Serializable(
                SerializableRealMethodCall::new(
                    self.identifier.as_str(),
                    origin,
                    mock.clone(),
                    arguments.to_vec(),
                )
                .in_table(self.table),
            )
        } else {
            RealMethod::Direct(RealMethodCall::new(
                self.self_call,
                origin.clone(),
                mock.clone(),
                arguments.to_vec(),
                self.filter,
            ))
        };

        let returned =
            interceptor.do_intercept(mock, origin.clone(), arguments.to_vec(), real_method)?;
        Ok(Some(PendingResult::new(returned)))
    }

    fn is_mock(&self, instance: ObjectId) -> bool {
        self.interceptors.contains_key(instance)
    }

    fn is_mocked(&self, instance: ObjectId) -> bool {
        self.self_call.check_and_consume(instance) && self.is_mock(instance)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
