//! Call dispatch for mock instances
//!
//! Every call into an instrumented method asks the governing dispatcher
//! two questions: is this instance mocked right now (`is_mocked`), and if
//! so, what should the call return (`handle`).
//!
//! ```text
//! call site ──► DispatcherTable::resolve(id) ──► is_mocked(this)?
//!                                                  │ no: run original body
//!                                                  ▼ yes
//!                  registry lookup ──► handler.handle(invocation)
//!                                                  │
//!                 PendingResult ◄──────────────────┘
//! ```

mod advice;
mod real_call;
mod self_call;
mod table;

pub use advice::MockMethodAdvice;
pub use real_call::{RealMethod, RealMethodCall, SerializableRealMethodCall};
pub use self_call::{SelfCallGuard, SelfCallMarker};
pub use table::{DispatcherTable, TableError};

use crate::fault::CallError;
use crate::method::Method;
use crate::object::ObjectId;
use crate::value::Value;
use std::any::Any;
use std::sync::Arc;

/// Per-call interception decision point
pub trait MockMethodDispatcher: Send + Sync + 'static {
    /// Identifier the dispatcher is registered under
    fn identifier(&self) -> &str;

    /// Intercept a call, or return `None` to let it run normally
    fn handle(
        &self,
        instance: ObjectId,
        origin: &Arc<Method>,
        arguments: &[Value],
    ) -> Result<Option<PendingResult>, CallError>;

    /// Check if the instance is a registered mock
    fn is_mock(&self, instance: ObjectId) -> bool;

    /// Check if a call on the instance should be intercepted
    ///
    /// Consumes this thread's self-call mark for the instance, if any.
    fn is_mocked(&self, instance: ObjectId) -> bool;

    /// Access the concrete dispatcher for downcasting
    fn as_any(&self) -> &dyn Any;
}

/// Result of an intercepted call, substituted for the method's own return
#[derive(Debug, Clone, PartialEq)]
pub struct PendingResult {
    returned: Value,
}

impl PendingResult {
    /// Wrap a handler's result
    pub fn new(returned: Value) -> Self {
        Self { returned }
    }

    /// Peek at the substitute value
    pub fn value(&self) -> &Value {
        &self.returned
    }

    /// Take the substitute value
    pub fn into_value(self) -> Value {
        self.returned
    }
}
