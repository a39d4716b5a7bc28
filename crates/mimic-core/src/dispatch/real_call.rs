//! Real-call trampolines
//!
//! Both variants invoke the real implementation of an intercepted
//! method. Before invoking they relax access checks for non-public
//! methods and arm the dispatcher's self-call marker for the instance, so
//! the re-entered call site lets the call through. The mark lives only as
//! long as the invocation: a call rejected before it reaches the body
//! leaves nothing behind. A callee failure is unwrapped from the
//! invocation mechanism and re-raised as is, minus interception-layer
//! frames.

use crate::dispatch::{DispatcherTable, MockMethodAdvice, SelfCallMarker};
use crate::fault::{CallError, ConditionalStackTraceFilter};
use crate::method::{Method, MethodDescriptor};
use crate::object::Instance;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Handle on the real implementation of an intercepted call
#[derive(Debug)]
pub enum RealMethod {
    /// Holds the live method and the dispatcher's marker
    Direct(RealMethodCall),
    /// Holds only serializable descriptions, resolved at call time
    Serializable(SerializableRealMethodCall),
}

impl RealMethod {
    /// Whether the real implementation can be called
    pub fn is_invokable(&self) -> bool {
        true
    }

    /// Call the real implementation
    pub fn invoke(&self) -> Result<Value, CallError> {
        match self {
            RealMethod::Direct(call) => call.invoke(),
            RealMethod::Serializable(call) => call.invoke(),
        }
    }
}

/// Real call bound to a live method
pub struct RealMethodCall {
    marker: SelfCallMarker,
    origin: Arc<Method>,
    instance: Instance,
    arguments: Vec<Value>,
    filter: ConditionalStackTraceFilter,
}

impl RealMethodCall {
    /// Bind a real call
    pub fn new(
        marker: SelfCallMarker,
        origin: Arc<Method>,
        instance: Instance,
        arguments: Vec<Value>,
        filter: ConditionalStackTraceFilter,
    ) -> Self {
        Self {
            marker,
            origin,
            instance,
            arguments,
            filter,
        }
    }

    /// Invoke the real implementation
    pub fn invoke(&self) -> Result<Value, CallError> {
        if !self.origin.is_public() {
            self.origin.set_accessible(true);
        }
        let _armed = self.marker.arm(&self.instance);
        self.origin
            .invoke(self.instance.as_ref(), &self.arguments)
            .map_err(|error| error.into_cause(&self.filter))
    }
}

impl fmt::Debug for RealMethodCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealMethodCall")
            .field("origin", self.origin.descriptor())
            .field("instance", &self.instance.type_name())
            .field("arguments", &self.arguments)
            .finish()
    }
}

/// Real call holding no live method or dispatcher reference
///
/// The method is resolved from its descriptor and the dispatcher from its
/// identifier when the call is made, so the call stays valid when it is
/// reconstructed somewhere else. The instance is not part of the
/// serialized form; a deserialized call must be re-bound with
/// [`bind`](Self::bind) before it is invoked.
#[derive(Serialize, Deserialize)]
pub struct SerializableRealMethodCall {
    identifier: String,
    origin: MethodDescriptor,
    #[serde(skip)]
    instance: Option<Instance>,
    arguments: Vec<Value>,
    #[serde(skip, default = "DispatcherTable::global")]
    table: &'static DispatcherTable,
}

impl SerializableRealMethodCall {
    /// Describe a real call
    pub fn new(
        identifier: impl Into<String>,
        origin: &Method,
        instance: Instance,
        arguments: Vec<Value>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            origin: origin.descriptor().clone(),
            instance: Some(instance),
            arguments,
            table: DispatcherTable::global(),
        }
    }

    /// Resolve the dispatcher in `table` instead of the global table
    pub fn in_table(mut self, table: &'static DispatcherTable) -> Self {
        self.table = table;
        self
    }

    /// Identifier of the governing dispatcher
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Descriptor of the called method
    pub fn descriptor(&self) -> &MethodDescriptor {
        &self.origin
    }

    /// Arguments of the call
    pub fn arguments(&self) -> &[Value] {
        &self.arguments
    }

    /// Instance the call runs on, if bound
    pub fn instance(&self) -> Option<&Instance> {
        self.instance.as_ref()
    }

    /// Bind the call to the (restored) instance it runs on
    pub fn bind(&mut self, instance: Instance) {
        self.instance = Some(instance);
    }

    /// Invoke the real implementation
    ///
    /// The dispatcher is resolved in the table the call was created for;
    /// a deserialized call uses the global table.
    pub fn invoke(&self) -> Result<Value, CallError> {
        self.invoke_in(self.table)
    }

    /// Invoke the real implementation, resolving the dispatcher in `table`
    pub fn invoke_in(&self, table: &DispatcherTable) -> Result<Value, CallError> {
        let instance = self
            .instance
            .as_ref()
            .ok_or_else(|| CallError::UnboundInstance(self.origin.clone()))?;
        let method = self
            .origin
            .resolve()
            .ok_or_else(|| CallError::UnresolvedMethod(self.origin.clone()))?;
        if !method.is_public() {
            method.set_accessible(true);
        }

        let dispatcher = table.resolve(&self.identifier);
        let advice = dispatcher
            .as_deref()
            .and_then(|dispatcher| dispatcher.as_any().downcast_ref::<MockMethodAdvice>())
            .ok_or_else(|| CallError::UnexpectedDispatcher(self.identifier.clone()))?;

        let _armed = advice.self_call_marker().arm(instance);
        method
            .invoke(instance.as_ref(), &self.arguments)
            .map_err(|error| error.into_cause(advice.stack_trace_filter()))
    }
}

impl fmt::Debug for SerializableRealMethodCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerializableRealMethodCall")
            .field("identifier", &self.identifier)
            .field("origin", &self.origin)
            .field(
                "instance",
                &self.instance.as_ref().map(|instance| instance.type_name()),
            )
            .field("arguments", &self.arguments)
            .finish()
    }
}
