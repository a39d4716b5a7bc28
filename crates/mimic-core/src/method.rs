//! Method capabilities and descriptors
//!
//! A [`Method`] is bound when a mock type is generated: it knows how to
//! call the (instrumented) entry point of one method on an instance. That
//! call goes back through the call-site hooks, which is why the real-call
//! trampolines arm the self-call marker before invoking it.
//!
//! A [`MethodDescriptor`] is the serializable description of a method. It
//! resolves back to the live [`Method`] through the process-wide
//! [`MethodTable`].

use crate::fault::{CallError, Frame, InvocationError};
use crate::object::MockObject;
use crate::value::Value;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Invocation capability of a method
pub type MethodBody = dyn Fn(&dyn MockObject, &[Value]) -> Result<Value, CallError> + Send + Sync;

/// Serializable identity of a method
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodDescriptor {
    declaring_type: String,
    name: String,
    parameter_types: Vec<String>,
}

impl MethodDescriptor {
    /// Create a method descriptor
    pub fn new<I, S>(
        declaring_type: impl Into<String>,
        name: impl Into<String>,
        parameter_types: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            declaring_type: declaring_type.into(),
            name: name.into(),
            parameter_types: parameter_types.into_iter().map(Into::into).collect(),
        }
    }

    /// Name of the type declaring the method
    pub fn declaring_type(&self) -> &str {
        &self.declaring_type
    }

    /// Method name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parameter type names in declaration order
    pub fn parameter_types(&self) -> &[String] {
        &self.parameter_types
    }

    /// Resolve the descriptor to a live method through the global table
    pub fn resolve(&self) -> Option<Arc<Method>> {
        MethodTable::global().resolve(self)
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}::{}({})",
            self.declaring_type,
            self.name,
            self.parameter_types.join(", ")
        )
    }
}

/// Visibility of a method or of its declaring type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    /// Reachable from any calling context
    #[default]
    Public,
    /// Only reachable once access checks are relaxed
    Restricted,
}

/// A method of a generated mock type
pub struct Method {
    descriptor: MethodDescriptor,
    visibility: Visibility,
    declaring_visibility: Visibility,
    accessible: AtomicBool,
    body: Box<MethodBody>,
}

impl Method {
    /// Create a public method on a public type
    pub fn new<F>(descriptor: MethodDescriptor, body: F) -> Self
    where
        F: Fn(&dyn MockObject, &[Value]) -> Result<Value, CallError> + Send + Sync + 'static,
    {
        Self {
            descriptor,
            visibility: Visibility::Public,
            declaring_visibility: Visibility::Public,
            accessible: AtomicBool::new(false),
            body: Box::new(body),
        }
    }

    /// Set the method's own visibility
    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Set the visibility of the declaring type
    pub fn with_declaring_visibility(mut self, visibility: Visibility) -> Self {
        self.declaring_visibility = visibility;
        self
    }

    /// Get the method descriptor
    pub fn descriptor(&self) -> &MethodDescriptor {
        &self.descriptor
    }

    /// Public only if both the method and its declaring type are
    pub fn is_public(&self) -> bool {
        self.visibility == Visibility::Public && self.declaring_visibility == Visibility::Public
    }

    /// Check if access checks were relaxed
    pub fn is_accessible(&self) -> bool {
        self.accessible.load(Ordering::Acquire)
    }

    /// Relax (or restore) access checks
    pub fn set_accessible(&self, accessible: bool) {
        self.accessible.store(accessible, Ordering::Release);
    }

    /// Invoke the method on an instance
    ///
    /// Any failure of the callee comes back wrapped in
    /// [`InvocationError::Target`].
    pub fn invoke(
        &self,
        instance: &dyn MockObject,
        arguments: &[Value],
    ) -> Result<Value, InvocationError> {
        if !self.is_public() && !self.is_accessible() {
            return Err(InvocationError::IllegalAccess(self.descriptor.clone()));
        }
        let expected = self.descriptor.parameter_types.len();
        if arguments.len() != expected {
            return Err(InvocationError::IllegalArgument(format!(
                "{} expects {} arguments but got {}",
                self.descriptor,
                expected,
                arguments.len()
            )));
        }

        (self.body)(instance, arguments).map_err(|error| {
            let error = match error {
                CallError::Raised(mut fault) => {
                    fault.push_frame(Frame::new(concat!(module_path!(), "::Method::invoke")));
                    CallError::Raised(fault)
                }
                other => other,
            };
            InvocationError::Target(Box::new(error))
        })
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("descriptor", &self.descriptor)
            .field("visibility", &self.visibility)
            .field("declaring_visibility", &self.declaring_visibility)
            .field("accessible", &self.is_accessible())
            .finish()
    }
}

static GLOBAL_METHODS: Lazy<MethodTable> = Lazy::new(MethodTable::new);

/// Table resolving method descriptors to live methods
///
/// Generated types define their methods here so that serializable real
/// calls can find them again from a descriptor alone.
pub struct MethodTable {
    methods: DashMap<MethodDescriptor, Arc<Method>>,
}

impl MethodTable {
    /// Create an empty method table
    pub fn new() -> Self {
        Self {
            methods: DashMap::new(),
        }
    }

    /// The process-wide method table
    pub fn global() -> &'static MethodTable {
        &GLOBAL_METHODS
    }

    /// Define a method, returning the table's canonical instance
    ///
    /// The first definition for a descriptor wins.
    pub fn define(&self, method: Method) -> Arc<Method> {
        self.methods
            .entry(method.descriptor.clone())
            .or_insert_with(|| Arc::new(method))
            .value()
            .clone()
    }

    /// Look up a method by descriptor
    pub fn resolve(&self, descriptor: &MethodDescriptor) -> Option<Arc<Method>> {
        self.methods.get(descriptor).map(|entry| entry.value().clone())
    }

    /// Get the number of defined methods
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    /// Check if the table is empty
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

impl Default for MethodTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fault::Fault;
    use std::any::Any;

    struct Counter;

    impl MockObject for Counter {
        fn as_any(&self) -> &dyn Any {
            self
        }

        fn type_name(&self) -> &str {
            "Counter"
        }
    }

    fn descriptor(name: &str) -> MethodDescriptor {
        MethodDescriptor::new("Counter", name, ["int"])
    }

    #[test]
    fn test_descriptor_display() {
        let d = MethodDescriptor::new("Greeter", "greet", ["String", "int"]);
        assert_eq!(d.to_string(), "Greeter::greet(String, int)");
    }

    #[test]
    fn test_invoke_public_method() {
        let method = Method::new(descriptor("double"), |_, args| {
            Ok(Value::Int(args[0].as_int().unwrap_or_default() * 2))
        });

        assert_eq!(method.invoke(&Counter, &[Value::Int(21)]), Ok(Value::Int(42)));
    }

    #[test]
    fn test_restricted_method_requires_access() {
        let method = Method::new(descriptor("secret"), |_, _| Ok(Value::Null))
            .with_visibility(Visibility::Restricted);

        assert!(!method.is_public());
        assert_eq!(
            method.invoke(&Counter, &[Value::Int(1)]),
            Err(InvocationError::IllegalAccess(descriptor("secret")))
        );

        method.set_accessible(true);
        assert_eq!(method.invoke(&Counter, &[Value::Int(1)]), Ok(Value::Null));
    }

    #[test]
    fn test_restricted_declaring_type_is_not_public() {
        let method = Method::new(descriptor("hidden"), |_, _| Ok(Value::Null))
            .with_declaring_visibility(Visibility::Restricted);
        assert!(!method.is_public());
    }

    #[test]
    fn test_invoke_checks_arity() {
        let method = Method::new(descriptor("double"), |_, _| Ok(Value::Null));
        assert!(matches!(
            method.invoke(&Counter, &[]),
            Err(InvocationError::IllegalArgument(_))
        ));
    }

    #[test]
    fn test_invoke_wraps_callee_fault() {
        let method = Method::new(descriptor("explode"), |_, _| {
            Err(Fault::new("ArithmeticException", "divide by zero")
                .at("app::Counter::explode")
                .into())
        });

        match method.invoke(&Counter, &[Value::Int(0)]) {
            Err(InvocationError::Target(cause)) => match *cause {
                CallError::Raised(fault) => {
                    assert_eq!(fault.message(), "divide by zero");
                    assert_eq!(fault.trace().len(), 2);
                    assert!(fault.trace()[1].is_internal());
                }
                other => panic!("unexpected cause {:?}", other),
            },
            other => panic!("expected wrapped failure, got {:?}", other),
        }
    }

    #[test]
    fn test_method_table_define_and_resolve() {
        let table = MethodTable::new();
        let first = table.define(Method::new(descriptor("a"), |_, _| Ok(Value::Int(1))));
        let second = table.define(Method::new(descriptor("a"), |_, _| Ok(Value::Int(2))));

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(table.len(), 1);
        assert!(table.resolve(&descriptor("a")).is_some());
        assert!(table.resolve(&descriptor("b")).is_none());
    }
}
