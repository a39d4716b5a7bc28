//! Handlers and interception state
//!
//! The core does not decide how a mock answers. It hands each intercepted
//! call to the [`MockHandler`] bound to the instance, wrapped in an
//! [`Invocation`] that can reach the real implementation.
//!
//! Only handlers that are [`InternalMockHandler`]s can be bound. Those are
//! serializable, which lets a serializable mock carry its own
//! [`MockMethodInterceptor`] through a round trip and be re-registered
//! afterwards.

use crate::dispatch::RealMethod;
use crate::fault::CallError;
use crate::method::Method;
use crate::object::Instance;
use crate::value::Value;
use parking_lot::RwLock;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// How a mock may be serialized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SerializableMode {
    /// Not serializable
    #[default]
    None,
    /// Serializable within the execution context that created it
    Basic,
    /// Serializable into a different execution context
    AcrossContexts,
}

/// Settings a mock was created with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MockSettings {
    type_to_mock: String,
    extra_interfaces: BTreeSet<String>,
    serializable_mode: SerializableMode,
    name: Option<String>,
}

impl MockSettings {
    /// Create settings for mocking a type
    pub fn new(type_to_mock: impl Into<String>) -> Self {
        Self {
            type_to_mock: type_to_mock.into(),
            extra_interfaces: BTreeSet::new(),
            serializable_mode: SerializableMode::None,
            name: None,
        }
    }

    /// Add an extra interface the mock implements
    pub fn with_extra_interface(mut self, interface: impl Into<String>) -> Self {
        self.extra_interfaces.insert(interface.into());
        self
    }

    /// Set the serializable mode
    pub fn with_serializable_mode(mut self, mode: SerializableMode) -> Self {
        self.serializable_mode = mode;
        self
    }

    /// Name the mock
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Type being mocked
    pub fn type_to_mock(&self) -> &str {
        &self.type_to_mock
    }

    /// Extra interfaces
    pub fn extra_interfaces(&self) -> &BTreeSet<String> {
        &self.extra_interfaces
    }

    /// Serializable mode
    pub fn serializable_mode(&self) -> SerializableMode {
        self.serializable_mode
    }

    /// Mock name, if any
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

static NEXT_SEQUENCE_NUMBER: AtomicU64 = AtomicU64::new(1);

/// An intercepted call on a mock
pub struct Invocation {
    mock: Instance,
    method: Arc<Method>,
    arguments: Vec<Value>,
    real_method: RealMethod,
    sequence_number: u64,
}

impl Invocation {
    /// Create an invocation with the next sequence number
    pub fn new(
        mock: Instance,
        method: Arc<Method>,
        arguments: Vec<Value>,
        real_method: RealMethod,
    ) -> Self {
        Self {
            mock,
            method,
            arguments,
            real_method,
            sequence_number: NEXT_SEQUENCE_NUMBER.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// The mock the call was made on
    pub fn mock(&self) -> &Instance {
        &self.mock
    }

    /// The called method
    pub fn method(&self) -> &Arc<Method> {
        &self.method
    }

    /// Call arguments
    pub fn arguments(&self) -> &[Value] {
        &self.arguments
    }

    /// Argument at an index
    pub fn argument(&self, index: usize) -> Option<&Value> {
        self.arguments.get(index)
    }

    /// Process-wide ordering of invocations
    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    /// The representation of the real implementation
    pub fn real_method(&self) -> &RealMethod {
        &self.real_method
    }

    /// Call the real implementation with the original arguments
    ///
    /// May be called any number of times; each call passes the self-call
    /// marker once.
    pub fn call_real_method(&self) -> Result<Value, CallError> {
        self.real_method.invoke()
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("mock", &self.mock.type_name())
            .field("method", self.method.descriptor())
            .field("arguments", &self.arguments)
            .field("sequence_number", &self.sequence_number)
            .finish()
    }
}

/// Decides how a mock answers an intercepted call
pub trait MockHandler: Send + Sync {
    /// Produce the value (or failure) of an intercepted call
    fn handle(&self, invocation: &Invocation) -> Result<Value, CallError>;

    /// View this handler as one the core can bind
    ///
    /// Handlers that are not internal handlers are rejected at binding time.
    fn into_internal(self: Arc<Self>) -> Option<Arc<dyn InternalMockHandler>> {
        None
    }
}

/// A handler the core can bind to a mock instance
#[typetag::serde(tag = "handler")]
pub trait InternalMockHandler: MockHandler {
    /// Settings of the mock this handler serves
    fn mock_settings(&self) -> &MockSettings;
}

/// Interception state of one mock instance
#[derive(Clone, Serialize, Deserialize)]
pub struct MockMethodInterceptor {
    handler: Arc<dyn InternalMockHandler>,
    settings: MockSettings,
}

impl MockMethodInterceptor {
    /// Bind a handler with the settings the mock was created with
    pub fn new(handler: Arc<dyn InternalMockHandler>, settings: MockSettings) -> Self {
        Self { handler, settings }
    }

    /// The bound handler
    pub fn handler(&self) -> &Arc<dyn InternalMockHandler> {
        &self.handler
    }

    /// Creation settings
    pub fn settings(&self) -> &MockSettings {
        &self.settings
    }

    /// Hand an intercepted call to the handler
    pub fn do_intercept(
        &self,
        mock: Instance,
        method: Arc<Method>,
        arguments: Vec<Value>,
        real_method: RealMethod,
    ) -> Result<Value, CallError> {
        let invocation = Invocation::new(mock, method, arguments, real_method);
        self.handler.handle(&invocation)
    }
}

impl fmt::Debug for MockMethodInterceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockMethodInterceptor")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// Access to the interception state a mock carries in its own fields
pub trait MockAccess {
    /// The interception state last bound to this instance
    fn mock_interceptor(&self) -> Option<Arc<MockMethodInterceptor>>;

    /// Store the interception state in the instance
    fn set_mock_interceptor(&self, interceptor: Arc<MockMethodInterceptor>);
}

/// Field holding a mock's own interception state
///
/// Serializes as the interceptor itself (or nothing), so it survives a
/// round trip while the registry does not.
#[derive(Default)]
pub struct InterceptorSlot {
    interceptor: RwLock<Option<Arc<MockMethodInterceptor>>>,
}

impl InterceptorSlot {
    /// Create an empty slot
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the slot holds state
    pub fn is_set(&self) -> bool {
        self.interceptor.read().is_some()
    }
}

impl MockAccess for InterceptorSlot {
    fn mock_interceptor(&self) -> Option<Arc<MockMethodInterceptor>> {
        self.interceptor.read().clone()
    }

    fn set_mock_interceptor(&self, interceptor: Arc<MockMethodInterceptor>) {
        *self.interceptor.write() = Some(interceptor);
    }
}

impl fmt::Debug for InterceptorSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorSlot")
            .field("set", &self.is_set())
            .finish()
    }
}

impl Serialize for InterceptorSlot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.interceptor.read().as_deref().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for InterceptorSlot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let interceptor = Option::<MockMethodInterceptor>::deserialize(deserializer)?;
        Ok(Self {
            interceptor: RwLock::new(interceptor.map(Arc::new)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize, Deserialize)]
    struct FixedAnswer {
        answer: Value,
        settings: MockSettings,
    }

    impl MockHandler for FixedAnswer {
        fn handle(&self, _invocation: &Invocation) -> Result<Value, CallError> {
            Ok(self.answer.clone())
        }

        fn into_internal(self: Arc<Self>) -> Option<Arc<dyn InternalMockHandler>> {
            Some(self)
        }
    }

    #[typetag::serde]
    impl InternalMockHandler for FixedAnswer {
        fn mock_settings(&self) -> &MockSettings {
            &self.settings
        }
    }

    struct Foreign;

    impl MockHandler for Foreign {
        fn handle(&self, _invocation: &Invocation) -> Result<Value, CallError> {
            Ok(Value::Null)
        }
    }

    fn settings() -> MockSettings {
        MockSettings::new("Greeter")
            .with_extra_interface("Serializable")
            .with_serializable_mode(SerializableMode::Basic)
            .with_name("greeter")
    }

    #[test]
    fn test_settings_builder() {
        let settings = settings();
        assert_eq!(settings.type_to_mock(), "Greeter");
        assert!(settings.extra_interfaces().contains("Serializable"));
        assert_eq!(settings.serializable_mode(), SerializableMode::Basic);
        assert_eq!(settings.name(), Some("greeter"));
    }

    #[test]
    fn test_into_internal() {
        let internal: Arc<dyn MockHandler> = Arc::new(FixedAnswer {
            answer: Value::Int(1),
            settings: settings(),
        });
        assert!(internal.into_internal().is_some());

        let foreign: Arc<dyn MockHandler> = Arc::new(Foreign);
        assert!(foreign.into_internal().is_none());
    }

    #[test]
    fn test_slot_round_trips_interceptor() {
        let slot = InterceptorSlot::new();
        assert_eq!(serde_json::to_string(&slot).unwrap(), "null");

        let handler = Arc::new(FixedAnswer {
            answer: Value::from("canned"),
            settings: settings(),
        });
        slot.set_mock_interceptor(Arc::new(MockMethodInterceptor::new(handler, settings())));

        let json = serde_json::to_string(&slot).unwrap();
        let restored: InterceptorSlot = serde_json::from_str(&json).unwrap();

        let interceptor = restored.mock_interceptor().unwrap();
        assert_eq!(interceptor.settings(), &settings());
        assert_eq!(interceptor.handler().mock_settings().name(), Some("greeter"));
    }
}
