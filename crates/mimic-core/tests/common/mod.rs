//! Shared fixtures: hand-written equivalents of generated mock types

#![allow(dead_code)]

use mimic_core::hook;
use mimic_core::{
    CallError, ConditionalStackTraceFilter, DispatcherTable, Fault, InternalMockHandler,
    InterceptorSlot, Invocation, Method, MethodDescriptor, MethodTable, MockAccess,
    MockHandler, MockMethodAdvice, MockMethodInterceptor, MockObject, MockRegistry,
    MockSettings, Value, Visibility,
};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// A dispatcher installed in a table (the global one by default) for the duration of a test
pub struct Installed {
    pub identifier: String,
    pub advice: Arc<MockMethodAdvice>,
    pub table: &'static DispatcherTable,
}

impl Installed {
    pub fn new(name: &str) -> Self {
        Self::with_filter(name, ConditionalStackTraceFilter::default())
    }

    pub fn with_filter(name: &str, filter: ConditionalStackTraceFilter) -> Self {
        Self::install(name, filter, DispatcherTable::global())
    }

    pub fn in_table(name: &str, table: &'static DispatcherTable) -> Self {
        Self::install(name, ConditionalStackTraceFilter::default(), table)
    }

    fn install(
        name: &str,
        filter: ConditionalStackTraceFilter,
        table: &'static DispatcherTable,
    ) -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        let identifier = format!("{}-{}", name, NEXT.fetch_add(1, Ordering::Relaxed));
        let advice = Arc::new(
            MockMethodAdvice::new(Arc::new(MockRegistry::new()), identifier.clone(), filter)
                .with_table(table),
        );
        table.register(identifier.clone(), advice.clone()).unwrap();
        Self {
            identifier,
            advice,
            table,
        }
    }

    pub fn registry(&self) -> &Arc<MockRegistry> {
        self.advice.interceptors()
    }

    pub fn bind(&self, instance: &Arc<dyn MockObject>, handler: Arc<dyn InternalMockHandler>) {
        let settings = handler.mock_settings().clone();
        let interceptor = Arc::new(MockMethodInterceptor::new(handler, settings));
        if let Some(access) = instance.mock_access() {
            access.set_mock_interceptor(interceptor.clone());
        }
        self.registry().put(instance, interceptor);
    }
}

impl Drop for Installed {
    fn drop(&mut self) {
        self.table.unregister(&self.identifier);
    }
}

// ---------------------------------------------------------------------------
// Greeter: a plain (non-serializable) generated type
// ---------------------------------------------------------------------------

pub struct Greeter {
    pub dispatcher: String,
    pub greeting: String,
    pub real_calls: AtomicUsize,
}

impl Greeter {
    pub fn new(dispatcher: &str, greeting: &str) -> Self {
        Self {
            dispatcher: dispatcher.to_string(),
            greeting: greeting.to_string(),
            real_calls: AtomicUsize::new(0),
        }
    }

    pub fn greet(&self, name: &str) -> Result<Value, CallError> {
        let arguments = [Value::from(name)];
        hook::around(&self.dispatcher, self, &GREET, &arguments, || {
            self.real_calls.fetch_add(1, Ordering::SeqCst);
            Ok(Value::from(format!("{}, {}", self.greeting, name)))
        })
    }

    pub fn explode(&self) -> Result<Value, CallError> {
        hook::around(&self.dispatcher, self, &EXPLODE, &[], || {
            self.real_calls.fetch_add(1, Ordering::SeqCst);
            Err(Fault::new("IllegalStateException", "boom")
                .at("app::Greeter::explode")
                .into())
        })
    }

    pub fn secret(&self) -> Result<Value, CallError> {
        hook::around(&self.dispatcher, self, &SECRET, &[], || {
            self.real_calls.fetch_add(1, Ordering::SeqCst);
            Ok(Value::from("hidden"))
        })
    }

    pub fn hash_code(&self) -> u64 {
        hook::hash_code(&self.dispatcher, self, || self.greeting.len() as u64)
    }

    pub fn equals(&self, other: &Greeter) -> bool {
        hook::equals(&self.dispatcher, self, other, || self.greeting == other.greeting)
    }

    pub fn real_calls(&self) -> usize {
        self.real_calls.load(Ordering::SeqCst)
    }
}

impl MockObject for Greeter {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn type_name(&self) -> &str {
        "Greeter$Mock"
    }

    fn mocked_type(&self) -> Option<&str> {
        Some("Greeter")
    }
}

fn greeter(this: &dyn MockObject) -> Result<&Greeter, CallError> {
    this.as_any()
        .downcast_ref::<Greeter>()
        .ok_or_else(|| CallError::IllegalArgument(format!("{} is not a Greeter", this.type_name())))
}

pub static GREET: Lazy<Arc<Method>> = Lazy::new(|| {
    MethodTable::global().define(Method::new(
        MethodDescriptor::new("Greeter", "greet", ["String"]),
        |this, arguments| greeter(this)?.greet(arguments[0].as_str().unwrap_or_default()),
    ))
});

pub static EXPLODE: Lazy<Arc<Method>> = Lazy::new(|| {
    MethodTable::global().define(Method::new(
        MethodDescriptor::new("Greeter", "explode", Vec::<String>::new()),
        |this, _| greeter(this)?.explode(),
    ))
});

pub static SECRET: Lazy<Arc<Method>> = Lazy::new(|| {
    MethodTable::global().define(
        Method::new(
            MethodDescriptor::new("Greeter", "secret", Vec::<String>::new()),
            |this, _| greeter(this)?.secret(),
        )
        .with_visibility(Visibility::Restricted),
    )
});

// ---------------------------------------------------------------------------
// Ledger: a serializable generated type carrying its own interception state
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize)]
pub struct Ledger {
    pub entries: Vec<i64>,
    pub interceptor: InterceptorSlot,
    pub dispatcher: String,
}

impl Ledger {
    pub fn new(dispatcher: &str, entries: Vec<i64>) -> Self {
        Self {
            entries,
            interceptor: InterceptorSlot::new(),
            dispatcher: dispatcher.to_string(),
        }
    }

    pub fn total(&self) -> Result<Value, CallError> {
        hook::around(&self.dispatcher, self, &TOTAL, &[], || {
            Ok(Value::Int(self.entries.iter().sum()))
        })
    }
}

impl MockObject for Ledger {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn type_name(&self) -> &str {
        "Ledger$Mock"
    }

    fn is_serializable(&self) -> bool {
        true
    }

    fn mock_access(&self) -> Option<&dyn MockAccess> {
        Some(&self.interceptor)
    }
}

impl MockAccess for Ledger {
    fn mock_interceptor(&self) -> Option<Arc<MockMethodInterceptor>> {
        self.interceptor.mock_interceptor()
    }

    fn set_mock_interceptor(&self, interceptor: Arc<MockMethodInterceptor>) {
        self.interceptor.set_mock_interceptor(interceptor);
    }
}

pub static TOTAL: Lazy<Arc<Method>> = Lazy::new(|| {
    MethodTable::global().define(Method::new(
        MethodDescriptor::new("Ledger", "total", Vec::<String>::new()),
        |this, _| {
            this.as_any()
                .downcast_ref::<Ledger>()
                .ok_or_else(|| CallError::IllegalArgument("not a Ledger".to_string()))?
                .total()
        },
    ))
});

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Answers every call with a fixed value and records method names
#[derive(Serialize, Deserialize)]
pub struct Answer {
    pub value: Value,
    pub settings: MockSettings,
    #[serde(skip)]
    pub seen: Mutex<Vec<String>>,
}

impl Answer {
    pub fn new(value: impl Into<Value>, type_to_mock: &str) -> Arc<Self> {
        Arc::new(Self {
            value: value.into(),
            settings: MockSettings::new(type_to_mock),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().clone()
    }
}

impl MockHandler for Answer {
    fn handle(&self, invocation: &Invocation) -> Result<Value, CallError> {
        self.seen
            .lock()
            .push(invocation.method().descriptor().name().to_string());
        Ok(self.value.clone())
    }

    fn into_internal(self: Arc<Self>) -> Option<Arc<dyn InternalMockHandler>> {
        Some(self)
    }
}

#[typetag::serde]
impl InternalMockHandler for Answer {
    fn mock_settings(&self) -> &MockSettings {
        &self.settings
    }
}

/// Calls the real implementation `times` times and returns the last result
#[derive(Serialize, Deserialize)]
pub struct CallsRealMethod {
    pub times: usize,
    pub settings: MockSettings,
}

impl CallsRealMethod {
    pub fn new(times: usize, type_to_mock: &str) -> Arc<Self> {
        Arc::new(Self {
            times,
            settings: MockSettings::new(type_to_mock),
        })
    }
}

impl MockHandler for CallsRealMethod {
    fn handle(&self, invocation: &Invocation) -> Result<Value, CallError> {
        let mut last = Value::Null;
        for _ in 0..self.times {
            last = invocation.call_real_method()?;
        }
        Ok(last)
    }

    fn into_internal(self: Arc<Self>) -> Option<Arc<dyn InternalMockHandler>> {
        Some(self)
    }
}

#[typetag::serde]
impl InternalMockHandler for CallsRealMethod {
    fn mock_settings(&self) -> &MockSettings {
        &self.settings
    }
}

/// Hashes and compares the mock from inside the handler
#[derive(Serialize, Deserialize)]
pub struct SelfInspecting {
    pub settings: MockSettings,
}

impl MockHandler for SelfInspecting {
    fn handle(&self, invocation: &Invocation) -> Result<Value, CallError> {
        let greeter = invocation
            .mock()
            .as_any()
            .downcast_ref::<Greeter>()
            .ok_or_else(|| CallError::IllegalArgument("not a Greeter".to_string()))?;
        let hash = greeter.hash_code();
        let equal = greeter.equals(greeter);
        Ok(Value::List(vec![Value::Int(hash as i64), Value::Bool(equal)]))
    }

    fn into_internal(self: Arc<Self>) -> Option<Arc<dyn InternalMockHandler>> {
        Some(self)
    }
}

#[typetag::serde]
impl InternalMockHandler for SelfInspecting {
    fn mock_settings(&self) -> &MockSettings {
        &self.settings
    }
}
