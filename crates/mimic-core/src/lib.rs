//! Mimic Interception Core
//!
//! This crate mediates every call made on an inline mock instance:
//! - Weak, identity-keyed registry from mock instance to interception state
//! - Dispatcher deciding per call whether to intercept
//! - Per-thread self-call marker letting real-implementation calls through
//! - Real-call trampolines with failure unwrapping and trace filtering
//! - Process-wide dispatcher identity table for generated call sites
//! - Rehydration of mocks reconstructed from serialized data
//!
//! Generating mock types, constructing instances and deciding how a mock
//! answers are left to collaborators (see `mimic-inline`).

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod dispatch;
pub mod fault;
pub mod handler;
pub mod hook;
pub mod method;
pub mod object;
pub mod registry;
pub mod rehydrate;
pub mod value;

pub use dispatch::{
    DispatcherTable, MockMethodAdvice, MockMethodDispatcher, PendingResult, RealMethod, RealMethodCall,
    SelfCallGuard, SelfCallMarker, TableError,
};
pub use fault::{CallError, ConditionalStackTraceFilter, Fault, Frame, InvocationError};
pub use handler::{
    InternalMockHandler, InterceptorSlot, Invocation, MockAccess, MockHandler,
    MockMethodInterceptor, MockSettings, SerializableMode,
};
pub use method::{Method, MethodDescriptor, MethodTable, Visibility};
pub use object::{identity_hash, same_object, Instance, MockObject, ObjectId};
pub use registry::{MockRegistry, WeakIdentityMap};
pub use rehydrate::RehydrateError;
pub use value::Value;
