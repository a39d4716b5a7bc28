//! Failures raised through intercepted calls
//!
//! A [`Fault`] is what a real implementation raises. It travels back to
//! the handler and the caller unchanged, apart from frames belonging to
//! the interception layer, which [`ConditionalStackTraceFilter`] strips.
//!
//! [`InvocationError`] is the wrapper the invocation mechanism puts
//! around a callee failure; the real-call trampolines unwrap it again.

use crate::method::MethodDescriptor;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Location prefixes of frames that belong to the interception layer
pub const INTERNAL_FRAME_PREFIXES: &[&str] = &["mimic_core::", "mimic_inline::"];

/// One entry of a fault's trace
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Frame {
    /// Fully qualified location (e.g. `app::Greeter::greet`)
    pub location: String,
}

impl Frame {
    /// Create a frame for a location
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
        }
    }

    /// Check if this frame belongs to the interception layer
    pub fn is_internal(&self) -> bool {
        INTERNAL_FRAME_PREFIXES
            .iter()
            .any(|prefix| self.location.starts_with(prefix))
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "at {}", self.location)
    }
}

/// Failure raised by a real implementation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct Fault {
    kind: String,
    message: String,
    trace: Vec<Frame>,
}

impl Fault {
    /// Create a fault with an empty trace
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            trace: Vec::new(),
        }
    }

    /// Record the location the fault passes through
    pub fn at(mut self, location: impl Into<String>) -> Self {
        self.trace.push(Frame::new(location));
        self
    }

    /// Append a frame to the trace
    pub fn push_frame(&mut self, frame: Frame) {
        self.trace.push(frame);
    }

    /// Failure kind (the "exception type")
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Failure message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Frames from the raising location outwards
    pub fn trace(&self) -> &[Frame] {
        &self.trace
    }

    /// Drop frames that belong to the interception layer
    pub fn filter_internal_frames(&mut self) {
        self.trace.retain(|frame| !frame.is_internal());
    }
}

/// Stack trace filter that only cleans when enabled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConditionalStackTraceFilter {
    enabled: bool,
}

impl ConditionalStackTraceFilter {
    /// Create a filter
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// Check whether the filter cleans traces
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Remove interception-layer frames from the fault's trace
    pub fn filter(&self, fault: &mut Fault) {
        if self.enabled {
            fault.filter_internal_frames();
        }
    }
}

impl Default for ConditionalStackTraceFilter {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Errors surfaced by an intercepted call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallError {
    /// The real implementation (or a handler) raised a fault
    #[error(transparent)]
    Raised(#[from] Fault),

    /// The dispatcher resolved for a serializable real call is not the advice dispatcher
    #[error("Unexpected dispatcher for advice-based real call: {0}")]
    UnexpectedDispatcher(String),

    /// A deserialized real call was invoked before being bound to an instance
    #[error("Real call of {0} is not bound to an instance")]
    UnboundInstance(MethodDescriptor),

    /// A method descriptor could not be resolved back to a method
    #[error("Cannot resolve method {0}")]
    UnresolvedMethod(MethodDescriptor),

    /// The method is not accessible from the calling context
    #[error("Method {0} is not accessible")]
    IllegalAccess(MethodDescriptor),

    /// Arguments or receiver do not fit the method
    #[error("Illegal argument: {0}")]
    IllegalArgument(String),
}

/// Failure of the invocation mechanism itself
///
/// `Target` wraps whatever the invoked method raised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvocationError {
    /// The invoked method failed
    #[error("Invocation target failed: {0}")]
    Target(Box<CallError>),

    /// The method is not public and was not made accessible
    #[error("Method {0} is not accessible")]
    IllegalAccess(MethodDescriptor),

    /// Arguments or receiver do not fit the method
    #[error("Illegal argument: {0}")]
    IllegalArgument(String),
}

impl InvocationError {
    /// Unwrap to the underlying cause, filtering interception frames from faults
    pub fn into_cause(self, filter: &ConditionalStackTraceFilter) -> CallError {
        match self {
            InvocationError::Target(cause) => match *cause {
                CallError::Raised(mut fault) => {
                    filter.filter(&mut fault);
                    CallError::Raised(fault)
                }
                other => other,
            },
            InvocationError::IllegalAccess(method) => CallError::IllegalAccess(method),
            InvocationError::IllegalArgument(message) => CallError::IllegalArgument(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fault_with_internal_frames() -> Fault {
        Fault::new("IllegalStateException", "boom")
            .at("app::Greeter::explode")
            .at("mimic_core::method::Method::invoke")
            .at("mimic_inline::maker::InlineMockMaker::create_mock")
            .at("app::main")
    }

    #[test]
    fn test_fault_display() {
        let fault = Fault::new("IllegalStateException", "boom");
        assert_eq!(fault.to_string(), "IllegalStateException: boom");
    }

    #[test]
    fn test_filter_removes_internal_frames() {
        let mut fault = fault_with_internal_frames();
        ConditionalStackTraceFilter::new(true).filter(&mut fault);

        let locations: Vec<_> = fault.trace().iter().map(|f| f.location.as_str()).collect();
        assert_eq!(locations, vec!["app::Greeter::explode", "app::main"]);
    }

    #[test]
    fn test_disabled_filter_keeps_trace() {
        let mut fault = fault_with_internal_frames();
        ConditionalStackTraceFilter::new(false).filter(&mut fault);
        assert_eq!(fault.trace().len(), 4);
    }

    #[test]
    fn test_into_cause_unwraps_target() {
        let error = InvocationError::Target(Box::new(CallError::Raised(
            fault_with_internal_frames(),
        )));

        match error.into_cause(&ConditionalStackTraceFilter::default()) {
            CallError::Raised(fault) => {
                assert_eq!(fault.kind(), "IllegalStateException");
                assert_eq!(fault.message(), "boom");
                assert!(fault.trace().iter().all(|f| !f.is_internal()));
            }
            other => panic!("expected raised fault, got {:?}", other),
        }
    }

    #[test]
    fn test_into_cause_passes_framework_errors() {
        let error = InvocationError::Target(Box::new(CallError::UnexpectedDispatcher(
            "abc".to_string(),
        )));
        assert_eq!(
            error.into_cause(&ConditionalStackTraceFilter::default()),
            CallError::UnexpectedDispatcher("abc".to_string())
        );
    }
}
