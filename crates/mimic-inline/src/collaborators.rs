//! Contracts the maker consumes from its environment
//!
//! Generating mock types and constructing instances are outside the
//! interception core. A generated type must route every mockable method
//! through `mimic_core::hook` under the identifier it was generated for,
//! and implement `hash_code`/`equals` with the identity fallbacks.

use mimic_core::{Instance, SerializableMode};
use std::collections::BTreeSet;
use std::fmt;

/// A type as the runtime sees it
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RuntimeType {
    name: String,
    primitive: bool,
}

impl RuntimeType {
    /// A non-primitive type
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primitive: false,
        }
    }

    /// A primitive type
    pub fn primitive(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primitive: true,
        }
    }

    /// Get the type name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check if the type is primitive
    pub fn is_primitive(&self) -> bool {
        self.primitive
    }
}

impl fmt::Display for RuntimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// What a generated mock type has to provide
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockFeatures {
    /// The type being mocked
    pub mocked_type: RuntimeType,
    /// Additional interfaces the mock implements
    pub interfaces: BTreeSet<String>,
    /// Serialization support requested for the mock
    pub serializable_mode: SerializableMode,
}

impl MockFeatures {
    /// Collect the features of a mock
    pub fn new(
        mocked_type: RuntimeType,
        interfaces: BTreeSet<String>,
        serializable_mode: SerializableMode,
    ) -> Self {
        Self {
            mocked_type,
            interfaces,
            serializable_mode,
        }
    }
}

/// Failure of the type generator
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Cannot generate mock type for '{type_name}': {reason}")]
pub struct GenerationError {
    /// The type that could not be mocked
    pub type_name: String,
    /// Why generation failed
    pub reason: String,
}

/// Failure of the instantiator
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct InstantiationError(pub String);

/// Runtime modification capability
pub trait Instrumentation: Send + Sync {
    /// Whether already loaded types can be redefined
    fn is_retransform_supported(&self) -> bool;

    /// Whether the given type can be modified
    fn is_modifiable(&self, ty: &RuntimeType) -> bool;
}

/// Generates mock types wired to a dispatcher
pub trait MockTypeGenerator: Send + Sync {
    /// Produce (or reuse) the mock type for a set of features
    ///
    /// The type's call sites must resolve their dispatcher under
    /// `identifier`.
    fn mock_type(
        &self,
        identifier: &str,
        features: &MockFeatures,
    ) -> Result<RuntimeType, GenerationError>;
}

/// Constructs instances of generated types
pub trait Instantiator: Send + Sync {
    /// Build an instance without running user construction logic
    fn new_instance(&self, ty: &RuntimeType) -> Result<Instance, InstantiationError>;
}
