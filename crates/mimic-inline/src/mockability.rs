//! Type mockability classification

use crate::collaborators::{Instrumentation, RuntimeType};

/// Types that can never be mocked inline: boxed wrappers, strings and type objects
pub const EXCLUDED_TYPES: [&str; 10] = [
    "Boolean",
    "Byte",
    "Character",
    "Short",
    "Integer",
    "Long",
    "Float",
    "Double",
    "String",
    "Class",
];

/// Reason reported for primitive types
pub const PRIMITIVE_REASON: &str = "primitive type";
/// Reason reported for excluded types
pub const EXCLUDED_REASON: &str = "excluded wrapper/String/Class type";
/// Reason reported for types the runtime can not modify
pub const UNMODIFIABLE_REASON: &str = "type not modifiable at runtime";

/// Whether a type can be mocked, and why not
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeMockability {
    mockable: bool,
    reason: Option<&'static str>,
}

impl TypeMockability {
    fn mockable() -> Self {
        Self {
            mockable: true,
            reason: None,
        }
    }

    fn rejected(reason: &'static str) -> Self {
        Self {
            mockable: false,
            reason: Some(reason),
        }
    }

    /// Check if the type can be mocked
    pub fn is_mockable(&self) -> bool {
        self.mockable
    }

    /// Why the type can not be mocked
    pub fn non_mockable_reason(&self) -> Option<&'static str> {
        self.reason
    }
}

/// Check if a type name is in the exclusion set
pub fn is_excluded(ty: &RuntimeType) -> bool {
    EXCLUDED_TYPES.contains(&ty.name())
}

/// Classify a type
pub fn classify(instrumentation: &dyn Instrumentation, ty: &RuntimeType) -> TypeMockability {
    if ty.is_primitive() {
        TypeMockability::rejected(PRIMITIVE_REASON)
    } else if is_excluded(ty) {
        TypeMockability::rejected(EXCLUDED_REASON)
    } else if instrumentation.is_modifiable(ty) {
        TypeMockability::mockable()
    } else {
        TypeMockability::rejected(UNMODIFIABLE_REASON)
    }
}
