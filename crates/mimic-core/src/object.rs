//! Mock instances and reference identity
//!
//! The registry and the self-call marker never look at an instance's own
//! equality. Two instances are the same only if they are the same
//! allocation, which is what [`ObjectId`] captures.

use crate::handler::MockAccess;
use rustc_hash::FxHasher;
use std::any::Any;
use std::fmt;
use std::hash::Hasher;
use std::sync::{Arc, Weak};

/// An object produced by the type generator whose calls route through the core
pub trait MockObject: Any + Send + Sync {
    /// Access the concrete instance for downcasting
    fn as_any(&self) -> &dyn Any;

    /// Name of the instance's runtime type
    fn type_name(&self) -> &str;

    /// Declared type this instance mocks, when it differs from its runtime type
    fn mocked_type(&self) -> Option<&str> {
        None
    }

    /// Whether the instance may be serialized
    ///
    /// Serializable mocks get a real-call representation that holds no
    /// live method or dispatcher reference.
    fn is_serializable(&self) -> bool {
        false
    }

    /// Access to interception state the instance carries itself
    fn mock_access(&self) -> Option<&dyn MockAccess> {
        None
    }
}

/// Shared handle to a mock instance
pub type Instance = Arc<dyn MockObject>;

/// Reference identity of an object (its data address)
///
/// An `ObjectId` taken from `&self` inside a method equals the one taken
/// from the `Arc` the object lives in.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(usize);

impl ObjectId {
    /// Identity of any referenced value
    #[inline]
    pub fn of<T: ?Sized>(value: &T) -> Self {
        ObjectId(value as *const T as *const () as usize)
    }

    /// Identity of a shared instance
    #[inline]
    pub fn of_arc<T: ?Sized>(value: &Arc<T>) -> Self {
        ObjectId(Arc::as_ptr(value) as *const () as usize)
    }

    /// Identity of the allocation behind a weak handle
    #[inline]
    pub fn of_weak<T: ?Sized>(value: &Weak<T>) -> Self {
        ObjectId(Weak::as_ptr(value) as *const () as usize)
    }

    /// Get the raw address
    pub fn as_usize(&self) -> usize {
        self.0
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({:#x})", self.0)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Identity-based hash of an object, independent of its own `Hash`
pub fn identity_hash<T: ?Sized>(value: &T) -> u64 {
    let mut hasher = FxHasher::default();
    hasher.write_usize(ObjectId::of(value).as_usize());
    hasher.finish()
}

/// Reference equality between two objects
pub fn same_object<A: ?Sized, B: ?Sized>(a: &A, b: &B) -> bool {
    ObjectId::of(a) == ObjectId::of(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Plain {
        _value: i32,
    }

    impl MockObject for Plain {
        fn as_any(&self) -> &dyn Any {
            self
        }

        fn type_name(&self) -> &str {
            "Plain"
        }
    }

    #[test]
    fn test_identity_matches_across_views() {
        let concrete = Arc::new(Plain { _value: 1 });
        let instance: Instance = concrete.clone();

        assert_eq!(ObjectId::of(&*concrete), ObjectId::of_arc(&instance));
        assert_eq!(ObjectId::of(instance.as_ref()), ObjectId::of_arc(&concrete));
        assert_eq!(
            ObjectId::of_weak(&Arc::downgrade(&instance)),
            ObjectId::of_arc(&instance)
        );
    }

    #[test]
    fn test_equal_values_have_distinct_identity() {
        let a = Plain { _value: 7 };
        let b = Plain { _value: 7 };

        assert_ne!(ObjectId::of(&a), ObjectId::of(&b));
        assert!(same_object(&a, &a));
        assert!(!same_object(&a, &b));
    }

    #[test]
    fn test_identity_hash_is_stable() {
        let a = Arc::new(Plain { _value: 3 });
        assert_eq!(identity_hash(&*a), identity_hash(&*a.clone()));
    }
}
