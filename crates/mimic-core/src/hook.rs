//! Call-site hooks targeted by generated mock types
//!
//! Every mockable method of a generated type starts with [`enter`] (or is
//! wrapped in [`around`]). `hash_code` and `equals` use the identity
//! fallbacks instead, so that handlers can hash and compare mocks without
//! recursing into themselves.
//!
//! Each hook resolves the dispatcher in the global table; the `_in`
//! variants take the table explicitly, for call sites generated against
//! a table of their own.
//!
//! A generated method looks like this:
//!
//! ```ignore
//! pub fn greet(&self, name: &str) -> Result<Value, CallError> {
//!     let arguments = [Value::from(name)];
//!     hook::around(DISPATCHER_ID, self, &GREET, &arguments, || self.greet_body(name))
//! }
//! ```

use crate::dispatch::{DispatcherTable, PendingResult};
use crate::fault::CallError;
use crate::method::Method;
use crate::object::{identity_hash, same_object, ObjectId};
use crate::value::Value;
use std::sync::Arc;

/// Method entry: intercept the call if its receiver is mocked
///
/// `Some` means the original body must be skipped and the pending value
/// returned instead.
pub fn enter<T: ?Sized>(
    identifier: &str,
    this: &T,
    origin: &Arc<Method>,
    arguments: &[Value],
) -> Result<Option<PendingResult>, CallError> {
    enter_in(DispatcherTable::global(), identifier, this, origin, arguments)
}

/// [`enter`] against a specific dispatcher table
pub fn enter_in<T: ?Sized>(
    table: &DispatcherTable,
    identifier: &str,
    this: &T,
    origin: &Arc<Method>,
    arguments: &[Value],
) -> Result<Option<PendingResult>, CallError> {
    let instance = ObjectId::of(this);
    match table.resolve(identifier) {
        Some(dispatcher) if dispatcher.is_mocked(instance) => {
            dispatcher.handle(instance, origin, arguments)
        }
        _ => Ok(None),
    }
}

/// Method exit: substitute the pending value for the original return
pub fn exit(returned: Value, mocked: Option<PendingResult>) -> Value {
    match mocked {
        Some(pending) => pending.into_value(),
        None => returned,
    }
}

/// Run a method body behind the entry hook
pub fn around<T, F>(
    identifier: &str,
    this: &T,
    origin: &Arc<Method>,
    arguments: &[Value],
    body: F,
) -> Result<Value, CallError>
where
    T: ?Sized,
    F: FnOnce() -> Result<Value, CallError>,
{
    around_in(DispatcherTable::global(), identifier, this, origin, arguments, body)
}

/// [`around`] against a specific dispatcher table
pub fn around_in<T, F>(
    table: &DispatcherTable,
    identifier: &str,
    this: &T,
    origin: &Arc<Method>,
    arguments: &[Value],
    body: F,
) -> Result<Value, CallError>
where
    T: ?Sized,
    F: FnOnce() -> Result<Value, CallError>,
{
    match enter_in(table, identifier, this, origin, arguments)? {
        Some(pending) => Ok(pending.into_value()),
        None => body(),
    }
}

/// `hash_code` of a generated type: identity hash for registered mocks
pub fn hash_code<T, F>(identifier: &str, this: &T, original: F) -> u64
where
    T: ?Sized,
    F: FnOnce() -> u64,
{
    hash_code_in(DispatcherTable::global(), identifier, this, original)
}

/// [`hash_code`] against a specific dispatcher table
pub fn hash_code_in<T, F>(
    table: &DispatcherTable,
    identifier: &str,
    this: &T,
    original: F,
) -> u64
where
    T: ?Sized,
    F: FnOnce() -> u64,
{
    if is_mock(table, identifier, this) {
        identity_hash(this)
    } else {
        original()
    }
}

/// `equals` of a generated type: reference equality for registered mocks
pub fn equals<T, U, F>(identifier: &str, this: &T, other: &U, original: F) -> bool
where
    T: ?Sized,
    U: ?Sized,
    F: FnOnce() -> bool,
{
    equals_in(DispatcherTable::global(), identifier, this, other, original)
}

/// [`equals`] against a specific dispatcher table
pub fn equals_in<T, U, F>(
    table: &DispatcherTable,
    identifier: &str,
    this: &T,
    other: &U,
    original: F,
) -> bool
where
    T: ?Sized,
    U: ?Sized,
    F: FnOnce() -> bool,
{
    if is_mock(table, identifier, this) {
        same_object(this, other)
    } else {
        original()
    }
}

fn is_mock<T: ?Sized>(table: &DispatcherTable, identifier: &str, this: &T) -> bool {
    table
        .resolve(identifier)
        .is_some_and(|dispatcher| dispatcher.is_mock(ObjectId::of(this)))
}
