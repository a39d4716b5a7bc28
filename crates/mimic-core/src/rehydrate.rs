//! Re-registration of mocks reconstructed from serialized data
//!
//! The registry is keyed by live identity and is never serialized. A
//! serializable mock carries its own interception state (through
//! [`MockAccess`]) and, in the envelope written by [`write_mock`], the
//! identifier of its dispatcher. Reading it back registers the new
//! instance with that dispatcher again.

use crate::dispatch::{DispatcherTable, MockMethodAdvice};
use crate::handler::MockAccess;
use crate::object::{Instance, MockObject, ObjectId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Errors raised while rehydrating a mock
#[derive(Debug, thiserror::Error)]
pub enum RehydrateError {
    /// The payload could not be encoded or decoded
    #[error("Mock serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The identifier resolved to a dispatcher that is not the advice dispatcher
    #[error("Unexpected dispatcher '{0}' for mock rehydration")]
    UnexpectedDispatcher(String),
}

/// Serialized form of a mock: its fields plus its dispatcher identifier
#[derive(Debug, Serialize, Deserialize)]
pub struct MockEnvelope<T> {
    /// Identifier of the dispatcher governing the mock
    pub dispatcher: String,
    /// The mock's own fields
    pub mock: T,
}

/// Register an instance reconstructed from serialized data
///
/// If no dispatcher is registered under `identifier` the instance is
/// returned unregistered, and calls on it run their real bodies.
pub fn read_object<T>(identifier: &str, mock: T) -> Result<Arc<T>, RehydrateError>
where
    T: MockObject + MockAccess,
{
    read_object_in(DispatcherTable::global(), identifier, mock)
}

/// [`read_object`], resolving the dispatcher in `table`
pub fn read_object_in<T>(
    table: &DispatcherTable,
    identifier: &str,
    mock: T,
) -> Result<Arc<T>, RehydrateError>
where
    T: MockObject + MockAccess,
{
    let mock = Arc::new(mock);
    let Some(dispatcher) = table.resolve(identifier) else {
        tracing::trace!(identifier, "no dispatcher for rehydrated mock");
        return Ok(mock);
    };
    let advice = dispatcher
        .as_any()
        .downcast_ref::<MockMethodAdvice>()
        .ok_or_else(|| RehydrateError::UnexpectedDispatcher(identifier.to_string()))?;

    if let Some(interceptor) = mock.mock_interceptor() {
        let instance: Instance = mock.clone();
        advice.interceptors().put(&instance, interceptor);
        tracing::trace!(
            identifier,
            instance = %ObjectId::of_arc(&instance),
            "re-registered rehydrated mock"
        );
    }
    Ok(mock)
}

/// Serialize a mock together with its dispatcher identifier
pub fn write_mock<T: Serialize>(identifier: &str, mock: &T) -> Result<String, RehydrateError> {
    #[derive(Serialize)]
    struct Outgoing<'a, T> {
        dispatcher: &'a str,
        mock: &'a T,
    }

    let envelope = Outgoing {
        dispatcher: identifier,
        mock,
    };
    Ok(serde_json::to_string(&envelope)?)
}

/// Deserialize a mock written by [`write_mock`] and re-register it
pub fn read_mock<T>(json: &str) -> Result<Arc<T>, RehydrateError>
where
    T: MockObject + MockAccess + DeserializeOwned,
{
    read_mock_in(DispatcherTable::global(), json)
}

/// [`read_mock`], resolving the dispatcher in `table`
pub fn read_mock_in<T>(table: &DispatcherTable, json: &str) -> Result<Arc<T>, RehydrateError>
where
    T: MockObject + MockAccess + DeserializeOwned,
{
    let envelope: MockEnvelope<T> = serde_json::from_str(json)?;
    read_object_in(table, &envelope.dispatcher, envelope.mock)
}
