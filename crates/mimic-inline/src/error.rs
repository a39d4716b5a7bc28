//! Maker errors

use crate::collaborators::{GenerationError, InstantiationError};
use mimic_core::TableError;

/// Errors raised by the inline mock maker
#[derive(Debug, thiserror::Error)]
pub enum MakerError {
    /// The environment can not support inline mocking
    #[error("Cannot create inline mock maker: {0}")]
    Construction(String),

    /// The handler is not one the core can bind
    #[error(
        "Custom MockHandler implementations are not supported; \
         provide a handler that converts into an internal handler"
    )]
    UnsupportedHandler,

    /// The instantiator could not build the mock
    #[error("Unable to create mock instance of type '{type_name}'")]
    Instantiation {
        /// Generated type that failed to instantiate
        type_name: String,
        /// Instantiator failure
        #[source]
        source: InstantiationError,
    },

    /// The type generator failed
    #[error(transparent)]
    Generation(#[from] GenerationError),

    /// The dispatcher could not be installed
    #[error(transparent)]
    Registration(#[from] TableError),
}

/// Result type for maker operations
pub type MakerResult<T> = Result<T, MakerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_instantiation_error_names_type() {
        let error = MakerError::Instantiation {
            type_name: "Greeter$Mock".to_string(),
            source: InstantiationError("no default constructor".to_string()),
        };

        assert_eq!(
            error.to_string(),
            "Unable to create mock instance of type 'Greeter$Mock'"
        );
        assert_eq!(
            error.source().map(|source| source.to_string()),
            Some("no default constructor".to_string())
        );
    }

    #[test]
    fn test_registration_error_is_transparent() {
        let error = MakerError::from(TableError::DuplicateIdentifier("dup".to_string()));
        assert_eq!(error.to_string(), "Dispatcher identifier 'dup' is already registered");
    }
}
