//! Mimic Inline Mock Maker
//!
//! Creates mocks of existing types by redefining them in place, with all
//! per-call decisions delegated to `mimic-core`:
//! - Collaborator contracts for instrumentation, type generation and instantiation
//! - Maker options (dispatcher identifier, stack trace cleaning, registry sweeps)
//! - Type mockability classification
//! - Mock creation and the handler association surface

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod collaborators;
pub mod error;
pub mod maker;
pub mod mockability;
pub mod options;

pub use collaborators::{
    GenerationError, InstantiationError, Instantiator, Instrumentation, MockFeatures,
    MockTypeGenerator, RuntimeType,
};
pub use error::{MakerError, MakerResult};
pub use maker::InlineMockMaker;
pub use mockability::{classify, TypeMockability, EXCLUDED_TYPES};
pub use options::MakerOptions;
