//! The inline mock maker

use crate::collaborators::{
    Instantiator, Instrumentation, MockFeatures, MockTypeGenerator, RuntimeType,
};
use crate::error::{MakerError, MakerResult};
use crate::mockability::{self, TypeMockability};
use crate::options::MakerOptions;
use mimic_core::{
    DispatcherTable, Instance, InternalMockHandler, MockHandler, MockMethodAdvice,
    MockMethodInterceptor, MockRegistry, MockSettings, ObjectId, SerializableMode,
};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::collections::BTreeSet;
use std::sync::Arc;

const IDENTIFIER_LENGTH: usize = 12;

/// Creates mocks whose calls are mediated by a registry-backed dispatcher
///
/// Each maker owns one registry and one [`MockMethodAdvice`], installed in
/// a dispatcher table (the global one unless [`MakerOptions::table`] says
/// otherwise) under the maker's identifier for as long as the maker lives.
pub struct InlineMockMaker {
    identifier: String,
    instrumentation: Arc<dyn Instrumentation>,
    generator: Arc<dyn MockTypeGenerator>,
    instantiator: Arc<dyn Instantiator>,
    mocks: Arc<MockRegistry>,
    advice: Arc<MockMethodAdvice>,
    table: &'static DispatcherTable,
}

impl InlineMockMaker {
    /// Create a maker with default options
    pub fn new(
        instrumentation: Arc<dyn Instrumentation>,
        generator: Arc<dyn MockTypeGenerator>,
        instantiator: Arc<dyn Instantiator>,
    ) -> MakerResult<Self> {
        Self::with_options(instrumentation, generator, instantiator, MakerOptions::default())
    }

    /// Create a maker and install its dispatcher
    pub fn with_options(
        instrumentation: Arc<dyn Instrumentation>,
        generator: Arc<dyn MockTypeGenerator>,
        instantiator: Arc<dyn Instantiator>,
        options: MakerOptions,
    ) -> MakerResult<Self> {
        if !instrumentation.is_retransform_supported() {
            return Err(MakerError::Construction(
                "the runtime does not support retransformation".to_string(),
            ));
        }

        let identifier = options.identifier.clone().unwrap_or_else(random_identifier);
        let mocks = Arc::new(MockRegistry::with_expunge_interval(options.expunge_interval));
        let advice = Arc::new(
            MockMethodAdvice::new(mocks.clone(), identifier.clone(), options.stack_trace_filter())
                .with_table(options.table),
        );
        options.table.register(identifier.clone(), advice.clone())?;
        tracing::debug!(
            identifier = %identifier,
            clean_stack_traces = options.clean_stack_traces,
            "inline mock maker ready"
        );

        Ok(Self {
            identifier,
            instrumentation,
            generator,
            instantiator,
            mocks,
            advice,
            table: options.table,
        })
    }

    /// Identifier of this maker's dispatcher
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// The registry of mocks created by this maker
    pub fn registry(&self) -> &Arc<MockRegistry> {
        &self.mocks
    }

    /// The dispatcher installed for this maker
    pub fn advice(&self) -> &Arc<MockMethodAdvice> {
        &self.advice
    }

    /// The table the dispatcher is installed in
    pub fn table(&self) -> &'static DispatcherTable {
        self.table
    }

    /// Create a mock instance bound to a handler
    pub fn create_mock(
        &self,
        settings: &MockSettings,
        handler: Arc<dyn MockHandler>,
    ) -> MakerResult<Instance> {
        let ty = self.generator.mock_type(&self.identifier, &features_of(settings))?;
        let handler = as_internal_handler(handler)?;
        let instance = self
            .instantiator
            .new_instance(&ty)
            .map_err(|source| MakerError::Instantiation {
                type_name: ty.name().to_string(),
                source,
            })?;

        self.create_association(&instance, handler, settings.clone());
        tracing::trace!(
            identifier = %self.identifier,
            mock_type = %ty,
            instance = %ObjectId::of_arc(&instance),
            "created mock"
        );
        Ok(instance)
    }

    /// Generate the mock type for a type, extra interfaces and serializable mode
    pub fn create_mock_type(
        &self,
        mocked_type: RuntimeType,
        interfaces: BTreeSet<String>,
        serializable_mode: SerializableMode,
    ) -> MakerResult<RuntimeType> {
        let features = MockFeatures::new(mocked_type, interfaces, serializable_mode);
        Ok(self.generator.mock_type(&self.identifier, &features)?)
    }

    /// Bind an internal handler to an instance
    ///
    /// The state is also stored in the instance itself when it carries an
    /// interceptor slot, so it survives serialization.
    pub fn create_association(
        &self,
        instance: &Instance,
        handler: Arc<dyn InternalMockHandler>,
        settings: MockSettings,
    ) -> Arc<MockMethodInterceptor> {
        let interceptor = Arc::new(MockMethodInterceptor::new(handler, settings));
        self.mocks.put(instance, interceptor.clone());
        if let Some(access) = instance.mock_access() {
            access.set_mock_interceptor(interceptor.clone());
        }
        tracing::trace!(
            identifier = %self.identifier,
            instance = %ObjectId::of_arc(instance),
            "associated mock state"
        );
        interceptor
    }

    /// The handler bound to an instance, if it is a mock of this maker
    pub fn lookup_handler(&self, instance: &Instance) -> Option<Arc<dyn InternalMockHandler>> {
        self.mocks
            .get(ObjectId::of_arc(instance))
            .map(|interceptor| interceptor.handler().clone())
    }

    /// The full interception state bound to an instance
    pub fn lookup_interceptor(&self, instance: &Instance) -> Option<Arc<MockMethodInterceptor>> {
        self.mocks.get(ObjectId::of_arc(instance))
    }

    /// Replace the handler and settings bound to an instance
    pub fn reset_association(
        &self,
        instance: &Instance,
        handler: Arc<dyn MockHandler>,
        settings: MockSettings,
    ) -> MakerResult<()> {
        let handler = as_internal_handler(handler)?;
        self.create_association(instance, handler, settings);
        Ok(())
    }

    /// Check if an instance is a live mock of this maker
    pub fn is_known_mock(&self, instance: &Instance) -> bool {
        self.mocks.contains_key(ObjectId::of_arc(instance))
    }

    /// Check whether a type can be mocked inline
    pub fn classify(&self, ty: &RuntimeType) -> TypeMockability {
        mockability::classify(self.instrumentation.as_ref(), ty)
    }

    /// The type a mock stands in for
    ///
    /// `None` for instances that are not mocks of this maker.
    pub fn mocked_type(&self, instance: &Instance) -> Option<String> {
        if !self.is_known_mock(instance) {
            return None;
        }
        Some(
            instance
                .mocked_type()
                .unwrap_or_else(|| instance.type_name())
                .to_string(),
        )
    }
}

impl Drop for InlineMockMaker {
    fn drop(&mut self) {
        self.table.unregister(&self.identifier);
        // Marks on other threads go with those threads.
        self.advice.self_call_marker().clear();
    }
}

impl std::fmt::Debug for InlineMockMaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InlineMockMaker")
            .field("identifier", &self.identifier)
            .field("mocks", &self.mocks.approximate_size())
            .finish_non_exhaustive()
    }
}

fn features_of(settings: &MockSettings) -> MockFeatures {
    MockFeatures::new(
        RuntimeType::new(settings.type_to_mock()),
        settings.extra_interfaces().clone(),
        settings.serializable_mode(),
    )
}

fn as_internal_handler(handler: Arc<dyn MockHandler>) -> MakerResult<Arc<dyn InternalMockHandler>> {
    handler.into_internal().ok_or(MakerError::UnsupportedHandler)
}

fn random_identifier() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(IDENTIFIER_LENGTH)
        .map(char::from)
        .collect()
}
