//! Mock state registry
//!
//! Maps mock instances (by identity) to their interception state without
//! keeping the instances alive.

mod weak_map;

pub use weak_map::WeakIdentityMap;

use crate::handler::MockMethodInterceptor;
use crate::object::MockObject;
use std::sync::Arc;

/// Registry from mock instance to its interception state
pub type MockRegistry = WeakIdentityMap<dyn MockObject, Arc<MockMethodInterceptor>>;
