//! Dispatch context.
//!
//! Contains the shared collaborator dependencies needed by the dispatcher:
//! auth resolution, entity construction, session-log emission, and
//! optional per-call resource acquisition.

use std::sync::Arc;

use trellis_core::AuthProvider;
use trellis_core::CallResourceFactory;
use trellis_core::EntityCodec;
use trellis_core::SessionLogSink;

/// Collaborator bundle handed to every dispatch call.
///
/// Cheap to clone; every field is an `Arc` shared across concurrent calls.
#[derive(Clone)]
pub struct DispatchContext {
    /// Auth backend for sign-in, scope, and identity resolution.
    pub auth: Arc<dyn AuthProvider>,
    /// Serialization subsystem for complex parameter types.
    pub codec: Arc<dyn EntityCodec>,
    /// Sink receiving one session record per completed or faulted call.
    pub log_sink: Arc<dyn SessionLogSink>,
    /// Per-call transactional resource factory, if the deployment uses one.
    pub resources: Option<Arc<dyn CallResourceFactory>>,
}

impl std::fmt::Debug for DispatchContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchContext")
            .field("has_resource_factory", &self.resources.is_some())
            .finish_non_exhaustive()
    }
}
