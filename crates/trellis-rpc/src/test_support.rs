//! Test fixtures for dispatch tests.
//!
//! Builds [`DispatchContext`]s from the deterministic collaborator stubs
//! in `trellis_core::test_support`. Tests keep their own `Arc` clones of
//! the stubs they want to assert on and hand the same clones to the
//! builder.

use std::sync::Arc;

use trellis_core::AuthProvider;
use trellis_core::CallResourceFactory;
use trellis_core::EntityCodec;
use trellis_core::SessionLogSink;
use trellis_core::test_support::RecordingLogSink;
use trellis_core::test_support::StaticAuthProvider;
use trellis_core::test_support::StubEntityCodec;

use crate::context::DispatchContext;

/// Builder for a [`DispatchContext`] backed by stubs.
///
/// Defaults: signed-out auth, an empty entity codec, a recording log
/// sink, and no resource factory.
pub struct TestContextBuilder {
    auth: Arc<dyn AuthProvider>,
    codec: Arc<dyn EntityCodec>,
    log_sink: Arc<dyn SessionLogSink>,
    resources: Option<Arc<dyn CallResourceFactory>>,
}

impl TestContextBuilder {
    pub fn new() -> Self {
        Self {
            auth: Arc::new(StaticAuthProvider::signed_out()),
            codec: Arc::new(StubEntityCodec::empty()),
            log_sink: Arc::new(RecordingLogSink::new()),
            resources: None,
        }
    }

    pub fn auth(mut self, auth: Arc<dyn AuthProvider>) -> Self {
        self.auth = auth;
        self
    }

    pub fn codec(mut self, codec: Arc<dyn EntityCodec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn log_sink(mut self, log_sink: Arc<dyn SessionLogSink>) -> Self {
        self.log_sink = log_sink;
        self
    }

    pub fn resources(mut self, factory: Arc<dyn CallResourceFactory>) -> Self {
        self.resources = Some(factory);
        self
    }

    pub fn build(self) -> DispatchContext {
        DispatchContext {
            auth: self.auth,
            codec: self.codec,
            log_sink: self.log_sink,
            resources: self.resources,
        }
    }
}

impl Default for TestContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}
