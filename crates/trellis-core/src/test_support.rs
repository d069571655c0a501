//! Deterministic stubs for the collaborator traits.
//!
//! Used by this crate's unit tests and, behind the `testing` feature, by
//! downstream crates' integration tests. All stubs are in-memory, lock
//! nothing across awaits, and count the calls they receive so tests can
//! assert resolution happens at most once.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use async_trait::async_trait;

use crate::error::CodecError;
use crate::scope::Scope;
use crate::session::Session;
use crate::session::SessionRecord;
use crate::traits::AuthProvider;
use crate::traits::AuthenticatedUser;
use crate::traits::CallResourceFactory;
use crate::traits::CallResources;
use crate::traits::EntityCodec;
use crate::traits::SessionLogSink;

/// Entity codec with a fixed set of registered type names.
///
/// Known types pass the decoded JSON through unchanged. Types added via
/// [`with_failing_type`](Self::with_failing_type) resolve at registration
/// time but fail construction, for exercising call-time codec failures.
#[derive(Debug, Default)]
pub struct StubEntityCodec {
    types: HashSet<String>,
    failing: HashSet<String>,
}

impl StubEntityCodec {
    /// Codec with no registered types.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Codec that resolves the given type names.
    pub fn with_types<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            types: types.into_iter().map(Into::into).collect(),
            failing: HashSet::new(),
        }
    }

    /// Register a type that resolves but always fails construction.
    pub fn with_failing_type(mut self, type_name: impl Into<String>) -> Self {
        self.failing.insert(type_name.into());
        self
    }
}

impl EntityCodec for StubEntityCodec {
    fn has_constructor_for(&self, type_name: &str) -> bool {
        self.types.contains(type_name) || self.failing.contains(type_name)
    }

    fn entity_from_value(
        &self,
        type_name: &str,
        value: serde_json::Value,
    ) -> Result<serde_json::Value, CodecError> {
        if self.failing.contains(type_name) {
            return Err(CodecError::Construction {
                type_name: type_name.to_string(),
                reason: "stubbed construction failure".to_string(),
            });
        }
        if !self.types.contains(type_name) {
            return Err(CodecError::UnknownType {
                type_name: type_name.to_string(),
            });
        }
        Ok(value)
    }
}

/// Auth provider with fixed sign-in state, scopes, and identity.
///
/// Counts every resolution call so tests can verify the session caches.
#[derive(Debug)]
pub struct StaticAuthProvider {
    signed_in: bool,
    scopes: HashSet<Scope>,
    user: Option<AuthenticatedUser>,
    sign_in_checks: Arc<AtomicUsize>,
    scope_resolutions: Arc<AtomicUsize>,
    user_resolutions: Arc<AtomicUsize>,
}

impl StaticAuthProvider {
    /// Provider that recognizes the caller as signed in with the given id.
    pub fn signed_in(user_id: impl Into<String>) -> Self {
        Self {
            signed_in: true,
            scopes: HashSet::new(),
            user: Some(AuthenticatedUser {
                id: user_id.into(),
                display_name: None,
            }),
            sign_in_checks: Arc::new(AtomicUsize::new(0)),
            scope_resolutions: Arc::new(AtomicUsize::new(0)),
            user_resolutions: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Provider that treats every caller as signed out.
    pub fn signed_out() -> Self {
        Self {
            signed_in: false,
            scopes: HashSet::new(),
            user: None,
            sign_in_checks: Arc::new(AtomicUsize::new(0)),
            scope_resolutions: Arc::new(AtomicUsize::new(0)),
            user_resolutions: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Grant one scope.
    pub fn with_scope(mut self, scope: impl Into<Scope>) -> Self {
        self.scopes.insert(scope.into());
        self
    }

    /// Number of `is_signed_in` calls received.
    pub fn sign_in_checks(&self) -> usize {
        self.sign_in_checks.load(Ordering::SeqCst)
    }

    /// Number of `resolve_scopes` calls received.
    pub fn scope_resolutions(&self) -> usize {
        self.scope_resolutions.load(Ordering::SeqCst)
    }

    /// Number of `resolve_user` calls received.
    pub fn user_resolutions(&self) -> usize {
        self.user_resolutions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthProvider for StaticAuthProvider {
    async fn is_signed_in(&self, _session: &Session) -> bool {
        self.sign_in_checks.fetch_add(1, Ordering::SeqCst);
        self.signed_in
    }

    async fn resolve_scopes(&self, _session: &Session) -> HashSet<Scope> {
        self.scope_resolutions.fetch_add(1, Ordering::SeqCst);
        self.scopes.clone()
    }

    async fn resolve_user(&self, _session: &Session) -> Option<AuthenticatedUser> {
        self.user_resolutions.fetch_add(1, Ordering::SeqCst);
        self.user.clone()
    }
}

/// Log sink that records every session record in memory.
#[derive(Debug)]
pub struct RecordingLogSink {
    records: Mutex<Vec<SessionRecord>>,
    /// Id returned from `log_session`; `None` simulates a failing sink.
    id: Option<String>,
}

impl RecordingLogSink {
    /// Sink returning the default log id.
    pub fn new() -> Self {
        Self::with_id("log-1")
    }

    /// Sink returning a fixed log id.
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            id: Some(id.into()),
        }
    }

    /// Sink that records but reports storage failure (returns no id).
    pub fn failing() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            id: None,
        }
    }

    /// Snapshot of everything logged so far.
    pub fn records(&self) -> Vec<SessionRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Number of records received.
    pub fn count(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }
}

impl Default for RecordingLogSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionLogSink for RecordingLogSink {
    async fn log_session(&self, record: SessionRecord) -> Option<String> {
        if let Ok(mut records) = self.records.lock() {
            records.push(record);
        }
        self.id.clone()
    }
}

/// Call resources that count their releases.
#[derive(Debug)]
pub struct CountingResources {
    releases: Arc<AtomicUsize>,
}

impl CountingResources {
    /// Resources incrementing `releases` on each release.
    pub fn new(releases: Arc<AtomicUsize>) -> Self {
        Self { releases }
    }
}

#[async_trait]
impl CallResources for CountingResources {
    async fn release(&mut self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

/// Factory handing out [`CountingResources`] sharing one release counter.
#[derive(Debug, Default)]
pub struct CountingResourceFactory {
    acquires: Arc<AtomicUsize>,
    releases: Arc<AtomicUsize>,
}

impl CountingResourceFactory {
    /// Fresh factory with zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of acquisitions handed out.
    pub fn acquires(&self) -> usize {
        self.acquires.load(Ordering::SeqCst)
    }

    /// Number of releases observed across all handed-out resources.
    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CallResourceFactory for CountingResourceFactory {
    async fn acquire(&self) -> Box<dyn CallResources> {
        self.acquires.fetch_add(1, Ordering::SeqCst);
        Box::new(CountingResources::new(self.releases.clone()))
    }
}
