//! Per-call session context.
//!
//! A [`Session`] is created when a request reaches the dispatcher and is
//! owned exclusively by that one in-flight call. It carries the caller's
//! auth key, tracks elapsed time from construction, accumulates diagnostic
//! log entries and a query audit record, and caches the auth provider's
//! sign-in / scope / identity resolutions so each is computed at most once.
//!
//! # Lifecycle
//!
//! Constructed per inbound call, mutated by auth checks and by the handler,
//! and closed exactly once on every exit path. `close` releases any held
//! transactional resources; a second close is a no-op. If the call is
//! cancelled externally before close runs, the boxed [`CallResources`]
//! implementation's own `Drop` is the cleanup backstop.
//!
//! # Tiger Style
//!
//! - Diagnostic log and query record are bounded; truncation is flagged
//! - No locking: a session is never shared across calls

use std::collections::HashSet;
use std::time::Duration;
use std::time::Instant;

use serde::Serialize;
use tracing::debug;

use crate::constants::MAX_DIAGNOSTIC_ENTRY_BYTES;
use crate::constants::MAX_DIAGNOSTIC_LOG_ENTRIES;
use crate::constants::MAX_RECORDED_QUERIES;
use crate::scope::Scope;
use crate::traits::AuthProvider;
use crate::traits::AuthenticatedUser;
use crate::traits::CallResources;

/// Audit record for one completed or faulted call.
///
/// Built from the session at the end of dispatch and handed to the
/// session-log sink. Fault records carry exception text and backtrace and
/// no authenticated user; success records are the inverse.
#[derive(Debug, Clone, Serialize)]
pub struct SessionRecord {
    /// Owning endpoint name.
    pub endpoint: String,
    /// Requested method name.
    pub method: String,
    /// Wall-clock call duration in milliseconds.
    pub elapsed_ms: u64,
    /// Query statements executed during the call.
    pub queries: Vec<String>,
    /// Diagnostic log entries accumulated during the call.
    pub diagnostic_log: Vec<String>,
    /// Signed-in caller, resolved on the success path when login was
    /// required.
    pub authenticated_user: Option<AuthenticatedUser>,
    /// Fault text, on the fault path only.
    pub exception: Option<String>,
    /// Captured backtrace, on the fault path only.
    pub backtrace: Option<String>,
}

/// Per-call context: auth state, timing, audit, and held resources.
pub struct Session {
    endpoint: String,
    method: String,
    auth_key: Option<String>,
    body: Option<String>,
    started: Instant,
    diagnostic_log: Vec<String>,
    log_truncated: bool,
    queries: Vec<String>,
    queries_truncated: bool,
    resources: Option<Box<dyn CallResources>>,
    // Cached auth resolutions, each computed at most once.
    signed_in: Option<bool>,
    scopes: Option<HashSet<Scope>>,
    user: Option<Option<AuthenticatedUser>>,
    closed: bool,
}

impl Session {
    /// Open a session for one inbound call.
    pub fn new(endpoint: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            method: method.into(),
            auth_key: None,
            body: None,
            started: Instant::now(),
            diagnostic_log: Vec::new(),
            log_truncated: false,
            queries: Vec::new(),
            queries_truncated: false,
            resources: None,
            signed_in: None,
            scopes: None,
            user: None,
            closed: false,
        }
    }

    /// Attach the caller's authentication key.
    pub fn with_auth_key(mut self, key: Option<String>) -> Self {
        self.auth_key = key;
        self
    }

    /// Attach the raw request body.
    pub fn with_body(mut self, body: Option<String>) -> Self {
        self.body = body;
        self
    }

    /// Attach per-call transactional resources, released on close.
    pub fn with_resources(mut self, resources: Box<dyn CallResources>) -> Self {
        self.resources = Some(resources);
        self
    }

    /// Owning endpoint name.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Requested method name (may be empty when the request omitted one).
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Authentication key presented by the caller, if any.
    pub fn auth_key(&self) -> Option<&str> {
        self.auth_key.as_deref()
    }

    /// Raw request body, if the transport delivered one.
    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// Time elapsed since the session was opened.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Append a diagnostic log entry, subject to the session log cap.
    pub fn log(&mut self, entry: impl Into<String>) {
        if self.diagnostic_log.len() >= MAX_DIAGNOSTIC_LOG_ENTRIES {
            self.log_truncated = true;
            return;
        }
        let mut entry = entry.into();
        if entry.len() > MAX_DIAGNOSTIC_ENTRY_BYTES {
            let mut cut = MAX_DIAGNOSTIC_ENTRY_BYTES;
            while !entry.is_char_boundary(cut) {
                cut -= 1;
            }
            entry.truncate(cut);
        }
        self.diagnostic_log.push(entry);
    }

    /// Record a query statement for the call's audit trail.
    pub fn record_query(&mut self, statement: impl Into<String>) {
        if self.queries.len() >= MAX_RECORDED_QUERIES {
            self.queries_truncated = true;
            return;
        }
        self.queries.push(statement.into());
    }

    /// Diagnostic log entries accumulated so far.
    pub fn diagnostic_log(&self) -> &[String] {
        &self.diagnostic_log
    }

    /// Queries recorded so far.
    pub fn queries(&self) -> &[String] {
        &self.queries
    }

    /// Number of queries recorded (truncation included in the flag, not
    /// the count).
    pub fn query_count(&self) -> usize {
        self.queries.len()
    }

    /// Whether either audit accumulator hit its cap.
    pub fn audit_truncated(&self) -> bool {
        self.log_truncated || self.queries_truncated
    }

    /// Whether the caller is signed in, resolved at most once.
    pub async fn is_signed_in(&mut self, auth: &dyn AuthProvider) -> bool {
        if let Some(cached) = self.signed_in {
            return cached;
        }
        let resolved = auth.is_signed_in(self).await;
        self.signed_in = Some(resolved);
        resolved
    }

    /// Scopes granted to the caller's credentials, resolved at most once.
    pub async fn resolved_scopes(&mut self, auth: &dyn AuthProvider) -> &HashSet<Scope> {
        if self.scopes.is_none() {
            let resolved = auth.resolve_scopes(self).await;
            self.scopes = Some(resolved);
        }
        self.scopes.get_or_insert_with(HashSet::new)
    }

    /// Signed-in user identity, resolved at most once.
    pub async fn resolve_user(&mut self, auth: &dyn AuthProvider) -> Option<AuthenticatedUser> {
        if self.user.is_none() {
            let resolved = auth.resolve_user(self).await;
            self.user = Some(resolved);
        }
        self.user.clone().unwrap_or_default()
    }

    /// Build the audit record for this call.
    pub fn record(
        &self,
        authenticated_user: Option<AuthenticatedUser>,
        exception: Option<String>,
        backtrace: Option<String>,
    ) -> SessionRecord {
        SessionRecord {
            endpoint: self.endpoint.clone(),
            method: self.method.clone(),
            elapsed_ms: u64::try_from(self.elapsed().as_millis()).unwrap_or(u64::MAX),
            queries: self.queries.clone(),
            diagnostic_log: self.diagnostic_log.clone(),
            authenticated_user,
            exception,
            backtrace,
        }
    }

    /// Close the session, releasing held resources.
    ///
    /// Idempotent: the first close releases, later closes are no-ops.
    pub async fn close(&mut self) {
        if self.closed {
            debug!(
                endpoint = %self.endpoint,
                method = %self.method,
                "session close called twice"
            );
            return;
        }
        self.closed = true;
        if let Some(mut resources) = self.resources.take() {
            resources.release().await;
        }
    }

    /// Whether the session has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("endpoint", &self.endpoint)
            .field("method", &self.method)
            .field("closed", &self.closed)
            .field("log_entries", &self.diagnostic_log.len())
            .field("queries", &self.queries.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::test_support::CountingResources;
    use crate::test_support::StaticAuthProvider;

    #[tokio::test]
    async fn close_releases_resources_exactly_once() {
        let releases = Arc::new(AtomicUsize::new(0));
        let mut session = Session::new("calc", "add")
            .with_resources(Box::new(CountingResources::new(releases.clone())));

        session.close().await;
        assert!(session.is_closed());
        assert_eq!(releases.load(Ordering::SeqCst), 1);

        // Second close must not release again.
        session.close().await;
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn close_without_resources_is_fine() {
        let mut session = Session::new("calc", "add");
        session.close().await;
        assert!(session.is_closed());
    }

    #[test]
    fn diagnostic_log_is_bounded() {
        let mut session = Session::new("calc", "add");
        for i in 0..(MAX_DIAGNOSTIC_LOG_ENTRIES + 10) {
            session.log(format!("entry {i}"));
        }
        assert_eq!(session.diagnostic_log().len(), MAX_DIAGNOSTIC_LOG_ENTRIES);
        assert!(session.audit_truncated());
    }

    #[test]
    fn oversized_log_entry_is_cut_at_char_boundary() {
        let mut session = Session::new("calc", "add");
        session.log("é".repeat(MAX_DIAGNOSTIC_ENTRY_BYTES));
        let entry = &session.diagnostic_log()[0];
        assert!(entry.len() <= MAX_DIAGNOSTIC_ENTRY_BYTES);
        assert!(entry.is_char_boundary(entry.len()));
    }

    #[test]
    fn query_record_is_bounded() {
        let mut session = Session::new("calc", "add");
        for i in 0..(MAX_RECORDED_QUERIES + 1) {
            session.record_query(format!("SELECT {i}"));
        }
        assert_eq!(session.query_count(), MAX_RECORDED_QUERIES);
        assert!(session.audit_truncated());
    }

    #[tokio::test]
    async fn sign_in_is_resolved_at_most_once() {
        let auth = StaticAuthProvider::signed_in("u1");
        let mut session = Session::new("calc", "add").with_auth_key(Some("key".to_string()));

        assert!(session.is_signed_in(&auth).await);
        assert!(session.is_signed_in(&auth).await);
        assert!(session.is_signed_in(&auth).await);
        assert_eq!(auth.sign_in_checks(), 1);
    }

    #[tokio::test]
    async fn scopes_are_resolved_at_most_once() {
        let auth = StaticAuthProvider::signed_in("u1").with_scope("admin");
        let mut session = Session::new("calc", "add");

        assert!(
            session
                .resolved_scopes(&auth)
                .await
                .contains(&Scope::new("admin"))
        );
        let _ = session.resolved_scopes(&auth).await;
        assert_eq!(auth.scope_resolutions(), 1);
    }

    #[tokio::test]
    async fn user_is_resolved_at_most_once_and_cached_absence_sticks() {
        let auth = StaticAuthProvider::signed_out();
        let mut session = Session::new("calc", "add");

        assert!(session.resolve_user(&auth).await.is_none());
        assert!(session.resolve_user(&auth).await.is_none());
        assert_eq!(auth.user_resolutions(), 1);
    }

    #[test]
    fn record_carries_audit_state() {
        let mut session = Session::new("calc", "add");
        session.log("step one");
        session.record_query("SELECT 1");

        let record = session.record(None, Some("boom".to_string()), None);
        assert_eq!(record.endpoint, "calc");
        assert_eq!(record.method, "add");
        assert_eq!(record.queries, vec!["SELECT 1".to_string()]);
        assert_eq!(record.diagnostic_log, vec!["step one".to_string()]);
        assert_eq!(record.exception.as_deref(), Some("boom"));
        assert!(record.authenticated_user.is_none());
    }
}
