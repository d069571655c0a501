//! Collaborator trait seams consumed by the dispatcher.
//!
//! The dispatch core never talks to a database, an auth backend, a codec,
//! or a log store directly. Each collaborator is a trait object supplied
//! through the dispatch context, so the core stays testable with
//! deterministic stubs (see [`crate::test_support`]).

use std::collections::HashSet;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;

use crate::error::CodecError;
use crate::scope::Scope;
use crate::session::Session;
use crate::session::SessionRecord;

/// Identity of a signed-in caller, resolved by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    /// Stable user identifier.
    pub id: String,
    /// Display name, if the auth backend knows one.
    pub display_name: Option<String>,
}

/// External serialization subsystem for complex parameter types.
///
/// Complex (entity) parameters arrive as JSON text on the wire. The codec
/// constructs the typed entity from the decoded JSON, keyed by the type
/// name the parameter was registered with. `has_constructor_for` is
/// consulted at registration time so unresolvable types fail endpoint
/// initialization instead of surfacing at call time.
pub trait EntityCodec: Send + Sync {
    /// Whether a constructor is registered for `type_name`.
    fn has_constructor_for(&self, type_name: &str) -> bool;

    /// Construct an entity from its decoded serialized form.
    ///
    /// # Errors
    ///
    /// Returns an error if the type is unknown or the value does not
    /// describe a valid instance. Callers normalize every failure into a
    /// type mismatch; nothing from the codec reaches the wire.
    fn entity_from_value(
        &self,
        type_name: &str,
        value: serde_json::Value,
    ) -> Result<serde_json::Value, CodecError>;
}

/// Auth backend resolving sign-in state, scopes, and identity for a session.
///
/// All three resolutions are potentially I/O-bound. The session caches
/// each result, so providers are queried at most once per call per
/// resolution.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Whether the session's auth key identifies a signed-in user.
    async fn is_signed_in(&self, session: &Session) -> bool;

    /// The scopes granted to the session's credentials.
    async fn resolve_scopes(&self, session: &Session) -> HashSet<Scope>;

    /// The signed-in user's identity, if any.
    async fn resolve_user(&self, session: &Session) -> Option<AuthenticatedUser>;
}

/// Sink receiving one audit record per completed or faulted call.
#[async_trait]
pub trait SessionLogSink: Send + Sync {
    /// Persist a session record, returning its log identifier.
    ///
    /// Returns `None` when the sink could not store the record; the
    /// dispatcher treats that as best-effort and carries on.
    async fn log_session(&self, record: SessionRecord) -> Option<String>;
}

/// Transactional resources held for the duration of one call.
///
/// Implementations own their cleanup: `release` is awaited exactly once
/// by `Session::close`, and the implementation's `Drop` is the backstop
/// if the surrounding call is cancelled before close runs.
#[async_trait]
pub trait CallResources: Send {
    /// Release everything held for the call.
    async fn release(&mut self);
}

/// Acquires per-call resources at session construction time.
#[async_trait]
pub trait CallResourceFactory: Send + Sync {
    /// Acquire resources for one inbound call.
    async fn acquire(&self) -> Box<dyn CallResources>;
}
