//! Wire-facing message types for the dispatch protocol.
//!
//! The types here are the full surface exchanged with the transport layer:
//! the per-request context it supplies, the outcome taxonomy it receives,
//! and the structured endpoint listing used by documentation and codegen
//! tooling.

use serde::Deserialize;
use serde::Serialize;

/// Maximum accepted request body size in bytes (1 MB).
///
/// Bodies larger than this should be rejected by the transport before
/// dispatch is ever invoked.
pub const MAX_REQUEST_BODY_BYTES: usize = 1024 * 1024;

/// Maximum success payload size in bytes (4 MB).
pub const MAX_PAYLOAD_BYTES: usize = 4 * 1024 * 1024;

/// Per-request context supplied by the transport layer.
///
/// Carries the caller's authentication key (if any) and identifying
/// information used for session audit records. The dispatch core never
/// interprets the key itself; verification is delegated to the configured
/// auth provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestContext {
    /// Authentication key presented by the caller, if any.
    pub auth_key: Option<String>,
    /// Remote peer address, for audit records.
    pub remote_addr: Option<String>,
}

impl RequestContext {
    /// Context for an unauthenticated caller.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Context carrying an authentication key.
    pub fn with_auth_key(key: impl Into<String>) -> Self {
        Self {
            auth_key: Some(key.into()),
            remote_addr: None,
        }
    }
}

/// Outcome of one dispatched call.
///
/// Exactly one variant is produced per call. The transport maps variants to
/// wire-level status codes via [`DispatchOutcome::http_status`] and
/// serializes the variant body as the response payload.
///
/// `InvalidParams` and `AuthFailed` carry a human-readable description only,
/// never internal exception text. `InternalError` carries the raw fault text
/// and backtrace together with the session-log identifier returned by the
/// log sink (or `None` when logging was disabled or the sink failed).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// The handler completed; `payload` is its JSON-encoded return value.
    Success {
        /// Handler return value.
        payload: serde_json::Value,
    },
    /// The request named a missing/unknown method or a parameter failed
    /// type coercion.
    InvalidParams {
        /// Human-readable description naming the offending parameter or method.
        reason: String,
    },
    /// Missing or invalid credentials, or a required scope was not granted.
    AuthFailed {
        /// Human-readable description of the auth failure.
        reason: String,
    },
    /// The handler faulted during invocation.
    InternalError {
        /// Raw fault text.
        error: String,
        /// Captured backtrace text.
        backtrace: String,
        /// Identifier returned by the session-log sink, if logging ran.
        log_id: Option<String>,
    },
    /// Pass-through escape hatch for handlers that short-circuit with a raw
    /// transport status.
    StatusCode {
        /// Raw status code to return on the wire.
        code: u16,
    },
}

impl DispatchOutcome {
    /// Returns the variant name for logging/debugging.
    pub fn variant_name(&self) -> &'static str {
        match self {
            Self::Success { .. } => "Success",
            Self::InvalidParams { .. } => "InvalidParams",
            Self::AuthFailed { .. } => "AuthFailed",
            Self::InternalError { .. } => "InternalError",
            Self::StatusCode { .. } => "StatusCode",
        }
    }

    /// Returns true for the `Success` variant.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Maps this outcome to an HTTP status code for the transport layer.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Success { .. } => 200,
            Self::InvalidParams { .. } => 400,
            Self::AuthFailed { .. } => 401,
            Self::InternalError { .. } => 500,
            Self::StatusCode { code } => *code,
        }
    }
}

/// One parameter in a method listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamDescription {
    /// Parameter name as it appears on the wire.
    pub name: String,
    /// Semantic type name ("string", "int", "float", "bool", "datetime",
    /// or a registered entity type name).
    pub type_name: String,
}

/// One callable method in an endpoint listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDescription {
    /// Method name.
    pub name: String,
    /// Required parameters, in declaration order. The implicit session
    /// parameter is not listed; it is not a wire parameter.
    pub required: Vec<ParamDescription>,
    /// Optional parameters, in declaration order.
    pub optional: Vec<ParamDescription>,
    /// Named parameters, in declaration order.
    pub named: Vec<ParamDescription>,
    /// Declared return type name.
    pub returns: String,
}

/// Structured listing of an endpoint's callable surface.
///
/// Produced by `Endpoint::describe()` for documentation and client codegen
/// tooling. The output is a nested listing, not a fixed wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointDescription {
    /// Endpoint name.
    pub name: String,
    /// Whether calls must present a valid authentication key.
    pub requires_login: bool,
    /// Scopes every caller must hold, in declaration order.
    pub required_scopes: Vec<String>,
    /// Callable methods, sorted by name.
    pub methods: Vec<MethodDescription>,
}
