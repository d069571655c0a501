//! Error taxonomy for registration, coercion, and handler invocation.
//!
//! Four distinct failure families, matching how each is recovered:
//!
//! - [`RegistrationError`] - programming errors surfaced fatally at
//!   endpoint initialization; a malformed endpoint is never served
//! - [`CoerceError`] - wire values that fail type coercion; recovered
//!   into an `InvalidParams` outcome, never propagated as a fault
//! - [`CodecError`] - failures from the external serialization
//!   subsystem; normalized into [`CoerceError`] at the coercion boundary
//! - [`HandlerError`] - what a handler invocation can return besides a
//!   payload: a raw status short-circuit or an opaque fault

use thiserror::Error;

/// Fatal endpoint-initialization errors.
///
/// These indicate a malformed handler registration, not a runtime
/// condition. They are returned from `EndpointBuilder::build` and must
/// abort startup.
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// The first required parameter of every callable method must be the
    /// session context.
    #[error("method '{method}' must declare the session context as its first parameter")]
    FirstParamNotSession {
        /// Offending method name.
        method: String,
    },

    /// The session context may only appear in the leading slot.
    #[error("method '{method}' declares session-context parameter '{param}' outside the first slot")]
    UnexpectedSessionParam {
        /// Offending method name.
        method: String,
        /// Offending parameter name.
        param: String,
    },

    /// A complex parameter type is not resolvable by the serialization
    /// subsystem.
    #[error("method '{method}' parameter '{param}' uses entity type '{type_name}' with no registered constructor")]
    UnresolvableEntityType {
        /// Offending method name.
        method: String,
        /// Offending parameter name.
        param: String,
        /// Unresolvable entity type name.
        type_name: String,
    },

    /// Two methods were registered under the same name.
    #[error("method '{method}' is registered more than once")]
    DuplicateMethod {
        /// Duplicated method name.
        method: String,
    },

    /// A method was registered without an invocation target.
    #[error("method '{method}' has no bound handler")]
    MissingHandler {
        /// Offending method name.
        method: String,
    },

    /// Two endpoints were registered under the same name.
    #[error("endpoint '{endpoint}' is registered more than once")]
    DuplicateEndpoint {
        /// Duplicated endpoint name.
        endpoint: String,
    },
}

/// A wire value failed coercion into its declared parameter type.
///
/// Always recovered locally into an `InvalidParams` outcome. The message
/// names the parameter and expected type but never carries internal
/// collaborator error text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoerceError {
    /// The raw value does not parse/decode as the declared type.
    #[error("parameter '{param}' expects {expected}, got '{value}'")]
    TypeMismatch {
        /// Parameter that failed coercion.
        param: String,
        /// Expected semantic type name.
        expected: String,
        /// Raw wire value that was rejected.
        value: String,
    },
}

impl CoerceError {
    /// The name of the parameter that failed coercion.
    pub fn param(&self) -> &str {
        match self {
            Self::TypeMismatch { param, .. } => param,
        }
    }
}

/// Failures from the external serialization subsystem.
#[derive(Debug, Error)]
pub enum CodecError {
    /// No constructor is registered for the requested type name.
    #[error("no registered constructor for entity type '{type_name}'")]
    UnknownType {
        /// Requested entity type name.
        type_name: String,
    },

    /// The decoded JSON could not be turned into an entity.
    #[error("failed to construct entity '{type_name}': {reason}")]
    Construction {
        /// Entity type name being constructed.
        type_name: String,
        /// Codec-supplied failure description.
        reason: String,
    },
}

/// What a handler invocation can produce besides a success payload.
///
/// `Status` is the escape hatch for handlers that want to short-circuit
/// with a raw transport status; it is not a fault and is never logged as
/// one. `Fault` is any uncaught handler failure; the dispatcher converts
/// it to an `InternalError` outcome and never re-raises it.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Short-circuit with a raw transport status code.
    #[error("handler short-circuited with status {0}")]
    Status(u16),

    /// Uncaught handler fault.
    #[error(transparent)]
    Fault(#[from] anyhow::Error),
}
