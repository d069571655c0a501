//! Method handler trait and the assembled argument container.
//!
//! This module defines the invocation contract between the dispatcher and
//! endpoint handlers. At registration time each method binds an
//! `Arc<dyn MethodHandler>`; at call time the dispatcher assembles an
//! [`ArgSet`] from the coerced wire inputs and invokes the handler with the
//! live session.
//!
//! # Implementing a Handler
//!
//! ```ignore
//! use async_trait::async_trait;
//! use trellis_core::{HandlerError, Session};
//! use trellis_rpc::{ArgSet, MethodHandler};
//!
//! struct Add;
//!
//! #[async_trait]
//! impl MethodHandler for Add {
//!     async fn invoke(
//!         &self,
//!         session: &mut Session,
//!         args: ArgSet,
//!     ) -> Result<serde_json::Value, HandlerError> {
//!         let a = args.get("a").and_then(|v| v.as_int()).unwrap_or(0);
//!         let b = args.get("b").and_then(|v| v.as_int()).unwrap_or(0);
//!         session.log(format!("adding {a} + {b}"));
//!         Ok(serde_json::json!(a + b))
//!     }
//! }
//! ```

use std::collections::BTreeMap;

use async_trait::async_trait;
use trellis_core::ArgValue;
use trellis_core::HandlerError;
use trellis_core::Session;

/// Invocation target bound to a method at registration time.
///
/// # Tiger Style
///
/// - Handlers hold no per-call state; everything lives on the session
/// - A `Fault` error is converted to `InternalError` by the dispatcher
///   and never re-raised to the transport
/// - `Status` short-circuits with a raw transport status code
#[async_trait]
pub trait MethodHandler: Send + Sync {
    /// Process one call with the session and the assembled arguments.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError::Status`] to short-circuit with a raw status
    /// code, or [`HandlerError::Fault`] for any uncaught failure.
    async fn invoke(
        &self,
        session: &mut Session,
        args: ArgSet,
    ) -> Result<serde_json::Value, HandlerError>;
}

/// Fixed-shape container of coerced arguments for one invocation.
///
/// Slots follow the method's declared parameter order: required arguments
/// (after the implicit session slot), then optional, then named. A slot is
/// `None` when the wire input was absent - absence is not an error by
/// itself; only a present value that fails coercion rejects the call
/// before the handler runs.
#[derive(Debug, Clone, Default)]
pub struct ArgSet {
    required: Vec<(String, Option<ArgValue>)>,
    optional: Vec<(String, Option<ArgValue>)>,
    named: BTreeMap<String, ArgValue>,
}

impl ArgSet {
    /// Assemble an argument set from its parts.
    ///
    /// Exposed so handlers can be unit-tested without going through
    /// dispatch.
    pub fn from_parts(
        required: Vec<(String, Option<ArgValue>)>,
        optional: Vec<(String, Option<ArgValue>)>,
        named: BTreeMap<String, ArgValue>,
    ) -> Self {
        Self {
            required,
            optional,
            named,
        }
    }

    /// Look up an argument by name across required, optional, and named
    /// slots. Returns `None` for undeclared names and for declared
    /// arguments whose wire input was absent.
    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.required
            .iter()
            .chain(self.optional.iter())
            .find(|(slot, _)| slot == name)
            .and_then(|(_, value)| value.as_ref())
            .or_else(|| self.named.get(name))
    }

    /// Required argument slots in declared order (session excluded).
    pub fn required(&self) -> impl Iterator<Item = (&str, Option<&ArgValue>)> {
        self.required
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_ref()))
    }

    /// Optional argument slots in declared order.
    pub fn optional(&self) -> impl Iterator<Item = (&str, Option<&ArgValue>)> {
        self.optional
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_ref()))
    }

    /// Named arguments that were present on the wire.
    pub fn named(&self) -> &BTreeMap<String, ArgValue> {
        &self.named
    }
}
