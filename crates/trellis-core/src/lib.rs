//! Domain vocabulary and collaborator seams for Trellis dispatch.
//!
//! This crate holds everything the dispatch machinery in `trellis-rpc`
//! shares with its collaborators, without depending on either side's
//! implementation:
//!
//! - [`Scope`] - named permission unit required by endpoint policy
//! - [`ParamSpec`] / [`ParamKind`] / [`ArgValue`] - parameter descriptors
//!   and typed coerced arguments, plus the pure [`coerce`] function
//! - [`Session`] - per-call context with auth caching, audit recording,
//!   and close-exactly-once resource release
//! - Collaborator traits: [`EntityCodec`], [`AuthProvider`],
//!   [`SessionLogSink`], [`CallResources`] / [`CallResourceFactory`]
//! - Error taxonomy: [`RegistrationError`], [`CoerceError`],
//!   [`CodecError`], [`HandlerError`]
//!
//! # Tiger Style
//!
//! - Session log and query records are bounded (see [`constants`])
//! - Coercion never panics and never propagates collaborator errors
//! - Auth resolution results are computed at most once per session

pub mod constants;
mod error;
mod param;
mod scope;
mod session;
#[cfg(any(test, feature = "testing"))]
pub mod test_support;
mod traits;

pub use error::CodecError;
pub use error::CoerceError;
pub use error::HandlerError;
pub use error::RegistrationError;
pub use param::ArgValue;
pub use param::ParamKind;
pub use param::ParamSpec;
pub use param::coerce;
pub use scope::Scope;
pub use session::Session;
pub use session::SessionRecord;
pub use traits::AuthProvider;
pub use traits::AuthenticatedUser;
pub use traits::CallResourceFactory;
pub use traits::CallResources;
pub use traits::EntityCodec;
pub use traits::SessionLogSink;
