//! Method-dispatch core: endpoint registration and the per-call
//! dispatcher.
//!
//! An [`Endpoint`] groups remotely callable methods behind a shared
//! authentication policy. Methods are declared with [`MethodBuilder`],
//! validated fatally at build time, and served from an immutable table.
//! [`Endpoint::dispatch`] runs the full call lifecycle and returns a
//! `DispatchOutcome` for every request, valid or not.
//!
//! # Architecture
//!
//! ```text
//!   inbound uri + body + request context
//!        |
//!        v
//!   Endpoint::dispatch          (open session, acquire resources)
//!        |
//!        +-- method-name presence check
//!        +-- login check        (AuthProvider, cached per call)
//!        +-- scope check
//!        +-- method lookup      (immutable descriptor table)
//!        +-- argument assembly  (coercion, EntityCodec)
//!        +-- handler invoke     (MethodHandler)
//!        |
//!        v
//!   DispatchOutcome             (close session exactly once)
//! ```
//!
//! # Tiger Style
//!
//! - Registration failures are fatal; a malformed endpoint never serves
//! - The descriptor table is built once and read lock-free afterward
//! - Every failure mode is an outcome variant; dispatch never panics on
//!   handler faults

mod context;
mod dispatch;
mod endpoint;
mod handler;
mod method;
mod registry;

#[cfg(any(test, feature = "testing"))]
pub mod test_support;

pub use context::DispatchContext;
pub use endpoint::Endpoint;
pub use endpoint::EndpointBuilder;
pub use handler::ArgSet;
pub use handler::MethodHandler;
pub use method::MethodBuilder;
pub use method::MethodDescriptor;
pub use registry::EndpointRegistry;
pub use registry::EndpointRegistryBuilder;
