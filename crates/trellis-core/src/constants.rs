//! Bounded-resource constants for per-call sessions.
//!
//! # Tiger Style
//!
//! - Every per-call accumulator has a fixed cap
//! - Caps are generous for legitimate traffic, tight enough to bound
//!   memory under a misbehaving handler

/// Maximum diagnostic log entries retained per session.
///
/// Entries past the cap are dropped; the session records that truncation
/// occurred so audit consumers can tell the log is partial.
pub const MAX_DIAGNOSTIC_LOG_ENTRIES: usize = 1024;

/// Maximum query statements recorded per session for audit.
pub const MAX_RECORDED_QUERIES: usize = 1024;

/// Maximum length of a single diagnostic log entry in bytes.
pub const MAX_DIAGNOSTIC_ENTRY_BYTES: usize = 4096;

/// Prefix marking a registered method as private (never callable remotely).
pub const PRIVATE_METHOD_PREFIX: &str = "_";
