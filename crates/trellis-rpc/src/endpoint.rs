//! Endpoint policy and the method registration table.
//!
//! An [`Endpoint`] is a named group of remotely callable methods sharing
//! authentication policy. Its method table is built exactly once, before
//! any dispatch, via [`EndpointBuilder`]; registration failures are fatal
//! programming errors, so a malformed endpoint is never served. The built
//! table is read-only and safe for concurrent lookup without locking.

use std::collections::HashMap;

use tracing::debug;
use tracing::info;
use trellis_api::EndpointDescription;
use trellis_core::EntityCodec;
use trellis_core::RegistrationError;
use trellis_core::Scope;
use trellis_core::constants::PRIVATE_METHOD_PREFIX;

use crate::method::MethodBuilder;
use crate::method::MethodDescriptor;

/// A named, stateful policy unit owning its method descriptor table.
///
/// # Tiger Style
///
/// - Table built once at initialization, immutable afterward
/// - O(1) expected method lookup, lock-free for concurrent readers
/// - Policy (login, scopes, logging) is fixed per endpoint
#[derive(Debug)]
pub struct Endpoint {
    name: String,
    require_login: bool,
    required_scopes: Vec<Scope>,
    log_sessions: bool,
    methods: HashMap<String, MethodDescriptor>,
}

impl Endpoint {
    /// Start building an endpoint.
    pub fn builder(name: impl Into<String>) -> EndpointBuilder {
        EndpointBuilder::new(name)
    }

    /// Endpoint name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether calls must present a valid authentication key.
    pub fn requires_login(&self) -> bool {
        self.require_login
    }

    /// Scopes every caller must hold, in declaration order.
    pub fn required_scopes(&self) -> &[Scope] {
        &self.required_scopes
    }

    /// Whether completed calls emit session-log records.
    pub fn logs_sessions(&self) -> bool {
        self.log_sessions
    }

    /// Look up a method descriptor by name.
    pub fn find_method(&self, name: &str) -> Option<&MethodDescriptor> {
        self.methods.get(name)
    }

    /// Number of callable methods.
    pub fn method_count(&self) -> usize {
        self.methods.len()
    }

    /// Structured listing of policy and callable methods, sorted by method
    /// name for deterministic output.
    pub fn describe(&self) -> EndpointDescription {
        let mut methods: Vec<_> = self.methods.values().map(MethodDescriptor::describe).collect();
        methods.sort_by(|a, b| a.name.cmp(&b.name));
        EndpointDescription {
            name: self.name.clone(),
            requires_login: self.require_login,
            required_scopes: self
                .required_scopes
                .iter()
                .map(|scope| scope.as_str().to_string())
                .collect(),
            methods,
        }
    }
}

/// Builder collecting endpoint policy and method declarations.
#[derive(Debug)]
pub struct EndpointBuilder {
    name: String,
    require_login: bool,
    required_scopes: Vec<Scope>,
    log_sessions: bool,
    methods: Vec<MethodBuilder>,
}

impl EndpointBuilder {
    /// Start building an endpoint with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            require_login: false,
            required_scopes: Vec::new(),
            log_sessions: true,
            methods: Vec::new(),
        }
    }

    /// Require a valid authentication key for every call.
    pub fn require_login(mut self) -> Self {
        self.require_login = true;
        self
    }

    /// Require callers to hold a scope. Declaration order is preserved and
    /// determines which missing scope an `AuthFailed` outcome names.
    pub fn require_scope(mut self, scope: impl Into<Scope>) -> Self {
        self.required_scopes.push(scope.into());
        self
    }

    /// Enable or disable session-log emission (enabled by default).
    pub fn log_sessions(mut self, enabled: bool) -> Self {
        self.log_sessions = enabled;
        self
    }

    /// Declare a callable method.
    pub fn method(mut self, method: MethodBuilder) -> Self {
        self.methods.push(method);
        self
    }

    /// Validate every declaration and build the immutable endpoint.
    ///
    /// Methods whose names start with the private prefix are skipped: they
    /// do not qualify as remotely callable and never enter the table.
    ///
    /// # Errors
    ///
    /// Fails fatally on any malformed declaration - missing handler,
    /// session context absent from the first slot or present elsewhere,
    /// unresolvable entity parameter type, or duplicate method name.
    pub fn build(self, codec: &dyn EntityCodec) -> Result<Endpoint, RegistrationError> {
        let mut methods = HashMap::with_capacity(self.methods.len());
        for builder in self.methods {
            if builder.name().starts_with(PRIVATE_METHOD_PREFIX) {
                debug!(
                    endpoint = %self.name,
                    method = %builder.name(),
                    "skipping private method"
                );
                continue;
            }
            let descriptor = builder.build(codec)?;
            if methods.contains_key(descriptor.name()) {
                return Err(RegistrationError::DuplicateMethod {
                    method: descriptor.name().to_string(),
                });
            }
            methods.insert(descriptor.name().to_string(), descriptor);
        }

        info!(
            endpoint = %self.name,
            method_count = methods.len(),
            requires_login = self.require_login,
            "endpoint initialized"
        );

        Ok(Endpoint {
            name: self.name,
            require_login: self.require_login,
            required_scopes: self.required_scopes,
            log_sessions: self.log_sessions,
            methods,
        })
    }
}
