//! Process-wide endpoint registry.
//!
//! Maps endpoint names to built [`Endpoint`]s. The table is assembled once
//! at startup and immutable afterward, so concurrent dispatch tasks read
//! it without synchronization.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;
use trellis_api::EndpointDescription;
use trellis_core::RegistrationError;

use crate::endpoint::Endpoint;

/// Immutable name-to-endpoint table for one process.
#[derive(Debug, Clone, Default)]
pub struct EndpointRegistry {
    endpoints: HashMap<String, Arc<Endpoint>>,
}

impl EndpointRegistry {
    /// Start building a registry.
    pub fn builder() -> EndpointRegistryBuilder {
        EndpointRegistryBuilder::default()
    }

    /// Look up an endpoint by name.
    pub fn find(&self, name: &str) -> Option<&Arc<Endpoint>> {
        self.endpoints.get(name)
    }

    /// Registered endpoint names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.endpoints.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Structured listings for every endpoint, sorted by endpoint name.
    pub fn describe_all(&self) -> Vec<EndpointDescription> {
        let mut listings: Vec<_> = self.endpoints.values().map(|e| e.describe()).collect();
        listings.sort_by(|a, b| a.name.cmp(&b.name));
        listings
    }
}

/// Builder collecting endpoints before the registry is frozen.
#[derive(Debug, Default)]
pub struct EndpointRegistryBuilder {
    endpoints: Vec<Endpoint>,
}

impl EndpointRegistryBuilder {
    /// Add a built endpoint.
    pub fn register(mut self, endpoint: Endpoint) -> Self {
        self.endpoints.push(endpoint);
        self
    }

    /// Freeze the registry.
    ///
    /// # Errors
    ///
    /// Fails when two endpoints share a name.
    pub fn build(self) -> Result<EndpointRegistry, RegistrationError> {
        let mut endpoints = HashMap::with_capacity(self.endpoints.len());
        for endpoint in self.endpoints {
            let name = endpoint.name().to_string();
            if endpoints.contains_key(&name) {
                return Err(RegistrationError::DuplicateEndpoint { endpoint: name });
            }
            endpoints.insert(name, Arc::new(endpoint));
        }
        debug!(endpoint_count = endpoints.len(), "endpoint registry frozen");
        Ok(EndpointRegistry { endpoints })
    }
}

#[cfg(test)]
mod tests {
    use trellis_core::test_support::StubEntityCodec;

    use super::*;

    fn empty_endpoint(name: &str) -> Endpoint {
        Endpoint::builder(name)
            .build(&StubEntityCodec::empty())
            .expect("registration")
    }

    #[test]
    fn find_returns_registered_endpoint() {
        let registry = EndpointRegistry::builder()
            .register(empty_endpoint("calc"))
            .register(empty_endpoint("docs"))
            .build()
            .expect("build");
        assert!(registry.find("calc").is_some());
        assert!(registry.find("missing").is_none());
        assert_eq!(registry.names(), vec!["calc", "docs"]);
    }

    #[test]
    fn duplicate_endpoint_name_fails() {
        let result = EndpointRegistry::builder()
            .register(empty_endpoint("calc"))
            .register(empty_endpoint("calc"))
            .build();
        assert!(matches!(
            result,
            Err(RegistrationError::DuplicateEndpoint { endpoint }) if endpoint == "calc"
        ));
    }

    #[test]
    fn describe_all_is_sorted() {
        let registry = EndpointRegistry::builder()
            .register(empty_endpoint("zeta"))
            .register(empty_endpoint("alpha"))
            .build()
            .expect("build");
        let listings = registry.describe_all();
        assert_eq!(listings[0].name, "alpha");
        assert_eq!(listings[1].name, "zeta");
    }
}
