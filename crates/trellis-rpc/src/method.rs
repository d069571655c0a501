//! Method descriptors and their registration builder.
//!
//! A [`MethodDescriptor`] is the static metadata for one callable handler:
//! name, ordered parameter descriptors, declared return type, and the bound
//! invocation target. Descriptors are created during endpoint
//! initialization via [`MethodBuilder`], validated fatally, and immutable
//! afterward.

use std::sync::Arc;

use trellis_api::MethodDescription;
use trellis_api::ParamDescription;
use trellis_core::EntityCodec;
use trellis_core::ParamKind;
use trellis_core::ParamSpec;
use trellis_core::RegistrationError;

use crate::handler::MethodHandler;

/// Static metadata and bound handler for one callable method.
///
/// The first required parameter is always the session context - an
/// invariant enforced when the owning endpoint is built.
pub struct MethodDescriptor {
    name: String,
    /// Required parameters; slot 0 is the implicit session parameter.
    required: Vec<ParamSpec>,
    optional: Vec<ParamSpec>,
    named: Vec<ParamSpec>,
    returns: String,
    handler: Arc<dyn MethodHandler>,
}

impl MethodDescriptor {
    /// Method name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared return type name.
    pub fn returns(&self) -> &str {
        &self.returns
    }

    /// Required wire parameters, i.e. everything after the session slot.
    pub(crate) fn wire_required(&self) -> &[ParamSpec] {
        self.required.get(1..).unwrap_or(&[])
    }

    /// Optional parameters in declared order.
    pub(crate) fn optional_params(&self) -> &[ParamSpec] {
        &self.optional
    }

    /// Named parameters in declared order.
    pub(crate) fn named_params(&self) -> &[ParamSpec] {
        &self.named
    }

    /// The bound invocation target.
    pub(crate) fn handler(&self) -> &Arc<dyn MethodHandler> {
        &self.handler
    }

    /// Structured listing of this method for `describe()` output.
    pub fn describe(&self) -> MethodDescription {
        let listing = |specs: &[ParamSpec]| {
            specs
                .iter()
                .map(|spec| ParamDescription {
                    name: spec.name().to_string(),
                    type_name: spec.kind().type_name().to_string(),
                })
                .collect()
        };
        MethodDescription {
            name: self.name.clone(),
            required: listing(self.wire_required()),
            optional: listing(&self.optional),
            named: listing(&self.named),
            returns: self.returns.clone(),
        }
    }
}

impl std::fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodDescriptor")
            .field("name", &self.name)
            .field("required", &self.required.len())
            .field("optional", &self.optional.len())
            .field("named", &self.named.len())
            .field("returns", &self.returns)
            .finish_non_exhaustive()
    }
}

/// Builder collecting one method's parameters and invocation target.
///
/// Validation happens when the owning endpoint is built, so a malformed
/// declaration fails endpoint initialization rather than surfacing at call
/// time.
pub struct MethodBuilder {
    name: String,
    required: Vec<ParamSpec>,
    optional: Vec<ParamSpec>,
    named: Vec<ParamSpec>,
    returns: String,
    handler: Option<Arc<dyn MethodHandler>>,
}

impl MethodBuilder {
    /// Start declaring a method.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: Vec::new(),
            optional: Vec::new(),
            named: Vec::new(),
            returns: "void".to_string(),
            handler: None,
        }
    }

    /// Method name as declared.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append a required parameter. The first must be
    /// [`ParamSpec::session`].
    pub fn param(mut self, spec: ParamSpec) -> Self {
        self.required.push(spec);
        self
    }

    /// Append an optional parameter.
    pub fn optional(mut self, spec: ParamSpec) -> Self {
        self.optional.push(spec);
        self
    }

    /// Append a named parameter.
    pub fn named(mut self, spec: ParamSpec) -> Self {
        self.named.push(spec);
        self
    }

    /// Declare the return type name.
    pub fn returns(mut self, type_name: impl Into<String>) -> Self {
        self.returns = type_name.into();
        self
    }

    /// Bind the invocation target.
    pub fn handler(mut self, handler: impl MethodHandler + 'static) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Bind an already-shared invocation target.
    pub fn handler_arc(mut self, handler: Arc<dyn MethodHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Validate the declaration and produce the immutable descriptor.
    ///
    /// # Errors
    ///
    /// Fails when no handler is bound, when the first required parameter
    /// is not the session context (or the session appears elsewhere), or
    /// when an entity parameter's type has no registered constructor.
    pub(crate) fn build(
        self,
        codec: &dyn EntityCodec,
    ) -> Result<MethodDescriptor, RegistrationError> {
        let handler = self
            .handler
            .ok_or_else(|| RegistrationError::MissingHandler {
                method: self.name.clone(),
            })?;

        if self.required.first().map(ParamSpec::kind) != Some(&ParamKind::Session) {
            return Err(RegistrationError::FirstParamNotSession { method: self.name });
        }

        let wire_params = self
            .required
            .iter()
            .skip(1)
            .chain(self.optional.iter())
            .chain(self.named.iter());
        for spec in wire_params {
            match spec.kind() {
                ParamKind::Session => {
                    return Err(RegistrationError::UnexpectedSessionParam {
                        method: self.name,
                        param: spec.name().to_string(),
                    });
                }
                ParamKind::Entity { type_name } => {
                    if !codec.has_constructor_for(type_name) {
                        return Err(RegistrationError::UnresolvableEntityType {
                            method: self.name,
                            param: spec.name().to_string(),
                            type_name: type_name.clone(),
                        });
                    }
                }
                _ => {}
            }
        }

        Ok(MethodDescriptor {
            name: self.name,
            required: self.required,
            optional: self.optional,
            named: self.named,
            returns: self.returns,
            handler,
        })
    }
}

impl std::fmt::Debug for MethodBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodBuilder")
            .field("name", &self.name)
            .field("has_handler", &self.handler.is_some())
            .finish_non_exhaustive()
    }
}
