//! Request dispatch: the per-call state machine.
//!
//! `Endpoint::dispatch` orchestrates the full request lifecycle: session
//! creation, auth and scope checks, method lookup, argument assembly,
//! handler invocation, session-log emission, session close, and outcome
//! conversion. The session opened in state 1 is closed exactly once on
//! every exit path.
//!
//! # Ordering
//!
//! The login check precedes the scope check, which precedes method
//! lookup: an unauthenticated caller must never learn whether a method
//! name or parameter is valid. The only check ahead of login is the
//! presence of a method name at all, which reveals nothing about the
//! endpoint surface.
//!
//! # Fault Interception
//!
//! Any handler fault between method lookup and invocation is intercepted
//! at this boundary, logged with exception text and backtrace, and
//! converted to an `InternalError` outcome. Nothing re-raises to the
//! transport layer.

use std::collections::BTreeMap;

use tracing::debug;
use tracing::warn;
use trellis_api::DispatchOutcome;
use trellis_api::RequestContext;
use trellis_core::CoerceError;
use trellis_core::HandlerError;
use trellis_core::Session;
use trellis_core::coerce;

use crate::context::DispatchContext;
use crate::endpoint::Endpoint;
use crate::handler::ArgSet;
use crate::method::MethodDescriptor;

/// Parsed view of one inbound request.
///
/// The method name is the path segment following the endpoint name;
/// query pairs are percent-decoded. On duplicate query keys the last
/// value wins.
#[derive(Debug)]
struct InboundRequest {
    method_name: Option<String>,
    params: BTreeMap<String, String>,
}

impl InboundRequest {
    fn parse(endpoint: &str, uri: &str) -> Self {
        let (path, query) = match uri.split_once('?') {
            Some((path, query)) => (path, query),
            None => (uri, ""),
        };
        let mut segments = path.split('/').filter(|segment| !segment.is_empty());
        let mut method_name = segments.next().map(str::to_string);
        if method_name.as_deref() == Some(endpoint) {
            method_name = segments.next().map(str::to_string);
        }
        let params: BTreeMap<String, String> = url::form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect();
        Self {
            method_name,
            params,
        }
    }
}

impl Endpoint {
    /// Dispatch one inbound call and return its outcome.
    ///
    /// Every failure mode is an outcome variant; this method never
    /// returns an error and never panics on handler faults. The per-call
    /// session is closed exactly once before returning, on every path.
    pub async fn dispatch(
        &self,
        uri: &str,
        body: Option<&str>,
        ctx: &RequestContext,
        deps: &DispatchContext,
    ) -> DispatchOutcome {
        let request = InboundRequest::parse(self.name(), uri);

        // State 1: open the session. It stays alive through the terminal
        // state of every path below.
        let mut session = Session::new(
            self.name(),
            request.method_name.clone().unwrap_or_default(),
        )
        .with_auth_key(ctx.auth_key.clone())
        .with_body(body.map(str::to_string));
        if let Some(factory) = &deps.resources {
            session = session.with_resources(factory.acquire().await);
        }

        let outcome = self.run(&mut session, &request, deps).await;
        session.close().await;

        debug!(
            endpoint = %self.name(),
            method = %session.method(),
            outcome = outcome.variant_name(),
            elapsed_ms = session.elapsed().as_millis() as u64,
            "dispatch complete"
        );
        outcome
    }

    /// States 2 through 10. The caller owns session close.
    async fn run(
        &self,
        session: &mut Session,
        request: &InboundRequest,
        deps: &DispatchContext,
    ) -> DispatchOutcome {
        // State 2: method-name presence.
        let Some(method_name) = request.method_name.as_deref() else {
            return DispatchOutcome::InvalidParams {
                reason: "no method name supplied".to_string(),
            };
        };

        // State 3: login requirement.
        if self.requires_login() {
            if session.auth_key().is_none() {
                debug!(endpoint = %self.name(), "rejecting call without auth key");
                return DispatchOutcome::AuthFailed {
                    reason: "authentication required".to_string(),
                };
            }
            if !session.is_signed_in(deps.auth.as_ref()).await {
                debug!(endpoint = %self.name(), "rejecting call with invalid auth key");
                return DispatchOutcome::AuthFailed {
                    reason: "invalid authentication key".to_string(),
                };
            }
        }

        // State 4: scope requirement. Sign-in must succeed here even when
        // the endpoint does not require login.
        if !self.required_scopes().is_empty() {
            if !session.is_signed_in(deps.auth.as_ref()).await {
                return DispatchOutcome::AuthFailed {
                    reason: "authentication required".to_string(),
                };
            }
            for scope in self.required_scopes() {
                let granted = session.resolved_scopes(deps.auth.as_ref()).await;
                if !granted.contains(scope) {
                    debug!(endpoint = %self.name(), scope = %scope, "missing required scope");
                    return DispatchOutcome::AuthFailed {
                        reason: format!("User does not have access to scope {scope}"),
                    };
                }
            }
        }

        // States 5-8 may fault; intercept at this boundary.
        match self.run_method(session, method_name, request, deps).await {
            Ok(outcome) => outcome,
            Err(fault) => self.intercept_fault(session, fault, deps).await,
        }
    }

    /// States 5 through 9: lookup, assembly, invocation, success logging.
    async fn run_method(
        &self,
        session: &mut Session,
        method_name: &str,
        request: &InboundRequest,
        deps: &DispatchContext,
    ) -> Result<DispatchOutcome, anyhow::Error> {
        // State 5: method lookup.
        let Some(method) = self.find_method(method_name) else {
            debug!(endpoint = %self.name(), method = %method_name, "unknown method");
            return Ok(DispatchOutcome::InvalidParams {
                reason: format!(
                    "Method {method_name} not found on endpoint {}",
                    self.name()
                ),
            });
        };

        // States 6-7: argument assembly. A coercion failure rejects the
        // call before the handler ever runs.
        let args = match assemble_args(method, request, deps) {
            Ok(args) => args,
            Err(err) => {
                debug!(
                    endpoint = %self.name(),
                    method = %method_name,
                    param = err.param(),
                    "parameter coercion failed"
                );
                return Ok(DispatchOutcome::InvalidParams {
                    reason: err.to_string(),
                });
            }
        };

        debug!(endpoint = %self.name(), method = %method_name, "invoking handler");

        // State 8: invoke with [session, required..., optional...] as
        // declared.
        match method.handler().invoke(session, args).await {
            Ok(payload) => {
                // State 9: success path.
                let user = if self.requires_login() {
                    session.resolve_user(deps.auth.as_ref()).await
                } else {
                    None
                };
                if self.logs_sessions() {
                    let record = session.record(user, None, None);
                    let _ = deps.log_sink.log_session(record).await;
                }
                Ok(DispatchOutcome::Success { payload })
            }
            Err(HandlerError::Status(code)) => Ok(DispatchOutcome::StatusCode { code }),
            Err(HandlerError::Fault(fault)) => Err(fault),
        }
    }

    /// State 10: fault path. Emits the fault record (no authenticated
    /// user) and captures the sink's log id.
    async fn intercept_fault(
        &self,
        session: &mut Session,
        fault: anyhow::Error,
        deps: &DispatchContext,
    ) -> DispatchOutcome {
        let error = format!("{fault:#}");
        let backtrace = fault.backtrace().to_string();
        warn!(
            endpoint = %self.name(),
            method = %session.method(),
            error = %error,
            "handler fault intercepted"
        );
        let log_id = if self.logs_sessions() {
            deps.log_sink
                .log_session(session.record(None, Some(error.clone()), Some(backtrace.clone())))
                .await
        } else {
            None
        };
        DispatchOutcome::InternalError {
            error,
            backtrace,
            log_id,
        }
    }
}

/// States 6-7: coerce present inputs into the fixed-shape argument
/// container. Absent inputs leave required slots empty and omit optional
/// and named slots entirely.
fn assemble_args(
    method: &MethodDescriptor,
    request: &InboundRequest,
    deps: &DispatchContext,
) -> Result<ArgSet, CoerceError> {
    let codec = deps.codec.as_ref();

    let mut required = Vec::with_capacity(method.wire_required().len());
    for spec in method.wire_required() {
        let value = match request.params.get(spec.name()) {
            Some(raw) => Some(coerce(raw, spec, codec)?),
            None => None,
        };
        required.push((spec.name().to_string(), value));
    }

    let mut optional = Vec::with_capacity(method.optional_params().len());
    for spec in method.optional_params() {
        let value = match request.params.get(spec.name()) {
            Some(raw) => Some(coerce(raw, spec, codec)?),
            None => None,
        };
        optional.push((spec.name().to_string(), value));
    }

    let mut named = BTreeMap::new();
    for spec in method.named_params() {
        if let Some(raw) = request.params.get(spec.name()) {
            named.insert(spec.name().to_string(), coerce(raw, spec, codec)?);
        }
    }

    Ok(ArgSet::from_parts(required, optional, named))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_extracts_method_after_endpoint_segment() {
        let request = InboundRequest::parse("calc", "/calc/add?a=3&b=4");
        assert_eq!(request.method_name.as_deref(), Some("add"));
        assert_eq!(request.params.get("a").map(String::as_str), Some("3"));
        assert_eq!(request.params.get("b").map(String::as_str), Some("4"));
    }

    #[test]
    fn parse_bare_endpoint_path_has_no_method() {
        let request = InboundRequest::parse("calc", "/calc");
        assert!(request.method_name.is_none());

        let request = InboundRequest::parse("calc", "/calc/");
        assert!(request.method_name.is_none());
    }

    #[test]
    fn parse_accepts_method_only_path() {
        // Transports that strip the endpoint prefix deliver "/add".
        let request = InboundRequest::parse("calc", "/add");
        assert_eq!(request.method_name.as_deref(), Some("add"));
    }

    #[test]
    fn parse_percent_decodes_query_values() {
        let request = InboundRequest::parse("calc", "/calc/echo?text=hello%20world&sym=%26");
        assert_eq!(
            request.params.get("text").map(String::as_str),
            Some("hello world")
        );
        assert_eq!(request.params.get("sym").map(String::as_str), Some("&"));
    }

    #[test]
    fn parse_last_duplicate_query_key_wins() {
        let request = InboundRequest::parse("calc", "/calc/add?a=1&a=2");
        assert_eq!(request.params.get("a").map(String::as_str), Some("2"));
    }

    #[test]
    fn parse_empty_uri_has_no_method() {
        let request = InboundRequest::parse("calc", "");
        assert!(request.method_name.is_none());
    }
}
