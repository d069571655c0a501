//! End-to-end dispatch behaviour through the public API.
//!
//! Exercises the full call lifecycle with stub collaborators: auth and
//! scope gating order, argument coercion failures, fault interception,
//! session logging, and resource release on every exit path.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use trellis_api::DispatchOutcome;
use trellis_api::RequestContext;
use trellis_core::HandlerError;
use trellis_core::ParamSpec;
use trellis_core::Session;
use trellis_core::test_support::CountingResourceFactory;
use trellis_core::test_support::RecordingLogSink;
use trellis_core::test_support::StaticAuthProvider;
use trellis_core::test_support::StubEntityCodec;
use trellis_rpc::ArgSet;
use trellis_rpc::DispatchContext;
use trellis_rpc::Endpoint;
use trellis_rpc::MethodBuilder;
use trellis_rpc::MethodHandler;
use trellis_rpc::test_support::TestContextBuilder;

struct AddHandler;

#[async_trait]
impl MethodHandler for AddHandler {
    async fn invoke(
        &self,
        session: &mut Session,
        args: ArgSet,
    ) -> Result<serde_json::Value, HandlerError> {
        let a = args.get("a").and_then(|v| v.as_int()).unwrap_or(0);
        let b = args.get("b").and_then(|v| v.as_int()).unwrap_or(0);
        session.record_query(format!("SELECT {a} + {b}"));
        session.log("computed sum");
        Ok(json!(a + b))
    }
}

/// Echoes whether its optional bool argument was supplied.
struct GreetHandler;

#[async_trait]
impl MethodHandler for GreetHandler {
    async fn invoke(
        &self,
        _session: &mut Session,
        args: ArgSet,
    ) -> Result<serde_json::Value, HandlerError> {
        let name = args.get("name").and_then(|v| v.as_str()).unwrap_or("?");
        let shout = args.get("shout").and_then(|v| v.as_bool());
        Ok(json!({ "name": name, "shout": shout }))
    }
}

struct FaultHandler;

#[async_trait]
impl MethodHandler for FaultHandler {
    async fn invoke(
        &self,
        _session: &mut Session,
        _args: ArgSet,
    ) -> Result<serde_json::Value, HandlerError> {
        Err(anyhow::anyhow!("database exploded").into())
    }
}

struct TeapotHandler;

#[async_trait]
impl MethodHandler for TeapotHandler {
    async fn invoke(
        &self,
        _session: &mut Session,
        _args: ArgSet,
    ) -> Result<serde_json::Value, HandlerError> {
        Err(HandlerError::Status(418))
    }
}

fn calc_builder() -> trellis_rpc::EndpointBuilder {
    Endpoint::builder("calc")
        .method(
            MethodBuilder::new("add")
                .param(ParamSpec::session())
                .param(ParamSpec::int("a"))
                .param(ParamSpec::int("b"))
                .returns("int")
                .handler(AddHandler),
        )
        .method(
            MethodBuilder::new("greet")
                .param(ParamSpec::session())
                .param(ParamSpec::string("name"))
                .optional(ParamSpec::bool("shout"))
                .returns("object")
                .handler(GreetHandler),
        )
        .method(
            MethodBuilder::new("explode")
                .param(ParamSpec::session())
                .handler(FaultHandler),
        )
        .method(
            MethodBuilder::new("teapot")
                .param(ParamSpec::session())
                .handler(TeapotHandler),
        )
}

fn calc_endpoint() -> Endpoint {
    calc_builder()
        .build(&StubEntityCodec::empty())
        .expect("registration")
}

fn admin_endpoint() -> Endpoint {
    Endpoint::builder("admin")
        .require_login()
        .require_scope("admin")
        .method(
            MethodBuilder::new("purge")
                .param(ParamSpec::session())
                .handler(AddHandler),
        )
        .build(&StubEntityCodec::empty())
        .expect("registration")
}

fn signed_in_ctx(auth: StaticAuthProvider) -> DispatchContext {
    TestContextBuilder::new().auth(Arc::new(auth)).build()
}

#[tokio::test]
async fn success_returns_handler_payload() {
    let endpoint = calc_endpoint();
    let deps = TestContextBuilder::new().build();

    let outcome = endpoint
        .dispatch("/calc/add?a=3&b=4", None, &RequestContext::anonymous(), &deps)
        .await;

    match outcome {
        DispatchOutcome::Success { payload } => assert_eq!(payload, json!(7)),
        other => panic!("expected Success, got {other:?}"),
    }
}

#[tokio::test]
async fn repeated_dispatch_of_same_request_yields_identical_payloads() {
    // A stateless handler sees no residue from earlier calls: each
    // dispatch gets a fresh session and the same coerced arguments.
    let endpoint = calc_endpoint();
    let deps = TestContextBuilder::new().build();

    let first = endpoint
        .dispatch("/calc/add?a=3&b=4", None, &RequestContext::anonymous(), &deps)
        .await;
    let second = endpoint
        .dispatch("/calc/add?a=3&b=4", None, &RequestContext::anonymous(), &deps)
        .await;

    match (first, second) {
        (
            DispatchOutcome::Success { payload: p1 },
            DispatchOutcome::Success { payload: p2 },
        ) => {
            assert_eq!(p1, json!(7));
            assert_eq!(p1, p2);
        }
        other => panic!("expected two Success outcomes, got {other:?}"),
    }
}

#[tokio::test]
async fn unknown_method_is_invalid_params_with_method_name() {
    let endpoint = calc_endpoint();
    let deps = TestContextBuilder::new().build();

    let outcome = endpoint
        .dispatch("/calc/frobnicate", None, &RequestContext::anonymous(), &deps)
        .await;

    match outcome {
        DispatchOutcome::InvalidParams { reason } => {
            assert_eq!(reason, "Method frobnicate not found on endpoint calc");
        }
        other => panic!("expected InvalidParams, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_method_name_is_invalid_params() {
    let endpoint = calc_endpoint();
    let deps = TestContextBuilder::new().build();

    let outcome = endpoint
        .dispatch("/calc", None, &RequestContext::anonymous(), &deps)
        .await;

    match outcome {
        DispatchOutcome::InvalidParams { reason } => {
            assert_eq!(reason, "no method name supplied");
        }
        other => panic!("expected InvalidParams, got {other:?}"),
    }
}

#[tokio::test]
async fn coercion_failure_names_the_parameter() {
    let endpoint = calc_endpoint();
    let deps = TestContextBuilder::new().build();

    let outcome = endpoint
        .dispatch("/calc/add?a=x&b=4", None, &RequestContext::anonymous(), &deps)
        .await;

    match outcome {
        DispatchOutcome::InvalidParams { reason } => {
            assert_eq!(reason, "parameter 'a' expects int, got 'x'");
        }
        other => panic!("expected InvalidParams, got {other:?}"),
    }
}

#[tokio::test]
async fn absent_required_argument_is_not_a_coercion_error() {
    // Absence reaches the handler as an empty slot; only a present value
    // that fails coercion rejects the call.
    let endpoint = calc_endpoint();
    let deps = TestContextBuilder::new().build();

    let outcome = endpoint
        .dispatch("/calc/add?a=3", None, &RequestContext::anonymous(), &deps)
        .await;

    match outcome {
        DispatchOutcome::Success { payload } => assert_eq!(payload, json!(3)),
        other => panic!("expected Success, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_scope_names_the_scope() {
    let endpoint = admin_endpoint();
    let deps = signed_in_ctx(StaticAuthProvider::signed_in("u1"));

    let outcome = endpoint
        .dispatch(
            "/admin/purge",
            None,
            &RequestContext::with_auth_key("key"),
            &deps,
        )
        .await;

    match outcome {
        DispatchOutcome::AuthFailed { reason } => {
            assert_eq!(reason, "User does not have access to scope admin");
        }
        other => panic!("expected AuthFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn granted_scope_passes_through_to_handler() {
    let endpoint = admin_endpoint();
    let deps = signed_in_ctx(StaticAuthProvider::signed_in("u1").with_scope("admin"));

    let outcome = endpoint
        .dispatch(
            "/admin/purge",
            None,
            &RequestContext::with_auth_key("key"),
            &deps,
        )
        .await;
    assert!(outcome.is_success(), "got {outcome:?}");
}

#[tokio::test]
async fn missing_auth_key_is_rejected_before_method_lookup() {
    // An unknown method plus missing credentials must yield the auth
    // failure: unauthenticated callers learn nothing about the surface.
    let endpoint = admin_endpoint();
    let deps = TestContextBuilder::new().build();

    let outcome = endpoint
        .dispatch(
            "/admin/no_such_method",
            None,
            &RequestContext::anonymous(),
            &deps,
        )
        .await;

    match outcome {
        DispatchOutcome::AuthFailed { reason } => {
            assert_eq!(reason, "authentication required");
        }
        other => panic!("expected AuthFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn invalid_auth_key_is_rejected_before_method_lookup() {
    let endpoint = admin_endpoint();
    let deps = signed_in_ctx(StaticAuthProvider::signed_out());

    let outcome = endpoint
        .dispatch(
            "/admin/no_such_method",
            None,
            &RequestContext::with_auth_key("bogus"),
            &deps,
        )
        .await;

    match outcome {
        DispatchOutcome::AuthFailed { reason } => {
            assert_eq!(reason, "invalid authentication key");
        }
        other => panic!("expected AuthFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_scope_is_rejected_before_method_lookup() {
    let endpoint = admin_endpoint();
    let deps = signed_in_ctx(StaticAuthProvider::signed_in("u1"));

    let outcome = endpoint
        .dispatch(
            "/admin/no_such_method",
            None,
            &RequestContext::with_auth_key("key"),
            &deps,
        )
        .await;

    match outcome {
        DispatchOutcome::AuthFailed { reason } => {
            assert_eq!(reason, "User does not have access to scope admin");
        }
        other => panic!("expected AuthFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn method_name_presence_is_checked_before_auth() {
    let endpoint = admin_endpoint();
    let deps = TestContextBuilder::new().build();

    let outcome = endpoint
        .dispatch("/admin", None, &RequestContext::anonymous(), &deps)
        .await;

    assert!(
        matches!(outcome, DispatchOutcome::InvalidParams { .. }),
        "got {outcome:?}"
    );
}

#[tokio::test]
async fn scope_requirement_without_login_still_needs_sign_in() {
    let endpoint = Endpoint::builder("reports")
        .require_scope("reporting")
        .method(
            MethodBuilder::new("run")
                .param(ParamSpec::session())
                .handler(AddHandler),
        )
        .build(&StubEntityCodec::empty())
        .expect("registration");
    let deps = signed_in_ctx(StaticAuthProvider::signed_out());

    let outcome = endpoint
        .dispatch("/reports/run", None, &RequestContext::anonymous(), &deps)
        .await;

    match outcome {
        DispatchOutcome::AuthFailed { reason } => {
            assert_eq!(reason, "authentication required");
        }
        other => panic!("expected AuthFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn handler_fault_becomes_internal_error_with_log_id() {
    let endpoint = calc_endpoint();
    let sink = Arc::new(RecordingLogSink::with_id("log-77"));
    let deps = TestContextBuilder::new().log_sink(sink.clone()).build();

    let outcome = endpoint
        .dispatch("/calc/explode", None, &RequestContext::anonymous(), &deps)
        .await;

    match outcome {
        DispatchOutcome::InternalError {
            error,
            backtrace: _,
            log_id,
        } => {
            assert!(error.contains("database exploded"), "error = {error}");
            assert_eq!(log_id.as_deref(), Some("log-77"));
        }
        other => panic!("expected InternalError, got {other:?}"),
    }

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].method, "explode");
    assert!(
        records[0]
            .exception
            .as_deref()
            .is_some_and(|e| e.contains("database exploded"))
    );
    assert!(records[0].authenticated_user.is_none());
}

#[tokio::test]
async fn fault_with_logging_disabled_has_no_log_id() {
    let endpoint = calc_builder()
        .log_sessions(false)
        .build(&StubEntityCodec::empty())
        .expect("registration");
    let sink = Arc::new(RecordingLogSink::new());
    let deps = TestContextBuilder::new().log_sink(sink.clone()).build();

    let outcome = endpoint
        .dispatch("/calc/explode", None, &RequestContext::anonymous(), &deps)
        .await;

    match outcome {
        DispatchOutcome::InternalError { log_id, .. } => assert!(log_id.is_none()),
        other => panic!("expected InternalError, got {other:?}"),
    }
    assert_eq!(sink.count(), 0);
}

#[tokio::test]
async fn failing_sink_stores_record_but_yields_no_log_id() {
    let endpoint = calc_endpoint();
    let sink = Arc::new(RecordingLogSink::failing());
    let deps = TestContextBuilder::new().log_sink(sink.clone()).build();

    let outcome = endpoint
        .dispatch("/calc/explode", None, &RequestContext::anonymous(), &deps)
        .await;

    match outcome {
        DispatchOutcome::InternalError { log_id, .. } => assert!(log_id.is_none()),
        other => panic!("expected InternalError, got {other:?}"),
    }
    assert_eq!(sink.count(), 1);
}

#[tokio::test]
async fn status_code_escape_hatch_passes_through() {
    let endpoint = calc_endpoint();
    let deps = TestContextBuilder::new().build();

    let outcome = endpoint
        .dispatch("/calc/teapot", None, &RequestContext::anonymous(), &deps)
        .await;

    match outcome {
        DispatchOutcome::StatusCode { code } => assert_eq!(code, 418),
        other => panic!("expected StatusCode, got {other:?}"),
    }
    assert_eq!(outcome.http_status(), 418);
}

#[tokio::test]
async fn optional_bool_absent_reaches_handler_as_empty() {
    let endpoint = calc_endpoint();
    let deps = TestContextBuilder::new().build();

    let outcome = endpoint
        .dispatch(
            "/calc/greet?name=ada",
            None,
            &RequestContext::anonymous(),
            &deps,
        )
        .await;
    match outcome {
        DispatchOutcome::Success { payload } => {
            assert_eq!(payload, json!({ "name": "ada", "shout": null }));
        }
        other => panic!("expected Success, got {other:?}"),
    }
}

#[tokio::test]
async fn optional_bool_present_must_be_exact_literal() {
    let endpoint = calc_endpoint();
    let deps = TestContextBuilder::new().build();

    let outcome = endpoint
        .dispatch(
            "/calc/greet?name=ada&shout=true",
            None,
            &RequestContext::anonymous(),
            &deps,
        )
        .await;
    match outcome {
        DispatchOutcome::Success { payload } => {
            assert_eq!(payload, json!({ "name": "ada", "shout": true }));
        }
        other => panic!("expected Success, got {other:?}"),
    }

    // "1" never coerces; present-but-malformed rejects the call.
    let outcome = endpoint
        .dispatch(
            "/calc/greet?name=ada&shout=1",
            None,
            &RequestContext::anonymous(),
            &deps,
        )
        .await;
    match outcome {
        DispatchOutcome::InvalidParams { reason } => {
            assert_eq!(reason, "parameter 'shout' expects bool, got '1'");
        }
        other => panic!("expected InvalidParams, got {other:?}"),
    }
}

#[tokio::test]
async fn success_log_record_carries_user_and_audit_state() {
    let endpoint = Endpoint::builder("calc")
        .require_login()
        .method(
            MethodBuilder::new("add")
                .param(ParamSpec::session())
                .param(ParamSpec::int("a"))
                .param(ParamSpec::int("b"))
                .handler(AddHandler),
        )
        .build(&StubEntityCodec::empty())
        .expect("registration");
    let sink = Arc::new(RecordingLogSink::new());
    let deps = TestContextBuilder::new()
        .auth(Arc::new(StaticAuthProvider::signed_in("u42")))
        .log_sink(sink.clone())
        .build();

    let outcome = endpoint
        .dispatch(
            "/calc/add?a=1&b=2",
            None,
            &RequestContext::with_auth_key("key"),
            &deps,
        )
        .await;
    assert!(outcome.is_success(), "got {outcome:?}");

    let records = sink.records();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.endpoint, "calc");
    assert_eq!(record.method, "add");
    assert_eq!(record.queries, vec!["SELECT 1 + 2".to_string()]);
    assert_eq!(record.diagnostic_log, vec!["computed sum".to_string()]);
    assert_eq!(
        record.authenticated_user.as_ref().map(|u| u.id.as_str()),
        Some("u42")
    );
    assert!(record.exception.is_none());
    assert!(record.backtrace.is_none());
}

#[tokio::test]
async fn anonymous_success_record_has_no_user() {
    let endpoint = calc_endpoint();
    let sink = Arc::new(RecordingLogSink::new());
    let deps = TestContextBuilder::new().log_sink(sink.clone()).build();

    let outcome = endpoint
        .dispatch("/calc/add?a=1&b=2", None, &RequestContext::anonymous(), &deps)
        .await;
    assert!(outcome.is_success(), "got {outcome:?}");
    assert!(sink.records()[0].authenticated_user.is_none());
}

#[tokio::test]
async fn resources_are_released_exactly_once_on_every_exit_path() {
    let calc = calc_endpoint();
    let admin = admin_endpoint();
    let factory = Arc::new(CountingResourceFactory::new());
    let deps = TestContextBuilder::new().resources(factory.clone()).build();
    let anon = RequestContext::anonymous();

    // Success, unknown method, missing method name, coercion failure,
    // fault, status short-circuit, and auth rejection.
    calc.dispatch("/calc/add?a=1&b=2", None, &anon, &deps).await;
    calc.dispatch("/calc/frobnicate", None, &anon, &deps).await;
    calc.dispatch("/calc", None, &anon, &deps).await;
    calc.dispatch("/calc/add?a=x", None, &anon, &deps).await;
    calc.dispatch("/calc/explode", None, &anon, &deps).await;
    calc.dispatch("/calc/teapot", None, &anon, &deps).await;
    admin.dispatch("/admin/purge", None, &anon, &deps).await;

    assert_eq!(factory.acquires(), 7);
    assert_eq!(factory.releases(), 7);
}

#[tokio::test]
async fn auth_is_resolved_at_most_once_per_call() {
    let endpoint = admin_endpoint();
    let auth = Arc::new(StaticAuthProvider::signed_in("u1").with_scope("admin"));
    let deps = TestContextBuilder::new().auth(auth.clone()).build();

    let outcome = endpoint
        .dispatch(
            "/admin/purge",
            None,
            &RequestContext::with_auth_key("key"),
            &deps,
        )
        .await;
    assert!(outcome.is_success(), "got {outcome:?}");

    // Login and scope checks share the session caches.
    assert_eq!(auth.sign_in_checks(), 1);
    assert_eq!(auth.scope_resolutions(), 1);
}

#[tokio::test]
async fn entity_parameter_flows_through_codec() {
    struct EchoDoc;

    #[async_trait]
    impl MethodHandler for EchoDoc {
        async fn invoke(
            &self,
            _session: &mut Session,
            args: ArgSet,
        ) -> Result<serde_json::Value, HandlerError> {
            let doc = args
                .get("doc")
                .and_then(|v| v.as_entity())
                .cloned()
                .unwrap_or(serde_json::Value::Null);
            Ok(doc)
        }
    }

    let codec = Arc::new(StubEntityCodec::with_types(["Document"]));
    let endpoint = Endpoint::builder("docs")
        .method(
            MethodBuilder::new("echo")
                .param(ParamSpec::session())
                .param(ParamSpec::entity("doc", "Document"))
                .handler(EchoDoc),
        )
        .build(codec.as_ref())
        .expect("registration");
    let deps = TestContextBuilder::new().codec(codec).build();

    let outcome = endpoint
        .dispatch(
            "/docs/echo?doc=%7B%22title%22%3A%22notes%22%7D",
            None,
            &RequestContext::anonymous(),
            &deps,
        )
        .await;
    match outcome {
        DispatchOutcome::Success { payload } => {
            assert_eq!(payload, json!({ "title": "notes" }));
        }
        other => panic!("expected Success, got {other:?}"),
    }
}

#[tokio::test]
async fn call_time_codec_failure_is_invalid_params_not_fault() {
    let codec = Arc::new(StubEntityCodec::empty().with_failing_type("Document"));
    let endpoint = Endpoint::builder("docs")
        .method(
            MethodBuilder::new("save")
                .param(ParamSpec::session())
                .param(ParamSpec::entity("doc", "Document"))
                .handler(AddHandler),
        )
        .build(codec.as_ref())
        .expect("registration");
    let deps = TestContextBuilder::new().codec(codec).build();

    let outcome = endpoint
        .dispatch(
            "/docs/save?doc=%7B%7D",
            None,
            &RequestContext::anonymous(),
            &deps,
        )
        .await;
    match outcome {
        DispatchOutcome::InvalidParams { reason } => {
            assert!(reason.contains("'doc'"), "reason = {reason}");
        }
        other => panic!("expected InvalidParams, got {other:?}"),
    }
}
