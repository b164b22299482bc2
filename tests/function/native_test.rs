//! Native adapter tests: trust gating, output trust, error folding.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use trustflow::context::{ExecutionContext, InvocationError};
use trustflow::function::{
    Function, FunctionDescriptor, FunctionError, NativeFn, NativeFunction, ParamKind,
    ReturnKind, Signature,
};
use trustflow::taint::{TaintedValue, MAIN_KEY};
use trustflow::trust::{DefaultTrustPolicy, TrustError};

fn descriptor(name: &str) -> FunctionDescriptor {
    FunctionDescriptor::new("test", name)
}

fn upper() -> NativeFn {
    NativeFn::sync_text_to_text(|input| Ok(input.to_uppercase()))
}

// ---------- sensitive gating ----------

#[tokio::test]
async fn sensitive_function_never_runs_on_untrusted_context() {
    let ran = Arc::new(AtomicBool::new(false));
    let marker = Arc::clone(&ran);
    let function = NativeFunction::new(
        descriptor("send").sensitive(true),
        NativeFn::sync_text_to_unit(move |_| {
            marker.store(true, Ordering::SeqCst);
            Ok(())
        }),
    );

    let ctx = ExecutionContext::from_input(TaintedValue::untrusted("hello"));
    let ctx = function.invoke(ctx, &CancellationToken::new()).await;

    assert!(!ran.load(Ordering::SeqCst), "side effect must not happen");
    assert!(ctx.is_trust_violation());
    assert!(matches!(
        ctx.last_error(),
        Some(InvocationError::Untrusted(
            TrustError::SensitiveOperationWithUntrustedContent { .. }
        ))
    ));
    assert_eq!(ctx.result(), "hello");
}

#[tokio::test]
async fn sensitive_function_blocked_by_any_untrusted_slot() {
    let function = NativeFunction::new(descriptor("send").sensitive(true), upper());
    let ctx = ExecutionContext::from_input("trusted main");
    ctx.variables()
        .set("attachment", Some("from the web".to_owned()), false);

    let ctx = function.invoke(ctx, &CancellationToken::new()).await;
    assert!(ctx.is_trust_violation());
    assert_eq!(ctx.result(), "trusted main");
}

#[tokio::test]
async fn sensitive_function_runs_on_trusted_context() {
    let function = NativeFunction::new(descriptor("send").sensitive(true), upper());
    let ctx = function
        .invoke_text("ok", &CancellationToken::new())
        .await;
    assert!(!ctx.error_occurred());
    assert_eq!(ctx.variables().main(), TaintedValue::trusted("OK"));
}

// ---------- output trust ----------

#[tokio::test]
async fn text_output_inherits_untrusted_input() {
    let function = NativeFunction::new(descriptor("upper"), upper());
    let ctx = ExecutionContext::from_input(TaintedValue::untrusted("abc"));
    let ctx = function.invoke(ctx, &CancellationToken::new()).await;

    assert!(!ctx.error_occurred());
    assert_eq!(ctx.variables().main(), TaintedValue::untrusted("ABC"));
}

#[tokio::test]
async fn forced_untrusted_output_keeps_computed_value() {
    let function = NativeFunction::new(
        descriptor("upper").with_force_output_untrusted(true),
        upper(),
    );
    let ctx = function
        .invoke_text("abc", &CancellationToken::new())
        .await;

    assert!(!ctx.error_occurred());
    assert_eq!(ctx.variables().main(), TaintedValue::untrusted("ABC"));
}

#[tokio::test]
async fn force_flag_flip_applies_on_next_invocation() {
    let function = NativeFunction::new(descriptor("upper"), upper());
    let first = function.invoke_text("a", &CancellationToken::new()).await;
    assert!(first.is_trusted());

    function.descriptor().set_force_output_untrusted(true);
    let second = function.invoke_text("a", &CancellationToken::new()).await;
    assert!(!second.is_trusted());
}

#[tokio::test]
async fn unit_output_downgrades_main_only() {
    let function = NativeFunction::new(
        descriptor("noop").with_force_output_untrusted(true),
        NativeFn::sync_nothing_to_unit(|| Ok(())),
    );
    let ctx = ExecutionContext::from_input("main");
    ctx.variables().insert("other", "o");

    let ctx = function.invoke(ctx, &CancellationToken::new()).await;
    assert_eq!(ctx.variables().main(), TaintedValue::untrusted("main"));
    assert_eq!(ctx.variables().get("other"), TaintedValue::trusted("o"));
}

#[tokio::test]
async fn default_untrusted_policy_downgrades_output() {
    let function = NativeFunction::new(descriptor("upper"), upper())
        .with_policy(Arc::new(DefaultTrustPolicy::new(false)));
    let ctx = function.invoke_text("a", &CancellationToken::new()).await;
    assert!(!ctx.error_occurred());
    assert_eq!(ctx.variables().main(), TaintedValue::untrusted("A"));
}

// ---------- context-returning ----------

#[tokio::test]
async fn replacement_context_is_isolated_from_the_original() {
    let function = NativeFunction::new(
        descriptor("fresh"),
        NativeFn::sync_context_to_context(|ctx: &ExecutionContext| {
            let next = ExecutionContext::from_input(TaintedValue::trusted("replaced"));
            next.variables().set_value("copied", ctx.variables().main());
            Ok(next)
        }),
    );

    let original = ExecutionContext::from_input("first");
    let kept = original.share();
    let returned = function.invoke(original, &CancellationToken::new()).await;

    assert_eq!(returned.result(), "replaced");
    assert!(!returned.shares_store_with(&kept));

    returned.variables().insert("later", "x");
    assert!(!kept.variables().contains("later"));
    assert!(!kept.variables().contains("copied"));

    kept.variables().insert("back", "y");
    assert!(!returned.variables().contains("back"));
}

#[tokio::test]
async fn replacement_context_trust_is_taken_as_returned() {
    let function = NativeFunction::new(
        descriptor("clean").with_force_output_untrusted(true),
        NativeFn::sync_nothing_to_context(|| {
            Ok(ExecutionContext::from_input(TaintedValue::trusted("clean")))
        }),
    );
    let ctx = ExecutionContext::from_input(TaintedValue::untrusted("dirty"));
    let ctx = function.invoke(ctx, &CancellationToken::new()).await;
    assert!(ctx.is_trusted());
    assert_eq!(ctx.result(), "clean");
}

// ---------- async bodies ----------

#[tokio::test]
async fn async_context_body_writes_into_caller_store() {
    let function = NativeFunction::new(
        descriptor("annotate"),
        NativeFn::async_text_and_context_to_unit(|input, ctx, _cancel| async move {
            ctx.variables().insert("seen", input);
            Ok(())
        }),
    );
    let ctx = function
        .invoke_text("payload", &CancellationToken::new())
        .await;
    assert!(!ctx.error_occurred());
    assert_eq!(ctx.variables().get("seen"), TaintedValue::trusted("payload"));
}

#[tokio::test]
async fn async_body_receives_cancellation_token() {
    let function = NativeFunction::new(
        descriptor("watch"),
        NativeFn::async_nothing_to_text(|cancel| async move {
            Ok(cancel.is_cancelled().to_string())
        }),
    );
    let cancel = CancellationToken::new();
    cancel.cancel();
    let ctx = function.invoke_text("", &cancel).await;
    assert_eq!(ctx.result(), "true");
}

// ---------- failures ----------

#[tokio::test]
async fn callable_error_is_recorded_not_thrown() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let function = NativeFunction::new(
        descriptor("boom"),
        NativeFn::sync_text_to_text(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("disk on fire")
        }),
    );

    let ctx = function.invoke_text("in", &CancellationToken::new()).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(ctx.error_occurred());
    assert!(!ctx.is_trust_violation());
    assert!(ctx.last_error_description().contains("test.boom"));
    assert!(ctx.last_error_description().contains("disk on fire"));
    assert_eq!(ctx.result(), "in");
    assert!(matches!(
        ctx.last_error(),
        Some(InvocationError::Failed { .. })
    ));
}

// ---------- binding ----------

#[test]
fn bind_accepts_matching_signature() {
    let signature = Signature {
        params: vec![ParamKind::Input],
        returns: ReturnKind::Text,
        asynchronous: false,
    };
    let function = NativeFunction::bind(descriptor("upper"), &signature, upper())
        .expect("shapes agree");
    assert!(!function.descriptor().is_semantic());
}

#[test]
fn bind_rejects_mismatched_body() {
    let signature = Signature {
        params: vec![ParamKind::Context],
        returns: ReturnKind::Text,
        asynchronous: false,
    };
    let err = NativeFunction::bind(descriptor("upper"), &signature, upper())
        .expect_err("shapes disagree");
    assert!(matches!(err, FunctionError::ShapeMismatch { .. }));
}

#[test]
fn bind_rejects_unsupported_signature() {
    let signature = Signature {
        params: vec![ParamKind::Other {
            type_name: "i32".to_owned(),
        }],
        returns: ReturnKind::Text,
        asynchronous: false,
    };
    let err = NativeFunction::bind(descriptor("weird"), &signature, upper())
        .expect_err("outside the closed set");
    assert!(matches!(
        err,
        FunctionError::UnsupportedFunctionShape { .. }
    ));
    assert!(err.to_string().contains("test.weird"));
}

#[tokio::test]
async fn main_slot_key_is_used_for_input() {
    let function = NativeFunction::new(descriptor("upper"), upper());
    let ctx = ExecutionContext::from_input("x");
    ctx.variables().insert(MAIN_KEY, "from slot");
    let ctx = function.invoke(ctx, &CancellationToken::new()).await;
    assert_eq!(ctx.result(), "FROM SLOT");
}
