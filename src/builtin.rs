//! Built-in demonstration functions used by the CLI.
//!
//! Each one exercises a different shape or trust flag:
//!
//! | name      | shape                          | flags                    |
//! |-----------|--------------------------------|--------------------------|
//! | `upper`   | `(input) -> text`              |                          |
//! | `lower`   | `(input) -> text`              |                          |
//! | `trim`    | `(input) -> text`              |                          |
//! | `echo`    | `(input, context) -> ()`       |                          |
//! | `publish` | `(input) -> ()`                | sensitive                |
//! | `fetch`   | `async (input, cancel) -> text`| force-untrusted output   |
//! | `reset`   | `() -> context`                |                          |

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::context::ExecutionContext;
use crate::function::{Function, FunctionDescriptor, NativeFn, NativeFunction, ParameterView};
use crate::taint::{TaintedValue, MAIN_KEY};
use crate::trust::{TrustConfig, TrustPolicy};

/// Skill name shared by all built-ins.
pub const SKILL: &str = "builtin";

/// Names accepted by [`lookup`].
pub const NAMES: &[&str] = &["upper", "lower", "trim", "echo", "publish", "fetch", "reset"];

/// Variable written by `echo`.
pub const ECHO_KEY: &str = "echo";

/// Simulated round trip of `fetch`.
pub const FETCH_LATENCY: Duration = Duration::from_millis(10);

fn input_parameter() -> ParameterView {
    ParameterView {
        name: MAIN_KEY.to_owned(),
        description: "Main input".to_owned(),
        default_value: None,
    }
}

fn native(descriptor: FunctionDescriptor, body: NativeFn) -> (FunctionDescriptor, NativeFn) {
    (descriptor.parameter(input_parameter()), body)
}

/// Build a built-in by name, with `trust` overrides and policy applied.
pub fn lookup(name: &str, trust: &TrustConfig) -> Option<Arc<dyn Function>> {
    let (descriptor, body) = match name {
        "upper" => native(
            FunctionDescriptor::new(SKILL, "upper").description("Uppercase the input"),
            NativeFn::sync_text_to_text(|input| Ok(input.to_uppercase())),
        ),
        "lower" => native(
            FunctionDescriptor::new(SKILL, "lower").description("Lowercase the input"),
            NativeFn::sync_text_to_text(|input| Ok(input.to_lowercase())),
        ),
        "trim" => native(
            FunctionDescriptor::new(SKILL, "trim").description("Trim surrounding whitespace"),
            NativeFn::sync_text_to_text(|input| Ok(input.trim().to_owned())),
        ),
        "echo" => native(
            FunctionDescriptor::new(SKILL, "echo")
                .description("Copy the input into the echo variable"),
            NativeFn::sync_text_and_context_to_unit(|input, context: &ExecutionContext| {
                let trusted = context.variables().main().is_trusted();
                context
                    .variables()
                    .set_value(ECHO_KEY, TaintedValue::new(input, trusted));
                Ok(())
            }),
        ),
        "publish" => native(
            FunctionDescriptor::new(SKILL, "publish")
                .description("Publish the input to an external audience")
                .sensitive(true),
            NativeFn::sync_text_to_unit(|input| {
                info!(bytes = input.len(), "published");
                Ok(())
            }),
        ),
        "fetch" => native(
            FunctionDescriptor::new(SKILL, "fetch")
                .description("Fetch remote content for the input")
                .with_force_output_untrusted(true),
            // Runs to completion; the pipeline observes cancellation afterwards.
            NativeFn::async_text_to_text(|input, _cancel| async move {
                tokio::time::sleep(FETCH_LATENCY).await;
                Ok(format!("fetched: {input}"))
            }),
        ),
        "reset" => (
            FunctionDescriptor::new(SKILL, "reset")
                .description("Replace the context with a fresh, trusted one"),
            NativeFn::sync_nothing_to_context(|| {
                Ok(ExecutionContext::from_input(TaintedValue::trusted("")))
            }),
        ),
        _ => return None,
    };

    let policy: Arc<dyn TrustPolicy> = Arc::new(trust.policy());
    let descriptor = trust.apply_overrides(descriptor);
    let function: Arc<dyn Function> =
        Arc::new(NativeFunction::new(descriptor, body).with_policy(policy));
    Some(function)
}
