//! Native callables bound to the canonical contract.
//!
//! [`NativeFn`] is a closed union over input shape × output shape ×
//! sync/async. Each constructor is strongly typed, so the shape is known the
//! moment the body is built and never has to be discovered at call time.
//!
//! Output trust rules:
//! - nothing returned: main slot keeps its content, trust becomes
//!   `main ∧ verdict ∧ ¬force`
//! - text returned: the text becomes the main slot with that same trust;
//!   the text itself carries no trust signal
//! - context returned: it replaces the caller's context wholesale, trust and
//!   error state included; no further downgrade is applied

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::shape::{InputShape, OutputShape, Shape, Signature};
use super::{Function, FunctionDescriptor, FunctionError};
use crate::context::{ExecutionContext, InvocationError};
use crate::trust::{DefaultTrustPolicy, TrustPolicy};

/// Boxed future returned by asynchronous bodies.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = anyhow::Result<T>> + Send + 'static>>;

type NullaryFn<O> = Box<dyn Fn() -> anyhow::Result<O> + Send + Sync>;
type TextFn<O> = Box<dyn Fn(&str) -> anyhow::Result<O> + Send + Sync>;
type ContextFn<O> = Box<dyn Fn(&ExecutionContext) -> anyhow::Result<O> + Send + Sync>;
type TextContextFn<O> = Box<dyn Fn(&str, &ExecutionContext) -> anyhow::Result<O> + Send + Sync>;

type AsyncNullaryFn<O> = Box<dyn Fn(CancellationToken) -> BoxFuture<O> + Send + Sync>;
type AsyncTextFn<O> = Box<dyn Fn(String, CancellationToken) -> BoxFuture<O> + Send + Sync>;
type AsyncContextFn<O> =
    Box<dyn Fn(ExecutionContext, CancellationToken) -> BoxFuture<O> + Send + Sync>;
type AsyncTextContextFn<O> =
    Box<dyn Fn(String, ExecutionContext, CancellationToken) -> BoxFuture<O> + Send + Sync>;

enum Body<O> {
    Nothing(NullaryFn<O>),
    Text(TextFn<O>),
    Context(ContextFn<O>),
    TextAndContext(TextContextFn<O>),
    AsyncNothing(AsyncNullaryFn<O>),
    AsyncText(AsyncTextFn<O>),
    AsyncContext(AsyncContextFn<O>),
    AsyncTextAndContext(AsyncTextContextFn<O>),
}

impl<O: Send + 'static> Body<O> {
    fn input(&self) -> InputShape {
        match self {
            Self::Nothing(_) | Self::AsyncNothing(_) => InputShape::Nothing,
            Self::Text(_) | Self::AsyncText(_) => InputShape::Text,
            Self::Context(_) | Self::AsyncContext(_) => InputShape::Context,
            Self::TextAndContext(_) | Self::AsyncTextAndContext(_) => InputShape::TextAndContext,
        }
    }

    fn is_async(&self) -> bool {
        matches!(
            self,
            Self::AsyncNothing(_)
                | Self::AsyncText(_)
                | Self::AsyncContext(_)
                | Self::AsyncTextAndContext(_)
        )
    }

    /// Asynchronous bodies receive a shared handle onto the caller's store,
    /// so their writes land in the caller's context.
    async fn call(
        &self,
        context: &ExecutionContext,
        cancel: &CancellationToken,
    ) -> anyhow::Result<O> {
        match self {
            Self::Nothing(f) => f(),
            Self::Text(f) => f(&context.result()),
            Self::Context(f) => f(context),
            Self::TextAndContext(f) => f(&context.result(), context),
            Self::AsyncNothing(f) => f(cancel.clone()).await,
            Self::AsyncText(f) => f(context.result(), cancel.clone()).await,
            Self::AsyncContext(f) => f(context.share(), cancel.clone()).await,
            Self::AsyncTextAndContext(f) => {
                f(context.result(), context.share(), cancel.clone()).await
            }
        }
    }
}

enum Output {
    Unit(Body<()>),
    Text(Body<String>),
    Context(Body<ExecutionContext>),
}

/// A native callable of known shape.
pub struct NativeFn {
    output: Output,
}

impl std::fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeFn")
            .field("shape", &self.shape())
            .finish()
    }
}

impl NativeFn {
    /// Shape of the bound body.
    pub fn shape(&self) -> Shape {
        let (input, output, asynchronous) = match &self.output {
            Output::Unit(body) => (body.input(), OutputShape::Nothing, body.is_async()),
            Output::Text(body) => (body.input(), OutputShape::Text, body.is_async()),
            Output::Context(body) => (body.input(), OutputShape::Context, body.is_async()),
        };
        Shape {
            input,
            output,
            asynchronous,
        }
    }

    // ── Synchronous, returning nothing ──

    /// `() -> ()`
    pub fn sync_nothing_to_unit<F>(f: F) -> Self
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self::unit(Body::Nothing(Box::new(f)))
    }

    /// `(input) -> ()`
    pub fn sync_text_to_unit<F>(f: F) -> Self
    where
        F: Fn(&str) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self::unit(Body::Text(Box::new(f)))
    }

    /// `(context) -> ()`
    pub fn sync_context_to_unit<F>(f: F) -> Self
    where
        F: Fn(&ExecutionContext) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self::unit(Body::Context(Box::new(f)))
    }

    /// `(input, context) -> ()`
    pub fn sync_text_and_context_to_unit<F>(f: F) -> Self
    where
        F: Fn(&str, &ExecutionContext) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self::unit(Body::TextAndContext(Box::new(f)))
    }

    // ── Synchronous, returning text ──

    /// `() -> text`
    pub fn sync_nothing_to_text<F>(f: F) -> Self
    where
        F: Fn() -> anyhow::Result<String> + Send + Sync + 'static,
    {
        Self::text(Body::Nothing(Box::new(f)))
    }

    /// `(input) -> text`
    pub fn sync_text_to_text<F>(f: F) -> Self
    where
        F: Fn(&str) -> anyhow::Result<String> + Send + Sync + 'static,
    {
        Self::text(Body::Text(Box::new(f)))
    }

    /// `(context) -> text`
    pub fn sync_context_to_text<F>(f: F) -> Self
    where
        F: Fn(&ExecutionContext) -> anyhow::Result<String> + Send + Sync + 'static,
    {
        Self::text(Body::Context(Box::new(f)))
    }

    /// `(input, context) -> text`
    pub fn sync_text_and_context_to_text<F>(f: F) -> Self
    where
        F: Fn(&str, &ExecutionContext) -> anyhow::Result<String> + Send + Sync + 'static,
    {
        Self::text(Body::TextAndContext(Box::new(f)))
    }

    // ── Synchronous, returning a replacement context ──

    /// `() -> context`
    pub fn sync_nothing_to_context<F>(f: F) -> Self
    where
        F: Fn() -> anyhow::Result<ExecutionContext> + Send + Sync + 'static,
    {
        Self::context(Body::Nothing(Box::new(f)))
    }

    /// `(input) -> context`
    pub fn sync_text_to_context<F>(f: F) -> Self
    where
        F: Fn(&str) -> anyhow::Result<ExecutionContext> + Send + Sync + 'static,
    {
        Self::context(Body::Text(Box::new(f)))
    }

    /// `(context) -> context`
    pub fn sync_context_to_context<F>(f: F) -> Self
    where
        F: Fn(&ExecutionContext) -> anyhow::Result<ExecutionContext> + Send + Sync + 'static,
    {
        Self::context(Body::Context(Box::new(f)))
    }

    /// `(input, context) -> context`
    pub fn sync_text_and_context_to_context<F>(f: F) -> Self
    where
        F: Fn(&str, &ExecutionContext) -> anyhow::Result<ExecutionContext>
            + Send
            + Sync
            + 'static,
    {
        Self::context(Body::TextAndContext(Box::new(f)))
    }

    // ── Asynchronous ──

    /// `async (cancel) -> ()`
    pub fn async_nothing_to_unit<F, Fut>(f: F) -> Self
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self::unit(Body::AsyncNothing(Box::new(move |c| {
            Box::pin(f(c)) as BoxFuture<_>
        })))
    }

    /// `async (input, cancel) -> ()`
    pub fn async_text_to_unit<F, Fut>(f: F) -> Self
    where
        F: Fn(String, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self::unit(Body::AsyncText(Box::new(move |s, c| {
            Box::pin(f(s, c)) as BoxFuture<_>
        })))
    }

    /// `async (context, cancel) -> ()`
    pub fn async_context_to_unit<F, Fut>(f: F) -> Self
    where
        F: Fn(ExecutionContext, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self::unit(Body::AsyncContext(Box::new(move |x, c| {
            Box::pin(f(x, c)) as BoxFuture<_>
        })))
    }

    /// `async (input, context, cancel) -> ()`
    pub fn async_text_and_context_to_unit<F, Fut>(f: F) -> Self
    where
        F: Fn(String, ExecutionContext, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self::unit(Body::AsyncTextAndContext(Box::new(move |s, x, c| {
            Box::pin(f(s, x, c)) as BoxFuture<_>
        })))
    }

    /// `async (cancel) -> text`
    pub fn async_nothing_to_text<F, Fut>(f: F) -> Self
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<String>> + Send + 'static,
    {
        Self::text(Body::AsyncNothing(Box::new(move |c| {
            Box::pin(f(c)) as BoxFuture<_>
        })))
    }

    /// `async (input, cancel) -> text`
    pub fn async_text_to_text<F, Fut>(f: F) -> Self
    where
        F: Fn(String, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<String>> + Send + 'static,
    {
        Self::text(Body::AsyncText(Box::new(move |s, c| {
            Box::pin(f(s, c)) as BoxFuture<_>
        })))
    }

    /// `async (context, cancel) -> text`
    pub fn async_context_to_text<F, Fut>(f: F) -> Self
    where
        F: Fn(ExecutionContext, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<String>> + Send + 'static,
    {
        Self::text(Body::AsyncContext(Box::new(move |x, c| {
            Box::pin(f(x, c)) as BoxFuture<_>
        })))
    }

    /// `async (input, context, cancel) -> text`
    pub fn async_text_and_context_to_text<F, Fut>(f: F) -> Self
    where
        F: Fn(String, ExecutionContext, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<String>> + Send + 'static,
    {
        Self::text(Body::AsyncTextAndContext(Box::new(move |s, x, c| {
            Box::pin(f(s, x, c)) as BoxFuture<_>
        })))
    }

    /// `async (cancel) -> context`
    pub fn async_nothing_to_context<F, Fut>(f: F) -> Self
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<ExecutionContext>> + Send + 'static,
    {
        Self::context(Body::AsyncNothing(Box::new(move |c| {
            Box::pin(f(c)) as BoxFuture<_>
        })))
    }

    /// `async (input, cancel) -> context`
    pub fn async_text_to_context<F, Fut>(f: F) -> Self
    where
        F: Fn(String, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<ExecutionContext>> + Send + 'static,
    {
        Self::context(Body::AsyncText(Box::new(move |s, c| {
            Box::pin(f(s, c)) as BoxFuture<_>
        })))
    }

    /// `async (context, cancel) -> context`
    pub fn async_context_to_context<F, Fut>(f: F) -> Self
    where
        F: Fn(ExecutionContext, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<ExecutionContext>> + Send + 'static,
    {
        Self::context(Body::AsyncContext(Box::new(move |x, c| {
            Box::pin(f(x, c)) as BoxFuture<_>
        })))
    }

    /// `async (input, context, cancel) -> context`
    pub fn async_text_and_context_to_context<F, Fut>(f: F) -> Self
    where
        F: Fn(String, ExecutionContext, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<ExecutionContext>> + Send + 'static,
    {
        Self::context(Body::AsyncTextAndContext(Box::new(move |s, x, c| {
            Box::pin(f(s, x, c)) as BoxFuture<_>
        })))
    }

    fn unit(body: Body<()>) -> Self {
        Self {
            output: Output::Unit(body),
        }
    }

    fn text(body: Body<String>) -> Self {
        Self {
            output: Output::Text(body),
        }
    }

    fn context(body: Body<ExecutionContext>) -> Self {
        Self {
            output: Output::Context(body),
        }
    }
}

/// A native callable adapted to [`Function`].
pub struct NativeFunction {
    descriptor: FunctionDescriptor,
    body: NativeFn,
    policy: Arc<dyn TrustPolicy>,
}

impl std::fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeFunction")
            .field("function", &self.descriptor.qualified_name())
            .field("shape", &self.body.shape())
            .field("policy", &self.policy)
            .finish()
    }
}

impl NativeFunction {
    /// Adapt a body under the default trust policy.
    pub fn new(descriptor: FunctionDescriptor, body: NativeFn) -> Self {
        Self {
            descriptor: descriptor.semantic(false),
            body,
            policy: Arc::new(DefaultTrustPolicy::default()),
        }
    }

    /// Adapt a body whose signature was declared separately, e.g. by a
    /// skill manifest. The declaration is classified once, here.
    ///
    /// # Errors
    ///
    /// [`FunctionError::UnsupportedFunctionShape`] when the declared
    /// signature is outside the closed set, [`FunctionError::ShapeMismatch`]
    /// when it classifies but disagrees with the body.
    pub fn bind(
        descriptor: FunctionDescriptor,
        signature: &Signature,
        body: NativeFn,
    ) -> Result<Self, FunctionError> {
        let declared = signature.classify(&descriptor.qualified_name())?;
        let actual = body.shape();
        if declared != actual {
            return Err(FunctionError::ShapeMismatch {
                function: descriptor.qualified_name(),
                declared,
                actual,
            });
        }
        Ok(Self::new(descriptor, body))
    }

    /// Replace the trust policy.
    #[must_use]
    pub fn with_policy(mut self, policy: Arc<dyn TrustPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Shape of the bound body.
    pub fn shape(&self) -> Shape {
        self.body.shape()
    }

    fn failed(&self, cause: anyhow::Error) -> InvocationError {
        InvocationError::Failed {
            skill: self.descriptor.skill_name().to_owned(),
            function: self.descriptor.function_name().to_owned(),
            cause,
        }
    }
}

#[async_trait]
impl Function for NativeFunction {
    fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    async fn invoke(
        &self,
        mut context: ExecutionContext,
        cancel: &CancellationToken,
    ) -> ExecutionContext {
        let descriptor = &self.descriptor;

        let verdict = match self.policy.validate(descriptor, &context) {
            Ok(verdict) => verdict,
            Err(err) => {
                context.fail(err.into());
                return context;
            }
        };
        let output_trusted = verdict && !descriptor.force_output_untrusted();

        debug!(
            run_id = %context.run_id(),
            skill = descriptor.skill_name(),
            function = descriptor.function_name(),
            verdict,
            "invoking native function"
        );

        let outcome = match &self.body.output {
            Output::Unit(body) => body.call(&context, cancel).await.map(|()| {
                if !output_trusted {
                    context.untrust_result();
                }
                None
            }),
            Output::Text(body) => body.call(&context, cancel).await.map(|text| {
                context
                    .variables()
                    .update_main_preserving_trust(text, output_trusted);
                None
            }),
            Output::Context(body) => body.call(&context, cancel).await.map(Some),
        };

        match outcome {
            Ok(Some(replacement)) => replacement,
            Ok(None) => context,
            Err(cause) => {
                warn!(
                    run_id = %context.run_id(),
                    skill = descriptor.skill_name(),
                    function = descriptor.function_name(),
                    error = %cause,
                    "native function failed"
                );
                let err = self.failed(cause);
                context.fail(err);
                context
            }
        }
    }
}
