//! Render-capable functions: prompt rendering followed by a completion call.
//!
//! Rendering may itself invoke nested functions that taint the context, so
//! trust is checked twice: once before rendering and again on the rendered
//! prompt. The completion inherits the post-render verdict.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{Function, FunctionDescriptor};
use crate::context::{ExecutionContext, InvocationError};
use crate::trust::{DefaultTrustPolicy, TrustPolicy};

/// Renders a prompt from the context. Provided by the template subsystem.
#[async_trait]
pub trait PromptRenderer: Send + Sync {
    /// Render the prompt. May run nested functions against `context`.
    async fn render(&self, context: &ExecutionContext) -> anyhow::Result<String>;
}

/// Turns a rendered prompt into a completion. Provided by a backend client.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Complete `prompt`.
    async fn complete(&self, prompt: &str, cancel: &CancellationToken) -> anyhow::Result<String>;
}

/// A semantic function adapted to [`Function`].
pub struct SemanticFunction {
    descriptor: FunctionDescriptor,
    renderer: Arc<dyn PromptRenderer>,
    backend: Arc<dyn CompletionBackend>,
    policy: Arc<dyn TrustPolicy>,
}

impl std::fmt::Debug for SemanticFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SemanticFunction")
            .field("function", &self.descriptor.qualified_name())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl SemanticFunction {
    /// Create a semantic function under the default trust policy.
    pub fn new(
        descriptor: FunctionDescriptor,
        renderer: Arc<dyn PromptRenderer>,
        backend: Arc<dyn CompletionBackend>,
    ) -> Self {
        Self {
            descriptor: descriptor.semantic(true),
            renderer,
            backend,
            policy: Arc::new(DefaultTrustPolicy::default()),
        }
    }

    /// Replace the trust policy.
    #[must_use]
    pub fn with_policy(mut self, policy: Arc<dyn TrustPolicy>) -> Self {
        self.policy = policy;
        self
    }

    fn failed(&self, cause: anyhow::Error) -> InvocationError {
        warn!(
            skill = self.descriptor.skill_name(),
            function = self.descriptor.function_name(),
            error = %cause,
            "semantic function failed"
        );
        InvocationError::Failed {
            skill: self.descriptor.skill_name().to_owned(),
            function: self.descriptor.function_name().to_owned(),
            cause,
        }
    }
}

#[async_trait]
impl Function for SemanticFunction {
    fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    async fn invoke(
        &self,
        mut context: ExecutionContext,
        cancel: &CancellationToken,
    ) -> ExecutionContext {
        let descriptor = &self.descriptor;

        if let Err(err) = self.policy.validate(descriptor, &context) {
            context.fail(err.into());
            return context;
        }

        let prompt = match self.renderer.render(&context).await {
            Ok(prompt) => prompt,
            Err(cause) => {
                let err = self.failed(cause);
                context.fail(err);
                return context;
            }
        };

        // Second checkpoint: rendering may have tainted the context.
        let prompt = match self.policy.validate_rendered(descriptor, &context, prompt) {
            Ok(prompt) => prompt,
            Err(err) => {
                context.fail(err.into());
                return context;
            }
        };

        debug!(
            run_id = %context.run_id(),
            skill = descriptor.skill_name(),
            function = descriptor.function_name(),
            trusted = prompt.is_trusted(),
            "prompt rendered"
        );

        match self.backend.complete(prompt.content(), cancel).await {
            Ok(completion) => {
                let trusted = prompt.is_trusted() && !descriptor.force_output_untrusted();
                context
                    .variables()
                    .update_main_preserving_trust(completion, trusted);
            }
            Err(cause) => {
                let err = self.failed(cause);
                context.fail(err);
            }
        }
        context
    }
}
