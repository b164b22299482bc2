//! Sequential pipeline: threads one context through a list of functions.
//!
//! Steps run strictly in order; step `i + 1` starts only after step `i` has
//! returned its context. Cancellation is cooperative and observed at step
//! boundaries only: a running step finishes, the next one never starts.
//! A step that reports an error ends the run.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::context::{ExecutionContext, InvocationError};
use crate::function::Function;
use crate::taint::TaintedValue;

/// Pipeline construction errors.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// More steps than the configured limit.
    #[error("pipeline would have {steps} steps, limit is {limit}")]
    TooManySteps {
        /// Requested step count.
        steps: usize,
        /// Configured limit.
        limit: usize,
    },
}

/// An ordered list of functions run against one starting context.
#[derive(Clone)]
pub struct Pipeline {
    steps: Vec<Arc<dyn Function>>,
    max_steps: usize,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self
            .steps
            .iter()
            .map(|step| step.descriptor().qualified_name())
            .collect();
        f.debug_struct("Pipeline")
            .field("steps", &names)
            .field("max_steps", &self.max_steps)
            .finish()
    }
}

impl Pipeline {
    /// Empty pipeline bounded by `config.max_steps`.
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            steps: Vec::new(),
            max_steps: config.max_steps,
        }
    }

    /// Pipeline over the given steps.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::TooManySteps`] when `steps` exceeds the limit.
    pub fn from_steps(
        steps: Vec<Arc<dyn Function>>,
        config: &PipelineConfig,
    ) -> Result<Self, PipelineError> {
        if steps.len() > config.max_steps {
            return Err(PipelineError::TooManySteps {
                steps: steps.len(),
                limit: config.max_steps,
            });
        }
        Ok(Self {
            steps,
            max_steps: config.max_steps,
        })
    }

    /// Append a step.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::TooManySteps`] when the pipeline is full.
    pub fn push(&mut self, step: Arc<dyn Function>) -> Result<(), PipelineError> {
        if self.steps.len() >= self.max_steps {
            return Err(PipelineError::TooManySteps {
                steps: self.steps.len().saturating_add(1),
                limit: self.max_steps,
            });
        }
        self.steps.push(step);
        Ok(())
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the pipeline has no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run every step against `context`.
    pub async fn run(
        &self,
        context: ExecutionContext,
        cancel: &CancellationToken,
    ) -> ExecutionContext {
        run(context, &self.steps, cancel).await
    }

    /// Run every step against a fresh context seeded with `input`.
    pub async fn run_input(
        &self,
        input: TaintedValue,
        cancel: &CancellationToken,
    ) -> ExecutionContext {
        self.run(ExecutionContext::from_input(input), cancel).await
    }
}

/// Serializable summary of a finished run, printed by the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Run identifier.
    pub run_id: String,
    /// Final main-slot content.
    pub result: String,
    /// Whether every variable is still trusted.
    pub trusted: bool,
    /// Rendered last error, if any.
    pub error: Option<String>,
    /// Whether the run stopped on a trust violation.
    pub trust_violation: bool,
    /// Whether the run stopped on cancellation.
    pub cancelled: bool,
}

impl RunReport {
    /// Summarise `context`.
    pub fn from_context(context: &ExecutionContext) -> Self {
        Self {
            run_id: context.run_id().to_string(),
            result: context.result(),
            trusted: context.is_trusted(),
            error: context
                .error_occurred()
                .then(|| context.last_error_description().to_owned()),
            trust_violation: context.is_trust_violation(),
            cancelled: context.is_cancelled(),
        }
    }
}

/// Thread `context` through `steps` in order.
///
/// Any error already recorded on `context` is cleared first. The returned
/// context is whatever the last executed step produced, which may be a
/// replacement for the one passed in.
pub async fn run(
    mut context: ExecutionContext,
    steps: &[Arc<dyn Function>],
    cancel: &CancellationToken,
) -> ExecutionContext {
    context.clear_error();

    for (index, step) in steps.iter().enumerate() {
        if cancel.is_cancelled() {
            warn!(
                run_id = %context.run_id(),
                step = index,
                "pipeline cancelled"
            );
            context.fail(InvocationError::Cancelled { step: index });
            return context;
        }

        let descriptor = step.descriptor();
        info!(
            run_id = %context.run_id(),
            step = index,
            skill = descriptor.skill_name(),
            function = descriptor.function_name(),
            "running pipeline step"
        );

        context = step.invoke(context, cancel).await;

        if context.error_occurred() {
            warn!(
                run_id = %context.run_id(),
                step = index,
                trust_violation = context.is_trust_violation(),
                error = context.last_error_description(),
                "pipeline step failed"
            );
            return context;
        }
    }

    info!(
        run_id = %context.run_id(),
        steps = steps.len(),
        trusted = context.is_trusted(),
        "pipeline finished"
    );
    context
}
