//! Execution context threaded through functions and pipelines.
//!
//! A context owns exactly one [`VariableStore`] plus run-level error state.
//! Cloning is deep: the clone gets its own store and never aliases the
//! original. The only way to get two contexts over one store is
//! [`ExecutionContext::share`], used when an asynchronous callable needs an
//! owned handle onto the caller's variables.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::taint::{TaintedValue, VariableStore};
use crate::trust::TrustError;

/// Why a function invocation or pipeline run failed.
///
/// Recorded on the resulting context instead of being returned as `Err`.
#[derive(Debug, Error)]
pub enum InvocationError {
    /// The trust pre-check or render checkpoint blocked execution.
    #[error(transparent)]
    Untrusted(#[from] TrustError),

    /// The wrapped callable returned an error.
    #[error("function {skill}.{function} failed: {cause:#}")]
    Failed {
        /// Skill the function belongs to.
        skill: String,
        /// Function name.
        function: String,
        /// Error raised by the callable.
        cause: anyhow::Error,
    },

    /// The pipeline was cancelled at a step boundary.
    #[error("pipeline cancelled before step {step}")]
    Cancelled {
        /// Zero-based index of the step that did not start.
        step: usize,
    },
}

/// Variables plus run-level state for one pipeline run.
#[derive(Debug)]
pub struct ExecutionContext {
    run_id: Uuid,
    variables: Arc<VariableStore>,
    last_error: Option<Arc<InvocationError>>,
    last_error_description: String,
}

impl ExecutionContext {
    /// Wrap an existing store in a fresh context.
    pub fn new(variables: VariableStore) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            variables: Arc::new(variables),
            last_error: None,
            last_error_description: String::new(),
        }
    }

    /// Fresh context whose main slot holds `input`.
    pub fn from_input(input: impl Into<TaintedValue>) -> Self {
        Self::new(VariableStore::with_main(input.into()))
    }

    /// Identifier carried in log spans for this run.
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// The variable store.
    pub fn variables(&self) -> &VariableStore {
        &self.variables
    }

    /// Content of the main slot.
    pub fn result(&self) -> String {
        self.variables.main().into_content()
    }

    /// Whether the context as a whole is trusted: every slot is.
    pub fn is_trusted(&self) -> bool {
        self.variables.is_all_trusted()
    }

    /// Mark every variable untrusted.
    pub fn make_untrusted(&self) {
        self.variables.force_all_untrusted();
    }

    /// Mark only the main slot untrusted.
    pub fn untrust_result(&self) {
        self.variables.untrust_main();
    }

    /// Whether an error has been recorded.
    pub fn error_occurred(&self) -> bool {
        self.last_error.is_some()
    }

    /// The last recorded error, if any.
    pub fn last_error(&self) -> Option<&InvocationError> {
        self.last_error.as_deref()
    }

    /// Rendered text of the last error, empty when none.
    pub fn last_error_description(&self) -> &str {
        &self.last_error_description
    }

    /// Whether the last error is a trust violation.
    pub fn is_trust_violation(&self) -> bool {
        matches!(self.last_error(), Some(InvocationError::Untrusted(_)))
    }

    /// Whether the last error is a cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.last_error(), Some(InvocationError::Cancelled { .. }))
    }

    /// Record a failure on this context.
    pub fn fail(&mut self, error: InvocationError) {
        self.last_error_description = error.to_string();
        self.last_error = Some(Arc::new(error));
    }

    /// Clear any recorded failure.
    pub fn clear_error(&mut self) {
        self.last_error = None;
        self.last_error_description.clear();
    }

    /// A second context over the same store, with its own error state.
    ///
    /// Writes through either handle are visible through both. Used to hand
    /// an owned context to asynchronous callables.
    pub fn share(&self) -> Self {
        Self {
            run_id: self.run_id,
            variables: Arc::clone(&self.variables),
            last_error: None,
            last_error_description: String::new(),
        }
    }

    /// Whether two contexts sit on the same store.
    pub fn shares_store_with(&self, other: &ExecutionContext) -> bool {
        Arc::ptr_eq(&self.variables, &other.variables)
    }
}

impl Clone for ExecutionContext {
    fn clone(&self) -> Self {
        Self {
            run_id: self.run_id,
            variables: Arc::new(VariableStore::clone(&self.variables)),
            last_error: self.last_error.clone(),
            last_error_description: self.last_error_description.clone(),
        }
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new(VariableStore::new())
    }
}

impl fmt::Display for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.error_occurred() {
            f.write_str(&self.last_error_description)
        } else {
            f.write_str(self.variables.main().content())
        }
    }
}
