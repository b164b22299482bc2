//! Functions: the canonical `invoke(context) -> context` contract and the
//! adapters that bring native and semantic callables under it.
//!
//! Every adapter runs the trust pre-check before touching the callable and
//! folds every fault into the returned context. Nothing is thrown across
//! [`Function::invoke`].

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::context::ExecutionContext;

pub mod descriptor;
pub mod native;
pub mod semantic;
pub mod shape;

pub use descriptor::{FunctionDescriptor, FunctionView, ParameterView};
pub use native::{NativeFn, NativeFunction};
pub use semantic::{CompletionBackend, PromptRenderer, SemanticFunction};
pub use shape::{InputShape, OutputShape, ParamKind, ReturnKind, Shape, Signature};

/// Construction-time faults. These surface before any pipeline runs.
#[derive(Debug, Error)]
pub enum FunctionError {
    /// The declared signature is outside the closed set of shapes.
    #[error("function {function} has an unsupported shape: {reason}")]
    UnsupportedFunctionShape {
        /// Function name.
        function: String,
        /// What did not match.
        reason: String,
    },

    /// The declared signature classifies, but the body has another shape.
    #[error("function {function} declares {declared} but its body is {actual}")]
    ShapeMismatch {
        /// Function name.
        function: String,
        /// Shape classified from the declared signature.
        declared: Shape,
        /// Shape of the bound body.
        actual: Shape,
    },
}

/// The canonical function contract.
///
/// `invoke` consumes the caller's context and returns the context the caller
/// continues with: the same one mutated in place, or a replacement.
#[async_trait]
pub trait Function: Send + Sync {
    /// Metadata and trust flags.
    fn descriptor(&self) -> &FunctionDescriptor;

    /// Run the function. Failures are recorded on the returned context.
    async fn invoke(
        &self,
        context: ExecutionContext,
        cancel: &CancellationToken,
    ) -> ExecutionContext;

    /// Run the function on a fresh context whose main slot is `input`,
    /// marked trusted.
    async fn invoke_text(&self, input: &str, cancel: &CancellationToken) -> ExecutionContext {
        self.invoke(ExecutionContext::from_input(input), cancel)
            .await
    }
}
