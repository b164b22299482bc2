//! Trustflow: trust and taint propagation for AI orchestration pipelines.
//!
//! Every piece of text flowing through a pipeline carries a trust bit.
//! Functions flagged sensitive never run against untrusted content, and
//! taint survives cloning, merging, partial updates and context replacement.
//!
//! Layers, leaves first:
//! - [`taint`]: trust-tagged values and the variable store
//! - [`context`]: execution context and the error taxonomy recorded on it
//! - [`trust`]: trust policies and their configuration
//! - [`function`]: the canonical function contract and its adapters
//! - [`pipeline`]: sequential execution with cooperative cancellation

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod builtin;
pub mod config;
pub mod context;
pub mod function;
pub mod logging;
pub mod pipeline;
pub mod taint;
pub mod trust;

pub use context::{ExecutionContext, InvocationError};
pub use function::{Function, FunctionDescriptor, NativeFn, NativeFunction, SemanticFunction};
pub use pipeline::Pipeline;
pub use taint::{TaintedValue, VariableStore, MAIN_KEY};
pub use trust::{DefaultTrustPolicy, TrustConfig, TrustError, TrustPolicy};
