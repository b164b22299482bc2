//! Trust validation boundary.
//!
//! A [`TrustPolicy`] is consulted at two checkpoints:
//! - before a function executes ([`TrustPolicy::validate`])
//! - after a semantic function has rendered its prompt
//!   ([`TrustPolicy::validate_rendered`]), because rendering may itself run
//!   nested functions that taint the context
//!
//! Sensitive functions never execute under an untrusted context. Policies
//! are synchronous and in-memory; they never own execution state.

use std::fmt;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::context::ExecutionContext;
use crate::function::FunctionDescriptor;
use crate::taint::{store::normalize, TaintedValue};

/// Trust violation raised by a policy checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrustError {
    /// A sensitive function would run against untrusted content.
    #[error("sensitive function {skill}.{function} cannot run with untrusted content")]
    SensitiveOperationWithUntrustedContent {
        /// Skill the blocked function belongs to.
        skill: String,
        /// Blocked function name.
        function: String,
    },
}

/// Strategy validating a context before (and after rendering for) a function.
pub trait TrustPolicy: Send + Sync + fmt::Debug {
    /// Pre-execution check.
    ///
    /// Returns the trust verdict for whatever the function produces, or a
    /// [`TrustError`] when the function must not run at all.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::SensitiveOperationWithUntrustedContent`] when a
    /// sensitive function meets an untrusted context.
    fn validate(
        &self,
        descriptor: &FunctionDescriptor,
        context: &ExecutionContext,
    ) -> Result<bool, TrustError>;

    /// Post-render check: re-validates the context as it stands after
    /// rendering and tags the rendered payload with the verdict.
    ///
    /// # Errors
    ///
    /// Same conditions as [`validate`](Self::validate), evaluated against the
    /// post-render context.
    fn validate_rendered(
        &self,
        descriptor: &FunctionDescriptor,
        context: &ExecutionContext,
        rendered: String,
    ) -> Result<TaintedValue, TrustError> {
        let trusted = self.validate(descriptor, context)?;
        Ok(TaintedValue::new(rendered, trusted))
    }
}

/// Per-function operator override, matched case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FunctionOverride {
    /// Skill name.
    pub skill: String,
    /// Function name.
    pub function: String,
    /// Replace the sensitivity flag when set.
    #[serde(default)]
    pub sensitive: Option<bool>,
    /// Replace the force-untrusted-output flag when set.
    #[serde(default)]
    pub force_output_untrusted: Option<bool>,
}

impl FunctionOverride {
    fn matches(&self, descriptor: &FunctionDescriptor) -> bool {
        normalize(&self.skill) == normalize(descriptor.skill_name())
            && normalize(&self.function) == normalize(descriptor.function_name())
    }
}

/// Explicit trust configuration handed to whichever component needs it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TrustConfig {
    /// When `false`, every result produced under the policy is downgraded to
    /// untrusted, even if its inputs were trusted.
    #[serde(default = "default_trusted")]
    pub default_trusted: bool,

    /// Operator overrides applied when functions are registered.
    #[serde(default)]
    pub functions: Vec<FunctionOverride>,
}

fn default_trusted() -> bool {
    true
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            default_trusted: default_trusted(),
            functions: Vec::new(),
        }
    }
}

impl TrustConfig {
    /// Apply matching overrides to a descriptor.
    pub fn apply_overrides(&self, descriptor: FunctionDescriptor) -> FunctionDescriptor {
        let mut descriptor = descriptor;
        for rule in &self.functions {
            if !rule.matches(&descriptor) {
                continue;
            }
            if let Some(sensitive) = rule.sensitive {
                descriptor = descriptor.sensitive(sensitive);
            }
            if let Some(force) = rule.force_output_untrusted {
                descriptor.set_force_output_untrusted(force);
            }
            debug!(
                skill = descriptor.skill_name(),
                function = descriptor.function_name(),
                "applied trust override"
            );
        }
        descriptor
    }

    /// Build the default policy from this configuration.
    pub fn policy(&self) -> DefaultTrustPolicy {
        DefaultTrustPolicy::new(self.default_trusted)
    }
}

/// Policy deriving its verdict purely from the context's trust bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultTrustPolicy {
    default_trusted: bool,
}

impl DefaultTrustPolicy {
    /// Create a policy with the given default-trusted bit.
    pub fn new(default_trusted: bool) -> Self {
        Self { default_trusted }
    }

    /// The default-trusted bit.
    pub fn default_trusted(&self) -> bool {
        self.default_trusted
    }
}

impl Default for DefaultTrustPolicy {
    fn default() -> Self {
        Self::new(true)
    }
}

impl TrustPolicy for DefaultTrustPolicy {
    fn validate(
        &self,
        descriptor: &FunctionDescriptor,
        context: &ExecutionContext,
    ) -> Result<bool, TrustError> {
        let context_trusted = context.is_trusted();

        if descriptor.is_sensitive() && !context_trusted {
            warn!(
                run_id = %context.run_id(),
                skill = descriptor.skill_name(),
                function = descriptor.function_name(),
                "blocked sensitive function on untrusted content"
            );
            return Err(TrustError::SensitiveOperationWithUntrustedContent {
                skill: descriptor.skill_name().to_owned(),
                function: descriptor.function_name().to_owned(),
            });
        }

        Ok(context_trusted && self.default_trusted)
    }
}
