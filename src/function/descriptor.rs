//! Function metadata read by the trust layer.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

/// Describes one named parameter a function reads from the variable store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterView {
    /// Variable name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Value used when the variable is absent.
    #[serde(default)]
    pub default_value: Option<String>,
}

/// Serializable snapshot of a descriptor, for listings and planners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionView {
    /// Skill the function belongs to.
    pub skill_name: String,
    /// Function name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Whether the function renders a prompt and calls a completion backend.
    pub is_semantic: bool,
    /// Whether the function requires a trusted context.
    pub is_sensitive: bool,
    /// Whether the function's output is always untrusted.
    pub force_output_untrusted: bool,
    /// Declared parameters.
    pub parameters: Vec<ParameterView>,
}

/// Immutable identity and trust flags of a function.
///
/// `force_output_untrusted` is the one flag an operator may flip after
/// construction; it is read at the start of every invocation.
#[derive(Debug)]
pub struct FunctionDescriptor {
    skill_name: String,
    function_name: String,
    description: String,
    is_sensitive: bool,
    is_semantic: bool,
    force_output_untrusted: AtomicBool,
    parameters: Vec<ParameterView>,
}

impl FunctionDescriptor {
    /// Descriptor with every flag off.
    pub fn new(skill_name: impl Into<String>, function_name: impl Into<String>) -> Self {
        Self {
            skill_name: skill_name.into(),
            function_name: function_name.into(),
            description: String::new(),
            is_sensitive: false,
            is_semantic: false,
            force_output_untrusted: AtomicBool::new(false),
            parameters: Vec::new(),
        }
    }

    /// Set the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the sensitivity flag.
    #[must_use]
    pub fn sensitive(mut self, sensitive: bool) -> Self {
        self.is_sensitive = sensitive;
        self
    }

    /// Set the semantic flag.
    #[must_use]
    pub fn semantic(mut self, semantic: bool) -> Self {
        self.is_semantic = semantic;
        self
    }

    /// Set the force-untrusted-output flag.
    #[must_use]
    pub fn with_force_output_untrusted(self, force: bool) -> Self {
        self.force_output_untrusted.store(force, Ordering::Relaxed);
        self
    }

    /// Declare a parameter.
    #[must_use]
    pub fn parameter(mut self, parameter: ParameterView) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Skill name.
    pub fn skill_name(&self) -> &str {
        &self.skill_name
    }

    /// Function name.
    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    /// `skill.function`.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.skill_name, self.function_name)
    }

    /// Whether the function requires a trusted context.
    pub fn is_sensitive(&self) -> bool {
        self.is_sensitive
    }

    /// Whether the function is render-capable.
    pub fn is_semantic(&self) -> bool {
        self.is_semantic
    }

    /// Whether output is downgraded to untrusted regardless of input trust.
    pub fn force_output_untrusted(&self) -> bool {
        self.force_output_untrusted.load(Ordering::Relaxed)
    }

    /// Flip the force-untrusted-output flag. Takes effect on the next invocation.
    pub fn set_force_output_untrusted(&self, force: bool) {
        self.force_output_untrusted.store(force, Ordering::Relaxed);
    }

    /// Declared parameters.
    pub fn parameters(&self) -> &[ParameterView] {
        &self.parameters
    }

    /// Serializable snapshot.
    pub fn describe(&self) -> FunctionView {
        FunctionView {
            skill_name: self.skill_name.clone(),
            name: self.function_name.clone(),
            description: self.description.clone(),
            is_semantic: self.is_semantic,
            is_sensitive: self.is_sensitive,
            force_output_untrusted: self.force_output_untrusted(),
            parameters: self.parameters.clone(),
        }
    }
}

impl Clone for FunctionDescriptor {
    fn clone(&self) -> Self {
        Self {
            skill_name: self.skill_name.clone(),
            function_name: self.function_name.clone(),
            description: self.description.clone(),
            is_sensitive: self.is_sensitive,
            is_semantic: self.is_semantic,
            force_output_untrusted: AtomicBool::new(self.force_output_untrusted()),
            parameters: self.parameters.clone(),
        }
    }
}
