//! Closed set of callable shapes and signature classification.
//!
//! A callable takes one of four input shapes and produces one of three
//! output shapes, synchronously or asynchronously. Registrars that only know
//! a callable's declared signature classify it once, at construction; a
//! signature outside the closed set fails with
//! [`FunctionError::UnsupportedFunctionShape`].

use std::fmt;

use serde::{Deserialize, Serialize};

use super::FunctionError;

/// What a callable receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputShape {
    /// No input.
    Nothing,
    /// The main-slot content.
    Text,
    /// The execution context.
    Context,
    /// The main-slot content, then the execution context.
    TextAndContext,
}

/// What a callable returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputShape {
    /// Nothing; the context is used as left by the callable.
    Nothing,
    /// New main-slot content.
    Text,
    /// A context that replaces the caller's.
    Context,
}

/// A classified callable shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shape {
    /// Input shape.
    pub input: InputShape,
    /// Output shape.
    pub output: OutputShape,
    /// Whether the callable returns a future.
    pub asynchronous: bool,
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = if self.asynchronous { "async " } else { "" };
        write!(f, "{prefix}{:?} -> {:?}", self.input, self.output)
    }
}

/// One declared parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParamKind {
    /// Main-slot content as a string.
    Input,
    /// The execution context.
    Context,
    /// A cancellation signal.
    Cancellation,
    /// Anything else.
    Other {
        /// Declared type name, for diagnostics.
        type_name: String,
    },
}

/// Declared return kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReturnKind {
    /// No value.
    Nothing,
    /// A string.
    Text,
    /// An execution context.
    Context,
    /// Anything else.
    Other {
        /// Declared type name, for diagnostics.
        type_name: String,
    },
}

/// A callable's declared signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Parameters in declaration order.
    #[serde(default)]
    pub params: Vec<ParamKind>,
    /// Return kind, unwrapped from any future.
    pub returns: ReturnKind,
    /// Whether the return is wrapped in a future.
    #[serde(default)]
    pub asynchronous: bool,
}

impl Signature {
    /// Classify into a [`Shape`].
    ///
    /// Accepted parameter lists are `()`, `(input)`, `(context)` and
    /// `(input, context)`, each optionally followed by one cancellation
    /// parameter when the callable is asynchronous.
    ///
    /// # Errors
    ///
    /// Returns [`FunctionError::UnsupportedFunctionShape`] for any other
    /// parameter list or return kind.
    pub fn classify(&self, function: &str) -> Result<Shape, FunctionError> {
        let unsupported = |reason: String| FunctionError::UnsupportedFunctionShape {
            function: function.to_owned(),
            reason,
        };

        let mut params = self.params.as_slice();
        if let Some((ParamKind::Cancellation, rest)) = params.split_last() {
            if !self.asynchronous {
                return Err(unsupported(
                    "cancellation is only accepted by asynchronous callables".to_owned(),
                ));
            }
            params = rest;
        }

        let input = match params {
            [] => InputShape::Nothing,
            [ParamKind::Input] => InputShape::Text,
            [ParamKind::Context] => InputShape::Context,
            [ParamKind::Input, ParamKind::Context] => InputShape::TextAndContext,
            other => {
                return Err(unsupported(format!(
                    "unsupported parameter list {other:?}"
                )))
            }
        };

        let output = match &self.returns {
            ReturnKind::Nothing => OutputShape::Nothing,
            ReturnKind::Text => OutputShape::Text,
            ReturnKind::Context => OutputShape::Context,
            ReturnKind::Other { type_name } => {
                return Err(unsupported(format!("unsupported return type {type_name}")))
            }
        };

        Ok(Shape {
            input,
            output,
            asynchronous: self.asynchronous,
        })
    }
}
