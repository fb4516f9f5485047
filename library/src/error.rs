use thiserror::Error;

use crate::model::graph::NodeId;

/// Structural failures of a compile run. None of these are transient; retrying
/// the same graph against the same host yields the same error.
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("Cyclic node dependency at {node}")]
    GraphCycle { id: NodeId, node: String },
    #[error("Unresolved link into {consumer} input '{input}': {reason}")]
    UnresolvedLink {
        consumer: String,
        input: String,
        reason: String,
    },
    #[error("Invalid mechanism: {0}")]
    InvalidMechanism(String),
    #[error("Expression for {target} is {length} characters, host limit is {max}")]
    ExpressionTooLong {
        target: String,
        length: usize,
        max: usize,
    },
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
}

impl CompileError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        CompileError::InvalidMechanism(msg.into())
    }

    pub fn unresolved(
        consumer: impl Into<String>,
        input: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        CompileError::UnresolvedLink {
            consumer: consumer.into(),
            input: input.into(),
            reason: reason.into(),
        }
    }
}

/// Failures reported by a host adapter.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("Unknown property: {0}")]
    UnknownProperty(String),
    #[error("Invalid property name: {0}")]
    InvalidName(String),
    #[error("Invalid scalar bounds for {name}: {reason}")]
    InvalidBounds { name: String, reason: String },
    #[error("Property {0} is already driven by another expression")]
    AlreadyDriven(String),
    #[error("Failed to evaluate expression for {target}: {message}")]
    Evaluation { target: String, message: String },
    #[error("Dependency cycle between expressions at {0}")]
    RuleCycle(String),
}

/// Top-level error for loading graphs and configuration and running compiles.
#[derive(Error, Debug)]
pub enum GearsimError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Config parsing error: {0}")]
    ConfigParse(#[from] toml::de::Error),
    #[error("Config serialization error: {0}")]
    ConfigWrite(#[from] toml::ser::Error),
    #[error("Compile error: {0}")]
    Compile(#[from] CompileError),
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
}
