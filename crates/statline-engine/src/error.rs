//! Error types for the Statline engine.

use thiserror::Error;

use crate::engine::VarName;

/// Errors raised while parsing, loading or evaluating formulas.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Parse error at offset {position}: {message}")]
    Parse { position: usize, message: String },

    #[error("Invalid variable name: {0:?}")]
    InvalidName(String),

    #[error("Expression variable '{0}' not defined in this context")]
    UnknownVariable(String),

    #[error("Unknown function '{name}' at offset {position}")]
    UnknownFunction { name: String, position: usize },

    #[error("Function '{function}' expects {expected} argument(s), got {found}")]
    Arity {
        function: &'static str,
        expected: String,
        found: usize,
    },

    #[error("Variable '{0}' is defined more than once")]
    DuplicateDefinition(VarName),

    #[error("Circular dependency detected: {}", format_path(.0))]
    CircularDependency(Vec<VarName>),

    #[error("{0} evaluated to NaN")]
    NotANumber(String),
}

fn format_path(path: &[VarName]) -> String {
    path.iter()
        .map(VarName::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

pub type Result<T> = std::result::Result<T, EngineError>;
