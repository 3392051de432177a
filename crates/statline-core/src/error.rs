//! Error types for Statline core.

use std::path::PathBuf;

use statline_engine::EngineError;
use statline_engine::engine::VarName;
use thiserror::Error;

/// Errors raised while wiring cells, refreshing or loading definitions.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Invalid registration: subscriber has already been dropped")]
    InvalidRegistration,

    #[error("Cascade cycle through signals: {}", join(.0))]
    CascadeCycle(Vec<VarName>),

    #[error("Variable '{0}' is not an editable base variable")]
    NotEditable(VarName),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Definitions error: {0}")]
    Definitions(#[from] toml::de::Error),

    #[error("Refusing to read {}: file too large ({size} bytes, max {max})", .path.display())]
    FileTooLarge { path: PathBuf, size: u64, max: u64 },
}

fn join(names: &[VarName]) -> String {
    names
        .iter()
        .map(VarName::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, CoreError>;
