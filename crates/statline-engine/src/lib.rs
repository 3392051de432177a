//! statline_engine - Formula parsing, evaluation and dependency analysis.

pub mod engine;
pub mod error;

pub use error::{EngineError, Result};
