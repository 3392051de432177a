//! statline - Reactive formula engine for character sheets.
//!
//! Named formulas are loaded into a [`engine::FormulaStore`], evaluated on
//! demand by an [`engine::Environment`], and kept on screen by
//! [`BoundCell`]s that a [`Refresher`] updates whenever a base value they
//! depend on changes. [`Sheet`] wires the three together.

pub mod engine {
    pub use statline_engine::engine::*;
    pub use statline_engine::{EngineError, Result};
}

pub use statline_core::*;
pub use statline_engine::EngineError;
