//! Formula engine API.
//!
//! This module provides the evaluation core for computed sheet values:
//!
//! - [`VarName`] - Validated, `|`-namespaced variable names
//! - [`tokenize`], [`parse`], [`Expr`] - Formula source to expression tree
//! - [`FormulaStore`], [`Formula`] - Closed registry of base and derived variables
//! - [`Environment`], [`ValueSource`] - Runtime evaluation and static reference walks
//! - [`DependencyCompiler`] - Transitive read-sets with edge exclusion
//! - [`detect_cycle`], [`find_cycle`] - Circular dependency detection
//! - [`format_number`] - Format values for display

mod ast;
mod builtins;
mod cycle;
mod deps;
mod env;
mod format;
mod lexer;
mod parser;
mod store;
mod var_name;

pub use ast::{BinaryOp, Expr, UnaryOp};
pub use builtins::{Arity, BUILTINS, Builtin, BuiltinInfo};
pub use cycle::{detect_cycle, find_cycle};
pub use deps::DependencyCompiler;
pub use env::{Environment, Mode, ValueSource};
pub use format::format_number;
pub use lexer::{Token, TokenKind, tokenize};
pub use parser::parse;
pub use store::{Formula, FormulaStore, FormulaStoreBuilder};
pub use var_name::{DELIMITER, KEYWORDS, VarName};
