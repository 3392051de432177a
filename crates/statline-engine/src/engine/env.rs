//! Formula evaluation environment.
//!
//! An [`Environment`] resolves variable names against a [`FormulaStore`].
//! It runs in one of two modes:
//!
//! - **Runtime**: base variables are read from a live [`ValueSource`],
//!   derived variables are evaluated by walking their formula, recursively
//!   resolving every reference. Produces numbers.
//! - **Static**: the same walk, but every variable reference is recorded
//!   and replaced by a neutral `0.0`. Both branches of conditionals and
//!   both sides of `and`/`or` are visited. The value source is never
//!   touched. Used to enumerate what a formula would read.
//!
//! Each [`Environment::read`] call memoizes values for the duration of that
//! call only; a later call starts fresh because base values may have
//! changed in between.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::hash::BuildHasher;

use super::ast::{BinaryOp, Expr, UnaryOp};
use super::store::{Formula, FormulaStore};
use super::var_name::VarName;
use crate::error::{EngineError, Result};

/// Live accessor for base variable values, supplied by the application.
pub trait ValueSource {
    /// Current value of a base variable, or `None` if it was never set.
    fn base_value(&self, name: &VarName) -> Option<f64>;
}

impl<S: BuildHasher> ValueSource for HashMap<VarName, f64, S> {
    fn base_value(&self, name: &VarName) -> Option<f64> {
        self.get(name).copied()
    }
}

impl ValueSource for BTreeMap<VarName, f64> {
    fn base_value(&self, name: &VarName) -> Option<f64> {
        self.get(name).copied()
    }
}

impl<T: ValueSource + ?Sized> ValueSource for &T {
    fn base_value(&self, name: &VarName) -> Option<f64> {
        (**self).base_value(name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Runtime,
    Static,
}

/// Evaluation context over a formula store.
#[derive(Clone, Copy)]
pub struct Environment<'s> {
    store: &'s FormulaStore,
    source: Option<&'s dyn ValueSource>,
}

/// Per-call evaluation state.
#[derive(Default)]
struct Frame {
    memo: HashMap<VarName, f64>,
    calls: Vec<VarName>,
    refs: BTreeSet<VarName>,
}

impl<'s> Environment<'s> {
    /// A runtime environment reading base values from `source`.
    pub fn runtime(store: &'s FormulaStore, source: &'s dyn ValueSource) -> Self {
        Environment {
            store,
            source: Some(source),
        }
    }

    /// A static environment, for reference enumeration only.
    pub fn static_mode(store: &'s FormulaStore) -> Self {
        Environment {
            store,
            source: None,
        }
    }

    pub fn mode(&self) -> Mode {
        match self.source {
            Some(_) => Mode::Runtime,
            None => Mode::Static,
        }
    }

    pub fn store(&self) -> &'s FormulaStore {
        self.store
    }

    /// Resolve a variable to its value.
    ///
    /// In static mode this only checks that `name` exists and returns the
    /// neutral placeholder `0.0`.
    pub fn read(&self, name: &VarName) -> Result<f64> {
        let mut frame = Frame::default();
        self.resolve(name, &mut frame)
    }

    /// A deferred [`read`](Self::read) of `name`.
    pub fn func(&self, name: &VarName) -> impl Fn() -> Result<f64> + 's {
        let env = *self;
        let name = name.clone();
        move || env.read(&name)
    }

    /// Evaluate an ad-hoc compiled formula.
    pub fn evaluate(&self, formula: &Formula) -> Result<f64> {
        let mut frame = Frame::default();
        let value = self.eval(formula.ast(), &mut Vec::new(), &mut frame)?;
        if value.is_nan() && self.mode() == Mode::Runtime {
            return Err(EngineError::NotANumber(formula.source().to_string()));
        }
        Ok(value)
    }

    /// The variables `name`'s formula reads directly, found by a static walk.
    ///
    /// Base variables have no references. Works in either mode; the value
    /// source is never consulted.
    pub fn references(&self, name: &VarName) -> Result<BTreeSet<VarName>> {
        if self.store.is_base(name) {
            return Ok(BTreeSet::new());
        }
        let formula = self
            .store
            .formula(name)
            .ok_or_else(|| EngineError::UnknownVariable(name.to_string()))?;
        self.formula_references(formula)
    }

    /// Static walk of an arbitrary formula.
    pub fn formula_references(&self, formula: &Formula) -> Result<BTreeSet<VarName>> {
        let walker = Environment::static_mode(self.store);
        let mut frame = Frame::default();
        walker.eval(formula.ast(), &mut Vec::new(), &mut frame)?;
        Ok(frame.refs)
    }

    fn resolve(&self, name: &VarName, frame: &mut Frame) -> Result<f64> {
        let Some(source) = self.source else {
            if !self.store.contains(name) {
                return Err(EngineError::UnknownVariable(name.to_string()));
            }
            frame.refs.insert(name.clone());
            return Ok(0.0);
        };

        if let Some(value) = frame.memo.get(name) {
            return Ok(*value);
        }

        let value = if let Some(default) = self.store.base_default(name) {
            source.base_value(name).unwrap_or(default)
        } else if let Some(formula) = self.store.formula(name) {
            if frame.calls.contains(name) {
                let mut path = frame.calls.clone();
                path.push(name.clone());
                return Err(EngineError::CircularDependency(path));
            }
            frame.calls.push(name.clone());
            let value = self.eval(formula.ast(), &mut Vec::new(), frame);
            frame.calls.pop();
            let value = value?;
            if value.is_nan() {
                return Err(EngineError::NotANumber(name.to_string()));
            }
            log::trace!("{} = {}", name, value);
            value
        } else {
            return Err(EngineError::UnknownVariable(name.to_string()));
        };

        frame.memo.insert(name.clone(), value);
        Ok(value)
    }

    fn eval(&self, expr: &Expr, scope: &mut Vec<f64>, frame: &mut Frame) -> Result<f64> {
        let walk_all = self.mode() == Mode::Static;
        match expr {
            Expr::Number(n) => Ok(*n),
            Expr::Var(name) => self.resolve(name, frame),
            Expr::Local { slot, .. } => Ok(scope.get(*slot).copied().unwrap_or(0.0)),
            Expr::Unary(op, inner) => {
                let value = self.eval(inner, scope, frame)?;
                Ok(match op {
                    UnaryOp::Plus => value,
                    UnaryOp::Minus => -value,
                })
            }
            Expr::Binary(op @ (BinaryOp::And | BinaryOp::Or), lhs, rhs) if !walk_all => {
                let left = self.eval(lhs, scope, frame)? != 0.0;
                let decided = match op {
                    BinaryOp::And => !left,
                    _ => left,
                };
                if decided {
                    return Ok(if left { 1.0 } else { 0.0 });
                }
                let right = self.eval(rhs, scope, frame)?;
                Ok(if right != 0.0 { 1.0 } else { 0.0 })
            }
            Expr::Binary(op, lhs, rhs) => {
                let x = self.eval(lhs, scope, frame)?;
                let y = self.eval(rhs, scope, frame)?;
                Ok(op.apply(x, y))
            }
            Expr::Call(builtin, args) => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(arg, scope, frame)?);
                }
                Ok(builtin.apply(&values))
            }
            Expr::If {
                cond,
                then,
                otherwise,
            } => {
                let test = self.eval(cond, scope, frame)?;
                if walk_all {
                    self.eval(then, scope, frame)?;
                    self.eval(otherwise, scope, frame)?;
                    Ok(0.0)
                } else if test != 0.0 {
                    self.eval(then, scope, frame)
                } else {
                    self.eval(otherwise, scope, frame)
                }
            }
            Expr::Let { bindings, body } => {
                let depth = scope.len();
                for (_, value) in bindings {
                    let value = self.eval(value, scope, frame);
                    match value {
                        Ok(v) => scope.push(v),
                        Err(e) => {
                            scope.truncate(depth);
                            return Err(e);
                        }
                    }
                }
                let result = self.eval(body, scope, frame);
                scope.truncate(depth);
                result
            }
        }
    }
}
