//! The formula store: a closed registry of base and derived variables.
//!
//! A [`FormulaStore`] is built once, from a list of base variable
//! declarations (with default values) and named formulas, and is immutable
//! afterwards. Building parses every formula and rejects:
//!
//! - names that are declared twice ([`EngineError::DuplicateDefinition`])
//! - formulas referring to undeclared names ([`EngineError::UnknownVariable`])
//! - formula graphs with a cycle ([`EngineError::CircularDependency`])
//!
//! so evaluation never has to discover a typo or a loop at read time.

use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};

use super::ast::Expr;
use super::cycle::find_cycle;
use super::parser::parse;
use super::var_name::VarName;
use crate::error::{EngineError, Result};

/// A parsed formula together with its source text.
#[derive(Clone, Debug, PartialEq)]
pub struct Formula {
    source: String,
    ast: Expr,
    symbols: BTreeSet<VarName>,
    about: Option<String>,
}

impl Formula {
    /// Parse `source`. References are not checked against any store.
    pub fn parse(source: &str) -> Result<Formula> {
        let ast = parse(source)?;
        let mut symbols = BTreeSet::new();
        ast.walk(&mut |node| {
            if let Expr::Var(name) = node {
                symbols.insert(name.clone());
            }
        });
        Ok(Formula {
            source: source.to_string(),
            ast,
            symbols,
            about: None,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn ast(&self) -> &Expr {
        &self.ast
    }

    /// Names this formula refers to directly (not transitively).
    pub fn symbols(&self) -> &BTreeSet<VarName> {
        &self.symbols
    }

    pub fn about(&self) -> Option<&str> {
        self.about.as_deref()
    }
}

/// Immutable mapping from variable name to its definition.
#[derive(Clone, Debug, Default)]
pub struct FormulaStore {
    base: BTreeMap<VarName, f64>,
    formulas: BTreeMap<VarName, Formula>,
}

impl FormulaStore {
    pub fn builder() -> FormulaStoreBuilder {
        FormulaStoreBuilder::default()
    }

    pub fn contains(&self, name: &VarName) -> bool {
        self.is_base(name) || self.is_derived(name)
    }

    pub fn is_base(&self, name: &VarName) -> bool {
        self.base.contains_key(name)
    }

    pub fn is_derived(&self, name: &VarName) -> bool {
        self.formulas.contains_key(name)
    }

    pub fn formula(&self, name: &VarName) -> Option<&Formula> {
        self.formulas.get(name)
    }

    /// The declared default of a base variable.
    pub fn base_default(&self, name: &VarName) -> Option<f64> {
        self.base.get(name).copied()
    }

    pub fn base_names(&self) -> impl Iterator<Item = &VarName> {
        self.base.keys()
    }

    pub fn derived_names(&self) -> impl Iterator<Item = &VarName> {
        self.formulas.keys()
    }

    /// All names, base and derived, whose text matches `pattern`.
    pub fn variables<'a>(&'a self, pattern: &'a Regex) -> impl Iterator<Item = &'a VarName> + 'a {
        self.base
            .keys()
            .chain(self.formulas.keys())
            .filter(move |name| pattern.is_match(name.as_str()))
    }

    /// Parse an ad-hoc expression and check its references against this store.
    pub fn compile(&self, source: &str) -> Result<Formula> {
        let formula = Formula::parse(source)?;
        self.check_symbols(&formula)?;
        Ok(formula)
    }

    fn check_symbols(&self, formula: &Formula) -> Result<()> {
        match formula.symbols.iter().find(|s| !self.contains(s)) {
            Some(unknown) => Err(EngineError::UnknownVariable(unknown.to_string())),
            None => Ok(()),
        }
    }
}

/// Collects declarations for a [`FormulaStore`]; all checks happen in
/// [`FormulaStoreBuilder::build`].
#[derive(Clone, Debug, Default)]
pub struct FormulaStoreBuilder {
    base: Vec<(String, f64)>,
    formulas: Vec<(String, String, Option<String>)>,
}

impl FormulaStoreBuilder {
    /// Declare a base (user-editable) variable and its default value.
    pub fn base(mut self, name: impl Into<String>, default: f64) -> Self {
        self.base.push((name.into(), default));
        self
    }

    /// Define a derived variable by formula source.
    pub fn define(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.formulas.push((name.into(), source.into(), None));
        self
    }

    /// Like [`define`](Self::define), with a human readable description.
    pub fn define_with_about(
        mut self,
        name: impl Into<String>,
        source: impl Into<String>,
        about: impl Into<String>,
    ) -> Self {
        self.formulas
            .push((name.into(), source.into(), Some(about.into())));
        self
    }

    pub fn build(self) -> Result<FormulaStore> {
        let mut store = FormulaStore::default();

        for (name, default) in self.base {
            let name = VarName::new(name)?;
            if store.base.insert(name.clone(), default).is_some() {
                return Err(EngineError::DuplicateDefinition(name));
            }
        }

        for (name, source, about) in self.formulas {
            let name = VarName::new(name)?;
            if store.contains(&name) {
                return Err(EngineError::DuplicateDefinition(name));
            }
            let mut formula = Formula::parse(&source)?;
            formula.about = about;
            store.formulas.insert(name, formula);
        }

        for formula in store.formulas.values() {
            store.check_symbols(formula)?;
        }

        if let Some(path) = find_cycle(&store) {
            return Err(EngineError::CircularDependency(path));
        }

        log::debug!(
            "formula store built: {} base, {} derived",
            store.base.len(),
            store.formulas.len()
        );
        Ok(store)
    }
}
