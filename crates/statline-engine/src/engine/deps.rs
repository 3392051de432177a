//! Dependency compilation: which variables a variable transitively reads.
//!
//! Built on the [`Environment`]'s static mode, so a formula is never
//! evaluated to find out what it depends on. Base variables are leaves:
//! they are included in a dependency set but have nothing to expand.
//!
//! The `exclude` list cuts edges. An excluded name is left out of the
//! result and its own references are not followed. Display cells use this
//! to avoid subscribing to the base variable they write themselves, e.g. a
//! cell editing `unit|base|str` and showing `unit|total|str`.

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

use super::env::Environment;
use super::store::{Formula, FormulaStore};
use super::var_name::VarName;
use crate::error::{EngineError, Result};

/// Computes transitive read-sets over a formula store.
#[derive(Clone, Copy)]
pub struct DependencyCompiler<'s> {
    env: Environment<'s>,
}

impl<'s> DependencyCompiler<'s> {
    pub fn new(store: &'s FormulaStore) -> Self {
        DependencyCompiler {
            env: Environment::static_mode(store),
        }
    }

    /// One-hop references of `name`.
    pub fn direct(&self, name: &VarName) -> Result<BTreeSet<VarName>> {
        self.env.references(name)
    }

    /// Every variable `name` transitively reads, minus `exclude`.
    pub fn dependencies(&self, name: &VarName, exclude: &[VarName]) -> Result<BTreeSet<VarName>> {
        let roots = self.direct(name)?;
        self.expand(roots, exclude)
    }

    /// Like [`dependencies`](Self::dependencies), for an ad-hoc formula.
    pub fn dependencies_of(
        &self,
        formula: &Formula,
        exclude: &[VarName],
    ) -> Result<BTreeSet<VarName>> {
        let roots = self.env.formula_references(formula)?;
        self.expand(roots, exclude)
    }

    fn expand(&self, roots: BTreeSet<VarName>, exclude: &[VarName]) -> Result<BTreeSet<VarName>> {
        let exclude: HashSet<&VarName> = exclude.iter().collect();
        let mut found = BTreeSet::new();
        let mut pending: Vec<VarName> = roots.into_iter().collect();

        while let Some(next) = pending.pop() {
            if exclude.contains(&next) || found.contains(&next) {
                continue;
            }
            let refs = self.direct(&next)?;
            found.insert(next);
            pending.extend(refs);
        }

        Ok(found)
    }

    /// Every derived variable whose dependency set contains `name`.
    pub fn dependents(&self, name: &VarName) -> Result<BTreeSet<VarName>> {
        let store = self.env.store();
        if !store.contains(name) {
            return Err(EngineError::UnknownVariable(name.to_string()));
        }

        let mut reverse: BTreeMap<VarName, Vec<VarName>> = BTreeMap::new();
        for derived in store.derived_names() {
            for dep in self.direct(derived)? {
                reverse.entry(dep).or_default().push(derived.clone());
            }
        }

        let mut found = BTreeSet::new();
        let mut pending = vec![name.clone()];
        while let Some(next) = pending.pop() {
            for user in reverse.get(&next).into_iter().flatten() {
                if found.insert(user.clone()) {
                    pending.push(user.clone());
                }
            }
        }
        Ok(found)
    }

    /// Graphviz rendering of the breadth-first reference graph from `name`.
    /// Edges into an already visited node are suffixed with `_R`.
    pub fn to_dot(&self, name: &VarName) -> Result<String> {
        let mut lines = vec![format!("digraph {} {{", name.clean())];
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([name.clone()]);

        while let Some(current) = queue.pop_front() {
            for each in self.direct(&current)? {
                let revisit = seen.contains(&each);
                lines.push(format!(
                    "\t{}->{}{};",
                    current.clean(),
                    each.clean(),
                    if revisit { "_R" } else { "" }
                ));
                if revisit {
                    continue;
                }
                seen.insert(each.clone());
                queue.push_back(each);
            }
        }

        lines.push("}".to_string());
        Ok(lines.join("\n"))
    }
}
