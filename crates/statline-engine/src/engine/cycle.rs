//! Circular dependency detection for derived variables.
//!
//! A formula store must be acyclic: if `a` reads `b`, `b` reads `c` and `c`
//! reads `a`, evaluating any of them would never finish.
//!
//! The walk colours variables: *open* while their references are being
//! followed, *done* once every reference has been. Meeting an open variable
//! closes a cycle; a done one is skipped. The marks survive across starting
//! points, so [`find_cycle`] visits each formula once however many totals
//! share it.

use std::collections::HashMap;

use super::{FormulaStore, VarName};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Open,
    Done,
}

struct Walk<'s> {
    store: &'s FormulaStore,
    marks: HashMap<&'s VarName, Mark>,
    stack: Vec<&'s VarName>,
}

impl<'s> Walk<'s> {
    fn new(store: &'s FormulaStore) -> Self {
        Walk {
            store,
            marks: HashMap::new(),
            stack: Vec::new(),
        }
    }

    fn visit(&mut self, current: &'s VarName) -> Option<Vec<VarName>> {
        match self.marks.get(current) {
            Some(Mark::Done) => return None,
            Some(Mark::Open) => {
                let from = self.stack.iter().rposition(|n| *n == current).unwrap_or(0);
                let mut cycle: Vec<VarName> =
                    self.stack[from..].iter().map(|n| (*n).clone()).collect();
                cycle.push(current.clone());
                return Some(cycle);
            }
            None => {}
        }

        // Base variables are leaves.
        let formula = self.store.formula(current)?;

        self.marks.insert(current, Mark::Open);
        self.stack.push(current);
        for dep in formula.symbols() {
            if let Some(cycle) = self.visit(dep) {
                return Some(cycle);
            }
        }
        self.stack.pop();
        self.marks.insert(current, Mark::Done);
        None
    }
}

/// Detect a cycle reachable from `start`.
///
/// The path starts and ends at the variable that closes the loop,
/// e.g. `[x, y, z, x]`.
pub fn detect_cycle(start: &VarName, store: &FormulaStore) -> Option<Vec<VarName>> {
    Walk::new(store).visit(start)
}

/// Detect a cycle anywhere in `store`, checking derived variables in name
/// order.
pub fn find_cycle(store: &FormulaStore) -> Option<Vec<VarName>> {
    let mut walk = Walk::new(store);
    store.derived_names().find_map(|name| walk.visit(name))
}
