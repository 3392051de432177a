//! The sheet: a formula store, its live base values and a refresher.
//!
//! Cells are bound through [`Sheet::bind`], which works out what each cell
//! has to listen to. A cell displaying variable `d` is subscribed to every
//! variable `d` transitively reads. A cell editing base `b` is subscribed to
//! `b` too, so an edit made through another cell reaches it; an edit made
//! through the cell itself skips it (see [`Refresher::refresh_except`]).
//! Cells displaying a derived variable cascade to it so displays built on
//! `d` follow.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::rc::{Rc, Weak};

use log::debug;
use statline_engine::EngineError;
use statline_engine::engine::{DependencyCompiler, Environment, FormulaStore, VarName};

use crate::base_values::BaseValues;
use crate::cell::{BoundCell, CellSpec, Floor};
use crate::error::{CoreError, Result};
use crate::refresher::{Refresher, Subscriber};

pub struct Sheet {
    store: Rc<FormulaStore>,
    values: BaseValues,
    refresher: Rc<Refresher>,
    /// Variables displayed with the cost floor.
    cost: BTreeSet<VarName>,
    /// Live cells by the base variable they edit.
    cells: RefCell<HashMap<VarName, Vec<Weak<BoundCell>>>>,
}

impl Sheet {
    pub fn new(store: FormulaStore) -> Self {
        Sheet {
            store: Rc::new(store),
            values: BaseValues::new(),
            refresher: Rc::new(Refresher::new()),
            cost: BTreeSet::new(),
            cells: RefCell::new(HashMap::new()),
        }
    }

    /// Mark `names` as cost-style variables; see [`Sheet::floor_for`].
    pub fn with_cost_variables(mut self, names: impl IntoIterator<Item = VarName>) -> Self {
        self.cost.extend(names);
        self
    }

    pub fn store(&self) -> &FormulaStore {
        &self.store
    }

    pub fn values(&self) -> &BaseValues {
        &self.values
    }

    pub fn refresher(&self) -> &Rc<Refresher> {
        &self.refresher
    }

    /// A runtime environment over the current base values.
    pub fn environment(&self) -> Environment<'_> {
        Environment::runtime(&self.store, &self.values)
    }

    pub fn compiler(&self) -> DependencyCompiler<'_> {
        DependencyCompiler::new(&self.store)
    }

    pub fn read(&self, name: &VarName) -> Result<f64> {
        Ok(self.environment().read(name)?)
    }

    /// The display floor for `name`.
    pub fn floor_for(&self, name: &VarName) -> Floor {
        if self.cost.contains(name) {
            Floor::Cost
        } else {
            Floor::Zero
        }
    }

    fn check_base(&self, name: &VarName) -> Result<()> {
        if self.store.is_base(name) {
            Ok(())
        } else if self.store.contains(name) {
            Err(CoreError::NotEditable(name.clone()))
        } else {
            Err(EngineError::UnknownVariable(name.to_string()).into())
        }
    }

    /// Create a cell, subscribe it and compute its first display value.
    pub fn bind(&self, spec: CellSpec) -> Result<Rc<BoundCell>> {
        if let Some(base) = &spec.base {
            self.check_base(base)?;
        }

        let own: Vec<VarName> = spec.base.iter().cloned().collect();
        let mut triggers: BTreeSet<VarName> = own.iter().cloned().collect();
        let mut cascades = Vec::new();
        if let Some(variable) = spec.trigger.variable() {
            if self.store.is_base(variable) {
                triggers.insert(variable.clone());
            } else {
                triggers.extend(self.compiler().dependencies(variable, &own)?);
                cascades.push(variable.clone());
            }
        }

        let cell = Rc::new(BoundCell::new(
            spec,
            self.store.clone(),
            self.values.clone(),
            self.refresher.clone(),
        ));
        let weak: Weak<dyn Subscriber> = Rc::downgrade(&cell) as Weak<dyn Subscriber>;
        let id = self.refresher.register(weak, triggers, cascades)?;
        cell.set_subscriber_id(id);

        if let Some(base) = cell.base_var() {
            self.cells
                .borrow_mut()
                .entry(base.clone())
                .or_default()
                .push(Rc::downgrade(&cell));
        }

        cell.recompute()?;
        debug!("bound {:?} as {:?}", cell.trigger().variable().or(cell.base_var()), id);
        Ok(cell)
    }

    fn live_cells(&self, name: &VarName) -> Vec<Rc<BoundCell>> {
        let mut cells = self.cells.borrow_mut();
        let Some(list) = cells.get_mut(name) else {
            return Vec::new();
        };
        list.retain(|weak| weak.strong_count() > 0);
        list.iter().filter_map(Weak::upgrade).collect()
    }

    /// Current value of a base variable, or its declared default.
    pub fn base(&self, name: &VarName) -> Result<f64> {
        self.check_base(name)?;
        Ok(self
            .values
            .get(name)
            .or_else(|| self.store.base_default(name))
            .unwrap_or_default())
    }

    /// Edit a base variable as if through its cell.
    ///
    /// With a bound cell the value is clamped by the first one bound.
    /// Returns how many subscribers were refreshed.
    pub fn set_base(&self, name: &VarName, value: f64) -> Result<usize> {
        self.check_base(name)?;
        match self.live_cells(name).first() {
            Some(cell) => cell.set_base(value),
            None => {
                self.values.set(name, value);
                self.refresher.refresh(name)
            }
        }
    }

    /// Load many base values at once.
    ///
    /// The refresher is paused while values are written, then every
    /// subscriber is refreshed once. On error the refresher is unpaused
    /// and nothing is refreshed.
    pub fn import<I>(&self, values: I) -> Result<usize>
    where
        I: IntoIterator<Item = (VarName, f64)>,
    {
        let was_paused = self.refresher.is_paused();
        self.refresher.set_paused(true);
        let written = self.write_all(values);
        self.refresher.set_paused(was_paused);

        let written = written?;
        let count = self.refresher.refresh_all()?;
        debug!("imported {} base values, refreshed {} cells", written, count);
        Ok(count)
    }

    fn write_all<I>(&self, values: I) -> Result<usize>
    where
        I: IntoIterator<Item = (VarName, f64)>,
    {
        let mut written = 0;
        for (name, value) in values {
            self.check_base(&name)?;
            let cells = self.live_cells(&name);
            match cells.first() {
                Some(cell) => {
                    cell.set_base_quiet(value);
                }
                None => {
                    self.values.set(&name, value);
                }
            }
            written += 1;
        }
        Ok(written)
    }

    /// Every base variable with its current value, defaults included.
    pub fn export(&self) -> BTreeMap<VarName, f64> {
        self.store
            .base_names()
            .map(|name| {
                let value = self
                    .values
                    .get(name)
                    .or_else(|| self.store.base_default(name))
                    .unwrap_or_default();
                (name.clone(), value)
            })
            .collect()
    }
}
